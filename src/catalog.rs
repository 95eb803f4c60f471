//! Local JSON catalog consumed by the web backend.
//!
//! The file holds one JSON object mapping video id to [`PodcastRecord`]. It
//! is loaded whole, only ever gains entries, and is rewritten whole.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::youtube::{ListedVideo, watch_url};

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/mqdefault.jpg")
}

/// Embeddable player URL the frontend streams from.
pub fn streaming_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{video_id}?autoplay=1&modestbranding=1")
}

/// Older catalog files sometimes carry `null` where a string is expected.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Durations written by older scrapers are yt-dlp floats such as `1834.0`.
fn lenient_duration<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Whole(i64),
        Fractional(f64),
    }

    Ok(
        Option::<Seconds>::deserialize(deserializer)?.map(|seconds| match seconds {
            Seconds::Whole(secs) => secs,
            Seconds::Fractional(secs) => secs.round() as i64,
        }),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastRecord {
    pub id: String,
    pub title: String,
    pub display_title: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    pub uploader: String,
    pub category: String,
    #[serde(default, deserialize_with = "lenient_duration")]
    pub duration: Option<i64>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub thumbnail: String,
    pub streaming_url: String,
    pub youtube_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PodcastRecord {
    /// Builds a fresh record. `created_at` prefers the upload date so the
    /// frontend can sort by when an episode aired, not when it was scraped.
    pub fn from_video(
        video: &ListedVideo,
        uploader: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let now = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let created_at = video
            .published_at
            .clone()
            .filter(|date| !date.trim().is_empty())
            .unwrap_or_else(|| now.clone());
        let thumbnail = video
            .thumbnail
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| thumbnail_url(&video.id));
        Self {
            id: video.id.clone(),
            title: video.title.clone(),
            display_title: video.title.clone(),
            description: video.description.clone().unwrap_or_default(),
            uploader: uploader.to_string(),
            category: category.to_string(),
            duration: video.duration,
            thumbnail,
            streaming_url: streaming_url(&video.id),
            youtube_url: watch_url(&video.id),
            created_at,
            updated_at: now,
        }
    }

    /// Creation time as a comparable instant. Naive timestamps are read as
    /// UTC; unparsable dates sort oldest.
    pub fn created_instant(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| naive.and_utc())
            })
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Clone)]
pub struct PodcastCatalog {
    path: PathBuf,
    entries: BTreeMap<String, PodcastRecord>,
}

impl PodcastCatalog {
    /// Reads the catalog at `path`. A missing file is an empty catalog; an
    /// unreadable or malformed one is an error so callers never overwrite it.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                entries: BTreeMap::new(),
            });
        }
        let raw =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let entries = serde_json::from_str(&raw)
            .with_context(|| format!("parsing podcast catalog {}", path.display()))?;
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.entries.contains_key(video_id)
    }

    pub fn get(&self, video_id: &str) -> Option<&PodcastRecord> {
        self.entries.get(video_id)
    }

    pub fn entries(&self) -> &BTreeMap<String, PodcastRecord> {
        &self.entries
    }

    pub fn records(&self) -> impl Iterator<Item = &PodcastRecord> {
        self.entries.values()
    }

    /// Distinct non-empty categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.records()
            .map(|record| record.category.as_str())
            .filter(|category| !category.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Inserts `video` unless its id is already stored. Returns whether a
    /// record was added.
    pub fn upsert(
        &mut self,
        video: &ListedVideo,
        uploader: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if self.entries.contains_key(&video.id) {
            return false;
        }
        let record = PodcastRecord::from_video(video, uploader, category, now);
        self.entries.insert(record.id.clone(), record);
        true
    }

    /// Rewrites the whole file through a sibling temp file so a crash never
    /// leaves half-written JSON behind.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(&self.entries).context("serializing podcast catalog")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json + "\n")
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
