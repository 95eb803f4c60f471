//! Channel enumeration through `yt-dlp`.
//!
//! Listing runs `yt-dlp --flat-playlist --dump-single-json` against a channel
//! page and keeps only the handful of fields the scrapers persist. Nothing is
//! downloaded here; see [`crate::media`] for the audio path.

use anyhow::{Context, Result, bail};
use chrono::DateTime;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Metadata for one upload as reported by the channel listing, optionally
/// backfilled with a publish date by [`crate::feed::enrich`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListedVideo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<i64>,
    pub view_count: Option<i64>,
    pub uploader: Option<String>,
    pub published_at: Option<String>,
}

/// Anything that can list the most recent uploads of a channel page.
pub trait VideoLister {
    fn list_recent(&self, channel_url: &str, limit: usize) -> Result<Vec<ListedVideo>>;
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Uploads tab of a channel addressed by its raw id.
pub fn channel_videos_url(channel_id: &str) -> String {
    format!("https://www.youtube.com/channel/{channel_id}/videos")
}

/// Channel page addressed by `@handle`; a missing `@` is added.
pub fn handle_url(handle: &str) -> String {
    let handle = handle.trim_start_matches('@');
    format!("https://www.youtube.com/@{handle}")
}

/// Handle to the `yt-dlp` executable. Tests point it at a shell stub.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlp {
    pub fn new() -> Self {
        Self::with_program("yt-dlp")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub(crate) fn command(&self) -> Command {
        Command::new(&self.program)
    }

    /// Runs `<program> --version` so a missing install fails loudly at
    /// startup instead of once per channel.
    pub fn ensure_available(&self) -> Result<()> {
        let status = self
            .command()
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => bail!(
                "{} is installed but returned a failure status",
                self.program.display()
            ),
            Err(err) => bail!(
                "{} is not installed or not in PATH: {}",
                self.program.display(),
                err
            ),
        }
    }
}

#[derive(Deserialize)]
struct PlaylistDump {
    #[serde(default)]
    entries: Vec<Option<FlatEntry>>,
}

#[derive(Deserialize)]
struct ThumbnailEntry {
    url: Option<String>,
}

/// Flat playlist entries leave most fields out, so everything is optional.
#[derive(Deserialize)]
struct FlatEntry {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<ThumbnailEntry>,
    duration: Option<f64>,
    view_count: Option<i64>,
    uploader: Option<String>,
    timestamp: Option<i64>,
}

impl FlatEntry {
    fn into_listed(self) -> Option<ListedVideo> {
        let id = self.id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())?;
        // The last thumbnail yt-dlp reports is the largest one.
        let thumbnail = self
            .thumbnail
            .filter(|url| !url.is_empty())
            .or_else(|| self.thumbnails.into_iter().rev().find_map(|thumb| thumb.url));
        Some(ListedVideo {
            id,
            title: self.title.unwrap_or_default(),
            description: self.description.filter(|text| !text.is_empty()),
            thumbnail,
            duration: self.duration.map(|secs| secs.round() as i64),
            view_count: self.view_count,
            uploader: self.uploader,
            published_at: self.timestamp.and_then(timestamp_to_iso),
        })
    }
}

fn timestamp_to_iso(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.to_rfc3339())
}

/// Parses the JSON printed by `--dump-single-json` for a channel page.
pub fn parse_playlist(raw: &str) -> Result<Vec<ListedVideo>> {
    let dump: PlaylistDump = serde_json::from_str(raw).context("deserializing playlist JSON")?;
    Ok(dump
        .entries
        .into_iter()
        .flatten()
        .filter_map(FlatEntry::into_listed)
        .collect())
}

impl VideoLister for YtDlp {
    fn list_recent(&self, channel_url: &str, limit: usize) -> Result<Vec<ListedVideo>> {
        let output = self
            .command()
            .arg("--flat-playlist")
            .arg("--dump-single-json")
            .arg("--playlist-end")
            .arg(limit.to_string())
            .arg("--ignore-errors")
            .arg("--no-warnings")
            .arg(channel_url)
            .output()
            .with_context(|| format!("retrieving playlist from {}", channel_url))?;

        if !output.status.success() {
            bail!(
                "failed to list videos for {} (status: {})",
                channel_url,
                output.status
            );
        }

        let raw = String::from_utf8(output.stdout).context("playlist JSON is not UTF-8")?;
        let mut videos = parse_playlist(&raw)?;
        videos.truncate(limit);
        Ok(videos)
    }
}
