//! Publish-date backfill from the public YouTube Atom feed.
//!
//! Flat channel listings rarely carry upload timestamps, while the per-channel
//! feed at `/feeds/videos.xml` lists the latest uploads with `<published>`
//! dates. Entries are joined to listed videos by id.

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

use crate::youtube::ListedVideo;

const FEED_TIMEOUT: Duration = Duration::from_secs(15);

static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid regex"));
static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<yt:videoId>\s*([^<\s]+)\s*</yt:videoId>").expect("valid regex")
});
static PUBLISHED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<published>\s*([^<\s]+)\s*</published>").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub video_id: String,
    pub published: String,
}

pub trait FeedSource {
    fn published_dates(&self, channel_id: &str) -> Result<Vec<FeedEntry>>;
}

pub fn feed_url(channel_id: &str) -> String {
    format!("https://www.youtube.com/feeds/videos.xml?channel_id={channel_id}")
}

/// Extracts `(videoId, published)` pairs; entries lacking either are dropped.
pub fn parse_feed(body: &str) -> Vec<FeedEntry> {
    ENTRY
        .captures_iter(body)
        .filter_map(|entry| {
            let entry = entry.get(1)?.as_str();
            let video_id = VIDEO_ID.captures(entry)?.get(1)?.as_str().to_string();
            let published = PUBLISHED.captures(entry)?.get(1)?.as_str().to_string();
            Some(FeedEntry {
                video_id,
                published,
            })
        })
        .collect()
}

/// Copies feed dates onto matching videos and returns how many were set.
pub fn enrich(videos: &mut [ListedVideo], entries: &[FeedEntry]) -> usize {
    let mut updated = 0;
    for entry in entries {
        if let Some(video) = videos.iter_mut().find(|video| video.id == entry.video_id) {
            video.published_at = Some(entry.published.clone());
            updated += 1;
        }
    }
    updated
}

/// HTTP-backed feed reader.
pub struct YouTubeFeed {
    agent: ureq::Agent,
    base_url: Option<String>,
}

impl Default for YouTubeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl YouTubeFeed {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(FEED_TIMEOUT).build(),
            base_url: None,
        }
    }

    /// Points the reader at another host serving the same query layout.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::new()
        }
    }

    fn url_for(&self, channel_id: &str) -> String {
        match &self.base_url {
            Some(base) => format!(
                "{}/feeds/videos.xml?channel_id={channel_id}",
                base.trim_end_matches('/')
            ),
            None => feed_url(channel_id),
        }
    }
}

impl FeedSource for YouTubeFeed {
    fn published_dates(&self, channel_id: &str) -> Result<Vec<FeedEntry>> {
        let url = self.url_for(channel_id);
        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            // Anything but 200 means there is nothing to join against.
            Err(ureq::Error::Status(_, _)) => return Ok(Vec::new()),
            Err(err) => return Err(err).with_context(|| format!("fetching feed {url}")),
        };
        if response.status() != 200 {
            return Ok(Vec::new());
        }
        let body = response
            .into_string()
            .with_context(|| format!("reading feed body from {url}"))?;
        Ok(parse_feed(&body))
    }
}
