//! Batch drivers for both scrapers.
//!
//! Each driver walks its channel list strictly in order. Failures are scoped:
//! a channel that cannot be listed or a video that cannot be processed is
//! logged and skipped, and the batch carries on. Only a broken local catalog
//! stops a run.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::archive::{ArchiveRecord, ArchiveStore};
use crate::catalog::PodcastCatalog;
use crate::channels::{ARCHIVE_LISTING_LIMIT, CATALOG_LISTING_LIMIT, CatalogChannel};
use crate::classify::{Taxonomy, clean_title};
use crate::feed::{FeedSource, enrich};
use crate::media::{AudioDownloader, ScopedWorkdir};
use crate::retry::{RetryPolicy, Sleeper, retry};
use crate::telegram::{AudioPublisher, AudioUpload, caption};
use crate::youtube::{ListedVideo, VideoLister, channel_videos_url, handle_url, watch_url};

/// Pause between channels to stay polite with YouTube.
pub const CHANNEL_DELAY: Duration = Duration::from_millis(500);
/// Pause after each successful Telegram post to avoid flood limits.
pub const PUBLISH_COOLDOWN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub channels_processed: usize,
    pub total_podcasts: usize,
    pub new_podcasts: usize,
}

/// Lists, dates, classifies and stores uploads into the local catalog.
pub struct CatalogSync<'a> {
    pub lister: &'a dyn VideoLister,
    pub feed: &'a dyn FeedSource,
    pub sleeper: &'a dyn Sleeper,
    pub taxonomy: Taxonomy,
    pub limit: usize,
    pub channel_delay: Duration,
    pub clock: fn() -> DateTime<Utc>,
}

impl<'a> CatalogSync<'a> {
    pub fn new(
        lister: &'a dyn VideoLister,
        feed: &'a dyn FeedSource,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            lister,
            feed,
            sleeper,
            taxonomy: Taxonomy::catalog(),
            limit: CATALOG_LISTING_LIMIT,
            channel_delay: CHANNEL_DELAY,
            clock: Utc::now,
        }
    }

    /// Processes every channel, then rewrites the catalog once.
    pub fn run(
        &self,
        catalog: &mut PodcastCatalog,
        channels: &[CatalogChannel],
    ) -> Result<CatalogSummary> {
        let mut summary = CatalogSummary::default();

        for (index, channel) in channels.iter().enumerate() {
            if index > 0 {
                self.sleeper.sleep(self.channel_delay);
            }
            let display_name = channel.display_name();
            info!("Processing {display_name}");

            let Some(channel_id) = channel.channel_id.as_deref() else {
                warn!("  Channel id not known for {display_name}, skipping");
                continue;
            };

            let videos = self.fetch_channel(channel_id);
            if videos.is_empty() {
                warn!("  No videos found for {display_name}");
                continue;
            }
            info!("  Found {} videos", videos.len());

            for video in &videos {
                let category = self
                    .taxonomy
                    .classify(&video.title, video.description.as_deref());
                summary.total_podcasts += 1;
                if catalog.upsert(video, &display_name, category, (self.clock)()) {
                    summary.new_podcasts += 1;
                } else {
                    info!("  Already exists: {}", preview(&video.title, 30));
                }
            }

            summary.channels_processed += 1;
            info!("  Processed {} videos from {display_name}", videos.len());
        }

        catalog.save()?;
        info!(
            "Catalog sync complete: {}/{} channels, {} podcasts stored, {} new",
            summary.channels_processed,
            channels.len(),
            catalog.len(),
            summary.new_podcasts
        );
        Ok(summary)
    }

    /// Listing plus feed dates. Both collaborators failing only costs data.
    fn fetch_channel(&self, channel_id: &str) -> Vec<ListedVideo> {
        let url = channel_videos_url(channel_id);
        let mut videos = match self.lister.list_recent(&url, self.limit) {
            Ok(videos) => videos,
            Err(err) => {
                warn!("  Listing error for {channel_id}: {err:#}");
                return Vec::new();
            }
        };
        if videos.is_empty() {
            return videos;
        }
        match self.feed.published_dates(channel_id) {
            Ok(entries) => {
                let dated = enrich(&mut videos, &entries);
                info!("  Feed dated {dated}/{} videos", videos.len());
            }
            Err(err) => warn!("  Feed error for {channel_id}: {err:#}"),
        }
        videos
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut shortened: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        shortened.push_str("...");
    }
    shortened
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOutcome {
    Synced,
    PublishFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub scanned: usize,
    pub skipped: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Downloads new uploads as audio, posts them to Telegram and records them
/// in the remote archive.
pub struct ArchiveSync<'a> {
    pub lister: &'a dyn VideoLister,
    pub downloader: &'a dyn AudioDownloader,
    pub publisher: &'a dyn AudioPublisher,
    pub store: &'a dyn ArchiveStore,
    pub sleeper: &'a dyn Sleeper,
    pub work_root: PathBuf,
    pub taxonomy: Taxonomy,
    pub retry: RetryPolicy,
    pub limit: usize,
    pub channel_delay: Duration,
    pub cooldown: Duration,
}

impl<'a> ArchiveSync<'a> {
    pub fn new(
        lister: &'a dyn VideoLister,
        downloader: &'a dyn AudioDownloader,
        publisher: &'a dyn AudioPublisher,
        store: &'a dyn ArchiveStore,
        sleeper: &'a dyn Sleeper,
        work_root: PathBuf,
    ) -> Self {
        Self {
            lister,
            downloader,
            publisher,
            store,
            sleeper,
            work_root,
            taxonomy: Taxonomy::archive(),
            retry: RetryPolicy::PUBLISH,
            limit: ARCHIVE_LISTING_LIMIT,
            channel_delay: CHANNEL_DELAY,
            cooldown: PUBLISH_COOLDOWN,
        }
    }

    pub fn run(&self, handles: &[String]) -> ArchiveSummary {
        let mut summary = ArchiveSummary::default();
        for (index, handle) in handles.iter().enumerate() {
            if index > 0 {
                self.sleeper.sleep(self.channel_delay);
            }
            info!("--- Scanning: {handle} ---");
            if let Err(err) = self.scan_channel(handle, &mut summary) {
                error!("Error scanning {handle}: {err:#}");
            }
        }
        info!(
            "Archive sync finished: {} scanned, {} skipped, {} synced, {} failed",
            summary.scanned, summary.skipped, summary.synced, summary.failed
        );
        summary
    }

    fn scan_channel(&self, handle: &str, summary: &mut ArchiveSummary) -> Result<()> {
        let videos = self.lister.list_recent(&handle_url(handle), self.limit)?;
        for video in videos {
            summary.scanned += 1;
            match self.sync_video(&video.id) {
                Ok(None) => summary.skipped += 1,
                Ok(Some(VideoOutcome::Synced)) => summary.synced += 1,
                Ok(Some(VideoOutcome::PublishFailed)) => summary.failed += 1,
                Err(err) => {
                    error!("Final error for {}: {err:#}", video.id);
                    summary.failed += 1;
                }
            }
        }
        Ok(())
    }

    /// `None` when the archive already holds `video_id`.
    fn sync_video(&self, video_id: &str) -> Result<Option<VideoOutcome>> {
        if self.store.exists(video_id)? {
            info!(" Skipping {video_id} (Done)");
            return Ok(None);
        }
        self.process_video(video_id, &watch_url(video_id)).map(Some)
    }

    /// Download, classify, publish and record one video. The work directory
    /// is gone by the time this returns, whatever the outcome.
    pub fn process_video(&self, video_id: &str, url: &str) -> Result<VideoOutcome> {
        let workdir = ScopedWorkdir::create(&self.work_root, video_id)?;
        info!("Downloading: {url}");
        let audio = self.downloader.download_audio(url, workdir.path())?;
        if audio.id != video_id {
            bail!("downloaded {} while archiving {video_id}", audio.id);
        }

        let category = self.taxonomy.classify(&audio.title, None);
        let display_title = clean_title(&audio.title);
        info!("Uploading to Telegram: {}", preview(&display_title, 40));

        let upload = AudioUpload {
            path: audio.path.clone(),
            caption: caption(category, &audio.uploader, &display_title),
            title: display_title.clone(),
            performer: audio.uploader.clone(),
        };
        let sent = retry(
            &self.retry,
            self.sleeper,
            &format!("uploading {video_id}"),
            |_| self.publisher.send_audio(&upload),
        );
        drop(workdir);

        let Some(sent) = sent else {
            return Ok(VideoOutcome::PublishFailed);
        };

        let record = ArchiveRecord {
            title: display_title,
            thumbnail_url: audio.thumbnail,
            duration: audio.duration,
            category: category.to_string(),
            uploader: audio.uploader,
            telegram_file_id: sent.file_id,
            telegram_message_id: sent.message_id.to_string(),
            youtube_url: url.to_string(),
        };
        self.store.put(video_id, &record)?;
        info!("Successfully synced {video_id}");
        self.sleeper.sleep(self.cooldown);
        Ok(VideoOutcome::Synced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedEntry;
    use crate::media::DownloadedAudio;
    use crate::telegram::SentAudio;
    use crate::testutil::RecordingSleeper;
    use anyhow::{anyhow, bail};
    use chrono::TimeZone;
    use std::cell::{Cell, RefCell};
    use std::collections::{BTreeMap, HashMap};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeLister {
        channels: HashMap<String, Vec<ListedVideo>>,
        requests: RefCell<Vec<(String, usize)>>,
    }

    impl FakeLister {
        fn with(mut self, url: String, videos: Vec<ListedVideo>) -> Self {
            self.channels.insert(url, videos);
            self
        }
    }

    impl VideoLister for FakeLister {
        fn list_recent(&self, channel_url: &str, limit: usize) -> Result<Vec<ListedVideo>> {
            self.requests
                .borrow_mut()
                .push((channel_url.to_string(), limit));
            self.channels
                .get(channel_url)
                .cloned()
                .ok_or_else(|| anyhow!("channel {channel_url} unavailable"))
        }
    }

    #[derive(Default)]
    struct FakeFeed {
        entries: HashMap<String, Vec<FeedEntry>>,
    }

    impl FeedSource for FakeFeed {
        fn published_dates(&self, channel_id: &str) -> Result<Vec<FeedEntry>> {
            self.entries
                .get(channel_id)
                .cloned()
                .ok_or_else(|| anyhow!("feed for {channel_id} unreachable"))
        }
    }

    /// Writes a fake m4a, or a partial file followed by an error for ids
    /// listed in `fail_ids`.
    #[derive(Default)]
    struct FakeDownloader {
        titles: HashMap<String, String>,
        fail_ids: Vec<String>,
        /// Id reported back instead of the requested one.
        reported_id: Option<String>,
        dirs: RefCell<Vec<PathBuf>>,
    }

    impl AudioDownloader for FakeDownloader {
        fn download_audio(&self, url: &str, dir: &Path) -> Result<DownloadedAudio> {
            let id = url.rsplit('=').next().unwrap_or_default().to_string();
            self.dirs.borrow_mut().push(dir.to_path_buf());
            if self.fail_ids.contains(&id) {
                fs::write(dir.join(format!("{id}.webm.part")), "partial")?;
                bail!("fragment 3 not found");
            }
            let path = dir.join(format!("{id}.m4a"));
            fs::write(&path, "audio")?;
            Ok(DownloadedAudio {
                title: self.titles.get(&id).cloned().unwrap_or_else(|| id.clone()),
                uploader: "Dejaf TV".into(),
                duration: Some(1200),
                thumbnail: Some(format!("https://thumb/{id}.jpg")),
                id: self.reported_id.clone().unwrap_or(id),
                path,
            })
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    struct FakePublisher {
        failures: Cell<u32>,
        calls: Cell<u32>,
        uploads: RefCell<Vec<AudioUpload>>,
    }

    impl FakePublisher {
        fn failing(failures: u32) -> Self {
            Self {
                failures: Cell::new(failures),
                calls: Cell::new(0),
                uploads: RefCell::new(Vec::new()),
            }
        }
    }

    impl AudioPublisher for FakePublisher {
        fn send_audio(&self, upload: &AudioUpload) -> Result<SentAudio> {
            self.calls.set(self.calls.get() + 1);
            assert!(upload.path.is_file(), "audio must exist while uploading");
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                bail!("connection reset");
            }
            self.uploads.borrow_mut().push(upload.clone());
            Ok(SentAudio {
                file_id: format!("file-{}", self.calls.get()),
                message_id: 900 + i64::from(self.calls.get()),
            })
        }
    }

    #[derive(Default)]
    struct MemoryArchive {
        docs: RefCell<BTreeMap<String, ArchiveRecord>>,
        broken_ids: Vec<String>,
    }

    impl ArchiveStore for MemoryArchive {
        fn exists(&self, video_id: &str) -> Result<bool> {
            if self.broken_ids.iter().any(|id| id == video_id) {
                bail!("deadline exceeded");
            }
            Ok(self.docs.borrow().contains_key(video_id))
        }

        fn put(&self, video_id: &str, record: &ArchiveRecord) -> Result<()> {
            self.docs
                .borrow_mut()
                .insert(video_id.to_string(), record.clone());
            Ok(())
        }
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 5, 12, 0, 0).unwrap()
    }

    fn listed(id: &str, title: &str, description: Option<&str>) -> ListedVideo {
        ListedVideo {
            id: id.into(),
            title: title.into(),
            description: description.map(str::to_string),
            ..ListedVideo::default()
        }
    }

    fn dejaf() -> CatalogChannel {
        CatalogChannel {
            handle: "dejaftv".into(),
            channel_id: Some("UCdQ-5b2xJiCWgxinWo4NX7w".into()),
        }
    }

    fn dejaf_fixtures() -> (FakeLister, FakeFeed) {
        let lister = FakeLister::default().with(
            channel_videos_url("UCdQ-5b2xJiCWgxinWo4NX7w"),
            vec![
                listed("vid1", "Amazing Tech Startup AI", Some("")),
                listed("vid2", "Best Lifestyle Tips", None),
            ],
        );
        let mut feed = FakeFeed::default();
        feed.entries.insert(
            "UCdQ-5b2xJiCWgxinWo4NX7w".into(),
            vec![FeedEntry {
                video_id: "vid1".into(),
                published: "2026-02-04T10:29:10+00:00".into(),
            }],
        );
        (lister, feed)
    }

    fn catalog_sync<'a>(
        lister: &'a FakeLister,
        feed: &'a FakeFeed,
        sleeper: &'a RecordingSleeper,
    ) -> CatalogSync<'a> {
        CatalogSync {
            clock: fixed_clock,
            ..CatalogSync::new(lister, feed, sleeper)
        }
    }

    #[test]
    fn catalog_sync_classifies_dates_and_saves() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("podcasts.json");
        let (lister, feed) = dejaf_fixtures();
        let sleeper = RecordingSleeper::default();
        let mut catalog = PodcastCatalog::load(&path)?;

        let summary = catalog_sync(&lister, &feed, &sleeper).run(&mut catalog, &[dejaf()])?;
        assert_eq!(
            summary,
            CatalogSummary {
                channels_processed: 1,
                total_podcasts: 2,
                new_podcasts: 2,
            }
        );
        assert_eq!(
            lister.requests.borrow().as_slice(),
            &[(
                "https://www.youtube.com/channel/UCdQ-5b2xJiCWgxinWo4NX7w/videos".to_string(),
                CATALOG_LISTING_LIMIT
            )]
        );

        let saved = PodcastCatalog::load(&path)?;
        let tech = saved.get("vid1").unwrap();
        assert_eq!(tech.category, "Tech");
        assert_eq!(tech.uploader, "@dejaftv");
        assert_eq!(tech.created_at, "2026-02-04T10:29:10+00:00");
        let lifestyle = saved.get("vid2").unwrap();
        assert_eq!(lifestyle.category, "Lifestyle");
        assert_eq!(lifestyle.created_at, "2026-02-05T12:00:00Z");
        Ok(())
    }

    #[test]
    fn catalog_sync_rerun_adds_nothing() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("podcasts.json");
        let (lister, feed) = dejaf_fixtures();
        let sleeper = RecordingSleeper::default();
        let sync = catalog_sync(&lister, &feed, &sleeper);

        let mut first = PodcastCatalog::load(&path)?;
        sync.run(&mut first, &[dejaf()])?;

        let mut second = PodcastCatalog::load(&path)?;
        let summary = sync.run(&mut second, &[dejaf()])?;
        assert_eq!(summary.new_podcasts, 0);
        assert_eq!(summary.total_podcasts, 2);
        assert_eq!(second.entries(), first.entries());
        Ok(())
    }

    #[test]
    fn catalog_sync_isolates_channel_failures() -> Result<()> {
        let dir = tempdir()?;
        let (lister, _) = dejaf_fixtures();
        // No feed entries at all: dates fall back to the clock.
        let feed = FakeFeed::default();
        let sleeper = RecordingSleeper::default();
        let mut catalog = PodcastCatalog::load(dir.path().join("podcasts.json"))?;
        let channels = vec![
            CatalogChannel {
                handle: "unlisted".into(),
                channel_id: Some("UCmissing".into()),
            },
            CatalogChannel {
                handle: "orphan".into(),
                channel_id: None,
            },
            dejaf(),
        ];

        let summary = catalog_sync(&lister, &feed, &sleeper).run(&mut catalog, &channels)?;
        assert_eq!(summary.channels_processed, 1);
        assert_eq!(summary.new_podcasts, 2);
        assert_eq!(
            catalog.get("vid1").unwrap().created_at,
            "2026-02-05T12:00:00Z"
        );
        assert_eq!(sleeper.millis(), vec![500, 500]);
        Ok(())
    }

    #[test]
    fn catalog_sync_refuses_to_run_on_corrupt_store() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("podcasts.json");
        fs::write(&path, "[not a map")?;
        assert!(PodcastCatalog::load(&path).is_err());
        assert_eq!(fs::read_to_string(&path)?, "[not a map");
        Ok(())
    }

    fn archive_lister() -> FakeLister {
        FakeLister::default().with(
            handle_url("@dejaftv"),
            vec![listed("done", "Old", None), listed("fresh", "New", None)],
        )
    }

    fn archive_sync<'a>(
        lister: &'a FakeLister,
        downloader: &'a FakeDownloader,
        publisher: &'a FakePublisher,
        store: &'a MemoryArchive,
        sleeper: &'a RecordingSleeper,
        work_root: &Path,
    ) -> ArchiveSync<'a> {
        ArchiveSync::new(
            lister,
            downloader,
            publisher,
            store,
            sleeper,
            work_root.to_path_buf(),
        )
    }

    fn existing_record() -> ArchiveRecord {
        ArchiveRecord {
            title: "Old".into(),
            thumbnail_url: None,
            duration: None,
            category: "General".into(),
            uploader: "Dejaf TV".into(),
            telegram_file_id: "f0".into(),
            telegram_message_id: "1".into(),
            youtube_url: watch_url("done"),
        }
    }

    #[test]
    fn archive_sync_skips_existing_and_publishes_new() -> Result<()> {
        let work = tempdir()?;
        let lister = archive_lister();
        let mut downloader = FakeDownloader::default();
        downloader
            .titles
            .insert("fresh".into(), "Startup secrets #podcast #ethiopia".into());
        let publisher = FakePublisher::failing(0);
        let store = MemoryArchive::default();
        store.put("done", &existing_record())?;
        let sleeper = RecordingSleeper::default();

        let summary = archive_sync(&lister, &downloader, &publisher, &store, &sleeper, work.path())
            .run(&["@dejaftv".to_string()]);
        assert_eq!(
            summary,
            ArchiveSummary {
                scanned: 2,
                skipped: 1,
                synced: 1,
                failed: 0,
            }
        );
        assert_eq!(lister.requests.borrow()[0].1, ARCHIVE_LISTING_LIMIT);

        // The existing id was never downloaded or re-published.
        assert_eq!(downloader.dirs.borrow().len(), 1);
        assert_eq!(store.docs.borrow()["done"], existing_record());

        let uploads = publisher.uploads.borrow();
        assert_eq!(uploads[0].caption, "#Tech | Dejaf TV\n\nStartup secrets");
        assert_eq!(uploads[0].title, "Startup secrets");
        assert_eq!(uploads[0].performer, "Dejaf TV");

        let docs = store.docs.borrow();
        let record = &docs["fresh"];
        assert_eq!(record.title, "Startup secrets");
        assert_eq!(record.category, "Tech");
        assert_eq!(record.telegram_file_id, "file-1");
        assert_eq!(record.telegram_message_id, "901");
        assert_eq!(record.duration, Some(1200));
        assert_eq!(record.youtube_url, "https://www.youtube.com/watch?v=fresh");
        assert_eq!(sleeper.seconds(), vec![5]);
        assert_eq!(fs::read_dir(work.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn archive_sync_is_at_most_once_across_runs() -> Result<()> {
        let work = tempdir()?;
        let lister = archive_lister();
        let downloader = FakeDownloader::default();
        let publisher = FakePublisher::failing(0);
        let store = MemoryArchive::default();
        let sleeper = RecordingSleeper::default();
        let sync = archive_sync(&lister, &downloader, &publisher, &store, &sleeper, work.path());

        let first = sync.run(&["@dejaftv".to_string()]);
        assert_eq!(first.synced, 2);
        let second = sync.run(&["@dejaftv".to_string()]);
        assert_eq!(second.synced, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(publisher.calls.get(), 2);
        assert_eq!(downloader.dirs.borrow().len(), 2);
        Ok(())
    }

    #[test]
    fn publish_retries_with_linear_backoff_then_succeeds() -> Result<()> {
        let work = tempdir()?;
        let lister = FakeLister::default();
        let downloader = FakeDownloader::default();
        let publisher = FakePublisher::failing(6);
        let store = MemoryArchive::default();
        let sleeper = RecordingSleeper::default();
        let sync = archive_sync(&lister, &downloader, &publisher, &store, &sleeper, work.path());

        let outcome = sync.process_video("vid7", &watch_url("vid7"))?;
        assert_eq!(outcome, VideoOutcome::Synced);
        assert_eq!(publisher.calls.get(), 7);
        assert_eq!(sleeper.seconds(), vec![15, 30, 45, 60, 75, 90, 5]);
        assert_eq!(store.docs.borrow()["vid7"].telegram_file_id, "file-7");
        Ok(())
    }

    #[test]
    fn exhausted_publish_skips_record_and_continues() -> Result<()> {
        let work = tempdir()?;
        let lister = archive_lister();
        let downloader = FakeDownloader::default();
        let publisher = FakePublisher::failing(7);
        let store = MemoryArchive::default();
        let sleeper = RecordingSleeper::default();

        let summary = archive_sync(&lister, &downloader, &publisher, &store, &sleeper, work.path())
            .run(&["@dejaftv".to_string()]);
        // First video burns all seven attempts; the second one succeeds.
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.synced, 1);
        assert!(!store.docs.borrow().contains_key("done"));
        assert!(store.docs.borrow().contains_key("fresh"));
        assert_eq!(
            sleeper.seconds(),
            vec![15, 30, 45, 60, 75, 90, 105, 5],
            "the final failed attempt waits too"
        );
        assert_eq!(fs::read_dir(work.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn download_failure_cleans_workdir_and_moves_on() -> Result<()> {
        let work = tempdir()?;
        let lister = archive_lister();
        let downloader = FakeDownloader {
            fail_ids: vec!["done".into()],
            ..FakeDownloader::default()
        };
        let publisher = FakePublisher::failing(0);
        let store = MemoryArchive::default();
        let sleeper = RecordingSleeper::default();

        let summary = archive_sync(&lister, &downloader, &publisher, &store, &sleeper, work.path())
            .run(&["@dejaftv".to_string()]);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.synced, 1);

        let dirs = downloader.dirs.borrow();
        assert_eq!(dirs.len(), 2);
        assert!(!dirs[0].exists(), "failed download left its workdir behind");
        assert!(
            dirs[0]
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("ingest-done-")
        );
        assert_eq!(fs::read_dir(work.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn mismatched_download_id_is_not_published() -> Result<()> {
        let work = tempdir()?;
        let lister = FakeLister::default();
        let downloader = FakeDownloader {
            reported_id: Some("other".into()),
            ..FakeDownloader::default()
        };
        let publisher = FakePublisher::failing(0);
        let store = MemoryArchive::default();
        let sleeper = RecordingSleeper::default();
        let sync = archive_sync(&lister, &downloader, &publisher, &store, &sleeper, work.path());

        let err = sync
            .process_video("vid1", &watch_url("vid1"))
            .unwrap_err();
        assert!(err.to_string().contains("while archiving vid1"));
        assert_eq!(publisher.calls.get(), 0);
        assert!(store.docs.borrow().is_empty());
        assert_eq!(fs::read_dir(work.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn archive_sync_isolates_channels_and_lookup_errors() -> Result<()> {
        let work = tempdir()?;
        let lister = archive_lister();
        let downloader = FakeDownloader::default();
        let publisher = FakePublisher::failing(0);
        let store = MemoryArchive {
            broken_ids: vec!["done".into()],
            ..MemoryArchive::default()
        };
        let sleeper = RecordingSleeper::default();

        let summary = archive_sync(&lister, &downloader, &publisher, &store, &sleeper, work.path())
            .run(&["@vanished".to_string(), "@dejaftv".to_string()]);
        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.synced, 1);
        assert_eq!(sleeper.millis(), vec![500, 5000]);
        Ok(())
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("ሰላም ለሁላችሁ", 3), "ሰላም...");
        assert_eq!(preview("short", 30), "short");
    }
}
