//! Audio extraction for the Telegram archive.
//!
//! Every video is downloaded into its own [`ScopedWorkdir`], transcoded to a
//! 32 kbps m4a by yt-dlp's ffmpeg post-processor, and the directory is removed
//! as soon as the handle drops, whatever happened in between.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::youtube::YtDlp;

pub const AUDIO_FORMAT: &str = "m4a";
pub const AUDIO_QUALITY: &str = "32K";
pub const DEFAULT_UPLOADER: &str = "Ethio Podcasts";
const NETWORK_RETRIES: u32 = 20;
const SOCKET_TIMEOUT_SECS: u32 = 60;

/// Metadata yt-dlp reported for a finished download plus the local file.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedAudio {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration: Option<i64>,
    pub thumbnail: Option<String>,
    pub path: PathBuf,
}

pub trait AudioDownloader {
    /// Fetches the best audio stream of `url` into `dir`.
    fn download_audio(&self, url: &str, dir: &Path) -> Result<DownloadedAudio>;
}

/// Per-video scratch directory, deleted on drop.
#[derive(Debug)]
pub struct ScopedWorkdir {
    dir: TempDir,
}

impl ScopedWorkdir {
    pub fn create(root: &Path, video_id: &str) -> Result<Self> {
        fs::create_dir_all(root).with_context(|| format!("creating {}", root.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("ingest-{video_id}-"))
            .tempdir_in(root)
            .with_context(|| format!("creating work directory for {video_id}"))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[derive(Deserialize)]
struct DownloadInfo {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
}

impl DownloadInfo {
    fn into_audio(self, dir: &Path) -> Result<DownloadedAudio> {
        let path = dir.join(format!("{}.{AUDIO_FORMAT}", self.id));
        if !path.is_file() {
            bail!("expected audio file {} was not produced", path.display());
        }
        Ok(DownloadedAudio {
            title: self.title.unwrap_or_else(|| self.id.clone()),
            uploader: self
                .uploader
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_UPLOADER.to_string()),
            duration: self.duration.map(|secs| secs.round() as i64),
            thumbnail: self.thumbnail,
            id: self.id,
            path,
        })
    }
}

impl AudioDownloader for YtDlp {
    fn download_audio(&self, url: &str, dir: &Path) -> Result<DownloadedAudio> {
        let template = dir.join("%(id)s.%(ext)s");
        let output = self
            .command()
            .arg("--format")
            .arg("bestaudio/best")
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg(AUDIO_FORMAT)
            .arg("--audio-quality")
            .arg(AUDIO_QUALITY)
            .arg("--retries")
            .arg(NETWORK_RETRIES.to_string())
            .arg("--fragment-retries")
            .arg(NETWORK_RETRIES.to_string())
            .arg("--socket-timeout")
            .arg(SOCKET_TIMEOUT_SECS.to_string())
            .arg("--output")
            .arg(template.to_string_lossy().to_string())
            .arg("--no-simulate")
            .arg("--dump-single-json")
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg(url)
            .output()
            .with_context(|| format!("downloading audio for {url}"))?;

        if !output.status.success() {
            bail!(
                "audio download failed for {} (status {}): {}",
                url,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let info: DownloadInfo =
            serde_json::from_slice(&output.stdout).context("deserializing download metadata")?;
        info.into_audio(dir)
    }
}
