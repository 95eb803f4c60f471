#![forbid(unsafe_code)]

//! Archives new uploads as audio in the Telegram channel and records each
//! one in Firestore so it is never posted twice.

use anyhow::Result;
use clap::Parser;
use ethiopodcasts_tools::{
    archive::Firestore,
    channels::ChannelTables,
    config::{RuntimeOverrides, resolve_runtime_settings},
    logging,
    pipeline::ArchiveSync,
    retry::ThreadSleeper,
    telegram::TelegramBot,
    youtube::YtDlp,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(about = "Mirror recent uploads into the Telegram audio channel")]
struct SyncArgs {
    /// `.env` file to read settings from.
    #[arg(long)]
    env_file: Option<PathBuf>,
    /// Scratch root for per-video downloads; overrides WORK_DIR.
    #[arg(long)]
    work_dir: Option<PathBuf>,
    /// TOML file replacing the built-in channel tables.
    #[arg(long)]
    channels: Option<PathBuf>,
    /// Scan these handles instead of the archive list. May be repeated.
    #[arg(long = "handle", value_name = "HANDLE")]
    handles: Vec<String>,
    /// yt-dlp executable to invoke.
    #[arg(long, default_value = "yt-dlp")]
    yt_dlp: PathBuf,
}

fn normalize_handle(handle: &str) -> String {
    let handle = handle.trim();
    if handle.starts_with('@') {
        handle.to_string()
    } else {
        format!("@{handle}")
    }
}

fn select_handles(tables: &ChannelTables, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        tables.archive.handles.clone()
    } else {
        requested.iter().map(|handle| normalize_handle(handle)).collect()
    }
}

fn main() -> Result<()> {
    logging::init()?;
    let args = SyncArgs::parse();

    let settings = resolve_runtime_settings(RuntimeOverrides {
        work_dir: args.work_dir.clone(),
        env_path: args.env_file.clone(),
        ..RuntimeOverrides::default()
    })?;
    let telegram = settings.telegram()?;
    let firestore = settings.firestore()?;
    let tables = ChannelTables::load(args.channels.as_deref())?;
    let handles = select_handles(&tables, &args.handles);

    let yt_dlp = YtDlp::with_program(args.yt_dlp.clone());
    yt_dlp.ensure_available()?;
    let bot = TelegramBot::new(&telegram)?;
    let store = Firestore::new(&firestore);

    info!(
        "Syncing {} channels into {} (work dir {})",
        handles.len(),
        telegram.channel_id,
        settings.work_dir.display()
    );
    let summary = ArchiveSync::new(
        &yt_dlp,
        &yt_dlp,
        &bot,
        &store,
        &ThreadSleeper,
        settings.work_dir.clone(),
    )
    .run(&handles);

    if summary.failed > 0 {
        warn!("{} videos could not be archived this run", summary.failed);
    }
    info!(
        "Done: {} new, {} already archived",
        summary.synced, summary.skipped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_archive_list() {
        let args = SyncArgs::try_parse_from(["telegram_sync"]).unwrap();
        let tables = ChannelTables::builtin().unwrap();
        let handles = select_handles(&tables, &args.handles);
        assert_eq!(handles.len(), 18);
        assert!(handles.iter().all(|handle| handle.starts_with('@')));
    }

    #[test]
    fn explicit_handles_gain_at_prefix() {
        let args = SyncArgs::try_parse_from([
            "telegram_sync",
            "--handle",
            "dejaftv",
            "--handle",
            " @marakiweg ",
            "--work-dir",
            "/var/tmp/ingest",
        ])
        .unwrap();
        let tables = ChannelTables::builtin().unwrap();
        assert_eq!(
            select_handles(&tables, &args.handles),
            vec!["@dejaftv".to_string(), "@marakiweg".to_string()]
        );
        assert_eq!(args.work_dir, Some(PathBuf::from("/var/tmp/ingest")));
    }
}
