#![forbid(unsafe_code)]

//! Refreshes the local podcast catalog from the YouTube watchlist.
//!
//! Run it from cron; every invocation only ever adds episodes, so it is safe
//! to repeat.

use anyhow::{Result, bail};
use clap::Parser;
use ethiopodcasts_tools::{
    catalog::PodcastCatalog,
    channels::{CatalogChannel, ChannelTables},
    config::{RuntimeOverrides, resolve_runtime_settings},
    feed::YouTubeFeed,
    logging,
    pipeline::CatalogSync,
    retry::ThreadSleeper,
    youtube::YtDlp,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Scrape the watchlist channels into the local podcast catalog")]
struct ScrapeArgs {
    /// `.env` file to read settings from.
    #[arg(long)]
    env_file: Option<PathBuf>,
    /// Catalog file to update; overrides PODCASTS_FILE.
    #[arg(long)]
    podcasts_file: Option<PathBuf>,
    /// TOML file replacing the built-in channel tables.
    #[arg(long)]
    channels: Option<PathBuf>,
    /// Restrict the run to these handles. May be repeated.
    #[arg(long = "only", value_name = "HANDLE")]
    only: Vec<String>,
    /// yt-dlp executable to invoke.
    #[arg(long, default_value = "yt-dlp")]
    yt_dlp: PathBuf,
}

/// Watchlist entries to scrape, in table order unless `only` narrows it.
fn select_channels(tables: &ChannelTables, only: &[String]) -> Result<Vec<CatalogChannel>> {
    if only.is_empty() {
        return Ok(tables.catalog.clone());
    }
    let mut selected = Vec::with_capacity(only.len());
    for handle in only {
        match tables.find_catalog(handle) {
            Some(channel) => selected.push(channel.clone()),
            None => bail!("{handle} is not on the catalog watchlist"),
        }
    }
    Ok(selected)
}

fn main() -> Result<()> {
    logging::init()?;
    let args = ScrapeArgs::parse();

    let settings = resolve_runtime_settings(RuntimeOverrides {
        podcasts_file: args.podcasts_file.clone(),
        env_path: args.env_file.clone(),
        ..RuntimeOverrides::default()
    })?;
    let tables = ChannelTables::load(args.channels.as_deref())?;
    let channels = select_channels(&tables, &args.only)?;

    let yt_dlp = YtDlp::with_program(args.yt_dlp.clone());
    yt_dlp.ensure_available()?;

    let mut catalog = PodcastCatalog::load(&settings.podcasts_file)?;
    info!(
        "Loaded {} podcasts from {}",
        catalog.len(),
        settings.podcasts_file.display()
    );

    let feed = YouTubeFeed::new();
    let summary = CatalogSync::new(&yt_dlp, &feed, &ThreadSleeper).run(&mut catalog, &channels)?;

    info!("Channels processed: {}/{}", summary.channels_processed, channels.len());
    info!("Podcasts seen: {}", summary.total_podcasts);
    info!("New podcasts: {}", summary.new_podcasts);
    info!("Saved to {}", catalog.path().display());
    Ok(())
}
