//! Fixed channel tables for both scrapers.
//!
//! The defaults ship inside the binary as TOML and are parsed once at
//! startup; an alternate file can replace them without a rebuild.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const BUILTIN_CHANNELS: &str = include_str!("channels.toml");

/// Upper bound on uploads requested per channel by the catalog scraper.
pub const CATALOG_LISTING_LIMIT: usize = 50;
/// Upper bound on uploads requested per channel by the Telegram archiver.
pub const ARCHIVE_LISTING_LIMIT: usize = 10;

/// One channel of the catalog watchlist. `handle` never carries the `@`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogChannel {
    pub handle: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

impl CatalogChannel {
    /// Uploader label stored on every catalog record, e.g. `@dejaftv`.
    pub fn display_name(&self) -> String {
        format!("@{}", self.handle)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveChannels {
    #[serde(default)]
    pub handles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelTables {
    #[serde(default)]
    pub catalog: Vec<CatalogChannel>,
    #[serde(default)]
    pub archive: ArchiveChannels,
}

impl ChannelTables {
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_CHANNELS).context("parsing built-in channel tables")
    }

    /// Loads `path` when given, otherwise the built-in tables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading channel tables {}", path.display()))?;
                Self::parse(&raw)
                    .with_context(|| format!("parsing channel tables {}", path.display()))
            }
            None => Self::builtin(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let tables: ChannelTables = toml::from_str(raw)?;
        for channel in &tables.catalog {
            if channel.handle.trim().is_empty() || channel.handle.starts_with('@') {
                bail!("catalog handle {:?} must be non-empty and omit '@'", channel.handle);
            }
        }
        for handle in &tables.archive.handles {
            if !handle.starts_with('@') || handle.len() < 2 {
                bail!("archive handle {:?} must start with '@'", handle);
            }
        }
        Ok(tables)
    }

    pub fn find_catalog(&self, handle: &str) -> Option<&CatalogChannel> {
        let handle = handle.trim_start_matches('@');
        self.catalog.iter().find(|channel| channel.handle == handle)
    }

    /// Catalog handles with the leading `@`, in table order.
    pub fn catalog_display_names(&self) -> Vec<String> {
        self.catalog.iter().map(CatalogChannel::display_name).collect()
    }
}
