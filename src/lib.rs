#![forbid(unsafe_code)]

//! Shared library behind the Ethiopodcasts batch jobs and the read-only API.
//!
//! Both scrapers walk a fixed list of YouTube channels, classify each new
//! upload by keyword and persist it once: `scrape_podcasts` into a local JSON
//! catalog, `telegram_sync` into a Telegram channel plus a Firestore
//! collection. Every external system sits behind a small trait so the drivers
//! in [`pipeline`] can be exercised without network access.

pub mod archive;
pub mod catalog;
pub mod channels;
pub mod classify;
pub mod config;
pub mod feed;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod retry;
pub mod telegram;
pub mod youtube;

#[cfg(test)]
mod testutil;
