#![forbid(unsafe_code)]

//! Read-only Axum API over the local podcast catalog.
//!
//! Requests never reach YouTube. The catalog file written by
//! `scrape_podcasts` is loaded on first use and re-read whenever its
//! modification time changes, so a scrape shows up without a restart.

use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::SystemTime,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use clap::Parser;
use ethiopodcasts_tools::{
    catalog::{PodcastCatalog, PodcastRecord, streaming_url, thumbnail_url},
    channels::ChannelTables,
    classify::DEFAULT_CATEGORY,
    config::{RuntimeOverrides, resolve_runtime_settings},
    logging,
    youtube::watch_url,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{error, info};

const SERVER_NAME: &str = "Ethiopodcasts API v2 (JSON)";
const UNKNOWN_UPLOADER: &str = "Unknown";
const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_SEARCH_LIMIT: usize = 50;
const MAX_PAGE_SIZE: usize = 200;
const MIN_QUERY_CHARS: usize = 2;
const HOME_RECENT: usize = 20;
const HOME_TRENDING: usize = 10;

#[derive(Debug, Parser)]
#[command(about = "Serve the podcast catalog over HTTP")]
struct BackendArgs {
    /// `.env` file to read settings from.
    #[arg(long)]
    env_file: Option<PathBuf>,
    /// Catalog file to serve; overrides PODCASTS_FILE.
    #[arg(long)]
    podcasts_file: Option<PathBuf>,
    /// Listen address; overrides PODCASTS_HOST.
    #[arg(long)]
    host: Option<String>,
    /// Listen port; overrides PODCASTS_PORT.
    #[arg(long)]
    port: Option<u16>,
    /// TOML file replacing the built-in channel tables.
    #[arg(long)]
    channels: Option<PathBuf>,
}

fn parse_host(value: &str) -> Result<IpAddr> {
    value
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/PODCASTS_HOST")
}

#[derive(Clone)]
struct AppState {
    catalog: Arc<CatalogCache>,
    watchlist: Arc<Vec<String>>,
}

impl AppState {
    /// Catalog for one request. Stat, read and parse run on the blocking pool.
    async fn load_catalog(&self) -> ApiResult<Arc<PodcastCatalog>> {
        let cache = self.catalog.clone();
        tokio::task::spawn_blocking(move || cache.current())
            .await
            .map_err(|err| {
                error!("Catalog loader task failed: {err}");
                ApiError::internal("catalog loader stopped")
            })?
    }
}

/// Parsed catalog plus the file mtime it was read at.
struct Snapshot {
    modified: Option<SystemTime>,
    catalog: Arc<PodcastCatalog>,
}

struct CatalogCache {
    path: PathBuf,
    snapshot: RwLock<Option<Snapshot>>,
}

impl CatalogCache {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            snapshot: RwLock::new(None),
        }
    }

    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
    }

    /// Current catalog, reloading it if the file changed since last read.
    fn current(&self) -> ApiResult<Arc<PodcastCatalog>> {
        let modified = self.modified();
        if let Some(snapshot) = self.snapshot.read().as_ref()
            && snapshot.modified == modified
        {
            return Ok(snapshot.catalog.clone());
        }

        let catalog = PodcastCatalog::load(&self.path).map_err(|err| {
            error!("Failed to load catalog: {err:#}");
            ApiError::internal(format!("{err:#}"))
        })?;
        let catalog = Arc::new(catalog);
        *self.snapshot.write() = Some(Snapshot {
            modified,
            catalog: catalog.clone(),
        });
        Ok(catalog)
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
struct Envelope<T> {
    status: &'static str,
    message: String,
    data: T,
    timestamp: String,
}

fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        message: "Success".to_string(),
        data,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// `m:ss`, with minutes allowed past 59. Missing durations read as `0:00`.
fn format_duration(seconds: Option<i64>) -> String {
    let seconds = seconds.unwrap_or(0).max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

fn thumbnail_for(record: &PodcastRecord) -> String {
    if record.thumbnail.is_empty() {
        thumbnail_url(&record.id)
    } else {
        record.thumbnail.clone()
    }
}

/// Card shown in lists, search hits and channel pages.
#[derive(Debug, Serialize)]
struct PodcastSummary {
    id: String,
    title: String,
    display_title: String,
    uploader: String,
    category: String,
    duration: String,
    thumbnail: String,
    streaming_url: String,
    created_at: String,
}

impl From<&PodcastRecord> for PodcastSummary {
    fn from(record: &PodcastRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            display_title: or_default(&record.display_title, &record.title).to_string(),
            uploader: or_default(&record.uploader, UNKNOWN_UPLOADER).to_string(),
            category: or_default(&record.category, DEFAULT_CATEGORY).to_string(),
            duration: format_duration(record.duration),
            thumbnail: thumbnail_for(record),
            streaming_url: streaming_url(&record.id),
            created_at: record.created_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PodcastDetail {
    #[serde(flatten)]
    summary: PodcastSummary,
    description: String,
    duration_seconds: i64,
    youtube_url: String,
}

impl From<&PodcastRecord> for PodcastDetail {
    fn from(record: &PodcastRecord) -> Self {
        Self {
            summary: PodcastSummary::from(record),
            description: record.description.clone(),
            duration_seconds: record.duration.unwrap_or(0),
            youtube_url: or_default(&record.youtube_url, &watch_url(&record.id)).to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PlayerPayload {
    id: String,
    title: String,
    uploader: String,
    category: String,
    duration: String,
    duration_seconds: i64,
    thumbnail: String,
    streaming_url: String,
    audio_only_url: String,
}

impl From<&PodcastRecord> for PlayerPayload {
    fn from(record: &PodcastRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: or_default(&record.display_title, &record.title).to_string(),
            uploader: or_default(&record.uploader, UNKNOWN_UPLOADER).to_string(),
            category: or_default(&record.category, DEFAULT_CATEGORY).to_string(),
            duration: format_duration(record.duration),
            duration_seconds: record.duration.unwrap_or(0),
            thumbnail: thumbnail_for(record),
            streaming_url: streaming_url(&record.id),
            audio_only_url: streaming_url(&record.id),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Pagination {
    page: usize,
    limit: usize,
    total: usize,
    has_more: bool,
}

/// Slices one page out of `records`. Pages are 1-based; page 0 reads as 1.
fn paginate<'a>(
    records: &[&'a PodcastRecord],
    page: usize,
    limit: usize,
) -> (Vec<&'a PodcastRecord>, Pagination) {
    let page = page.max(1);
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let start = (page - 1).saturating_mul(limit);
    let items = records.iter().skip(start).take(limit).copied().collect();
    let pagination = Pagination {
        page,
        limit,
        total: records.len(),
        has_more: start.saturating_add(limit) < records.len(),
    };
    (items, pagination)
}

fn newest_first(records: &mut [&PodcastRecord]) {
    records.sort_by(|a, b| {
        b.created_instant()
            .cmp(&a.created_instant())
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn matches_query(record: &PodcastRecord, needle: &str) -> bool {
    record.title.to_lowercase().contains(needle) || record.uploader.to_lowercase().contains(needle)
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    server: &'static str,
    status: &'static str,
}

async fn root() -> Json<Envelope<StatusPayload>> {
    success(StatusPayload {
        server: SERVER_NAME,
        status: "running",
    })
}

async fn health() -> Json<Envelope<StatusPayload>> {
    success(StatusPayload {
        server: SERVER_NAME,
        status: "healthy",
    })
}

#[derive(Debug, Serialize)]
struct WatchlistPayload {
    channels: Vec<String>,
    total: usize,
}

async fn watchlist(State(state): State<AppState>) -> Json<Envelope<WatchlistPayload>> {
    success(WatchlistPayload {
        channels: state.watchlist.as_ref().clone(),
        total: state.watchlist.len(),
    })
}

#[derive(Debug, Serialize)]
struct CategoriesPayload {
    categories: Vec<String>,
    total: usize,
}

async fn categories(State(state): State<AppState>) -> ApiResult<Json<Envelope<CategoriesPayload>>> {
    let categories = state.load_catalog().await?.categories();
    Ok(success(CategoriesPayload {
        total: categories.len(),
        categories,
    }))
}

async fn get_podcast(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<PodcastDetail>>> {
    let catalog = state.load_catalog().await?;
    let record = catalog
        .get(&id)
        .ok_or_else(|| ApiError::not_found("Podcast not found"))?;
    Ok(success(PodcastDetail::from(record)))
}

async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<PlayerPayload>>> {
    let catalog = state.load_catalog().await?;
    let record = catalog
        .get(&id)
        .ok_or_else(|| ApiError::not_found("Podcast not found"))?;
    Ok(success(PlayerPayload::from(record)))
}

#[derive(Debug, Serialize)]
struct HomeCard {
    #[serde(flatten)]
    summary: PodcastSummary,
    is_new: bool,
}

#[derive(Debug, Serialize)]
struct HomePayload {
    trending: Vec<HomeCard>,
    recent_today: Vec<HomeCard>,
    recent_yesterday: Vec<HomeCard>,
}

/// Front page over the newest episodes. `recent_yesterday` holds everything
/// among them added before midnight UTC of `now`.
fn home_payload(catalog: &PodcastCatalog, now: DateTime<Utc>) -> HomePayload {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let mut records: Vec<&PodcastRecord> = catalog.records().collect();
    newest_first(&mut records);
    records.truncate(HOME_RECENT);

    let card = |record: &&PodcastRecord| HomeCard {
        summary: PodcastSummary::from(*record),
        is_new: record.created_instant() >= today,
    };
    let trending = records.iter().take(HOME_TRENDING).map(card).collect();
    let (fresh, earlier): (Vec<&PodcastRecord>, Vec<&PodcastRecord>) = records
        .iter()
        .copied()
        .partition(|record| record.created_instant() >= today);
    HomePayload {
        trending,
        recent_today: fresh.iter().map(card).collect(),
        recent_yesterday: earlier.iter().map(card).collect(),
    }
}

async fn home(State(state): State<AppState>) -> ApiResult<Json<Envelope<HomePayload>>> {
    let catalog = state.load_catalog().await?;
    Ok(success(home_payload(&catalog, Utc::now())))
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchPayload {
    query: String,
    results: Vec<PodcastSummary>,
    total: usize,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Envelope<SearchPayload>>> {
    let query = params.q.unwrap_or_default();
    if query.trim().chars().count() < MIN_QUERY_CHARS {
        return Err(ApiError::bad_request("Query too short"));
    }
    let needle = query.trim().to_lowercase();
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_PAGE_SIZE);

    let catalog = state.load_catalog().await?;
    let results: Vec<PodcastSummary> = catalog
        .records()
        .filter(|record| matches_query(record, &needle))
        .take(limit)
        .map(PodcastSummary::from)
        .collect();
    Ok(success(SearchPayload {
        query,
        total: results.len(),
        results,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct DiscoverQuery {
    q: Option<String>,
    category: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct PagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    podcasts: Vec<PodcastSummary>,
    pagination: Pagination,
}

async fn discover(
    State(state): State<AppState>,
    Query(params): Query<DiscoverQuery>,
) -> ApiResult<Json<Envelope<PagePayload>>> {
    let catalog = state.load_catalog().await?;
    let needle = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);
    let category = params.category.as_deref().filter(|c| !c.is_empty());

    let mut records: Vec<&PodcastRecord> = catalog
        .records()
        .filter(|record| needle.as_deref().is_none_or(|n| matches_query(record, n)))
        .filter(|record| category.is_none_or(|c| record.category == c))
        .collect();
    newest_first(&mut records);

    let (page, pagination) = paginate(
        &records,
        params.page.unwrap_or(1),
        params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    Ok(success(PagePayload {
        channel: None,
        podcasts: page.into_iter().map(PodcastSummary::from).collect(),
        pagination,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

async fn channel_podcasts(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(params): Query<PageQuery>,
) -> ApiResult<Json<Envelope<PagePayload>>> {
    let channel = if channel.starts_with('@') {
        channel
    } else {
        format!("@{channel}")
    };
    let catalog = state.load_catalog().await?;
    let mut records: Vec<&PodcastRecord> = catalog
        .records()
        .filter(|record| record.uploader == channel)
        .collect();
    newest_first(&mut records);

    let (page, pagination) = paginate(
        &records,
        params.page.unwrap_or(1),
        params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    Ok(success(PagePayload {
        channel: Some(channel),
        podcasts: page.into_iter().map(PodcastSummary::from).collect(),
        pagination,
    }))
}

#[derive(Debug, Serialize)]
struct StatsPayload {
    total_podcasts: usize,
    total_channels: usize,
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<Envelope<StatsPayload>>> {
    let catalog = state.load_catalog().await?;
    Ok(success(StatsPayload {
        total_podcasts: catalog.len(),
        total_channels: state.watchlist.len(),
    }))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/watchlist", get(watchlist))
        .route("/api/home", get(home))
        .route("/api/categories", get(categories))
        .route("/api/podcasts/{id}", get(get_podcast))
        .route("/api/player/{id}", get(get_player))
        .route("/api/search", get(search))
        .route("/api/discover", get(discover))
        .route("/api/channels/{channel}", get(channel_podcasts))
        .route("/api/stats", get(stats))
        .fallback(not_found)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;
    let args = BackendArgs::parse();

    let settings = resolve_runtime_settings(RuntimeOverrides {
        podcasts_file: args.podcasts_file.clone(),
        api_host: args.host.clone(),
        api_port: args.port,
        env_path: args.env_file.clone(),
        ..RuntimeOverrides::default()
    })?;
    let host = parse_host(&settings.api_host)?;
    let tables = ChannelTables::load(args.channels.as_deref())?;

    let state = AppState {
        catalog: Arc::new(CatalogCache::new(settings.podcasts_file.clone())),
        watchlist: Arc::new(tables.catalog_display_names()),
    };
    // Fail at startup rather than on the first request if the file is broken.
    state
        .load_catalog()
        .await
        .map_err(|err| anyhow::anyhow!(err.message))
        .with_context(|| format!("loading {}", settings.podcasts_file.display()))?;

    let addr = SocketAddr::new(host, settings.api_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("API server listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {err}");
    }
}
