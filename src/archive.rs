//! Remote archive of published episodes, kept in a Firestore collection.
//!
//! Documents are keyed by YouTube video id. Existence is checked before any
//! download starts, so the write itself is a plain create with a
//! server-assigned `created_at`.

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::FirestoreSettings;

pub const COLLECTION: &str = "podcasts";
const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration: Option<i64>,
    pub category: String,
    pub uploader: String,
    pub telegram_file_id: String,
    /// Stored as text; clients treat it as an opaque string.
    pub telegram_message_id: String,
    pub youtube_url: String,
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn optional_string(value: Option<&str>) -> Value {
    match value {
        Some(value) => string_value(value),
        None => json!({ "nullValue": null }),
    }
}

fn optional_integer(value: Option<i64>) -> Value {
    match value {
        // Firestore's REST encoding carries int64 as a decimal string.
        Some(value) => json!({ "integerValue": value.to_string() }),
        None => json!({ "nullValue": null }),
    }
}

impl ArchiveRecord {
    /// Firestore `fields` map. `created_at` is left to the server transform.
    pub fn to_fields(&self) -> Value {
        json!({
            "title": string_value(&self.title),
            "thumbnail_url": optional_string(self.thumbnail_url.as_deref()),
            "duration": optional_integer(self.duration),
            "category": string_value(&self.category),
            "uploader": string_value(&self.uploader),
            "telegram_file_id": string_value(&self.telegram_file_id),
            "telegram_message_id": string_value(&self.telegram_message_id),
            "youtube_url": string_value(&self.youtube_url),
        })
    }
}

pub trait ArchiveStore {
    fn exists(&self, video_id: &str) -> Result<bool>;
    fn put(&self, video_id: &str, record: &ArchiveRecord) -> Result<()>;
}

pub struct Firestore {
    agent: ureq::Agent,
    api_base: String,
    project_id: String,
    access_token: String,
}

impl Firestore {
    pub fn new(settings: &FirestoreSettings) -> Self {
        Self::with_api_base(settings, FIRESTORE_API)
    }

    pub fn with_api_base(settings: &FirestoreSettings, api_base: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            api_base: api_base.trim_end_matches('/').to_string(),
            project_id: settings.project_id.clone(),
            access_token: settings.access_token.clone(),
        }
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    /// Resource name, e.g. `projects/p/databases/(default)/documents/podcasts/id`.
    pub fn document_name(&self, video_id: &str) -> String {
        format!("{}/documents/{COLLECTION}/{video_id}", self.database_path())
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Body of a `documents:commit` call creating the document.
    pub fn commit_body(&self, video_id: &str, record: &ArchiveRecord) -> Value {
        json!({
            "writes": [{
                "update": {
                    "name": self.document_name(video_id),
                    "fields": record.to_fields(),
                },
                "updateTransforms": [{
                    "fieldPath": "created_at",
                    "setToServerValue": "REQUEST_TIME",
                }],
            }],
        })
    }
}

fn status_error(action: &str, code: u16, response: ureq::Response) -> anyhow::Error {
    let body = response.into_string().unwrap_or_default();
    anyhow::anyhow!("{action} failed with status {code}: {}", body.trim())
}

impl ArchiveStore for Firestore {
    fn exists(&self, video_id: &str) -> Result<bool> {
        let url = format!("{}/{}", self.api_base, self.document_name(video_id));
        match self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .call()
        {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(ureq::Error::Status(code, response)) => {
                Err(status_error(&format!("looking up {video_id}"), code, response))
            }
            Err(err) => Err(err).with_context(|| format!("looking up {video_id}")),
        }
    }

    fn put(&self, video_id: &str, record: &ArchiveRecord) -> Result<()> {
        if video_id.is_empty() || video_id.contains('/') {
            bail!("invalid document id {video_id:?}");
        }
        let url = format!("{}/{}/documents:commit", self.api_base, self.database_path());
        match self
            .agent
            .post(&url)
            .set("Authorization", &self.bearer())
            .send_json(self.commit_body(video_id, record))
        {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, response)) => {
                Err(status_error(&format!("writing {video_id}"), code, response))
            }
            Err(err) => Err(err).with_context(|| format!("writing {video_id}")),
        }
    }
}
