//! Telegram Bot API client for posting audio into the archive channel.

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::{Client, multipart};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::TelegramSettings;

const TELEGRAM_API: &str = "https://api.telegram.org";
/// Large episodes over slow uplinks routinely need several minutes.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(1200);

#[derive(Debug, Clone, PartialEq)]
pub struct AudioUpload {
    pub path: PathBuf,
    pub caption: String,
    pub title: String,
    pub performer: String,
}

/// Identifiers Telegram hands back for a posted audio message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentAudio {
    pub file_id: String,
    pub message_id: i64,
}

pub trait AudioPublisher {
    fn send_audio(&self, upload: &AudioUpload) -> Result<SentAudio>;
}

/// Channel caption, e.g. `#Tech | @dejaftv\n\nEpisode title`.
pub fn caption(category: &str, uploader: &str, display_title: &str) -> String {
    format!("#{category} | {uploader}\n\n{display_title}")
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<MessagePayload>,
}

#[derive(Deserialize)]
struct MessagePayload {
    message_id: i64,
    #[serde(default)]
    audio: Option<AudioPayload>,
}

#[derive(Deserialize)]
struct AudioPayload {
    file_id: String,
}

/// Interprets a `sendAudio` response body.
pub fn parse_send_audio_response(body: &str) -> Result<SentAudio> {
    let response: ApiResponse =
        serde_json::from_str(body).context("deserializing sendAudio response")?;
    if !response.ok {
        bail!(
            "telegram rejected upload: {}",
            response.description.unwrap_or_else(|| "no description".into())
        );
    }
    let message = response
        .result
        .ok_or_else(|| anyhow!("sendAudio response has no message"))?;
    let audio = message
        .audio
        .ok_or_else(|| anyhow!("sendAudio message {} has no audio", message.message_id))?;
    Ok(SentAudio {
        file_id: audio.file_id,
        message_id: message.message_id,
    })
}

pub struct TelegramBot {
    client: Client,
    api_base: String,
    token: String,
    channel_id: String,
}

impl TelegramBot {
    pub fn new(settings: &TelegramSettings) -> Result<Self> {
        Self::with_api_base(settings, TELEGRAM_API)
    }

    pub fn with_api_base(settings: &TelegramSettings, api_base: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .context("building Telegram HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: settings.bot_token.clone(),
            channel_id: settings.channel_id.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }
}

impl AudioPublisher for TelegramBot {
    fn send_audio(&self, upload: &AudioUpload) -> Result<SentAudio> {
        let form = multipart::Form::new()
            .text("chat_id", self.channel_id.clone())
            .text("caption", upload.caption.clone())
            .text("title", upload.title.clone())
            .text("performer", upload.performer.clone())
            .file("audio", &upload.path)
            .with_context(|| format!("attaching {}", upload.path.display()))?;

        // Errors carry the request URL, which embeds the bot token.
        let response = self
            .client
            .post(self.method_url("sendAudio"))
            .multipart(form)
            .send()
            .map_err(|err| anyhow!("sendAudio request failed: {}", err.without_url()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| anyhow!("reading sendAudio response: {}", err.without_url()))?;
        parse_send_audio_response(&body).with_context(|| format!("sendAudio returned {status}"))
    }
}
