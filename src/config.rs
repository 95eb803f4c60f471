#![forbid(unsafe_code)]

//! Runtime settings resolved from CLI flags, the process environment and an
//! optional `.env` file, in that order of precedence.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_PODCASTS_FILE: &str = "podcasts.json";
pub const DEFAULT_TELEGRAM_CHANNEL: &str = "@ethio_podcast";
pub const DEFAULT_API_HOST: &str = "127.0.0.1";
pub const DEFAULT_API_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub podcasts_file: PathBuf,
    pub work_dir: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    pub telegram_bot_token: Option<String>,
    pub telegram_channel_id: String,
    pub firestore_project_id: Option<String>,
    pub firestore_access_token: Option<String>,
}

/// Credentials needed to post into the Telegram channel.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub channel_id: String,
}

/// Credentials for the Firestore REST API.
#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub project_id: String,
    pub access_token: String,
}

impl RuntimeSettings {
    pub fn telegram(&self) -> Result<TelegramSettings> {
        let bot_token = self
            .telegram_bot_token
            .clone()
            .ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN not set"))?;
        Ok(TelegramSettings {
            bot_token,
            channel_id: self.telegram_channel_id.clone(),
        })
    }

    pub fn firestore(&self) -> Result<FirestoreSettings> {
        let project_id = self
            .firestore_project_id
            .clone()
            .ok_or_else(|| anyhow!("FIRESTORE_PROJECT_ID not set"))?;
        let access_token = self
            .firestore_access_token
            .clone()
            .ok_or_else(|| anyhow!("FIRESTORE_ACCESS_TOKEN not set"))?;
        Ok(FirestoreSettings {
            project_id,
            access_token,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub podcasts_file: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub api_host: Option<String>,
    pub api_port: Option<u16>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_settings(overrides: RuntimeOverrides) -> Result<RuntimeSettings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_settings(&file_vars, env_var_string, overrides))
}

fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> RuntimeSettings {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let podcasts_file = overrides
        .podcasts_file
        .or_else(|| lookup("PODCASTS_FILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PODCASTS_FILE));
    let work_dir = overrides
        .work_dir
        .or_else(|| lookup("WORK_DIR").map(PathBuf::from))
        .unwrap_or_else(env::temp_dir);
    let api_host = overrides
        .api_host
        .and_then(non_blank)
        .or_else(|| lookup("PODCASTS_HOST"))
        .unwrap_or_else(|| DEFAULT_API_HOST.to_string());
    let api_port = overrides
        .api_port
        .or_else(|| lookup("PODCASTS_PORT").and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_API_PORT);

    RuntimeSettings {
        podcasts_file,
        work_dir,
        api_host,
        api_port,
        telegram_bot_token: lookup("TELEGRAM_BOT_TOKEN"),
        telegram_channel_id: lookup("TELEGRAM_CHANNEL_ID")
            .unwrap_or_else(|| DEFAULT_TELEGRAM_CHANNEL.to_string()),
        firestore_project_id: lookup("FIRESTORE_PROJECT_ID"),
        firestore_access_token: lookup("FIRESTORE_ACCESS_TOKEN"),
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| {
        file_vars
            .get(key)
            .cloned()
            .and_then(non_blank)
    })
}

/// Parses `KEY=value` lines, tolerating `export` prefixes, comments and
/// single or double quotes. A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
