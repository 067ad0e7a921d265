use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::warn;

use crate::validation::DEFAULT_RTMP_SERVER;

pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub auto_reconnect: bool,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub create_ack_timeout: Duration,
    /// How long a delete notification shows as loading before it reports
    /// success. Nothing confirms the delete itself.
    pub delete_settle: Duration,
    pub default_rtmp_server: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            auto_reconnect: true,
            reconnect_initial_delay: Duration::from_millis(500),
            reconnect_max_delay: Duration::from_secs(5),
            create_ack_timeout: Duration::from_secs(30),
            delete_settle: Duration::from_millis(500),
            default_rtmp_server: DEFAULT_RTMP_SERVER.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    auto_reconnect: Option<bool>,
    reconnect_initial_delay_ms: Option<u64>,
    reconnect_max_delay_ms: Option<u64>,
    create_ack_timeout_secs: Option<u64>,
    delete_settle_ms: Option<u64>,
    default_rtmp_server: Option<String>,
}

/// Defaults, then `client.toml` in the working directory if present, then
/// environment overrides.
pub fn load_settings() -> anyhow::Result<ClientSettings> {
    load_settings_from(None)
}

/// Like [`load_settings`], but an explicit `path` must exist.
pub fn load_settings_from(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    if required || path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        apply_file_settings(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub(crate) fn apply_file_settings(settings: &mut ClientSettings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.auto_reconnect {
        settings.auto_reconnect = v;
    }
    if let Some(v) = file_cfg.reconnect_initial_delay_ms {
        settings.reconnect_initial_delay = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.reconnect_max_delay_ms {
        settings.reconnect_max_delay = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.create_ack_timeout_secs {
        if v == 0 {
            bail!("create_ack_timeout_secs must be at least 1");
        }
        settings.create_ack_timeout = Duration::from_secs(v);
    }
    if let Some(v) = file_cfg.delete_settle_ms {
        settings.delete_settle = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.default_rtmp_server {
        settings.default_rtmp_server = v;
    }
    Ok(())
}

pub(crate) fn apply_env_overrides(
    settings: &mut ClientSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("LIVECTL_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = parsed(&lookup, "APP__AUTO_RECONNECT") {
        settings.auto_reconnect = v;
    }
    if let Some(v) = parsed(&lookup, "APP__RECONNECT_INITIAL_DELAY_MS") {
        settings.reconnect_initial_delay = Duration::from_millis(v);
    }
    if let Some(v) = parsed(&lookup, "APP__RECONNECT_MAX_DELAY_MS") {
        settings.reconnect_max_delay = Duration::from_millis(v);
    }
    match parsed::<u64>(&lookup, "APP__CREATE_ACK_TIMEOUT_SECS") {
        Some(0) => warn!("ignoring zero APP__CREATE_ACK_TIMEOUT_SECS"),
        Some(v) => settings.create_ack_timeout = Duration::from_secs(v),
        None => {}
    }
    if let Some(v) = parsed(&lookup, "APP__DELETE_SETTLE_MS") {
        settings.delete_settle = Duration::from_millis(v);
    }

    if let Some(v) = lookup("APP__DEFAULT_RTMP_SERVER") {
        settings.default_rtmp_server = v;
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
