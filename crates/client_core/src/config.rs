use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "portal.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct PortalSettings {
    pub server_url: String,
    pub notice_ttl_ms: u64,
    pub logout_delay_ms: u64,
    pub logout_fallback_ms: u64,
    pub request_timeout_secs: u64,
    pub remember_store_path: PathBuf,
    pub error_table_path: Option<PathBuf>,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8085".into(),
            notice_ttl_ms: 3000,
            logout_delay_ms: 100,
            logout_fallback_ms: 500,
            request_timeout_secs: 10,
            remember_store_path: PathBuf::from("./data/remembered.json"),
            error_table_path: None,
        }
    }
}

impl PortalSettings {
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }

    pub fn logout_timing(&self) -> LogoutTiming {
        LogoutTiming {
            delay: Duration::from_millis(self.logout_delay_ms),
            fallback: Duration::from_millis(self.logout_fallback_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Delays around the logout navigation: the primary navigation fires after
/// `delay`, the replace-navigation after a further `fallback` if the page
/// has not left the main view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutTiming {
    pub delay: Duration,
    pub fallback: Duration,
}

impl LogoutTiming {
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            fallback: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    notice_ttl_ms: Option<u64>,
    logout_delay_ms: Option<u64>,
    logout_fallback_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    remember_store_path: Option<PathBuf>,
    error_table_path: Option<PathBuf>,
}

/// Defaults, then `path` (or `portal.toml` when present), then environment.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<PortalSettings> {
    let mut settings = PortalSettings::default();

    let file = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))?,
        ),
        None => fs::read_to_string(DEFAULT_SETTINGS_FILE).ok(),
    };
    if let Some(raw) = file {
        apply_file(&mut settings, &raw)?;
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    validate_server_url(&settings.server_url)?;
    Ok(settings)
}

fn apply_file(settings: &mut PortalSettings, raw: &str) -> anyhow::Result<()> {
    let file: FileSettings = toml::from_str(raw).context("invalid settings file")?;
    if let Some(v) = file.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file.notice_ttl_ms {
        settings.notice_ttl_ms = v;
    }
    if let Some(v) = file.logout_delay_ms {
        settings.logout_delay_ms = v;
    }
    if let Some(v) = file.logout_fallback_ms {
        settings.logout_fallback_ms = v;
    }
    if let Some(v) = file.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file.remember_store_path {
        settings.remember_store_path = v;
    }
    if let Some(v) = file.error_table_path {
        settings.error_table_path = Some(v);
    }
    Ok(())
}

fn apply_env(settings: &mut PortalSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("PORTAL_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    let parse_u64 = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());
    if let Some(v) = parse_u64("APP__NOTICE_TTL_MS") {
        settings.notice_ttl_ms = v;
    }
    if let Some(v) = parse_u64("APP__LOGOUT_DELAY_MS") {
        settings.logout_delay_ms = v;
    }
    if let Some(v) = parse_u64("APP__LOGOUT_FALLBACK_MS") {
        settings.logout_fallback_ms = v;
    }
    if let Some(v) = parse_u64("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v;
    }

    if let Some(v) = lookup("APP__REMEMBER_STORE_PATH") {
        settings.remember_store_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("APP__ERROR_TABLE_PATH") {
        settings.error_table_path = Some(PathBuf::from(v));
    }
}

pub fn validate_server_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("invalid server_url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("server_url must start with http:// or https://");
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
