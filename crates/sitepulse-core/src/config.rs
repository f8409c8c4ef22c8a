//! SitePulse configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PulseError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
}

impl PulseConfig {
    /// Load config from the default path (~/.sitepulse/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PulseError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PulseError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the SitePulse home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitepulse")
    }
}

/// Where the SQLite stores live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "~/.sitepulse/data".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

/// Dispatch policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Local hour (0-23) at which the delivery window opens on the
    /// first day of each period.
    #[serde(default = "default_send_hour")]
    pub send_hour: u32,
    /// Base URL for per-recipient unsubscribe links.
    #[serde(default = "default_unsubscribe_base")]
    pub unsubscribe_base_url: String,
    /// Bound on each assembler / notifier call, in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_send_hour() -> u32 {
    9
}
fn default_unsubscribe_base() -> String {
    "https://app.sitepulse.io".into()
}
fn default_call_timeout() -> u64 {
    30
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            send_hour: default_send_hour(),
            unsubscribe_base_url: default_unsubscribe_base(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

/// Internal stats service the assembler queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_stats_url() -> String {
    "http://127.0.0.1:8080".into()
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { base_url: default_stats_url(), api_token: None }
    }
}

/// Outbound SMTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_smtp_host() -> String {
    "smtp.postmarkapp.com".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_from_address() -> String {
    "reports@sitepulse.io".into()
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_address: default_from_address(),
            display_name: None,
        }
    }
}
