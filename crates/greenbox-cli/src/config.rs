//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use greenbox_core::{FallbackPolicy, SyncConfig};
use greenbox_types::Period;
use serde::{Deserialize, Serialize};
use time::UtcOffset;

/// Gateway used when neither the flag, the environment nor the file set one.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:3000";

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Gateway base URL
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Seconds between periodic refreshes in watch mode
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Upper bound on each gateway call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// History windows fetched every refresh
    #[serde(default = "default_periods")]
    pub periods: Vec<Period>,

    /// What to show for data the gateway could not deliver
    #[serde(default)]
    pub fallback: FallbackPolicy,

    /// State database path (platform data directory when unset)
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Display time zone as minutes east of UTC (system zone when unset)
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

fn default_periods() -> Vec<Period> {
    vec![Period::Week]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            periods: default_periods(),
            fallback: FallbackPolicy::default(),
            database: None,
            utc_offset_minutes: None,
            no_color: false,
        }
    }
}

impl Config {
    /// Get the config file path, honoring `GREENBOX_CONFIG`
    pub fn path() -> PathBuf {
        if let Some(path) = std::env::var_os("GREENBOX_CONFIG").filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("greenbox")
            .join("config.toml")
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, or return default if missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Display time zone: the configured offset, else the system's.
    pub fn utc_offset(&self) -> Result<UtcOffset> {
        let seconds = match self.utc_offset_minutes {
            Some(minutes) => minutes * 60,
            None => chrono::Local::now().offset().local_minus_utc(),
        };
        UtcOffset::from_whole_seconds(seconds)
            .with_context(|| format!("Invalid UTC offset: {} seconds", seconds))
    }

    /// Engine configuration derived from this file.
    pub fn sync_config(&self) -> Result<SyncConfig> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        Ok(SyncConfig::new()
            .poll_interval(Duration::from_secs(self.poll_interval_secs))
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .periods(self.periods.iter().copied())
            .fallback(self.fallback)
            .utc_offset(self.utc_offset()?))
    }
}

/// Resolve the gateway URL: explicit argument first, then config.
pub fn resolve_gateway(gateway: Option<String>, config: &Config) -> String {
    gateway
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| config.gateway_url.clone())
}

/// Resolve the state database path: explicit argument, then config, then
/// the platform default.
pub fn resolve_database(database: Option<PathBuf>, config: &Config) -> PathBuf {
    database
        .or_else(|| config.database.clone())
        .unwrap_or_else(greenbox_store::default_db_path)
}
