//! Configuration loading
//!
//! Resolution priority order:
//! 1. Environment variables (highest priority)
//! 2. TOML config file at `<config_dir>/barinv/config.toml`
//! 3. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Production backend base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.barovainventura.sk/api";

/// Lead time before token expiry at which the refresh timer fires. Must be
/// shorter than the shortest token ttl the backend hands out (3600 s).
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Cadence of the missing-products poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Cooldown before the scanner re-arms after a resolved scan.
pub const DEFAULT_REARM_DELAY: Duration = Duration::from_secs(2);

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime configuration for the client cores.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub refresh_margin: Duration,
    pub poll_interval: Duration,
    pub rearm_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            poll_interval: DEFAULT_POLL_INTERVAL,
            rearm_delay: DEFAULT_REARM_DELAY,
        }
    }
}

/// Optional overrides as they appear in the TOML file.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    refresh_margin_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    rearm_delay_secs: Option<u64>,
}

impl ClientConfig {
    /// Load configuration honoring the priority order above.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = config_file_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                let file: FileConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                tracing::debug!(path = %path.display(), "applying config file");
                config.apply_file(file);
            }
        }
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.refresh_margin_secs {
            self.refresh_margin = Duration::from_secs(secs);
        }
        if let Some(secs) = file.poll_interval_secs {
            self.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = file.rearm_delay_secs {
            self.rearm_delay = Duration::from_secs(secs);
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("BARINV_API_URL") {
            self.base_url = url;
        }
        if let Some(secs) = env_secs("BARINV_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = secs;
        }
        if let Some(secs) = env_secs("BARINV_REFRESH_MARGIN_SECS") {
            self.refresh_margin = secs;
        }
        if let Some(secs) = env_secs("BARINV_POLL_INTERVAL_SECS") {
            self.poll_interval = secs;
        }
        if let Some(secs) = env_secs("BARINV_REARM_DELAY_SECS") {
            self.rearm_delay = secs;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if self.refresh_margin.is_zero() {
            return Err(Error::Config(
                "refresh_margin must be non-zero".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}

/// Path of the optional config file for the platform.
fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("barinv").join("config.toml"))
}
