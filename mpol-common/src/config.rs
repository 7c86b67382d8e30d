//! Bootstrap configuration loading and resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (`--backend-url`, `--config`)
//! 2. Environment variables (`MPOL_BACKEND_URL`, `MPOL_CONFIG`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing or unparseable TOML file never aborts startup: a warning is
//! logged and the compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Backend base URL used when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/api";

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "MPOL_BACKEND_URL";

/// Environment variable overriding the TOML config file location
pub const CONFIG_PATH_ENV: &str = "MPOL_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Backend API base URL (e.g. `http://localhost:8000/api`)
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Timer and limit tunables for the orchestration layer
    #[serde(default)]
    pub tuning: TuningConfig,

    /// Location of the local settings cache file
    #[serde(default)]
    pub settings_cache: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Timers and limits for upload tracking, playback and notifications
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TuningConfig {
    /// Delay between task status polls
    pub poll_interval_ms: u64,
    /// Poll attempts before a still-running task is declared timed out
    pub max_poll_attempts: u32,
    /// Delay before a completed upload is cleared from the queue
    pub completion_grace_ms: u64,
    /// Time allowed for an audio stream to become playable
    pub load_timeout_ms: u64,
    /// Lifetime of info/success/warning notifications
    pub notification_ms: u64,
    /// Lifetime of error notifications
    pub error_notification_ms: u64,
    /// Maximum notifications shown at once
    pub max_visible_notifications: usize,
    /// Per-request HTTP timeout
    pub http_timeout_ms: u64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_poll_attempts: 30,
            completion_grace_ms: 2000,
            load_timeout_ms: 10_000,
            notification_ms: 3000,
            error_notification_ms: 5000,
            max_visible_notifications: 3,
            http_timeout_ms: 30_000,
        }
    }
}

impl TuningConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn notification_lifetime(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }

    pub fn error_notification_lifetime(&self) -> Duration {
        Duration::from_millis(self.error_notification_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load configuration, falling back to defaults when the file is absent or invalid
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            debug!("No config file location, using compiled defaults");
            return Self::default();
        };

        if !path.exists() {
            debug!("Config file {} not found, using compiled defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}; using compiled defaults", e);
                Self::default()
            }
        }
    }
}

/// Default TOML location: `<config dir>/music-police/dash.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-police").join("dash.toml"))
}

/// Default settings cache location: `<local data dir>/music-police/settings-cache.json`
pub fn default_settings_cache_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("music-police").join("settings-cache.json"))
        .unwrap_or_else(|| PathBuf::from("./music-police-settings-cache.json"))
}

/// Fully resolved configuration used by the dashboard
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Backend base URL without trailing slash
    pub backend_url: String,
    pub logging: LoggingConfig,
    pub tuning: TuningConfig,
    pub settings_cache_path: PathBuf,
}

/// Resolves configuration from CLI, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_backend_url: Option<String>,
    cli_config_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend URL given on the command line
    pub fn with_backend_url(mut self, url: Option<String>) -> Self {
        self.cli_backend_url = url;
        self
    }

    /// TOML path given on the command line
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_config_path = path;
        self
    }

    /// Location of the TOML file to read, if any
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_config_path {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        default_config_path()
    }

    pub fn resolve(&self) -> ResolvedConfig {
        let config_path = self.config_path();
        let toml_config = TomlConfig::load_or_default(config_path.as_deref());

        let backend_url = self
            .cli_backend_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| {
                std::env::var(BACKEND_URL_ENV)
                    .ok()
                    .filter(|url| !url.trim().is_empty())
            })
            .or_else(|| toml_config.backend_url.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        ResolvedConfig {
            backend_url: normalize_base_url(&backend_url),
            logging: toml_config.logging,
            tuning: toml_config.tuning,
            settings_cache_path: toml_config
                .settings_cache
                .unwrap_or_else(default_settings_cache_path),
        }
    }
}

/// Trim whitespace and trailing slashes so endpoint paths can be appended directly
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://h:8000/api/"), "http://h:8000/api");
        assert_eq!(normalize_base_url("  http://h/api//  "), "http://h/api");
        assert_eq!(normalize_base_url("http://h/api"), "http://h/api");
    }

    #[test]
    fn test_tuning_defaults() {
        let tuning = TuningConfig::default();
        assert_eq!(tuning.poll_interval(), Duration::from_secs(1));
        assert_eq!(tuning.max_poll_attempts, 30);
        assert_eq!(tuning.completion_grace(), Duration::from_secs(2));
        assert_eq!(tuning.load_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_tuning_section_keeps_other_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [tuning]
            max_poll_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.tuning.max_poll_attempts, 5);
        assert_eq!(config.tuning.poll_interval_ms, 1000);
        assert_eq!(config.logging.level, "info");
        assert!(config.backend_url.is_none());
    }
}
