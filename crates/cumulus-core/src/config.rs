//! Configuration module for Cumulus.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, defaults, and a builder for programmatic
//! use (mainly tests).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Cumulus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub events: EventsConfig,
    pub locks: LocksConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Local directory to claim as the sync root. The claim itself is the
    /// explicit grant acquisition; it fails loudly when this path is gone.
    pub root: PathBuf,
    /// Seconds between periodic full passes.
    pub poll_interval_secs: u64,
    /// Milliseconds a burst of change events is allowed to settle before an
    /// incremental pass runs.
    pub debounce_window_ms: u64,
    /// Clock-skew tolerance in milliseconds when comparing a local mtime
    /// against the recorded sync timestamp.
    pub skew_tolerance_ms: u64,
    /// Maximum concurrent per-file transfers within one pass.
    pub transfer_concurrency: u32,
    /// Per-file transfer timeout in seconds.
    pub transfer_timeout_secs: u64,
}

/// Remote store endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the file-store REST API.
    pub base_url: String,
}

/// Event channel reconnect settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Base reconnect delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Ceiling for the reconnect delay in milliseconds.
    pub backoff_max_ms: u64,
    /// Reconnect attempts before the channel degrades.
    pub max_reconnect_attempts: u32,
}

/// Editorial lock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocksConfig {
    /// Minutes of inactivity after which a lock expires.
    pub expiry_minutes: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Path to the log file.
    pub file: PathBuf,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cumulus/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cumulus")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Cumulus"),
            poll_interval_secs: 30,
            debounce_window_ms: 500,
            skew_tolerance_ms: 1000,
            transfer_concurrency: 4,
            transfer_timeout_secs: 120,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
            max_reconnect_attempts: 5,
        }
    }
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self { expiry_minutes: 30 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("cumulus");
        Self {
            level: "info".to_string(),
            file: data_dir.join("cumulus.log"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.poll_interval_secs == 0 {
            errors.push(ValidationError {
                field: "sync.poll_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.debounce_window_ms == 0 {
            errors.push(ValidationError {
                field: "sync.debounce_window_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.transfer_concurrency == 0 {
            errors.push(ValidationError {
                field: "sync.transfer_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.transfer_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "sync.transfer_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- remote ---
        if self.remote.base_url.is_empty() {
            errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: "must not be empty".into(),
            });
        }

        // --- events ---
        if self.events.backoff_base_ms == 0 {
            errors.push(ValidationError {
                field: "events.backoff_base_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.events.backoff_max_ms < self.events.backoff_base_ms {
            errors.push(ValidationError {
                field: "events.backoff_max_ms".into(),
                message: format!(
                    "must not be below backoff_base_ms ({})",
                    self.events.backoff_base_ms
                ),
            });
        }
        if self.events.max_reconnect_attempts == 0 {
            errors.push(ValidationError {
                field: "events.max_reconnect_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- locks ---
        if self.locks.expiry_minutes == 0 {
            errors.push(ValidationError {
                field: "locks.expiry_minutes".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn sync_poll_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval_secs = seconds;
        self
    }

    pub fn sync_debounce_window_ms(mut self, ms: u64) -> Self {
        self.config.sync.debounce_window_ms = ms;
        self
    }

    pub fn sync_skew_tolerance_ms(mut self, ms: u64) -> Self {
        self.config.sync.skew_tolerance_ms = ms;
        self
    }

    pub fn sync_transfer_concurrency(mut self, n: u32) -> Self {
        self.config.sync.transfer_concurrency = n;
        self
    }

    pub fn sync_transfer_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.sync.transfer_timeout_secs = seconds;
        self
    }

    // --- remote ---

    pub fn remote_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.remote.base_url = base_url.into();
        self
    }

    // --- events ---

    pub fn events_backoff_base_ms(mut self, ms: u64) -> Self {
        self.config.events.backoff_base_ms = ms;
        self
    }

    pub fn events_backoff_max_ms(mut self, ms: u64) -> Self {
        self.config.events.backoff_max_ms = ms;
        self
    }

    pub fn events_max_reconnect_attempts(mut self, n: u32) -> Self {
        self.config.events.max_reconnect_attempts = n;
        self
    }

    // --- locks ---

    pub fn locks_expiry_minutes(mut self, minutes: u64) -> Self {
        self.config.locks.expiry_minutes = minutes;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = file;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
