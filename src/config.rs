//! Exporter configuration.
//!
//! Settings come from an optional TOML file. Command-line flags and
//! environment variables (`BAMBU_DEVICE_ID`, `HTTP_PORT`, `LOG_LEVEL`)
//! override it; see `main.rs`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::lifecycle::LifecycleMode;
use crate::metrics::MetricsServerConfig;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// No printer serial was configured.
    #[error("device id is required (set device.id or BAMBU_DEVICE_ID)")]
    MissingDeviceId,
    /// The metrics route is not an absolute path.
    #[error("invalid metrics path `{0}` (must start with `/`)")]
    InvalidMetricsPath(String),
    /// The resync interval is zero.
    #[error("resync interval must be non-zero")]
    InvalidResyncInterval,
    /// The graceful shutdown bound is zero.
    #[error("shutdown timeout must be non-zero")]
    InvalidShutdownTimeout,
    /// A simulation parameter is out of range.
    #[error("invalid simulation settings: {0}")]
    InvalidSimulation(String),
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The config file is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Printer identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Printer serial; becomes the `device` label on every metric.
    pub id: String,
}

/// Scrape endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listening port.
    pub port: u16,
    /// Route serving the metrics.
    pub path: String,
    /// Bound on graceful shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            path: "/metrics".to_string(),
            shutdown_timeout_secs: 5,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, e.g. `info` or `debug`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Full state request schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResyncConfig {
    /// Delay before the first request, in seconds.
    pub initial_delay_secs: u64,
    /// Interval between requests, in seconds.
    pub interval_secs: u64,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 1,
            interval_secs: 5 * 60,
        }
    }
}

impl ResyncConfig {
    /// Delay before the first request.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Interval between requests.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Lifecycle counting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How finished prints are counted.
    pub mode: LifecycleMode,
    /// Buffered lifecycle notifications before new ones are dropped.
    pub event_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            mode: LifecycleMode::Events,
            event_capacity: 64,
        }
    }
}

/// Simulated printer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Time between printer reports, in milliseconds.
    pub tick_ms: u64,
    /// Percent progress per tick.
    pub progress_step: u32,
    /// Idle ticks between jobs.
    pub idle_ticks: u32,
    /// Cancel every n-th job halfway (0 never cancels).
    pub cancel_every: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 2000,
            progress_step: 5,
            idle_ticks: 5,
            cancel_every: 4,
        }
    }
}

impl SimulationConfig {
    /// Validates the simulation parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::InvalidSimulation("tick_ms must be non-zero".into()));
        }
        if self.progress_step == 0 || self.progress_step > 100 {
            return Err(ConfigError::InvalidSimulation(
                "progress_step must be 1-100".into(),
            ));
        }
        Ok(())
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Printer identity.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Scrape endpoint.
    #[serde(default)]
    pub http: HttpConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
    /// Full state request schedule.
    #[serde(default)]
    pub resync: ResyncConfig,
    /// Lifecycle counting.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Simulated printer.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    ///
    /// The result is not validated, since flags and environment may
    /// still supply required values. Call [`FileConfig::validate`] once
    /// overrides are applied.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.id.trim().is_empty() {
            return Err(ConfigError::MissingDeviceId);
        }
        if !self.http.path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath(self.http.path.clone()));
        }
        if self.http.shutdown_timeout_secs == 0 {
            return Err(ConfigError::InvalidShutdownTimeout);
        }
        if self.resync.interval_secs == 0 {
            return Err(ConfigError::InvalidResyncInterval);
        }
        self.simulation.validate()
    }

    /// Scrape server settings derived from `[http]`.
    pub fn server_config(&self) -> MetricsServerConfig {
        MetricsServerConfig {
            path: self.http.path.clone(),
            shutdown_timeout: Duration::from_secs(self.http.shutdown_timeout_secs),
            ..MetricsServerConfig::with_port(self.http.port)
        }
    }
}
