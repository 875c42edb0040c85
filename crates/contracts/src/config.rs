//! ExporterConfig - Config Loader output
//!
//! Describes the whole process: backend connection, worker cycle tuning,
//! watchdog timing and the record / export definition sources.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Complete exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExporterConfig {
    /// Time-series backend connection
    #[validate(nested)]
    pub influxdb: InfluxDbConfig,

    /// Export worker cycle settings
    #[serde(default)]
    #[validate(nested)]
    pub worker: WorkerConfig,

    /// Watchdog timing
    #[serde(default)]
    #[validate(nested)]
    pub watchdog: WatchdogConfig,

    /// Export definition and record sources
    pub source: SourceConfig,
}

/// InfluxDB (1.x HTTP API) connection
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InfluxDbConfig {
    /// Base URL, e.g. `http://localhost:8086`
    #[validate(url)]
    pub url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_influx_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Retries on transport failures (0 = no retry)
    #[serde(default)]
    #[validate(range(max = 10))]
    pub retries: u32,
}

fn default_influx_timeout() -> u64 {
    10
}

impl InfluxDbConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Export worker settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorkerConfig {
    /// Batch pull timeout in seconds
    #[serde(default = "default_get_data_timeout")]
    #[validate(range(exclusive_min = 0.0, max = 3600.0))]
    pub get_data_timeout: f64,

    /// Maximum records per pull
    #[serde(default = "default_get_data_limit")]
    #[validate(range(min = 1))]
    pub get_data_limit: usize,

    /// What to do when a batch cannot be written
    #[serde(default)]
    pub on_fatal_write: FatalWritePolicy,

    /// What to do with measurements rejected after a split retry
    #[serde(default)]
    pub split_failure: SplitFailurePolicy,
}

fn default_get_data_timeout() -> f64 {
    5.0
}

fn default_get_data_limit() -> usize {
    10_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            get_data_timeout: default_get_data_timeout(),
            get_data_limit: default_get_data_limit(),
            on_fatal_write: FatalWritePolicy::default(),
            split_failure: SplitFailurePolicy::default(),
        }
    }
}

impl WorkerConfig {
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.get_data_timeout)
    }
}

/// Policy applied when a batch write fails fatally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FatalWritePolicy {
    /// Stop the worker without acknowledging
    #[default]
    Stop,
    /// Re-attempt the whole batch, then stop if it still fails
    Retry {
        /// Additional attempts after the first failure
        max_attempts: u32,
        /// Delay before attempt `n` is `n * backoff_ms`
        #[serde(default = "default_retry_backoff_ms")]
        backoff_ms: u64,
    },
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

/// Handling of measurements still rejected (bad request / too large) after
/// a per-measurement split
///
/// Any other failure during the split is always fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitFailurePolicy {
    /// Log and drop the rejected measurement
    #[default]
    Discard,
    /// Fail the cycle once every sibling measurement was attempted
    Escalate,
}

/// Watchdog timing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WatchdogConfig {
    /// Delay before the first liveness poll, in seconds
    #[serde(default = "default_start_delay")]
    #[validate(range(min = 0.0, max = 3600.0))]
    pub start_delay_secs: f64,

    /// Interval between liveness polls, in seconds
    #[serde(default = "default_monitor_delay")]
    #[validate(range(exclusive_min = 0.0, max = 3600.0))]
    pub monitor_delay_secs: f64,
}

fn default_start_delay() -> f64 {
    5.0
}

fn default_monitor_delay() -> f64 {
    2.0
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            start_delay_secs: default_start_delay(),
            monitor_delay_secs: default_monitor_delay(),
        }
    }
}

impl WatchdogConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_secs_f64(self.start_delay_secs)
    }

    pub fn monitor_delay(&self) -> Duration {
        Duration::from_secs_f64(self.monitor_delay_secs)
    }
}

/// Export definition and record sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// JSON array of raw export definitions
    pub exports_path: PathBuf,

    /// JSON-lines file of matched records
    pub records_path: PathBuf,

    /// Committed offset file (default: `<records_path>.offset`)
    #[serde(default)]
    pub offsets_path: Option<PathBuf>,
}

impl SourceConfig {
    /// Offset file actually used
    pub fn resolved_offsets_path(&self) -> PathBuf {
        self.offsets_path.clone().unwrap_or_else(|| {
            let mut name = self.records_path.clone().into_os_string();
            name.push(".offset");
            PathBuf::from(name)
        })
    }
}
