//! Configuration loading for db-chaos.
//!
//! Settings come from an optional TOML file. Command-line flags override
//! individual values after the file is loaded.

use chaos_core::{HarnessConfig, ReadinessConfig, SequencerConfig, WorkloadConfig};
use chaos_repo::{StoreConfig, DEFAULT_MIN_REPLICAS};
use chaos_types::DiskLatency;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for db-chaos.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Datastore connection.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Transfer workload.
    #[serde(default)]
    pub workload: WorkloadSection,
    /// Experiment sequencing.
    #[serde(default)]
    pub chaos: ChaosConfig,
    /// Kubernetes API access.
    #[serde(default)]
    pub kube: KubeSection,
}

/// Which datastore adapter to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// PostgreSQL; ready when out of recovery.
    #[default]
    Postgres,
    /// CockroachDB; ready when no range is under-replicated.
    Cockroach,
}

/// Datastore connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Adapter (default: postgres).
    #[serde(default)]
    pub kind: DatabaseKind,
    /// Connection URL. Required, from here or `--url`.
    pub url: Option<String>,
    /// Pool size (default: 3).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection lifetime in seconds (default: 15).
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
    /// Deadline for one transfer in seconds (default: 5).
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    /// Attempts on serialization conflicts (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// CockroachDB replication factor to wait for (default: 3).
    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,
}

/// Workload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadSection {
    /// Accounts seeded and sampled (default: 10000).
    #[serde(default = "default_accounts")]
    pub accounts: usize,
    /// Starting balance of each seeded account (default: 10000).
    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,
    /// Time between transfers in milliseconds (default: 100).
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,
    /// Upper bound on transfer amounts (default: 100).
    #[serde(default = "default_max_amount")]
    pub max_amount: f64,
    /// Drop and recreate the account table first (default: false).
    #[serde(default)]
    pub reseed: bool,
    /// Seconds of workload before the first experiment (default: 5).
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,
    /// Seed for the transfer RNG (random when unset).
    pub seed: Option<u64>,
}

/// Experiment sequencing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChaosConfig {
    /// Namespace the database pods run in (default: default).
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Namespace experiments are created in (default: chaos-mesh).
    #[serde(default = "default_chaos_namespace")]
    pub chaos_namespace: String,
    /// Seconds each experiment stays applied (default: 30).
    #[serde(default = "default_hold_secs")]
    pub hold_secs: u64,
    /// Seconds between readiness checks (default: 5).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds to wait for readiness before giving up (default: 300).
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    /// Disk latency profile. Disk latency experiments only run when set.
    pub disk_latency: Option<DiskLatencySection>,
}

/// Disk latency experiment parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct DiskLatencySection {
    /// Data volume mount point inside the container.
    pub volume_path: String,
    /// File glob to delay (default: all files).
    #[serde(default = "default_disk_path")]
    pub path: String,
    /// Added delay in milliseconds (default: 100).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Share of operations delayed, 1-100 (default: 100).
    #[serde(default = "default_percent")]
    pub percent: u8,
}

/// Kubernetes API access. Unset fields fall back to the environment, the
/// in-cluster service account, the kubeconfig file, then `kubectl proxy`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KubeSection {
    /// API server URL.
    pub api_server: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
}

// Default value functions
fn default_max_connections() -> u32 {
    3
}

fn default_max_lifetime_secs() -> u64 {
    15
}

fn default_operation_timeout_secs() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    5
}

fn default_min_replicas() -> u32 {
    DEFAULT_MIN_REPLICAS
}

fn default_accounts() -> usize {
    10_000
}

fn default_initial_balance() -> f64 {
    10_000.0
}

fn default_cadence_ms() -> u64 {
    100
}

fn default_max_amount() -> f64 {
    100.0
}

fn default_warmup_secs() -> u64 {
    5
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_chaos_namespace() -> String {
    "chaos-mesh".to_string()
}

fn default_hold_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_ready_timeout_secs() -> u64 {
    300 // 5 minutes
}

fn default_disk_path() -> String {
    "*".to_string()
}

fn default_delay_ms() -> u64 {
    100
}

fn default_percent() -> u8 {
    100
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kind: DatabaseKind::default(),
            url: None,
            max_connections: default_max_connections(),
            max_lifetime_secs: default_max_lifetime_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
            max_retries: default_max_retries(),
            min_replicas: default_min_replicas(),
        }
    }
}

impl Default for WorkloadSection {
    fn default() -> Self {
        Self {
            accounts: default_accounts(),
            initial_balance: default_initial_balance(),
            cadence_ms: default_cadence_ms(),
            max_amount: default_max_amount(),
            reseed: false,
            warmup_secs: default_warmup_secs(),
            seed: None,
        }
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            chaos_namespace: default_chaos_namespace(),
            hold_secs: default_hold_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
            disk_latency: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Reject values the run cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be non-zero",
            ));
        }
        if self.workload.cadence_ms == 0 {
            return Err(ConfigError::Invalid(
                "workload.cadence_ms must be non-zero",
            ));
        }
        if self.chaos.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "chaos.poll_interval_secs must be non-zero",
            ));
        }
        Ok(())
    }

    /// Connection pool settings for the datastore adapter.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_connections: self.database.max_connections,
            max_lifetime: Duration::from_secs(self.database.max_lifetime_secs),
            operation_timeout: Duration::from_secs(self.database.operation_timeout_secs),
            max_retries: self.database.max_retries,
            ..StoreConfig::default()
        }
    }

    /// Harness settings for the run.
    pub fn harness_config(&self) -> HarnessConfig {
        let workload = &self.workload;
        let chaos = &self.chaos;

        HarnessConfig {
            reseed: workload.reseed,
            initial_balance: workload.initial_balance,
            warmup: Duration::from_secs(workload.warmup_secs),
            workload: WorkloadConfig {
                entity_count: workload.accounts,
                cadence: Duration::from_millis(workload.cadence_ms),
                max_amount: workload.max_amount,
                seed: workload.seed,
            },
            sequencer: SequencerConfig {
                target_namespace: chaos.namespace.clone(),
                chaos_namespace: chaos.chaos_namespace.clone(),
                hold_duration: Duration::from_secs(chaos.hold_secs),
                readiness: ReadinessConfig {
                    poll_interval: Duration::from_secs(chaos.poll_interval_secs),
                    timeout: Duration::from_secs(chaos.ready_timeout_secs),
                },
                disk_latency: chaos.disk_latency.as_ref().map(|d| DiskLatency {
                    volume_path: d.volume_path.clone(),
                    path: d.path.clone(),
                    delay: Duration::from_millis(d.delay_ms),
                    percent: d.percent,
                }),
            },
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
