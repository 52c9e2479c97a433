//! Rebalancer configuration
//!
//! Configuration loaded from environment variables and command line.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::election::ElectionConfig;
use crate::executor::ExecutorConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Rebalancer configuration
#[derive(Debug, Clone)]
pub struct RebalancerConfig {
    /// Coordination store address passed to the admin tools
    pub zookeeper: String,

    /// Directory holding the admin tool scripts
    pub tools_path: PathBuf,

    /// Partition moves per reassignment batch
    pub moves_per_batch: usize,

    /// Maximum leader-election payload size in bytes
    pub ple_max_payload_bytes: usize,

    /// Wait between leader-election batches in seconds
    pub ple_wait_secs: u64,

    /// Wait between reassignment verification polls in seconds
    pub poll_interval_secs: u64,

    /// Maximum verification polls per batch (unbounded if unset)
    pub max_polls: Option<u32>,

    /// Dry run mode (print the plan, submit nothing)
    pub dry_run: bool,

    /// Skip preferred leader election after reassignment
    pub skip_ple: bool,

    /// Topics never touched by any strategy
    pub exclude_topics: Vec<String>,

    /// Write the reassignment plan here
    pub output_json: Option<PathBuf>,

    /// Seed for randomized broker selection
    pub seed: Option<u64>,

    /// Broker data directory scanned for partition sizes
    pub data_dir: String,

    /// Command used to run `du` on broker hosts
    pub remote_shell: String,
}

impl Default for RebalancerConfig {
    fn default() -> Self {
        Self {
            zookeeper: "localhost:2181".to_string(),
            tools_path: PathBuf::from("/opt/kafka/bin"),
            moves_per_batch: 10,
            ple_max_payload_bytes: 1_000_000,
            ple_wait_secs: 120,
            poll_interval_secs: 10,
            max_polls: None,
            dry_run: false,
            skip_ple: false,
            exclude_topics: Vec::new(),
            output_json: None,
            seed: None,
            data_dir: "/var/kafka-logs".to_string(),
            remote_shell: "ssh".to_string(),
        }
    }
}

fn parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), v)),
        Err(_) => Ok(None),
    }
}

fn flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

impl RebalancerConfig {
    /// Create configuration from `PARTMOVER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let moves_per_batch = parsed("PARTMOVER_MOVES_PER_BATCH")?.unwrap_or(defaults.moves_per_batch);
        if moves_per_batch == 0 {
            return Err(ConfigError::InvalidValue(
                "PARTMOVER_MOVES_PER_BATCH".to_string(),
                "0".to_string(),
            ));
        }

        let exclude_topics = std::env::var("PARTMOVER_EXCLUDE_TOPICS")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            zookeeper: std::env::var("PARTMOVER_ZOOKEEPER").unwrap_or(defaults.zookeeper),
            tools_path: std::env::var("PARTMOVER_TOOLS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.tools_path),
            moves_per_batch,
            ple_max_payload_bytes: parsed("PARTMOVER_PLE_MAX_PAYLOAD")?
                .unwrap_or(defaults.ple_max_payload_bytes),
            ple_wait_secs: parsed("PARTMOVER_PLE_WAIT")?.unwrap_or(defaults.ple_wait_secs),
            poll_interval_secs: parsed("PARTMOVER_POLL_INTERVAL")?
                .unwrap_or(defaults.poll_interval_secs),
            max_polls: parsed("PARTMOVER_MAX_POLLS")?,
            dry_run: flag("PARTMOVER_DRY_RUN"),
            skip_ple: flag("PARTMOVER_SKIP_PLE"),
            exclude_topics,
            output_json: std::env::var("PARTMOVER_OUTPUT_JSON").ok().map(PathBuf::from),
            seed: parsed("PARTMOVER_SEED")?,
            data_dir: std::env::var("PARTMOVER_DATA_DIR").unwrap_or(defaults.data_dir),
            remote_shell: std::env::var("PARTMOVER_REMOTE_SHELL").unwrap_or(defaults.remote_shell),
        })
    }

    /// Batch executor settings
    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            moves_per_batch: self.moves_per_batch,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_polls: self.max_polls,
        }
    }

    /// Leader-election settings
    pub fn election(&self) -> ElectionConfig {
        ElectionConfig {
            max_payload_bytes: self.ple_max_payload_bytes,
            wait: Duration::from_secs(self.ple_wait_secs),
        }
    }
}
