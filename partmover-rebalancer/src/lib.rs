//! partmover rebalancer library
//!
//! Plans and executes partition-replica reassignments:
//! - Balancing strategies (count, size, even, leader) and single-purpose
//!   transformations (replication factor, clone, trim, remove)
//! - Batched reassignment execution with verification polling
//! - Paced preferred leader election
//! - Collaborators for topology metadata, partition sizes and admin tooling

pub mod admin;
pub mod config;
pub mod election;
pub mod executor;
pub mod metadata_client;
pub mod runner;
pub mod sizer;
pub mod strategies;

// Re-export main types
pub use admin::{classify_verify_output, AdminClient, ScriptAdminClient, VerifyStatus};
pub use config::{ConfigError, RebalancerConfig};
pub use election::{ElectionConfig, LeaderElection};
pub use executor::{BatchExecutor, BatchStatus, ExecutionResult, ExecutorConfig, ProgressUpdate};
pub use metadata_client::{MetadataClient, SnapshotFileClient};
pub use runner::{Operation, Outcome, Runner};
pub use sizer::{apply_sizes, parse_du_output, DuSizeCollector, PartitionSize, SizeCollector};
pub use strategies::{Balance, BalanceType, Strategy};
