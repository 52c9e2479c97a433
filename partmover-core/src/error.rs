//! Error types for partmover
//!
//! Provides a unified error type for planning and executing reassignments.

use thiserror::Error;

use crate::cluster::BrokerId;

/// Result type alias for partmover operations
pub type Result<T> = std::result::Result<T, RebalanceError>;

/// Unified error type for partmover
#[derive(Error, Debug)]
pub enum RebalanceError {
    // ===== Validation Errors =====
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown broker: {0}")]
    UnknownBroker(BrokerId),

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Unknown partition: {topic}-{partition}")]
    UnknownPartition { topic: String, partition: u32 },

    #[error("Invalid replication factor: {0} (must be at least 1)")]
    InvalidReplicationFactor(usize),

    #[error("Replication factor mismatch for {partition}: expected {expected}, got {actual}")]
    ReplicationFactorMismatch {
        partition: String,
        expected: usize,
        actual: usize,
    },

    #[error("Removing brokers would leave {0} without replicas")]
    TrimWouldEmpty(String),

    #[error("No target broker available for {partition} on broker {broker}")]
    NoTargetBroker { partition: String, broker: BrokerId },

    // ===== Execution Errors =====
    #[error("Reassignment batch {batch} failed ({partitions}): {status}")]
    ExecutionFailed {
        batch: usize,
        partitions: String,
        status: String,
    },

    #[error("Reassignment batch {batch} still in progress after {attempts} polls")]
    PollTimeout { batch: usize, attempts: u32 },

    #[error("Admin tool error: {0}")]
    Admin(String),

    // ===== Collaborator Errors =====
    #[error("Metadata error: {0}")]
    Metadata(String),

    // ===== I/O Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Serialization Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RebalanceError {
    /// True for errors raised before anything is submitted to the cluster
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RebalanceError::Validation(_)
                | RebalanceError::UnknownBroker(_)
                | RebalanceError::UnknownTopic(_)
                | RebalanceError::UnknownPartition { .. }
                | RebalanceError::InvalidReplicationFactor(_)
                | RebalanceError::ReplicationFactorMismatch { .. }
                | RebalanceError::TrimWouldEmpty(_)
                | RebalanceError::NoTargetBroker { .. }
        )
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl From<serde_json::Error> for RebalanceError {
    fn from(err: serde_json::Error) -> Self {
        RebalanceError::Serialization(err.to_string())
    }
}
