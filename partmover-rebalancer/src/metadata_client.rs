//! Topology metadata client
//!
//! The [`MetadataClient`] trait hands over the current broker and partition
//! assignment. [`SnapshotFileClient`] reads it from a JSON document exported
//! from the coordination store.

use partmover_core::{RebalanceError, Result, TopologySnapshot};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Source of the current cluster topology
#[async_trait::async_trait]
pub trait MetadataClient: Send + Sync {
    async fn fetch_topology(&self) -> Result<TopologySnapshot>;
}

/// Snapshot-file metadata client
pub struct SnapshotFileClient {
    path: PathBuf,
}

impl SnapshotFileClient {
    /// Create a new snapshot file client
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl MetadataClient for SnapshotFileClient {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_topology(&self) -> Result<TopologySnapshot> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RebalanceError::Metadata(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let snapshot = TopologySnapshot::from_json(&raw)?;
        debug!(
            brokers = snapshot.brokers.len(),
            topics = snapshot.topics.len(),
            "Loaded topology snapshot"
        );
        Ok(snapshot)
    }
}
