//! Preferred leader election
//!
//! Requests election for every partition, split into batches whose encoded
//! payload stays near the admin tool's size cap, with a pause between
//! batches. Elections are not verified.

use partmover_core::{Cluster, ElectionRequest, Result, TopicPartition};
use std::time::Duration;
use tracing::{info, instrument};

use crate::admin::AdminClient;

/// Leader-election configuration
#[derive(Debug, Clone)]
pub struct ElectionConfig {
    /// Upper bound on one request's encoded size
    pub max_payload_bytes: usize,
    /// Pause between consecutive batches
    pub wait: Duration,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 1_000_000,
            wait: Duration::from_secs(120),
        }
    }
}

pub struct LeaderElection {
    config: ElectionConfig,
}

impl LeaderElection {
    pub fn new(config: ElectionConfig) -> Self {
        Self { config }
    }

    /// Split `partitions` into evenly sized requests
    ///
    /// `batches = ceil(encoded / max)`, `size = ceil(count / batches)`.
    pub fn plan_batches(&self, partitions: Vec<TopicPartition>) -> Result<Vec<ElectionRequest>> {
        if partitions.is_empty() {
            return Ok(Vec::new());
        }
        let encoded = ElectionRequest::new(partitions.clone()).encoded_len()?;
        let max = self.config.max_payload_bytes.max(1);
        let num_batches = encoded.div_ceil(max);
        let batch_size = partitions.len().div_ceil(num_batches);

        Ok(partitions
            .chunks(batch_size)
            .map(|chunk| ElectionRequest::new(chunk.to_vec()))
            .collect())
    }

    /// Elect preferred leaders for every partition of `cluster`
    #[instrument(skip(self, admin, cluster))]
    pub async fn run(&self, admin: &dyn AdminClient, cluster: &Cluster) -> Result<usize> {
        let partitions: Vec<TopicPartition> = cluster
            .partition_keys()
            .into_iter()
            .map(TopicPartition::from)
            .collect();
        let batches = self.plan_batches(partitions)?;
        let total = batches.len();

        for (index, request) in batches.iter().enumerate() {
            if index > 0 {
                info!(wait = ?self.config.wait, "Waiting before next election batch");
                tokio::time::sleep(self.config.wait).await;
            }
            info!(
                batch = index + 1,
                total,
                partitions = request.partitions.len(),
                "Requesting preferred leader election"
            );
            admin.elect_preferred_leaders(request).await?;
        }
        Ok(total)
    }
}
