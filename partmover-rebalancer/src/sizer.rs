//! On-disk partition sizes
//!
//! Sizes are gathered per broker by running `du` over the broker's data
//! directory through a remote shell, then folded into the cluster model.

use partmover_core::{Cluster, PartitionKey, RebalanceError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// One observed partition directory size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSize {
    pub key: PartitionKey,
    pub size_kb: u64,
}

/// Source of partition size observations
#[async_trait::async_trait]
pub trait SizeCollector: Send + Sync {
    async fn collect(&self, cluster: &Cluster) -> Result<Vec<PartitionSize>>;
}

/// Parse `du -sk` output lines of the form `<kb>\t<dir>/<topic>-<partition>`
///
/// Lines that do not name a partition directory are ignored.
pub fn parse_du_output(output: &str) -> Vec<PartitionSize> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let size_kb = fields.next()?.parse::<u64>().ok()?;
            let path = fields.next()?;
            let name = Path::new(path).file_name()?.to_str()?;
            let (topic, partition) = name.rsplit_once('-')?;
            let partition = partition.parse::<u32>().ok()?;
            if topic.is_empty() {
                return None;
            }
            Some(PartitionSize {
                key: PartitionKey::new(topic, partition),
                size_kb,
            })
        })
        .collect()
}

/// Fold observations into `cluster`, keeping the largest size seen per partition
///
/// Observations for partitions the cluster does not know are logged and
/// skipped. Returns the number of partitions updated.
pub fn apply_sizes(cluster: &mut Cluster, sizes: &[PartitionSize]) -> usize {
    let mut largest: BTreeMap<&PartitionKey, u64> = BTreeMap::new();
    for observed in sizes {
        let entry = largest.entry(&observed.key).or_default();
        *entry = (*entry).max(observed.size_kb);
    }

    let mut applied = 0;
    for (key, size_kb) in largest {
        if cluster.set_partition_size(key, size_kb) {
            applied += 1;
        } else {
            warn!(partition = %key, size_kb, "Size reported for unknown partition");
        }
    }
    applied
}

/// Collects sizes by running `du -sk` on every broker host
pub struct DuSizeCollector {
    remote_shell: String,
    data_dir: String,
}

impl DuSizeCollector {
    pub fn new(remote_shell: impl Into<String>, data_dir: impl Into<String>) -> Self {
        Self {
            remote_shell: remote_shell.into(),
            data_dir: data_dir.into(),
        }
    }

    async fn collect_host(&self, host: &str) -> Result<Vec<PartitionSize>> {
        let output = Command::new(&self.remote_shell)
            .arg(host)
            .arg("du")
            .arg("-sk")
            .arg(format!("{}/*", self.data_dir.trim_end_matches('/')))
            .output()
            .await
            .map_err(|e| {
                RebalanceError::Metadata(format!(
                    "failed to run {} on {}: {}",
                    self.remote_shell, host, e
                ))
            })?;
        if !output.status.success() {
            return Err(RebalanceError::Metadata(format!(
                "du on {} exited with {}: {}",
                host,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(parse_du_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait::async_trait]
impl SizeCollector for DuSizeCollector {
    #[instrument(skip(self, cluster))]
    async fn collect(&self, cluster: &Cluster) -> Result<Vec<PartitionSize>> {
        let mut sizes = Vec::new();
        for broker in cluster.brokers() {
            let Some(host) = broker.hostname() else {
                warn!(broker = broker.id(), "Broker has no hostname, skipping size collection");
                continue;
            };
            let found = self.collect_host(host).await?;
            debug!(broker = broker.id(), host, partitions = found.len(), "Collected sizes");
            sizes.extend(found);
        }
        info!(observations = sizes.len(), "Partition sizes collected");
        Ok(sizes)
    }
}
