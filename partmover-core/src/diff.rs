//! Move diff generator
//!
//! Compares a working cluster against the untouched original and emits one
//! move per partition whose replica list changed, including pure reorders.

use tracing::debug;

use crate::cluster::{BrokerId, Cluster};
use crate::request::PartitionMove;

/// Moves needed to turn `current` into `target`, in topic/partition order
pub fn generate_moves(current: &Cluster, target: &Cluster) -> Vec<PartitionMove> {
    let mut moves = Vec::new();
    for partition in target.partitions() {
        let before = current
            .partition(&partition.key())
            .map(|p| p.replicas())
            .unwrap_or(&[]);
        if before != partition.replicas() {
            debug!(
                partition = %partition.key(),
                from = ?before,
                to = ?partition.replicas(),
                "Replica list changed"
            );
            moves.push(PartitionMove {
                topic: partition.topic().to_string(),
                partition: partition.number(),
                replicas: partition.replicas().to_vec(),
            });
        }
    }
    moves
}

/// Per-broker replica and leader counts before and after a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerDelta {
    pub broker: BrokerId,
    pub partitions_before: usize,
    pub partitions_after: usize,
    pub leaders_before: usize,
    pub leaders_after: usize,
}

impl BrokerDelta {
    pub fn is_unchanged(&self) -> bool {
        self.partitions_before == self.partitions_after && self.leaders_before == self.leaders_after
    }
}

/// Count deltas for every broker known to either cluster
pub fn broker_deltas(current: &Cluster, target: &Cluster) -> Vec<BrokerDelta> {
    let mut ids = current.broker_ids();
    ids.extend(target.broker_ids());
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .map(|id| {
            let counts = |c: &Cluster| {
                c.broker(id)
                    .map(|b| (b.partition_count(), b.leader_count()))
                    .unwrap_or((0, 0))
            };
            let (partitions_before, leaders_before) = counts(current);
            let (partitions_after, leaders_after) = counts(target);
            BrokerDelta {
                broker: id,
                partitions_before,
                partitions_after,
                leaders_before,
                leaders_after,
            }
        })
        .collect()
}
