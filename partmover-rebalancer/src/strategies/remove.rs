//! Remove a broker by migrating its replicas round-robin onto other brokers

use partmover_core::{BrokerId, Cluster, PartitionKey, RebalanceError, Result};
use tracing::{debug, info, instrument};

use super::Strategy;

pub struct RemoveBroker {
    broker: BrokerId,
    targets: Vec<BrokerId>,
}

impl RemoveBroker {
    /// An empty `targets` list means every other broker in the cluster
    pub fn new(broker: BrokerId, targets: Vec<BrokerId>) -> Result<Self> {
        if targets.contains(&broker) {
            return Err(RebalanceError::Validation(format!(
                "broker {} cannot be its own migration target",
                broker
            )));
        }
        Ok(Self { broker, targets })
    }

    fn resolve_targets(&self, cluster: &Cluster) -> Result<Vec<BrokerId>> {
        cluster.require_brokers(&[self.broker])?;
        if self.targets.is_empty() {
            return Ok(cluster
                .broker_ids()
                .into_iter()
                .filter(|&b| b != self.broker)
                .collect());
        }
        cluster.require_brokers(&self.targets)?;
        Ok(self.targets.clone())
    }
}

impl Strategy for RemoveBroker {
    fn name(&self) -> &'static str {
        "remove"
    }

    #[instrument(skip(self, cluster), fields(broker = self.broker))]
    fn apply(&mut self, cluster: &mut Cluster) -> Result<()> {
        let targets = self.resolve_targets(cluster)?;

        let held: Vec<(PartitionKey, usize)> = cluster
            .partitions()
            .filter_map(|p| p.position_of(self.broker).map(|pos| (p.key(), pos)))
            .collect();

        let mut next = 0usize;
        for (key, position) in &held {
            let partition = cluster.require_partition(key)?;
            let offset = (0..targets.len())
                .find(|i| !partition.has_replica(targets[(next + i) % targets.len()]))
                .ok_or_else(|| RebalanceError::NoTargetBroker {
                    partition: key.to_string(),
                    broker: self.broker,
                })?;
            let to = targets[(next + offset) % targets.len()];
            next = (next + offset + 1) % targets.len();

            cluster.move_replica(key, *position, to)?;
            debug!(partition = %key, position, from = self.broker, to, "Migrated replica");
        }

        info!(broker = self.broker, partitions = held.len(), "Removal planned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;

    #[test]
    fn test_round_robin_over_other_brokers() {
        let mut working = cluster(&[1, 2, 3], &[("t", vec![vec![1]; 4])]);
        RemoveBroker::new(1, vec![]).unwrap().apply(&mut working).unwrap();

        assert_eq!(replicas(&working, "t", 0), vec![2]);
        assert_eq!(replicas(&working, "t", 1), vec![3]);
        assert_eq!(replicas(&working, "t", 2), vec![2]);
        assert_eq!(replicas(&working, "t", 3), vec![3]);
        assert_eq!(working.broker(1).unwrap().partition_count(), 0);
        working.verify_indices().unwrap();
    }

    #[test]
    fn test_skips_targets_already_holding_partition() {
        let mut working = cluster(&[1, 2, 3], &[("t", vec![vec![2, 1], vec![1, 3]])]);
        RemoveBroker::new(1, vec![2, 3]).unwrap().apply(&mut working).unwrap();

        assert_eq!(replicas(&working, "t", 0), vec![2, 3]);
        assert_eq!(replicas(&working, "t", 1), vec![2, 3]);
        working.verify_indices().unwrap();
    }

    #[test]
    fn test_no_valid_target_fails() {
        let mut working = cluster(&[1, 2], &[("t", vec![vec![1, 2]])]);
        let err = RemoveBroker::new(1, vec![]).unwrap().apply(&mut working).unwrap_err();
        assert!(matches!(err, RebalanceError::NoTargetBroker { broker: 1, .. }));
    }

    #[test]
    fn test_unknown_brokers_rejected() {
        let mut working = cluster(&[1, 2], &[("t", vec![vec![1]])]);
        let err = RemoveBroker::new(7, vec![]).unwrap().apply(&mut working).unwrap_err();
        assert!(matches!(err, RebalanceError::UnknownBroker(7)));

        let err = RemoveBroker::new(1, vec![9]).unwrap().apply(&mut working).unwrap_err();
        assert!(matches!(err, RebalanceError::UnknownBroker(9)));

        assert!(RemoveBroker::new(1, vec![1]).is_err());
    }
}
