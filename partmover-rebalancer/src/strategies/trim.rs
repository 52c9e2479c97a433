//! Trim brokers out of every replica list

use partmover_core::{BrokerId, Cluster, PartitionKey, RebalanceError, Result};
use tracing::{debug, info, instrument};

use super::Strategy;

pub struct TrimBrokers {
    brokers: Vec<BrokerId>,
}

impl TrimBrokers {
    pub fn new(brokers: Vec<BrokerId>) -> Result<Self> {
        if brokers.is_empty() {
            return Err(RebalanceError::Validation(
                "trim needs at least one broker".to_string(),
            ));
        }
        Ok(Self { brokers })
    }
}

impl Strategy for TrimBrokers {
    fn name(&self) -> &'static str {
        "trim"
    }

    #[instrument(skip(self, cluster), fields(brokers = ?self.brokers))]
    fn apply(&mut self, cluster: &mut Cluster) -> Result<()> {
        cluster.require_brokers(&self.brokers)?;

        // Check every partition first so a failure leaves the cluster untouched.
        let mut trimmed: Vec<(PartitionKey, Vec<BrokerId>)> = Vec::new();
        for partition in cluster.partitions() {
            if !self.brokers.iter().any(|&b| partition.has_replica(b)) {
                continue;
            }
            let remaining: Vec<BrokerId> = partition
                .replicas()
                .iter()
                .copied()
                .filter(|b| !self.brokers.contains(b))
                .collect();
            if remaining.is_empty() {
                return Err(RebalanceError::TrimWouldEmpty(partition.key().to_string()));
            }
            trimmed.push((partition.key(), remaining));
        }

        for (key, replicas) in &trimmed {
            debug!(partition = %key, ?replicas, "Trimmed replicas");
            cluster.set_replicas(key, replicas.clone())?;
        }
        info!(partitions = trimmed.len(), "Trim planned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use partmover_core::generate_moves;

    #[test]
    fn test_removes_brokers_from_replica_lists() {
        let mut working = cluster(
            &[1, 2, 3],
            &[("t", vec![vec![1, 2, 3], vec![3, 2], vec![1, 3]])],
        );
        TrimBrokers::new(vec![2]).unwrap().apply(&mut working).unwrap();

        assert_eq!(replicas(&working, "t", 0), vec![1, 3]);
        assert_eq!(replicas(&working, "t", 1), vec![3]);
        assert_eq!(replicas(&working, "t", 2), vec![1, 3]);
        assert_eq!(working.broker(2).unwrap().partition_count(), 0);
        working.verify_indices().unwrap();
    }

    #[test]
    fn test_sole_replica_fails_without_mutation() {
        let original = cluster(&[1, 2], &[("t", vec![vec![1, 2], vec![2]])]);
        let mut working = original.clone();
        let err = TrimBrokers::new(vec![2]).unwrap().apply(&mut working).unwrap_err();

        assert!(matches!(err, RebalanceError::TrimWouldEmpty(ref p) if p == "t-1"));
        assert!(err.is_validation());
        assert!(generate_moves(&original, &working).is_empty());
    }

    #[test]
    fn test_unknown_broker_rejected() {
        let mut working = cluster(&[1, 2], &[("t", vec![vec![1, 2]])]);
        let err = TrimBrokers::new(vec![5]).unwrap().apply(&mut working).unwrap_err();
        assert!(matches!(err, RebalanceError::UnknownBroker(5)));
    }
}
