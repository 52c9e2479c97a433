//! Replication factor change for a set of topics

use partmover_core::{BrokerId, Cluster, PartitionKey, RebalanceError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, instrument};

use super::Strategy;

pub struct SetReplicationFactor {
    topics: Vec<String>,
    replication_factor: usize,
    rng: StdRng,
}

impl SetReplicationFactor {
    pub fn new(topics: Vec<String>, replication_factor: usize, rng: StdRng) -> Result<Self> {
        if replication_factor < 1 {
            return Err(RebalanceError::InvalidReplicationFactor(replication_factor));
        }
        if topics.is_empty() {
            return Err(RebalanceError::Validation(
                "set-replication-factor needs at least one topic".to_string(),
            ));
        }
        Ok(Self {
            topics,
            replication_factor,
            rng,
        })
    }

    fn resize(&mut self, brokers: &[BrokerId], current: &[BrokerId]) -> Vec<BrokerId> {
        let mut replicas = current.to_vec();
        if replicas.len() < self.replication_factor {
            let mut spare: Vec<BrokerId> = brokers
                .iter()
                .copied()
                .filter(|b| !replicas.contains(b))
                .collect();
            spare.shuffle(&mut self.rng);
            let wanted = self.replication_factor - replicas.len();
            replicas.extend(spare.into_iter().take(wanted));
        }
        // Position 0 is never a removal candidate.
        while replicas.len() > self.replication_factor && replicas.len() > 1 {
            let victim = self.rng.gen_range(1..replicas.len());
            replicas.remove(victim);
        }
        replicas
    }
}

impl Strategy for SetReplicationFactor {
    fn name(&self) -> &'static str {
        "set-replication-factor"
    }

    #[instrument(skip(self, cluster), fields(rf = self.replication_factor))]
    fn apply(&mut self, cluster: &mut Cluster) -> Result<()> {
        for name in &self.topics {
            if cluster.topic(name).is_none() {
                return Err(RebalanceError::UnknownTopic(name.clone()));
            }
        }

        let brokers = cluster.broker_ids();
        let topics = self.topics.clone();
        for name in &topics {
            let count = cluster.topic(name).map(|t| t.partition_count()).unwrap_or(0);
            for number in 0..count as u32 {
                let key = PartitionKey::new(name.as_str(), number);
                let current = cluster.require_partition(&key)?.replicas().to_vec();
                if current.len() == self.replication_factor {
                    continue;
                }
                let replicas = self.resize(&brokers, &current);
                if replicas.len() != self.replication_factor {
                    return Err(RebalanceError::ReplicationFactorMismatch {
                        partition: key.to_string(),
                        expected: self.replication_factor,
                        actual: replicas.len(),
                    });
                }
                debug!(partition = %key, ?current, ?replicas, "Changed replication factor");
                cluster.set_replicas(&key, replicas)?;
            }
            info!(topic = %name, rf = self.replication_factor, "Replication factor set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use rand::SeedableRng;

    fn strategy(topics: &[&str], rf: usize) -> SetReplicationFactor {
        SetReplicationFactor::new(
            topics.iter().map(|t| t.to_string()).collect(),
            rf,
            StdRng::seed_from_u64(7),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_zero_replication_factor() {
        let err = SetReplicationFactor::new(vec!["t".into()], 0, StdRng::seed_from_u64(1))
            .err()
            .unwrap();
        assert!(matches!(err, RebalanceError::InvalidReplicationFactor(0)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_unknown_topic_fails_before_mutation() {
        let original = cluster(&[1, 2], &[("t", vec![vec![1]])]);
        let mut working = original.clone();
        let err = strategy(&["t", "missing"], 2).apply(&mut working).unwrap_err();
        assert!(matches!(err, RebalanceError::UnknownTopic(ref t) if t == "missing"));
        assert_eq!(replicas(&working, "t", 0), vec![1]);
    }

    #[test]
    fn test_increase_appends_distinct_brokers() {
        let mut working = cluster(&[1, 2, 3, 4], &[("t", vec![vec![1], vec![2], vec![3]])]);
        strategy(&["t"], 3).apply(&mut working).unwrap();

        for (n, leader) in [(0, 1), (1, 2), (2, 3)] {
            let r = replicas(&working, "t", n);
            assert_eq!(r.len(), 3);
            assert_eq!(r[0], leader);
            let mut sorted = r.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 3);
        }
        working.verify_indices().unwrap();
    }

    #[test]
    fn test_decrease_keeps_leader() {
        let mut working = cluster(&[1, 2, 3], &[("t", vec![vec![2, 3, 1], vec![3, 1, 2]])]);
        strategy(&["t"], 1).apply(&mut working).unwrap();

        assert_eq!(replicas(&working, "t", 0), vec![2]);
        assert_eq!(replicas(&working, "t", 1), vec![3]);
        working.verify_indices().unwrap();
    }

    #[test]
    fn test_not_enough_brokers_is_mismatch() {
        let mut working = cluster(&[1, 2], &[("t", vec![vec![1]])]);
        let err = strategy(&["t"], 3).apply(&mut working).unwrap_err();
        assert!(matches!(
            err,
            RebalanceError::ReplicationFactorMismatch { expected: 3, actual: 2, .. }
        ));
    }

    #[test]
    fn test_same_seed_same_plan() {
        let base = cluster(&[1, 2, 3, 4, 5], &[("t", vec![vec![1]; 4])]);
        let mut a = base.clone();
        let mut b = base.clone();
        strategy(&["t"], 3).apply(&mut a).unwrap();
        strategy(&["t"], 3).apply(&mut b).unwrap();
        for n in 0..4 {
            assert_eq!(replicas(&a, "t", n), replicas(&b, "t", n));
        }
    }

    #[test]
    fn test_other_topics_untouched() {
        let mut working = cluster(&[1, 2], &[("a", vec![vec![1]]), ("b", vec![vec![2]])]);
        strategy(&["a"], 2).apply(&mut working).unwrap();
        assert_eq!(replicas(&working, "a", 0), vec![1, 2]);
        assert_eq!(replicas(&working, "b", 0), vec![2]);
    }
}
