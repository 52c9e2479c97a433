//! Clone one or more brokers' replicas onto a target broker
//!
//! Every partition replicated on a source broker gains the target as an
//! extra replica. Leadership follows the sources: if a source led the
//! partition, the target becomes leader.

use partmover_core::{BrokerId, Cluster, PartitionKey, RebalanceError, Result};
use tracing::{debug, info, instrument, warn};

use super::Strategy;

pub struct CloneBrokers {
    sources: Vec<BrokerId>,
    target: BrokerId,
}

impl CloneBrokers {
    pub fn new(sources: Vec<BrokerId>, target: BrokerId) -> Result<Self> {
        if sources.is_empty() {
            return Err(RebalanceError::Validation(
                "clone needs at least one source broker".to_string(),
            ));
        }
        if sources.contains(&target) {
            return Err(RebalanceError::Validation(format!(
                "target broker {} is also a source",
                target
            )));
        }
        Ok(Self { sources, target })
    }
}

impl Strategy for CloneBrokers {
    fn name(&self) -> &'static str {
        "clone"
    }

    #[instrument(skip(self, cluster), fields(sources = ?self.sources, target = self.target))]
    fn apply(&mut self, cluster: &mut Cluster) -> Result<()> {
        cluster.require_brokers(&self.sources)?;
        cluster.require_brokers(&[self.target])?;

        let affected: Vec<PartitionKey> = cluster
            .partitions()
            .filter(|p| self.sources.iter().any(|&s| p.has_replica(s)))
            .map(|p| p.key())
            .collect();

        for key in &affected {
            let current = cluster.require_partition(key)?.replicas().to_vec();
            let mut replicas = current.clone();
            if let Some(position) = replicas.iter().position(|&b| b == self.target) {
                warn!(partition = %key, broker = self.target, "Target already a replica, promoting to leader");
                let target = replicas.remove(position);
                replicas.insert(0, target);
            } else if self.sources.contains(&replicas[0]) {
                replicas.insert(0, self.target);
            } else {
                replicas.insert(1, self.target);
            }
            if replicas != current {
                debug!(partition = %key, ?current, ?replicas, "Cloned replica");
                cluster.set_replicas(key, replicas)?;
            }
        }

        info!(partitions = affected.len(), "Clone planned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;

    #[test]
    fn test_target_leads_where_source_led() {
        let mut working = cluster(
            &[1, 2, 3, 4],
            &[("t", vec![vec![1, 2], vec![2, 1], vec![2, 3]])],
        );
        CloneBrokers::new(vec![1], 4).unwrap().apply(&mut working).unwrap();

        assert_eq!(replicas(&working, "t", 0), vec![4, 1, 2]);
        assert_eq!(replicas(&working, "t", 1), vec![2, 4, 1]);
        assert_eq!(replicas(&working, "t", 2), vec![2, 3]);
        working.verify_indices().unwrap();
    }

    #[test]
    fn test_existing_target_is_promoted() {
        let mut working = cluster(&[1, 2, 3], &[("t", vec![vec![1, 2, 3]])]);
        CloneBrokers::new(vec![1], 3).unwrap().apply(&mut working).unwrap();
        assert_eq!(replicas(&working, "t", 0), vec![3, 1, 2]);
    }

    #[test]
    fn test_multiple_sources() {
        let mut working = cluster(&[1, 2, 3, 4], &[("t", vec![vec![1], vec![2], vec![3]])]);
        CloneBrokers::new(vec![1, 2], 4).unwrap().apply(&mut working).unwrap();
        assert_eq!(replicas(&working, "t", 0), vec![4, 1]);
        assert_eq!(replicas(&working, "t", 1), vec![4, 2]);
        assert_eq!(replicas(&working, "t", 2), vec![3]);
    }

    #[test]
    fn test_unknown_brokers_rejected() {
        let mut working = cluster(&[1, 2], &[("t", vec![vec![1]])]);
        let err = CloneBrokers::new(vec![1], 9).unwrap().apply(&mut working).unwrap_err();
        assert!(matches!(err, RebalanceError::UnknownBroker(9)));

        let err = CloneBrokers::new(vec![8], 2).unwrap().apply(&mut working).unwrap_err();
        assert!(matches!(err, RebalanceError::UnknownBroker(8)));
    }

    #[test]
    fn test_target_in_sources_rejected() {
        assert!(CloneBrokers::new(vec![1, 2], 2).is_err());
        assert!(CloneBrokers::new(vec![], 2).is_err());
    }
}
