//! Even balance
//!
//! For topics whose partition count divides evenly over the brokers, gives
//! every broker exactly `partitions / brokers` replicas of the topic at each
//! replica position.

use partmover_core::{BrokerId, Cluster, PartitionKey, Result};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use super::Strategy;

pub struct EvenBalance;

impl Strategy for EvenBalance {
    fn name(&self) -> &'static str {
        "even"
    }

    #[instrument(skip(self, cluster))]
    fn apply(&mut self, cluster: &mut Cluster) -> Result<()> {
        let brokers = cluster.broker_ids();
        if brokers.is_empty() {
            return Ok(());
        }
        for name in cluster.topic_names() {
            balance_topic(cluster, &brokers, &name)?;
        }
        Ok(())
    }
}

fn balance_topic(cluster: &mut Cluster, brokers: &[BrokerId], name: &str) -> Result<()> {
    let Some(topic) = cluster.topic(name) else {
        return Ok(());
    };
    let count = topic.partition_count();
    if count == 0 {
        return Ok(());
    }
    if count % brokers.len() != 0 {
        warn!(
            topic = name,
            partitions = count,
            brokers = brokers.len(),
            "Skipping topic: partition count is not a multiple of the broker count"
        );
        return Ok(());
    }
    let factors = topic.replication_factors();
    let replication_factor = match factors.iter().next() {
        Some(&rf) if factors.len() == 1 => rf,
        _ => {
            warn!(topic = name, ?factors, "Skipping topic: partitions have differing replication factors");
            return Ok(());
        }
    };

    let target = count / brokers.len();
    let mut assigned: Vec<BTreeMap<BrokerId, usize>> =
        vec![brokers.iter().map(|&b| (b, 0)).collect(); replication_factor];
    debug!(topic = name, target, "Evening out topic");

    for number in 0..count as u32 {
        let key = PartitionKey::new(name, number);
        for (position, counts) in assigned.iter_mut().enumerate() {
            let replicas = cluster.require_partition(&key)?.replicas().to_vec();
            let current = replicas[position];
            let held = counts.entry(current).or_default();
            if *held < target {
                *held += 1;
                continue;
            }

            let candidate = brokers
                .iter()
                .copied()
                .find(|b| counts.get(b).copied().unwrap_or(0) < target && !replicas.contains(b));
            match candidate {
                Some(to) => {
                    cluster.move_replica(&key, position, to)?;
                    *counts.entry(to).or_default() += 1;
                    debug!(partition = %key, position, from = current, to, "Reassigned replica");
                }
                None => {
                    warn!(partition = %key, position, broker = current, "No broker below target for replica");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use partmover_core::generate_moves;

    fn topic_counts(cluster: &Cluster, topic: &str, position: usize) -> BTreeMap<BrokerId, usize> {
        let mut counts = BTreeMap::new();
        for p in cluster.topic(topic).unwrap().partitions() {
            *counts.entry(p.replicas()[position]).or_default() += 1;
        }
        counts
    }

    #[test]
    fn test_evens_out_divisible_topic() {
        let mut working = cluster(
            &[1, 2, 3],
            &[("t", vec![vec![1, 2], vec![1, 2], vec![1, 2], vec![1, 2], vec![2, 3], vec![3, 1]])],
        );
        EvenBalance.apply(&mut working).unwrap();

        for position in 0..2 {
            let counts = topic_counts(&working, "t", position);
            assert!(counts.values().all(|&c| c == 2), "position {}: {:?}", position, counts);
        }
        working.verify_indices().unwrap();
    }

    #[test]
    fn test_skips_indivisible_topic() {
        let original = cluster(&[1, 2], &[("t", vec![vec![1]; 3])]);
        let mut working = original.clone();
        EvenBalance.apply(&mut working).unwrap();
        assert!(generate_moves(&original, &working).is_empty());
    }

    #[test]
    fn test_skips_mixed_replication_factors() {
        let original = cluster(&[1, 2], &[("t", vec![vec![1, 2], vec![1]])]);
        let mut working = original.clone();
        EvenBalance.apply(&mut working).unwrap();
        assert!(generate_moves(&original, &working).is_empty());
    }

    #[test]
    fn test_already_even_topic_untouched() {
        let original = cluster(&[1, 2], &[("t", vec![vec![1, 2], vec![2, 1]])]);
        let mut working = original.clone();
        EvenBalance.apply(&mut working).unwrap();
        assert!(generate_moves(&original, &working).is_empty());
    }
}
