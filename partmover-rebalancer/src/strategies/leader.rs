//! Leader reorder
//!
//! Spreads leadership in proportion to each broker's replica load by
//! reordering replica lists. Replica-set membership never changes.

use partmover_core::{BrokerId, Cluster, PartitionKey, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use super::Strategy;

pub struct LeaderReorder;

impl Strategy for LeaderReorder {
    fn name(&self) -> &'static str {
        "leader"
    }

    #[instrument(skip(self, cluster))]
    fn apply(&mut self, cluster: &mut Cluster) -> Result<()> {
        let loads: BTreeMap<BrokerId, usize> = cluster
            .brokers()
            .map(|b| (b.id(), b.partition_count()))
            .collect();
        let mut leaders: BTreeMap<BrokerId, usize> = BTreeMap::new();

        // topic_names() is sorted, which keeps the leader counters reproducible
        for name in cluster.topic_names() {
            let count = cluster.topic(&name).map(|t| t.partition_count()).unwrap_or(0);
            for number in 0..count as u32 {
                let key = PartitionKey::new(name.as_str(), number);
                let replicas = cluster.require_partition(&key)?.replicas().to_vec();
                let Some(position) = choose_leader(&replicas, &leaders, &loads) else {
                    continue;
                };
                if position != 0 {
                    cluster.swap_replicas(&key, 0, position)?;
                    debug!(partition = %key, from = replicas[0], to = replicas[position], "Moved leadership");
                }
                *leaders.entry(replicas[position]).or_default() += 1;
            }
        }

        info!(leaders = ?leaders, "Leadership reordered");
        Ok(())
    }
}

/// Replica position that should lead next
///
/// The first replica with no leaderships yet wins; otherwise the replica
/// with the lowest leaders-to-replicas ratio, earliest position on ties.
fn choose_leader(
    replicas: &[BrokerId],
    leaders: &BTreeMap<BrokerId, usize>,
    loads: &BTreeMap<BrokerId, usize>,
) -> Option<usize> {
    let led = |b: &BrokerId| leaders.get(b).copied().unwrap_or(0);
    if let Some(position) = replicas.iter().position(|b| led(b) == 0) {
        return Some(position);
    }

    let mut best: Option<(usize, f64)> = None;
    for (position, broker) in replicas.iter().enumerate() {
        let load = loads.get(broker).copied().unwrap_or(0).max(1);
        let ratio = led(broker) as f64 / load as f64;
        if best.map_or(true, |(_, r)| ratio < r) {
            best = Some((position, ratio));
        }
    }
    best.map(|(position, _)| position)
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use partmover_core::generate_moves;
    use std::collections::BTreeSet;

    #[test]
    fn test_second_partition_leader_moves_to_idle_broker() {
        let mut working = cluster(&[1, 2], &[("t", vec![vec![1, 2], vec![1, 2]])]);
        LeaderReorder.apply(&mut working).unwrap();

        assert_eq!(replicas(&working, "t", 0), vec![1, 2]);
        assert_eq!(replicas(&working, "t", 1), vec![2, 1]);
        assert_eq!(working.broker(1).unwrap().leader_count(), 1);
        assert_eq!(working.broker(2).unwrap().leader_count(), 1);
        working.verify_indices().unwrap();
    }

    #[test]
    fn test_ties_go_to_earliest_replica() {
        let leaders: BTreeMap<BrokerId, usize> = [(1, 1), (2, 1)].into_iter().collect();
        let loads: BTreeMap<BrokerId, usize> = [(1, 4), (2, 4)].into_iter().collect();
        assert_eq!(choose_leader(&[2, 1], &leaders, &loads), Some(0));
    }

    #[test]
    fn test_lowest_ratio_wins() {
        let leaders: BTreeMap<BrokerId, usize> = [(1, 2), (2, 1), (3, 1)].into_iter().collect();
        let loads: BTreeMap<BrokerId, usize> = [(1, 4), (2, 2), (3, 8)].into_iter().collect();
        assert_eq!(choose_leader(&[1, 2, 3], &leaders, &loads), Some(2));
    }

    #[test]
    fn test_swap_only_touches_two_positions() {
        let mut working = cluster(
            &[1, 2, 3],
            &[("t", vec![vec![1, 2, 3], vec![1, 2, 3], vec![1, 2, 3]])],
        );
        LeaderReorder.apply(&mut working).unwrap();

        assert_eq!(replicas(&working, "t", 2), vec![3, 2, 1]);
        working.verify_indices().unwrap();
    }

    #[test]
    fn test_membership_preserved() {
        let original = cluster(
            &[1, 2, 3, 4],
            &[
                ("a", vec![vec![1, 2], vec![1, 3], vec![1, 4], vec![2, 1]]),
                ("b", vec![vec![3, 1, 2], vec![3, 4, 1]]),
            ],
        );
        let mut working = original.clone();
        LeaderReorder.apply(&mut working).unwrap();

        for (before, after) in original.partitions().zip(working.partitions()) {
            let a: BTreeSet<_> = before.replicas().iter().collect();
            let b: BTreeSet<_> = after.replicas().iter().collect();
            assert_eq!(a, b);
            let changed = before
                .replicas()
                .iter()
                .zip(after.replicas())
                .filter(|(x, y)| x != y)
                .count();
            assert!(changed == 0 || changed == 2);
        }
        assert!(!generate_moves(&original, &working).is_empty());
    }
}
