//! Size balance
//!
//! Moves partitions onto brokers whose on-disk size at a replica position is
//! below the cluster average, largest partitions first, within a tolerance
//! band of half the (approximate) median partition size.

use partmover_core::{BrokerId, Cluster, PartitionKey, Result, EMPTY_PARTITION_KB};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use super::Strategy;

pub struct SizeBalance;

/// Upper bound on full sweeps over every position
const MAX_SWEEPS: usize = 100;

impl Strategy for SizeBalance {
    fn name(&self) -> &'static str {
        "size"
    }

    #[instrument(skip(self, cluster))]
    fn apply(&mut self, cluster: &mut Cluster) -> Result<()> {
        let brokers = cluster.broker_ids();
        if brokers.is_empty() {
            return Ok(());
        }
        let positions = cluster.max_replication_factor();

        // A destination grows as it is filled and can then feed brokers
        // visited before it, so sweep until nothing moves.
        for sweep in 1..=MAX_SWEEPS {
            let mut moved = 0;
            for position in 0..positions {
                moved += balance_position(cluster, &brokers, position)?;
            }
            debug!(sweep, moved, "Finished size balance sweep");
            if moved == 0 {
                return Ok(());
            }
        }
        warn!(sweeps = MAX_SWEEPS, "Size balance did not settle");
        Ok(())
    }
}

/// Partitions worth moving at `position`, largest first
fn eligible_partitions(cluster: &Cluster, position: usize) -> Vec<(PartitionKey, i64)> {
    let mut eligible: Vec<(PartitionKey, i64)> = cluster
        .partitions()
        .filter(|p| p.replication_factor() > position && p.size_kb() > EMPTY_PARTITION_KB)
        .map(|p| (p.key(), p.size_kb() as i64))
        .collect();
    eligible.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    eligible
}

/// Half the middle element of a size-sorted list
///
/// Even-length lists are not averaged; the band only needs to be coarse.
fn margin(eligible: &[(PartitionKey, i64)]) -> i64 {
    eligible[eligible.len() / 2].1 / 2
}

/// One pass over `position`, returning the number of moves made
fn balance_position(cluster: &mut Cluster, brokers: &[BrokerId], position: usize) -> Result<usize> {
    let eligible = eligible_partitions(cluster, position);
    if eligible.is_empty() {
        return Ok(0);
    }

    let mut sizes: BTreeMap<BrokerId, i64> = brokers
        .iter()
        .map(|&b| (b, cluster.broker_size_kb(b, Some(position)) as i64))
        .collect();
    let average = sizes.values().sum::<i64>() / brokers.len() as i64;
    let margin = margin(&eligible);
    let floor = average - margin;
    debug!(position, average, margin, "Balancing partition sizes");

    let mut moved = 0;
    for &dest in brokers {
        if sizes[&dest] >= floor {
            continue;
        }
        let mut min_move = floor - sizes[&dest];
        let mut max_move = min_move + 2 * margin;

        for (key, size) in &eligible {
            if min_move <= 0 {
                break;
            }
            if *size > max_move {
                continue;
            }
            let partition = cluster.require_partition(key)?;
            if partition.has_replica(dest) {
                continue;
            }
            let source = partition.replicas()[position];
            let source_size = sizes.get(&source).copied().unwrap_or(0);
            if source_size - size < floor {
                continue;
            }

            cluster.move_replica(key, position, dest)?;
            debug!(partition = %key, position, from = source, to = dest, size_kb = size, "Moved partition");
            if let Some(s) = sizes.get_mut(&source) {
                *s -= size;
            }
            if let Some(s) = sizes.get_mut(&dest) {
                *s += size;
            }
            min_move -= size;
            max_move -= size;
            moved += 1;
        }
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use partmover_core::generate_moves;

    fn sized(
        brokers: &[BrokerId],
        topics: &[(&str, Vec<Vec<BrokerId>>)],
        sizes: &[(&str, u32, u64)],
    ) -> Cluster {
        let mut c = cluster(brokers, topics);
        for (topic, n, kb) in sizes {
            c.set_partition_size(&PartitionKey::new(*topic, *n), *kb);
        }
        c
    }

    #[test]
    fn test_margin_uses_middle_element() {
        let eligible: Vec<(PartitionKey, i64)> = [100, 80, 60, 40]
            .iter()
            .enumerate()
            .map(|(n, s)| (PartitionKey::new("t", n as u32), *s))
            .collect();
        assert_eq!(margin(&eligible), 30);
    }

    #[test]
    fn test_moves_onto_light_broker() {
        let original = sized(
            &[1, 2],
            &[("t", vec![vec![1]; 4])],
            &[("t", 0, 1000), ("t", 1, 1000), ("t", 2, 1000), ("t", 3, 1000)],
        );
        let mut working = original.clone();
        SizeBalance.apply(&mut working).unwrap();

        assert_eq!(working.broker_size_kb(1, Some(0)), 2000);
        assert_eq!(working.broker_size_kb(2, Some(0)), 2000);
        assert_eq!(generate_moves(&original, &working).len(), 2);
        working.verify_indices().unwrap();
    }

    #[test]
    fn test_tiny_partitions_are_not_moved() {
        let original = sized(
            &[1, 2],
            &[("t", vec![vec![1]; 3])],
            &[("t", 0, 4), ("t", 1, 3), ("t", 2, 0)],
        );
        let mut working = original.clone();
        SizeBalance.apply(&mut working).unwrap();
        assert!(generate_moves(&original, &working).is_empty());
    }

    #[test]
    fn test_skips_partition_already_replicated_on_target() {
        let original = sized(
            &[1, 2],
            &[("t", vec![vec![1, 2], vec![1, 2]])],
            &[("t", 0, 500), ("t", 1, 500)],
        );
        let mut working = original.clone();
        SizeBalance.apply(&mut working).unwrap();
        assert!(generate_moves(&original, &working).is_empty());
    }

    #[test]
    fn test_does_not_drain_source_below_band() {
        // One huge partition cannot be split; moving it would just swap the imbalance.
        let original = sized(
            &[1, 2],
            &[("t", vec![vec![1], vec![2]])],
            &[("t", 0, 10_000), ("t", 1, 100)],
        );
        let mut working = original.clone();
        SizeBalance.apply(&mut working).unwrap();
        assert!(generate_moves(&original, &working).is_empty());
    }

    #[test]
    fn test_filled_destination_feeds_earlier_broker() {
        let topics = [
            ("topic0", vec![vec![3], vec![4, 1], vec![3]]),
            ("topic1", vec![vec![3], vec![2], vec![4, 2], vec![4, 3]]),
        ];
        let kb = [319, 905, 1059, 538, 2068, 4239, 1213];
        let keys = [
            ("topic0", 0),
            ("topic0", 1),
            ("topic0", 2),
            ("topic1", 0),
            ("topic1", 1),
            ("topic1", 2),
            ("topic1", 3),
        ];
        let sizes: Vec<(&str, u32, u64)> = keys
            .iter()
            .zip(kb)
            .map(|(&(topic, n), size)| (topic, n, size))
            .collect();
        let mut once = sized(&[1, 2, 3, 4], &topics, &sizes);
        SizeBalance.apply(&mut once).unwrap();
        let mut twice = once.clone();
        SizeBalance.apply(&mut twice).unwrap();

        assert!(generate_moves(&once, &twice).is_empty());
        twice.verify_indices().unwrap();
    }

    #[test]
    fn test_second_run_is_noop() {
        let mut once = sized(
            &[1, 2, 3],
            &[("t", vec![vec![1]; 6])],
            &[
                ("t", 0, 900),
                ("t", 1, 800),
                ("t", 2, 700),
                ("t", 3, 600),
                ("t", 4, 500),
                ("t", 5, 400),
            ],
        );
        SizeBalance.apply(&mut once).unwrap();
        let mut twice = once.clone();
        SizeBalance.apply(&mut twice).unwrap();
        assert!(generate_moves(&once, &twice).is_empty());
        twice.verify_indices().unwrap();
    }
}
