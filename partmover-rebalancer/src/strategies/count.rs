//! Count balance
//!
//! Evens out the number of partitions each broker holds at every replica
//! position. Positions are balanced independently of each other.

use partmover_core::{BrokerId, Cluster, PartitionKey, Result};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use super::Strategy;

pub struct CountBalance;

/// Upper bound on full sweeps over every position
///
/// Each move brings one broker closer to its target without moving another
/// away, so sweeps stop well before this in practice.
const MAX_SWEEPS: usize = 100;

impl Strategy for CountBalance {
    fn name(&self) -> &'static str {
        "count"
    }

    #[instrument(skip(self, cluster))]
    fn apply(&mut self, cluster: &mut Cluster) -> Result<()> {
        let brokers = cluster.broker_ids();
        if brokers.is_empty() {
            return Ok(());
        }
        let positions = cluster.max_replication_factor();

        // Moves at one position change which brokers may take a partition at
        // the others, so sweep until nothing moves.
        for sweep in 1..=MAX_SWEEPS {
            let mut moved = 0;
            for position in 0..positions {
                moved += balance_position(cluster, &brokers, position)?;
            }
            debug!(sweep, moved, "Finished count balance sweep");
            if moved == 0 {
                for position in 0..positions {
                    report_shortfall(cluster, &brokers, position);
                }
                return Ok(());
            }
        }
        warn!(sweeps = MAX_SWEEPS, "Count balance did not settle");
        Ok(())
    }
}

/// Per-broker target counts at one position
///
/// With `pmax = total / n + 1`, the first `total % n` brokers in id order
/// may hold `pmax` partitions and the rest `pmax - 1`.
fn targets(brokers: &[BrokerId], total: usize) -> BTreeMap<BrokerId, usize> {
    let pmax = total / brokers.len() + 1;
    let mut remainder = total % brokers.len();
    brokers
        .iter()
        .map(|&id| {
            let target = if remainder > 0 {
                remainder -= 1;
                pmax
            } else {
                pmax - 1
            };
            (id, target)
        })
        .collect()
}

fn position_targets(
    cluster: &Cluster,
    brokers: &[BrokerId],
    position: usize,
) -> BTreeMap<BrokerId, usize> {
    let total: usize = brokers.iter().map(|&b| cluster.count_at(b, position)).sum();
    targets(brokers, total)
}

/// One pass over `position`, returning the number of moves made
fn balance_position(cluster: &mut Cluster, brokers: &[BrokerId], position: usize) -> Result<usize> {
    cluster.sort_partitions_by_size(position);

    let targets = position_targets(cluster, brokers, position);
    debug!(position, ?targets, "Balancing partition counts");

    let mut moved = 0;
    for &broker in brokers {
        let target = targets[&broker];
        let count = cluster.count_at(broker, position);
        if count < target {
            let wanted = target - count;
            let mut pulled = pull(cluster, brokers, &targets, broker, position, wanted)?;
            while pulled < wanted && relay(cluster, brokers, &targets, broker, position)? {
                pulled += 1;
            }
            moved += pulled;
        } else if count > target {
            moved += push(cluster, brokers, &targets, broker, position, count - target)?;
        }
    }
    Ok(moved)
}

fn report_shortfall(cluster: &Cluster, brokers: &[BrokerId], position: usize) {
    let targets = position_targets(cluster, brokers, position);
    for &broker in brokers {
        let count = cluster.count_at(broker, position);
        if count != targets[&broker] {
            warn!(
                broker,
                position,
                count,
                target = targets[&broker],
                "Could not reach target count without co-locating replicas"
            );
        }
    }
}

/// Smallest partition on `source` at `position` that `dest` does not already replicate
///
/// Broker indices are sorted by size at the start of each position pass, so
/// the first eligible entry is the smallest one the source held then.
fn smallest_movable(
    cluster: &Cluster,
    source: BrokerId,
    dest: BrokerId,
    position: usize,
) -> Option<PartitionKey> {
    cluster
        .broker(source)?
        .partitions_at(position)
        .iter()
        .find(|key| {
            cluster
                .partition(key)
                .is_some_and(|p| !p.has_replica(dest))
        })
        .cloned()
}

/// Pull partitions onto `dest` from brokers above their target
fn pull(
    cluster: &mut Cluster,
    brokers: &[BrokerId],
    targets: &BTreeMap<BrokerId, usize>,
    dest: BrokerId,
    position: usize,
    wanted: usize,
) -> Result<usize> {
    let mut pulled = 0;
    for &source in brokers {
        if pulled == wanted {
            break;
        }
        if source == dest {
            continue;
        }
        while pulled < wanted && cluster.count_at(source, position) > targets[&source] {
            let Some(key) = smallest_movable(cluster, source, dest, position) else {
                break;
            };
            cluster.move_replica(&key, position, dest)?;
            debug!(partition = %key, position, from = source, to = dest, "Pulled partition");
            pulled += 1;
        }
    }
    Ok(pulled)
}

/// Push partitions off `source` to brokers below their target
fn push(
    cluster: &mut Cluster,
    brokers: &[BrokerId],
    targets: &BTreeMap<BrokerId, usize>,
    source: BrokerId,
    position: usize,
    excess: usize,
) -> Result<usize> {
    let mut pushed = 0;
    for &dest in brokers {
        if pushed == excess {
            break;
        }
        if dest == source {
            continue;
        }
        while pushed < excess && cluster.count_at(dest, position) < targets[&dest] {
            let Some(key) = smallest_movable(cluster, source, dest, position) else {
                break;
            };
            cluster.move_replica(&key, position, dest)?;
            debug!(partition = %key, position, from = source, to = dest, "Pushed partition");
            pushed += 1;
        }
    }
    Ok(pushed)
}

/// Fill `dest` through an intermediate broker when no direct pull is possible
///
/// `via` hands one partition to `dest` and takes one from an over-target
/// `source` in return, so only `dest` and `source` change count.
fn relay(
    cluster: &mut Cluster,
    brokers: &[BrokerId],
    targets: &BTreeMap<BrokerId, usize>,
    dest: BrokerId,
    position: usize,
) -> Result<bool> {
    for &source in brokers {
        if source == dest || cluster.count_at(source, position) <= targets[&source] {
            continue;
        }
        for &via in brokers {
            if via == dest || via == source {
                continue;
            }
            let (Some(handed), Some(taken)) = (
                smallest_movable(cluster, via, dest, position),
                smallest_movable(cluster, source, via, position),
            ) else {
                continue;
            };
            cluster.move_replica(&handed, position, dest)?;
            cluster.move_replica(&taken, position, via)?;
            debug!(
                position,
                from = source,
                via,
                to = dest,
                handed = %handed,
                taken = %taken,
                "Relayed partition"
            );
            return Ok(true);
        }
    }
    Ok(false)
}
