//! Property tests for the cluster model
//!
//! Run with: cargo test -p partmover-core --test cluster_props

use partmover_core::{generate_moves, Broker, BrokerId, Cluster, PartitionKey, Topic};
use proptest::prelude::*;

const BROKERS: i32 = 5;

/// Replica lists of distinct brokers drawn from 1..=BROKERS
fn replica_list() -> impl Strategy<Value = Vec<BrokerId>> {
    Just((1..=BROKERS).collect::<Vec<_>>())
        .prop_shuffle()
        .prop_flat_map(|brokers| (1..=3usize).prop_map(move |rf| brokers[..rf].to_vec()))
}

fn topic_assignments() -> impl Strategy<Value = Vec<Vec<Vec<BrokerId>>>> {
    prop::collection::vec(prop::collection::vec(replica_list(), 1..8), 1..4)
}

fn build(topics: &[Vec<Vec<BrokerId>>]) -> Cluster {
    let mut cluster = Cluster::new();
    for id in 1..=BROKERS {
        cluster.add_broker(Broker::new(id, None)).unwrap();
    }
    for (t, partitions) in topics.iter().enumerate() {
        let mut topic = Topic::new(format!("topic{}", t), partitions.len() as u32);
        for (n, replicas) in partitions.iter().enumerate() {
            topic = topic.with_replicas(n as u32, replicas.clone()).unwrap();
        }
        cluster.add_topic(topic).unwrap();
    }
    cluster
}

proptest! {
    #[test]
    fn prop_clone_diff_is_empty(topics in topic_assignments()) {
        let cluster = build(&topics);
        prop_assert!(generate_moves(&cluster, &cluster.clone()).is_empty());
    }

    #[test]
    fn prop_moves_keep_indices_consistent(
        topics in topic_assignments(),
        ops in prop::collection::vec((0usize..32, 0usize..3, 1..=BROKERS), 0..40),
    ) {
        let original = build(&topics);
        let mut working = original.clone();
        let keys = working.partition_keys();

        for (pick, position, to) in ops {
            let key: &PartitionKey = &keys[pick % keys.len()];
            // invalid moves are rejected without touching the indices
            let _ = working.move_replica(key, position, to);
            prop_assert!(working.verify_indices().is_ok());
        }

        for position in 0..3 {
            let before: usize = original.brokers().map(|b| b.count_at(position)).sum();
            let after: usize = working.brokers().map(|b| b.count_at(position)).sum();
            prop_assert_eq!(before, after);
        }
        prop_assert!(original.verify_indices().is_ok());
    }
}
