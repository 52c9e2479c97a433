//! Topology snapshots
//!
//! Serialized form of the broker/topic/partition metadata handed over by the
//! coordination-store collaborator, and its conversion into a [`Cluster`].
//!
//! ```json
//! {
//!   "brokers": [{ "id": 1, "host": "kafka1.example.com" }],
//!   "topics": { "orders": { "0": [1, 2], "1": [2, 1] } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::cluster::{Broker, BrokerId, Cluster, Topic};
use crate::error::{RebalanceError, Result};

/// A registered broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerSnapshot {
    pub id: BrokerId,
    #[serde(default)]
    pub host: Option<String>,
}

/// Broker registrations and per-topic replica assignments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default)]
    pub brokers: Vec<BrokerSnapshot>,
    /// topic -> partition ordinal (as string) -> replica list
    #[serde(default)]
    pub topics: BTreeMap<String, BTreeMap<String, Vec<BrokerId>>>,
}

impl TopologySnapshot {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Build a cluster, dropping any topic named in `excluded`
    pub fn into_cluster(self, excluded: &[String]) -> Result<Cluster> {
        let mut cluster = Cluster::new();
        for broker in self.brokers {
            cluster.add_broker(Broker::new(broker.id, broker.host))?;
        }

        for (name, assignments) in self.topics {
            if excluded.contains(&name) {
                debug!(topic = %name, "Skipping excluded topic");
                continue;
            }

            let mut by_ordinal = BTreeMap::new();
            for (raw, replicas) in assignments {
                let ordinal: u32 = raw.parse().map_err(|_| {
                    RebalanceError::Metadata(format!(
                        "topic {} has non-numeric partition id {:?}",
                        name, raw
                    ))
                })?;
                by_ordinal.insert(ordinal, replicas);
            }

            let count = by_ordinal.len() as u32;
            if let Some((&last, _)) = by_ordinal.last_key_value() {
                if last as usize + 1 != by_ordinal.len() {
                    return Err(RebalanceError::Metadata(format!(
                        "topic {} has {} partitions but ordinals run to {}",
                        name, count, last
                    )));
                }
            }

            let mut topic = Topic::new(name, count);
            for (ordinal, replicas) in by_ordinal {
                topic = topic.with_replicas(ordinal, replicas)?;
            }
            cluster.add_topic(topic)?;
        }

        info!(
            brokers = cluster.num_brokers(),
            topics = cluster.topics().count(),
            partitions = cluster.partitions().count(),
            "Loaded cluster topology"
        );
        Ok(cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::PartitionKey;

    const SAMPLE: &str = r#"{
        "brokers": [
            { "id": 1, "host": "kafka1" },
            { "id": 2, "host": "kafka2" }
        ],
        "topics": {
            "orders": { "0": [1, 2], "1": [2, 3] },
            "audit": { "0": [1] }
        }
    }"#;

    #[test]
    fn test_snapshot_into_cluster() {
        let cluster = TopologySnapshot::from_json(SAMPLE)
            .unwrap()
            .into_cluster(&[])
            .unwrap();

        assert_eq!(cluster.num_brokers(), 3);
        assert_eq!(cluster.topic("orders").unwrap().partition_count(), 2);
        assert_eq!(
            cluster
                .partition(&PartitionKey::new("orders", 1))
                .unwrap()
                .replicas(),
            &[2, 3]
        );
        cluster.verify_indices().unwrap();
    }

    #[test]
    fn test_offline_broker_has_no_hostname() {
        let cluster = TopologySnapshot::from_json(SAMPLE)
            .unwrap()
            .into_cluster(&[])
            .unwrap();
        assert_eq!(cluster.broker(1).unwrap().hostname(), Some("kafka1"));
        assert!(cluster.broker(3).unwrap().hostname().is_none());
    }

    #[test]
    fn test_excluded_topics_dropped() {
        let cluster = TopologySnapshot::from_json(SAMPLE)
            .unwrap()
            .into_cluster(&["audit".to_string()])
            .unwrap();
        assert!(cluster.topic("audit").is_none());
        assert_eq!(cluster.broker(1).unwrap().partition_count(), 1);
    }

    #[test]
    fn test_gap_in_partition_ordinals_rejected() {
        let raw = r#"{ "topics": { "t": { "0": [1], "2": [1] } } }"#;
        let result = TopologySnapshot::from_json(raw).unwrap().into_cluster(&[]);
        assert!(matches!(result, Err(RebalanceError::Metadata(_))));
    }

    #[test]
    fn test_max_partition_ordinal_rejected() {
        let raw = r#"{ "topics": { "t": { "4294967295": [1] } } }"#;
        let result = TopologySnapshot::from_json(raw).unwrap().into_cluster(&[]);
        assert!(matches!(result, Err(RebalanceError::Metadata(_))));
    }

    #[test]
    fn test_non_numeric_partition_rejected() {
        let raw = r#"{ "topics": { "t": { "zero": [1] } } }"#;
        let result = TopologySnapshot::from_json(raw).unwrap().into_cluster(&[]);
        assert!(matches!(result, Err(RebalanceError::Metadata(_))));
    }
}
