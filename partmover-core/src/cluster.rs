//! Cluster topology model
//!
//! Partitions live in an arena owned by their topic and are the source of
//! truth for replica membership. Each broker keeps a derived, non-owning
//! index from replica position to the keys of the partitions it holds at
//! that position.
//!
//! All replica-list mutation goes through [`Cluster`], which removes the old
//! index entries, rewrites the replica list and inserts the new entries as a
//! single step.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::error::{RebalanceError, Result};

/// Broker identifier as used by the coordination store
pub type BrokerId = i32;

/// Identity of a partition: topic name and ordinal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub topic: String,
    pub partition: u32,
}

impl PartitionKey {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// A single partition and its ordered replica list
///
/// Position 0 of the replica list is the leader. Equality is by topic and
/// ordinal only.
#[derive(Debug, Clone)]
pub struct Partition {
    topic: String,
    number: u32,
    replicas: Vec<BrokerId>,
    /// Measured on-disk size in KiB (0 until collected)
    size_kb: u64,
}

impl PartialEq for Partition {
    fn eq(&self, other: &Self) -> bool {
        self.topic == other.topic && self.number == other.number
    }
}

impl Eq for Partition {}

impl Partition {
    fn new(topic: &str, number: u32) -> Self {
        Self {
            topic: topic.to_string(),
            number,
            replicas: Vec::new(),
            size_kb: 0,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn key(&self) -> PartitionKey {
        PartitionKey::new(self.topic.clone(), self.number)
    }

    pub fn replicas(&self) -> &[BrokerId] {
        &self.replicas
    }

    pub fn leader(&self) -> Option<BrokerId> {
        self.replicas.first().copied()
    }

    pub fn replication_factor(&self) -> usize {
        self.replicas.len()
    }

    pub fn size_kb(&self) -> u64 {
        self.size_kb
    }

    /// Position of `broker` in the replica list
    pub fn position_of(&self, broker: BrokerId) -> Option<usize> {
        self.replicas.iter().position(|&b| b == broker)
    }

    pub fn has_replica(&self, broker: BrokerId) -> bool {
        self.replicas.contains(&broker)
    }
}

/// A broker and its per-position partition index
#[derive(Debug, Clone)]
pub struct Broker {
    id: BrokerId,
    hostname: Option<String>,
    partitions: BTreeMap<usize, Vec<PartitionKey>>,
}

impl Broker {
    pub fn new(id: BrokerId, hostname: Option<String>) -> Self {
        Self {
            id,
            hostname,
            partitions: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> BrokerId {
        self.id
    }

    /// None when the broker is referenced by a replica list but offline
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Record that `partition` holds this broker at `position`
    pub fn add_partition_at(&mut self, position: usize, partition: &Partition) {
        self.partitions
            .entry(position)
            .or_default()
            .push(partition.key());
    }

    /// Drop `partition` from the index
    ///
    /// The position is looked up from the partition's own replica list, so
    /// this must be called before that list is changed.
    pub fn remove_partition(&mut self, partition: &Partition) -> bool {
        let Some(position) = partition.position_of(self.id) else {
            return false;
        };
        let Some(keys) = self.partitions.get_mut(&position) else {
            return false;
        };
        let Some(idx) = keys
            .iter()
            .position(|k| k.topic == partition.topic && k.partition == partition.number)
        else {
            return false;
        };
        keys.remove(idx);
        if keys.is_empty() {
            self.partitions.remove(&position);
        }
        true
    }

    /// Partitions held at `position`, in index order
    pub fn partitions_at(&self, position: usize) -> &[PartitionKey] {
        self.partitions
            .get(&position)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn count_at(&self, position: usize) -> usize {
        self.partitions_at(position).len()
    }

    /// Total replicas held across all positions
    pub fn partition_count(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    pub fn leader_count(&self) -> usize {
        self.count_at(0)
    }

    /// Percentage of this broker's replicas that are leaders
    pub fn leader_percent(&self) -> f64 {
        let total = self.partition_count();
        if total == 0 {
            return 0.0;
        }
        self.leader_count() as f64 / total as f64 * 100.0
    }
}

/// A topic with a fixed number of partitions
#[derive(Debug, Clone)]
pub struct Topic {
    name: String,
    partitions: Vec<Partition>,
}

impl Topic {
    /// Create a topic with `partition_count` partitions and empty replica lists
    pub fn new(name: impl Into<String>, partition_count: u32) -> Self {
        let name = name.into();
        let partitions = (0..partition_count)
            .map(|n| Partition::new(&name, n))
            .collect();
        Self { name, partitions }
    }

    /// Set the initial replica list of a partition before the topic joins a cluster
    pub fn with_replicas(mut self, partition: u32, replicas: Vec<BrokerId>) -> Result<Self> {
        let entry = self
            .partitions
            .get_mut(partition as usize)
            .ok_or_else(|| RebalanceError::UnknownPartition {
                topic: self.name.clone(),
                partition,
            })?;
        check_distinct(&entry.key(), &replicas)?;
        entry.replicas = replicas;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn partition(&self, number: u32) -> Option<&Partition> {
        self.partitions.get(number as usize)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Distinct replication factors across this topic's partitions
    pub fn replication_factors(&self) -> BTreeSet<usize> {
        self.partitions
            .iter()
            .map(Partition::replication_factor)
            .collect()
    }
}

/// Full cluster topology
///
/// `Clone` produces a fully independent copy: partitions, replica lists and
/// sizes are owned values and broker indices hold keys, not references, so
/// a working copy can be mutated while the original stays a diff baseline.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    brokers: BTreeMap<BrokerId, Broker>,
    topics: BTreeMap<String, Topic>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_broker(&mut self, broker: Broker) -> Result<()> {
        if self.brokers.contains_key(&broker.id) {
            return Err(RebalanceError::Validation(format!(
                "duplicate broker id {}",
                broker.id
            )));
        }
        self.brokers.insert(broker.id, broker);
        Ok(())
    }

    /// Add a topic and index its replicas
    ///
    /// Brokers referenced by a replica list but not yet known are added
    /// without a hostname.
    pub fn add_topic(&mut self, topic: Topic) -> Result<()> {
        if self.topics.contains_key(&topic.name) {
            return Err(RebalanceError::Validation(format!(
                "duplicate topic {}",
                topic.name
            )));
        }
        for partition in &topic.partitions {
            for (position, &broker_id) in partition.replicas.iter().enumerate() {
                self.brokers
                    .entry(broker_id)
                    .or_insert_with(|| Broker::new(broker_id, None))
                    .add_partition_at(position, partition);
            }
        }
        self.topics.insert(topic.name.clone(), topic);
        Ok(())
    }

    pub fn brokers(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.values()
    }

    pub fn broker(&self, id: BrokerId) -> Option<&Broker> {
        self.brokers.get(&id)
    }

    /// Broker ids in ascending order
    pub fn broker_ids(&self) -> Vec<BrokerId> {
        self.brokers.keys().copied().collect()
    }

    pub fn num_brokers(&self) -> usize {
        self.brokers.len()
    }

    /// Fail with `UnknownBroker` unless every id is present
    pub fn require_brokers(&self, ids: &[BrokerId]) -> Result<()> {
        match ids.iter().find(|id| !self.brokers.contains_key(id)) {
            Some(&missing) => Err(RebalanceError::UnknownBroker(missing)),
            None => Ok(()),
        }
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.values()
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    /// Topic names in sorted order
    pub fn topic_names(&self) -> Vec<String> {
        self.topics.keys().cloned().collect()
    }

    /// All partitions in topic-name then ordinal order
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.topics.values().flat_map(|t| t.partitions.iter())
    }

    pub fn partition_keys(&self) -> Vec<PartitionKey> {
        self.partitions().map(Partition::key).collect()
    }

    pub fn partition(&self, key: &PartitionKey) -> Option<&Partition> {
        self.topics
            .get(&key.topic)
            .and_then(|t| t.partition(key.partition))
    }

    /// Like [`Cluster::partition`] but fails with `UnknownPartition`
    pub fn require_partition(&self, key: &PartitionKey) -> Result<&Partition> {
        self.partition(key)
            .ok_or_else(|| RebalanceError::UnknownPartition {
                topic: key.topic.clone(),
                partition: key.partition,
            })
    }

    pub fn max_replication_factor(&self) -> usize {
        self.partitions()
            .map(Partition::replication_factor)
            .max()
            .unwrap_or(0)
    }

    /// Number of partitions `broker` holds at `position`
    pub fn count_at(&self, broker: BrokerId, position: usize) -> usize {
        self.brokers
            .get(&broker)
            .map(|b| b.count_at(position))
            .unwrap_or(0)
    }

    /// Total size in KiB of the replicas a broker holds
    ///
    /// With `Some(position)` only replicas at that position are counted.
    pub fn broker_size_kb(&self, broker: BrokerId, position: Option<usize>) -> u64 {
        let Some(b) = self.brokers.get(&broker) else {
            return 0;
        };
        let size_of = |k: &PartitionKey| self.partition(k).map(Partition::size_kb).unwrap_or(0);
        match position {
            Some(p) => b.partitions_at(p).iter().map(size_of).sum(),
            None => b.partitions.values().flatten().map(size_of).sum(),
        }
    }

    /// Record a measured size. Returns false if the partition is unknown.
    pub fn set_partition_size(&mut self, key: &PartitionKey, size_kb: u64) -> bool {
        match self
            .topics
            .get_mut(&key.topic)
            .and_then(|t| t.partitions.get_mut(key.partition as usize))
        {
            Some(partition) => {
                partition.size_kb = size_kb;
                true
            }
            None => false,
        }
    }

    /// Sort every broker's index at `position` by ascending partition size
    pub fn sort_partitions_by_size(&mut self, position: usize) {
        let Cluster { brokers, topics } = self;
        let size_of = |k: &PartitionKey| {
            topics
                .get(&k.topic)
                .and_then(|t| t.partition(k.partition))
                .map(Partition::size_kb)
                .unwrap_or(0)
        };
        for broker in brokers.values_mut() {
            if let Some(keys) = broker.partitions.get_mut(&position) {
                keys.sort_by_key(|k| size_of(k));
            }
        }
    }

    /// Replace a partition's replica list, keeping broker indices in step
    pub fn set_replicas(&mut self, key: &PartitionKey, replicas: Vec<BrokerId>) -> Result<()> {
        check_distinct(key, &replicas)?;
        self.require_brokers(&replicas)?;

        let Cluster { brokers, topics } = self;
        let partition = topics
            .get_mut(&key.topic)
            .and_then(|t| t.partitions.get_mut(key.partition as usize))
            .ok_or_else(|| RebalanceError::UnknownPartition {
                topic: key.topic.clone(),
                partition: key.partition,
            })?;

        for broker_id in &partition.replicas {
            if let Some(broker) = brokers.get_mut(broker_id) {
                broker.remove_partition(partition);
            }
        }
        partition.replicas = replicas;
        for (position, broker_id) in partition.replicas.iter().enumerate() {
            if let Some(broker) = brokers.get_mut(broker_id) {
                broker.add_partition_at(position, partition);
            }
        }
        Ok(())
    }

    /// Move the replica at `position` to broker `to`, returning the broker it left
    pub fn move_replica(
        &mut self,
        key: &PartitionKey,
        position: usize,
        to: BrokerId,
    ) -> Result<BrokerId> {
        let partition = self.require_partition(key)?;
        let from = *partition.replicas.get(position).ok_or_else(|| {
            RebalanceError::Validation(format!("{} has no replica at position {}", key, position))
        })?;
        if from == to {
            return Ok(from);
        }
        if partition.has_replica(to) {
            return Err(RebalanceError::Validation(format!(
                "{} already has a replica on broker {}",
                key, to
            )));
        }
        self.require_brokers(&[to])?;

        let Cluster { brokers, topics } = self;
        let partition = topics
            .get_mut(&key.topic)
            .and_then(|t| t.partitions.get_mut(key.partition as usize))
            .ok_or_else(|| RebalanceError::UnknownPartition {
                topic: key.topic.clone(),
                partition: key.partition,
            })?;

        if let Some(source) = brokers.get_mut(&from) {
            source.remove_partition(partition);
        }
        partition.replicas[position] = to;
        if let Some(dest) = brokers.get_mut(&to) {
            dest.add_partition_at(position, partition);
        }
        Ok(from)
    }

    /// Swap the brokers at two replica positions
    pub fn swap_replicas(&mut self, key: &PartitionKey, a: usize, b: usize) -> Result<()> {
        let mut replicas = self.require_partition(key)?.replicas.clone();
        if a >= replicas.len() || b >= replicas.len() {
            return Err(RebalanceError::Validation(format!(
                "cannot swap positions {} and {} of {} with {} replicas",
                a,
                b,
                key,
                replicas.len()
            )));
        }
        replicas.swap(a, b);
        self.set_replicas(key, replicas)
    }

    /// Check that every broker index agrees with the partition replica lists
    pub fn verify_indices(&self) -> Result<()> {
        let mut expected: BTreeMap<BrokerId, BTreeMap<usize, BTreeSet<PartitionKey>>> =
            BTreeMap::new();
        for partition in self.partitions() {
            for (position, broker_id) in partition.replicas.iter().enumerate() {
                if !self.brokers.contains_key(broker_id) {
                    return Err(RebalanceError::UnknownBroker(*broker_id));
                }
                expected
                    .entry(*broker_id)
                    .or_default()
                    .entry(position)
                    .or_default()
                    .insert(partition.key());
            }
        }
        for broker in self.brokers.values() {
            let mut actual: BTreeMap<usize, BTreeSet<PartitionKey>> = BTreeMap::new();
            for (position, keys) in &broker.partitions {
                let set: BTreeSet<_> = keys.iter().cloned().collect();
                if set.len() != keys.len() {
                    return Err(RebalanceError::Validation(format!(
                        "broker {} indexes a partition twice at position {}",
                        broker.id, position
                    )));
                }
                if !set.is_empty() {
                    actual.insert(*position, set);
                }
            }
            let wanted = expected.remove(&broker.id).unwrap_or_default();
            if actual != wanted {
                return Err(RebalanceError::Validation(format!(
                    "broker {} index is out of sync with replica lists",
                    broker.id
                )));
            }
        }
        Ok(())
    }
}

fn check_distinct(key: &PartitionKey, replicas: &[BrokerId]) -> Result<()> {
    let mut seen = HashSet::with_capacity(replicas.len());
    match replicas.iter().find(|b| !seen.insert(**b)) {
        Some(dup) => Err(RebalanceError::Validation(format!(
            "{} lists broker {} more than once",
            key, dup
        ))),
        None => Ok(()),
    }
}
