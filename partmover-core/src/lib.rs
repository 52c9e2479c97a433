//! partmover core library
//!
//! Core abstractions for planning partition-replica reassignments.
//! This crate provides:
//! - The cluster model (brokers, topics, partitions) with per-position broker indices
//! - Topology snapshot loading
//! - Move diffing between a current and a target cluster
//! - Reassignment and preferred-leader-election payloads
//! - Common error handling

pub mod cluster;
pub mod diff;
pub mod error;
pub mod request;
pub mod topology;

pub use cluster::{Broker, BrokerId, Cluster, Partition, PartitionKey, Topic};
pub use diff::{broker_deltas, generate_moves, BrokerDelta};
pub use error::{RebalanceError, Result};
pub use request::{ElectionRequest, PartitionMove, ReassignmentRequest, TopicPartition};
pub use topology::{BrokerSnapshot, TopologySnapshot};

/// Partitions at or below this size (KiB) are treated as empty when balancing by size
pub const EMPTY_PARTITION_KB: u64 = 4;
