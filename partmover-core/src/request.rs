//! Admin request payloads
//!
//! JSON documents consumed by the external reassignment and
//! preferred-leader-election tools.

use serde::{Deserialize, Serialize};

use crate::cluster::{BrokerId, PartitionKey};
use crate::error::Result;

/// New replica list for one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMove {
    pub topic: String,
    pub partition: u32,
    pub replicas: Vec<BrokerId>,
}

impl PartitionMove {
    pub fn key(&self) -> PartitionKey {
        PartitionKey::new(self.topic.clone(), self.partition)
    }
}

/// `{ "version": 1, "partitions": [...] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentRequest {
    pub version: u32,
    pub partitions: Vec<PartitionMove>,
}

impl ReassignmentRequest {
    pub const VERSION: u32 = 1;

    pub fn new(partitions: Vec<PartitionMove>) -> Self {
        Self {
            version: Self::VERSION,
            partitions,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Comma-separated `topic-partition` list for log and error context
    pub fn describe(&self) -> String {
        self.partitions
            .iter()
            .map(|m| m.key().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Partition reference inside an election request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: u32,
}

impl From<PartitionKey> for TopicPartition {
    fn from(key: PartitionKey) -> Self {
        Self {
            topic: key.topic,
            partition: key.partition,
        }
    }
}

/// `{ "partitions": [...] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionRequest {
    pub partitions: Vec<TopicPartition>,
}

impl ElectionRequest {
    pub fn new(partitions: Vec<TopicPartition>) -> Self {
        Self { partitions }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Size in bytes of the encoded payload
    pub fn encoded_len(&self) -> Result<usize> {
        Ok(serde_json::to_vec(self)?.len())
    }
}
