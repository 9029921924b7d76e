//! Feed configuration.

use crate::error::{FeedError, FeedResult};
use orderfeed_persistence::{validate_key, DEFAULT_STORAGE_KEY};
use serde::{Deserialize, Serialize};

/// Where a newly ingested order is placed in the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Newest arrival at the head, regardless of `createdAt`.
    #[default]
    Arrival,
    /// Sorted newest-first by `createdAt`, ties broken by id (descending).
    /// Unparseable timestamps sort as oldest.
    CreatedAt,
}

/// Order feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Maximum number of orders kept. Default: 7.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Persistent store key. Default: "orders".
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Placement of new orders. Default: arrival.
    #[serde(default)]
    pub ordering: OrderingPolicy,
}

fn default_capacity() -> usize {
    7
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            storage_key: default_storage_key(),
            ordering: OrderingPolicy::default(),
        }
    }
}

impl FeedConfig {
    /// Config with the given capacity and defaults elsewhere.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> FeedResult<()> {
        if self.capacity == 0 {
            return Err(FeedError::InvalidConfig(
                "capacity must be at least 1".to_string(),
            ));
        }
        validate_key(&self.storage_key)
            .map_err(|e| FeedError::InvalidConfig(e.to_string()))?;
        Ok(())
    }
}
