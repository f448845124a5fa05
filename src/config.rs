use crate::core::{Result, RouterError};
use crate::distributor::{DEFAULT_RING_REPLICAS, PolicyKind};
use crate::resolver::{DEFAULT_PARTITION_TAG, TagMatchMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Router configuration
///
/// Built with chained setters or loaded from JSON; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Shard to node distribution policy
    pub policy: PolicyKind,

    /// How requested partition tags select stored partitions
    pub tag_match: TagMatchMode,

    /// Bound on the whole catalog read of one routing call, in milliseconds
    pub catalog_timeout_ms: Option<u64>,

    /// Tag that selects the collection itself as its implicit partition
    pub default_partition_tag: String,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self {
            policy: PolicyKind::RoundRobin,
            tag_match: TagMatchMode::Regex,
            catalog_timeout_ms: None,
            default_partition_tag: DEFAULT_PARTITION_TAG.to_string(),
        }
    }

    /// Set the distribution policy
    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    /// Use a consistent hash ring with the default replica count
    pub fn hash_ring(self) -> Self {
        self.policy(PolicyKind::HashRing {
            replicas: DEFAULT_RING_REPLICAS,
        })
    }

    /// Set tag matching mode
    pub fn tag_match(mut self, mode: TagMatchMode) -> Self {
        self.tag_match = mode;
        self
    }

    /// Set catalog timeout
    ///
    /// Rounded up to whole milliseconds, so any non-zero timeout stays non-zero.
    pub fn catalog_timeout(mut self, timeout: Duration) -> Self {
        self.catalog_timeout_ms = Some(millis_ceil(timeout));
        self
    }

    /// Set the default partition tag
    pub fn default_partition_tag(mut self, tag: &str) -> Self {
        self.default_partition_tag = tag.to_string();
        self
    }

    pub fn catalog_timeout_duration(&self) -> Option<Duration> {
        self.catalog_timeout_ms.map(Duration::from_millis)
    }

    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RouterError::Configuration(format!("invalid router config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let PolicyKind::HashRing { replicas: 0 } = self.policy {
            return Err(RouterError::Configuration(
                "hash ring replicas must be > 0".to_string(),
            ));
        }

        if self.default_partition_tag.trim().is_empty() {
            return Err(RouterError::Configuration(
                "default partition tag cannot be empty".to_string(),
            ));
        }

        if self.catalog_timeout_ms == Some(0) {
            return Err(RouterError::Configuration(
                "catalog timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}
