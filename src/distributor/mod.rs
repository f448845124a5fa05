//! Shard to node assignment.
//!
//! A [`DistributionPolicy`] picks a node index for every shard; the
//! [`ShardDistributor`] owns the contract around it: every shard lands on
//! exactly one node from the given list, and nodes without shards are left
//! out of the result.

pub mod hash_ring;
pub mod round_robin;

pub use hash_ring::{HashRing, HashRingPolicy};
pub use round_robin::RoundRobinPolicy;

use crate::core::{NodeId, Result, RouterError, ShardRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

pub const DEFAULT_RING_REPLICAS: usize = 160;

/// Shards grouped by owning node, each list in catalog order.
pub type Assignment = BTreeMap<NodeId, Vec<ShardRecord>>;

pub trait DistributionPolicy: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Index into `nodes` for each shard, in shard order.
    ///
    /// Called only with a non-empty `nodes`. Shards the plan does not cover
    /// are placed round robin.
    fn plan(&self, shards: &[ShardRecord], nodes: &[NodeId]) -> Vec<usize>;
}

/// Which policy a router should build.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    RoundRobin,
    HashRing { replicas: usize },
}

pub fn policy_for(kind: &PolicyKind) -> Arc<dyn DistributionPolicy> {
    match kind {
        PolicyKind::RoundRobin => Arc::new(RoundRobinPolicy),
        PolicyKind::HashRing { replicas } => Arc::new(HashRingPolicy::new(*replicas)),
    }
}

#[derive(Debug, Clone)]
pub struct ShardDistributor {
    policy: Arc<dyn DistributionPolicy>,
}

impl ShardDistributor {
    pub fn new(policy: Arc<dyn DistributionPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Arc<dyn DistributionPolicy> {
        &self.policy
    }

    pub fn distribute(&self, shards: Vec<ShardRecord>, nodes: &[NodeId]) -> Result<Assignment> {
        let mut assignment = Assignment::new();
        if shards.is_empty() {
            return Ok(assignment);
        }
        if nodes.is_empty() {
            return Err(RouterError::NoNodesAvailable {
                shards: shards.len(),
                metadata: None,
            });
        }

        let plan = self.policy.plan(&shards, nodes);
        if plan.len() != shards.len() {
            tracing::warn!(
                policy = self.policy.name(),
                planned = plan.len(),
                shards = shards.len(),
                "policy plan does not cover every shard, placing the rest round robin"
            );
        }

        for (position, shard) in shards.into_iter().enumerate() {
            let index = plan.get(position).copied().unwrap_or(position);
            let node = &nodes[index % nodes.len()];
            tracing::debug!(
                position,
                shard = shard.id,
                node = %node,
                policy = self.policy.name(),
                "Target host for shard"
            );
            assignment.entry(node.clone()).or_default().push(shard);
        }

        Ok(assignment)
    }
}

impl Default for ShardDistributor {
    fn default() -> Self {
        Self::new(Arc::new(RoundRobinPolicy))
    }
}
