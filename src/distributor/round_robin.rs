use super::DistributionPolicy;
use crate::core::{NodeId, ShardRecord};

/// Shard `i` goes to `nodes[i % nodes.len()]`.
///
/// Stateless across calls: the same shard may move when the catalog order or
/// the node list changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinPolicy;

impl DistributionPolicy for RoundRobinPolicy {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn plan(&self, shards: &[ShardRecord], nodes: &[NodeId]) -> Vec<usize> {
        (0..shards.len()).map(|i| i % nodes.len()).collect()
    }
}
