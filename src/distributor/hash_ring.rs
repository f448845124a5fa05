//! Consistent hash ring (ketama style).
//!
//! Each node is placed on a 64-bit ring at `replicas` virtual points. A shard
//! belongs to the first point at or after its own hash, wrapping around. When
//! a node leaves, only the shards it owned move; when one joins, it only takes
//! shards from its ring neighbours.

use super::{DEFAULT_RING_REPLICAS, DistributionPolicy};
use crate::core::{NodeId, ShardRecord};
use std::collections::BTreeMap;

const FNV_OFFSET: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;

/// FNV-1a followed by a 64-bit finalizer so that short, similar keys
/// ("node-1", "node-2") spread over the whole ring.
pub fn ring_hash(key: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xc4ceb9fe1a85ec53);
    hash ^ (hash >> 33)
}

#[derive(Debug, Clone)]
pub struct HashRing {
    points: BTreeMap<u64, usize>,
    nodes: Vec<NodeId>,
}

impl HashRing {
    pub fn new(nodes: &[NodeId], replicas: usize) -> Self {
        let replicas = replicas.max(1);
        let mut points = BTreeMap::new();
        for (index, node) in nodes.iter().enumerate() {
            for replica in 0..replicas {
                points.insert(ring_hash(&format!("{}-{}", node, replica)), index);
            }
        }

        Self {
            points,
            nodes: nodes.to_vec(),
        }
    }

    /// Index of the node owning `key`, or `None` for an empty ring.
    pub fn lookup_index(&self, key: &str) -> Option<usize> {
        let hash = ring_hash(key);
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, index)| *index)
    }

    pub fn lookup(&self, key: &str) -> Option<&NodeId> {
        self.lookup_index(key).map(|index| &self.nodes[index])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Assigns shards by their id on a ring built from the current node set.
///
/// The result depends only on the shard id and the set of node names, not on
/// catalog order.
#[derive(Debug, Clone, Copy)]
pub struct HashRingPolicy {
    replicas: usize,
}

impl HashRingPolicy {
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas: replicas.max(1),
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

impl Default for HashRingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RING_REPLICAS)
    }
}

impl DistributionPolicy for HashRingPolicy {
    fn name(&self) -> &'static str {
        "hash_ring"
    }

    fn plan(&self, shards: &[ShardRecord], nodes: &[NodeId]) -> Vec<usize> {
        let ring = HashRing::new(nodes, self.replicas);
        shards
            .iter()
            .map(|shard| ring.lookup_index(&shard.id.to_string()).unwrap_or(0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(count: usize) -> Vec<NodeId> {
        (0..count).map(|i| format!("node-{i}")).collect()
    }

    #[test]
    fn test_empty_ring_returns_none() {
        let ring = HashRing::new(&[], DEFAULT_RING_REPLICAS);
        assert!(ring.lookup("any-key").is_none());
    }

    #[test]
    fn test_single_node_owns_all() {
        let ring = HashRing::new(&nodes(1), DEFAULT_RING_REPLICAS);
        for i in 0..100 {
            assert_eq!(ring.lookup(&i.to_string()).map(String::as_str), Some("node-0"));
        }
    }

    #[test]
    fn test_order_of_node_list_does_not_matter() {
        let forward = nodes(5);
        let mut backward = forward.clone();
        backward.reverse();

        let a = HashRing::new(&forward, DEFAULT_RING_REPLICAS);
        let b = HashRing::new(&backward, DEFAULT_RING_REPLICAS);
        for i in 0..500 {
            let key = i.to_string();
            assert_eq!(a.lookup(&key), b.lookup(&key));
        }
    }

    #[test]
    fn test_reasonable_distribution() {
        let node_list = nodes(4);
        let ring = HashRing::new(&node_list, DEFAULT_RING_REPLICAS);

        let mut counts = [0usize; 4];
        for i in 0..10_000 {
            if let Some(index) = ring.lookup_index(&i.to_string()) {
                counts[index] += 1;
            }
        }

        for (i, &count) in counts.iter().enumerate() {
            assert!(
                (1_000..=4_500).contains(&count),
                "Node {i}: got {count} of 10000 keys"
            );
        }
    }

    #[test]
    fn test_removing_node_only_moves_its_keys() {
        let before = nodes(4);
        let after: Vec<_> = before.iter().skip(1).cloned().collect();
        let old_ring = HashRing::new(&before, DEFAULT_RING_REPLICAS);
        let new_ring = HashRing::new(&after, DEFAULT_RING_REPLICAS);

        for i in 0..2_000 {
            let key = i.to_string();
            let old_owner = old_ring.lookup(&key).cloned();
            let new_owner = new_ring.lookup(&key).cloned();
            if old_owner.as_deref() != Some("node-0") {
                assert_eq!(old_owner, new_owner, "key {key} moved without cause");
            }
        }
    }

    #[test]
    fn test_adding_node_only_takes_keys() {
        let before = nodes(3);
        let after = nodes(4);
        let old_ring = HashRing::new(&before, DEFAULT_RING_REPLICAS);
        let new_ring = HashRing::new(&after, DEFAULT_RING_REPLICAS);

        for i in 0..2_000 {
            let key = i.to_string();
            let new_owner = new_ring.lookup(&key).cloned();
            if new_owner.as_deref() != Some("node-3") {
                assert_eq!(old_ring.lookup(&key).cloned(), new_owner);
            }
        }
    }

    #[test]
    fn test_zero_replicas_is_clamped() {
        assert_eq!(HashRingPolicy::new(0).replicas(), 1);
    }
}
