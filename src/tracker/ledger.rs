use crate::core::{NodeId, ShardId, ShardStamp};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Store of the last update time each node has observed per shard.
///
/// Implementations must make every compare-and-advance on a (node, shard)
/// entry atomic. A missing entry reads as `0`.
pub trait LedgerStore: Send + Sync + Debug {
    /// Last recorded update time, if the node has seen the shard.
    fn observed(&self, node: &str, shard: ShardId) -> Option<u64>;

    /// Store `updated_time` if it is strictly newer than the recorded value.
    ///
    /// Returns true when the entry advanced.
    fn compare_and_advance(&self, node: &str, shard: ShardId, updated_time: u64) -> bool;

    /// Advance every stamp for one node, returning the ids that advanced in
    /// input order.
    fn advance_batch(&self, node: &str, stamps: &[ShardStamp]) -> Vec<ShardId> {
        stamps
            .iter()
            .filter(|s| self.compare_and_advance(node, s.id, s.updated_time))
            .map(|s| s.id)
            .collect()
    }

    /// Number of nodes with at least one entry.
    fn node_count(&self) -> usize;
}

type NodeLedger = Arc<Mutex<HashMap<ShardId, u64>>>;

/// Process-local ledger with one lock per node.
///
/// The outer map is only write-locked the first time a node appears; calls
/// for different nodes never contend on the same mutex.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    nodes: RwLock<HashMap<NodeId, NodeLedger>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_ledger(&self, node: &str) -> NodeLedger {
        {
            let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ledger) = nodes.get(node) {
                return Arc::clone(ledger);
            }
        }

        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(nodes.entry(node.to_string()).or_default())
    }

    fn existing_ledger(&self, node: &str) -> Option<NodeLedger> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.get(node).cloned()
    }
}

fn advance(entries: &mut HashMap<ShardId, u64>, shard: ShardId, updated_time: u64) -> bool {
    let previous = entries.get(&shard).copied().unwrap_or(0);
    if previous >= updated_time {
        return false;
    }
    entries.insert(shard, updated_time);
    true
}

impl LedgerStore for InMemoryLedger {
    fn observed(&self, node: &str, shard: ShardId) -> Option<u64> {
        let ledger = self.existing_ledger(node)?;
        let entries = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(&shard).copied()
    }

    fn compare_and_advance(&self, node: &str, shard: ShardId, updated_time: u64) -> bool {
        let ledger = self.node_ledger(node);
        let mut entries = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        advance(&mut entries, shard, updated_time)
    }

    fn advance_batch(&self, node: &str, stamps: &[ShardStamp]) -> Vec<ShardId> {
        let ledger = self.node_ledger(node);
        let mut entries = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let advanced = stamps
            .iter()
            .filter(|s| advance(&mut entries, s.id, s.updated_time))
            .map(|s| s.id)
            .collect();
        advanced
    }

    fn node_count(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entry_reads_as_unseen() {
        let ledger = InMemoryLedger::new();
        assert_eq!(ledger.observed("A", 1), None);
        assert_eq!(ledger.node_count(), 0);
    }

    #[test]
    fn test_zero_timestamp_is_not_newer_than_unseen() {
        let ledger = InMemoryLedger::new();
        assert!(!ledger.compare_and_advance("A", 1, 0));
        assert!(ledger.compare_and_advance("A", 1, 1));
        assert_eq!(ledger.observed("A", 1), Some(1));
    }

    #[test]
    fn test_batch_skips_stale_entries() {
        let ledger = InMemoryLedger::new();
        ledger.compare_and_advance("A", 2, 10);

        let advanced = ledger.advance_batch(
            "A",
            &[ShardStamp::new(1, 5), ShardStamp::new(2, 7), ShardStamp::new(3, 1)],
        );

        assert_eq!(advanced, vec![1, 3]);
        assert_eq!(ledger.observed("A", 2), Some(10));
    }

    #[test]
    fn test_nodes_are_independent() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.compare_and_advance("A", 1, 5));
        assert!(ledger.compare_and_advance("B", 1, 5));
        assert_eq!(ledger.node_count(), 2);
    }
}
