//! Per-node change tracking.
//!
//! The tracker remembers, for every (node, shard) pair, the newest update time
//! it has handed to that node. A shard is dirty for a node when its current
//! update time is strictly greater than the remembered one.

pub mod ledger;

pub use ledger::{InMemoryLedger, LedgerStore};

use crate::core::{ShardId, ShardStamp};
use lazy_static::lazy_static;
use std::sync::Arc;

// Process-wide tracker shared by every router that is not given its own ledger.
lazy_static! {
    static ref GLOBAL_TRACKER: ChangeTracker = ChangeTracker::new(Arc::new(InMemoryLedger::new()));
}

#[derive(Debug, Clone)]
pub struct ChangeTracker {
    ledger: Arc<dyn LedgerStore>,
}

impl ChangeTracker {
    /// The process-wide tracker. Created empty on first use and never torn down.
    pub fn global() -> &'static ChangeTracker {
        &GLOBAL_TRACKER
    }

    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    /// Ids whose update time advanced for `node`; the ledger is moved forward
    /// for exactly those ids.
    pub fn diff(&self, node: &str, stamps: &[ShardStamp]) -> Vec<ShardId> {
        let updated = self.ledger.advance_batch(node, stamps);
        if !updated.is_empty() {
            tracing::debug!(
                node,
                updated = updated.len(),
                total = stamps.len(),
                "shards need update"
            );
        }
        tracing::trace!(node, ?updated, "change tracker diff");
        updated
    }
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryLedger::new()))
    }
}
