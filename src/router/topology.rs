use crate::core::NodeId;
use std::sync::{PoisonError, RwLock};

/// Source of the node names a router may assign shards to.
///
/// Routing captures the list once per call; it may differ between calls.
pub trait Topology: Send + Sync {
    fn group_names(&self) -> Vec<NodeId>;
}

/// A topology held in memory and edited by the host.
#[derive(Debug, Default)]
pub struct StaticTopology {
    groups: RwLock<Vec<NodeId>>,
}

impl StaticTopology {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        let topology = Self::default();
        topology.set_groups(groups);
        topology
    }

    /// Add a group unless it is already present.
    pub fn add_group(&self, name: impl Into<NodeId>) -> bool {
        let name = name.into();
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        if groups.contains(&name) {
            return false;
        }
        groups.push(name);
        true
    }

    pub fn remove_group(&self, name: &str) -> bool {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let before = groups.len();
        groups.retain(|g| g != name);
        groups.len() != before
    }

    /// Replace all groups, dropping duplicates and blank names.
    pub fn set_groups<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        let mut next: Vec<NodeId> = Vec::new();
        for name in names {
            let name = name.into();
            if !name.trim().is_empty() && !next.contains(&name) {
                next.push(name);
            }
        }
        *self.groups.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl Topology for StaticTopology {
    fn group_names(&self) -> Vec<NodeId> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
