use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a physical shard (a catalog file record).
pub type ShardId = u64;

/// Opaque host name of a serving node.
pub type NodeId = String;

/// Lifecycle state of a collection or partition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    #[default]
    Normal,
    /// Pending deletion. Never eligible for routing.
    ToDelete,
}

impl fmt::Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionState::Normal => write!(f, "normal"),
            CollectionState::ToDelete => write!(f, "to_delete"),
        }
    }
}

/// A collection or partition record.
///
/// An empty `owner_table` marks a primary collection; otherwise the record is
/// a partition of `owner_table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub table_id: String,
    #[serde(default)]
    pub owner_table: String,
    #[serde(default)]
    pub state: CollectionState,
    #[serde(default)]
    pub partition_tag: String,
}

impl CollectionRecord {
    pub fn primary(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            owner_table: String::new(),
            state: CollectionState::Normal,
            partition_tag: String::new(),
        }
    }

    pub fn partition(
        owner_table: impl Into<String>,
        table_id: impl Into<String>,
        partition_tag: impl Into<String>,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            owner_table: owner_table.into(),
            state: CollectionState::Normal,
            partition_tag: partition_tag.into(),
        }
    }

    pub fn is_partition(&self) -> bool {
        !self.owner_table.is_empty()
    }

    pub fn is_deleted(&self) -> bool {
        self.state == CollectionState::ToDelete
    }
}

/// Storage file kind. Only `Raw`, `ToIndex` and `Index` are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    New,
    Raw,
    ToIndex,
    Index,
    ToDelete,
    NewMerge,
    NewIndex,
    Backup,
}

impl FileType {
    pub const ROUTABLE: [FileType; 3] = [FileType::Raw, FileType::ToIndex, FileType::Index];

    pub fn is_routable(self) -> bool {
        Self::ROUTABLE.contains(&self)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::New => "new",
            FileType::Raw => "raw",
            FileType::ToIndex => "to_index",
            FileType::Index => "index",
            FileType::ToDelete => "to_delete",
            FileType::NewMerge => "new_merge",
            FileType::NewIndex => "new_index",
            FileType::Backup => "backup",
        };
        f.write_str(name)
    }
}

/// A shard (file) record owned by one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRecord {
    pub id: ShardId,
    pub table_id: String,
    pub file_type: FileType,
    /// Logical timestamp, monotonic per shard.
    pub updated_time: u64,
}

impl ShardRecord {
    pub fn new(
        id: ShardId,
        table_id: impl Into<String>,
        file_type: FileType,
        updated_time: u64,
    ) -> Self {
        Self {
            id,
            table_id: table_id.into(),
            file_type,
            updated_time,
        }
    }

    pub fn stamp(&self) -> ShardStamp {
        ShardStamp {
            id: self.id,
            updated_time: self.updated_time,
        }
    }
}

/// (shard id, update time) pair fed to the change tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardStamp {
    pub id: ShardId,
    pub updated_time: u64,
}

impl ShardStamp {
    pub fn new(id: ShardId, updated_time: u64) -> Self {
        Self { id, updated_time }
    }
}

/// Opaque call context carried into raised errors for upstream correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallMetadata(BTreeMap<String, String>);

impl CallMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What one node must do for a routed collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRoute {
    /// Every shard the node owns for this call.
    pub search_files: Vec<ShardId>,
    /// Owned shards whose update time advanced since the node last saw them.
    pub update_files: Vec<ShardId>,
}

/// Per-node routing decision, freshly built for each call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingResult {
    routes: BTreeMap<NodeId, NodeRoute>,
}

impl RoutingResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, node: NodeId, route: NodeRoute) {
        self.routes.insert(node, route);
    }

    pub fn get(&self, node: &str) -> Option<&NodeRoute> {
        self.routes.get(node)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeRoute)> {
        self.routes.iter()
    }

    /// All searchable shard ids across nodes, in node order.
    pub fn all_search_files(&self) -> Vec<ShardId> {
        self.routes
            .values()
            .flat_map(|route| route.search_files.iter().copied())
            .collect()
    }

    pub fn into_inner(self) -> BTreeMap<NodeId, NodeRoute> {
        self.routes
    }
}
