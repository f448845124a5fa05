pub mod error;
pub mod types;

pub use error::{CatalogError, CatalogResult, Result, RouterError};
pub use types::{
    CallMetadata, CollectionRecord, CollectionState, FileType, NodeId, NodeRoute, RoutingResult,
    ShardId, ShardRecord, ShardStamp,
};
