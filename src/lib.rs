// ============================================================================
// shardrouter Library
// ============================================================================

//! Routing core of a query-serving proxy.
//!
//! A routing call resolves a collection (optionally narrowed to partition
//! tags) into the catalog files that hold its data, assigns those files to
//! the readable nodes, and reports per node which files changed since the
//! node last received them.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use shardrouter::{
//!     FileBasedHashRingRouter, FileType, InMemoryCatalog, InMemoryLedger, Router,
//!     RouterOptions, RoutingRequest, StaticTopology,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> shardrouter::Result<()> {
//! let catalog = Arc::new(InMemoryCatalog::new());
//! catalog.create_collection("C").await.unwrap();
//! catalog.add_file(1, "C", FileType::Raw, 5).await.unwrap();
//! catalog.add_file(2, "C", FileType::Index, 7).await.unwrap();
//!
//! let topology = Arc::new(StaticTopology::new(["A", "B"]));
//! let router = FileBasedHashRingRouter::create(
//!     RouterOptions::new()
//!         .writable_topo(topology.clone())
//!         .readonly_topo(topology)
//!         .catalog(catalog)
//!         .ledger(Arc::new(InMemoryLedger::new())),
//! )?;
//!
//! let result = router.routing(RoutingRequest::new("C")).await?;
//! assert_eq!(result.get("A").unwrap().search_files, vec![1]);
//! assert_eq!(result.get("B").unwrap().update_files, vec![2]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod distributor;
pub mod resolver;
pub mod router;
pub mod storage;
pub mod tracker;

// Re-export main types for convenience
pub use config::RouterConfig;
pub use core::{
    CallMetadata, CatalogError, CollectionRecord, CollectionState, FileType, NodeId, NodeRoute,
    Result, RouterError, RoutingResult, ShardId, ShardRecord, ShardStamp,
};
pub use distributor::{
    DistributionPolicy, HashRingPolicy, PolicyKind, RoundRobinPolicy, ShardDistributor,
};
pub use resolver::{MetadataResolver, TagMatchMode, TagMatcher};
pub use router::{
    FileBasedHashRingRouter, PluginHost, QueryRange, ROUTER_NAME, Router, RouterOptions,
    RouterRegistry, RoutingRequest, StaticTopology, Topology, setup,
};
pub use storage::{CatalogSession, InMemoryCatalog, MetadataCatalog, SessionGuard};
pub use tracker::{ChangeTracker, InMemoryLedger, LedgerStore};
