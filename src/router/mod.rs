//! Routing facade: resolve, distribute, diff.

pub mod plugin;
pub mod request;
pub mod topology;

pub use plugin::{FileBasedHashRingRouterFactory, PluginHost, RouterFactory, RouterRegistry, setup};
pub use request::{QueryRange, RoutingRequest};
pub use topology::{StaticTopology, Topology};

use crate::config::RouterConfig;
use crate::core::{
    CallMetadata, CatalogError, NodeId, NodeRoute, Result, RouterError, RoutingResult,
    ShardRecord, ShardStamp,
};
use crate::distributor::{ShardDistributor, policy_for};
use crate::resolver::{MetadataResolver, matcher_for};
use crate::storage::MetadataCatalog;
use crate::tracker::{ChangeTracker, LedgerStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub const ROUTER_NAME: &str = "FileBasedHashRingRouter";

/// A routing implementation a host can install.
#[async_trait]
pub trait Router: Send + Sync {
    fn name(&self) -> &'static str;

    async fn routing(&self, request: RoutingRequest) -> Result<RoutingResult>;
}

/// Everything a router factory may be given.
#[derive(Default)]
pub struct RouterOptions {
    pub writable_topo: Option<Arc<dyn Topology>>,
    pub readonly_topo: Option<Arc<dyn Topology>>,
    pub catalog: Option<Arc<dyn MetadataCatalog>>,
    /// Ledger to track changes in; the process-wide tracker when absent.
    pub ledger: Option<Arc<dyn LedgerStore>>,
    pub config: RouterConfig,
}

impl RouterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writable_topo(mut self, topology: Arc<dyn Topology>) -> Self {
        self.writable_topo = Some(topology);
        self
    }

    pub fn readonly_topo(mut self, topology: Arc<dyn Topology>) -> Self {
        self.readonly_topo = Some(topology);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn MetadataCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn LedgerStore>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }
}

/// Resolves a collection into catalog files, spreads them over the readable
/// nodes and reports, per node, which files changed since that node last
/// received them.
pub struct FileBasedHashRingRouter {
    writable_topo: Arc<dyn Topology>,
    readonly_topo: Arc<dyn Topology>,
    resolver: MetadataResolver,
    distributor: ShardDistributor,
    tracker: ChangeTracker,
    config: RouterConfig,
}

impl FileBasedHashRingRouter {
    /// Build a router, failing fast when a required collaborator is missing.
    pub fn create(options: RouterOptions) -> Result<Self> {
        let writable_topo = options.writable_topo.ok_or_else(|| {
            RouterError::Configuration(format!(
                "Cannot find 'writable_topo' to initialize '{}'",
                ROUTER_NAME
            ))
        })?;
        let readonly_topo = options.readonly_topo.ok_or_else(|| {
            RouterError::Configuration(format!(
                "Cannot find 'readonly_topo' to initialize '{}'",
                ROUTER_NAME
            ))
        })?;
        let catalog = options.catalog.ok_or_else(|| {
            RouterError::Configuration(format!(
                "Cannot find 'catalog' to initialize '{}'",
                ROUTER_NAME
            ))
        })?;

        let config = options.config;
        config.validate()?;

        let resolver = MetadataResolver::new(catalog, matcher_for(config.tag_match))
            .with_default_partition_tag(config.default_partition_tag.clone());
        let distributor = ShardDistributor::new(policy_for(&config.policy));
        let tracker = match options.ledger {
            Some(ledger) => ChangeTracker::new(ledger),
            None => ChangeTracker::global().clone(),
        };

        debug!(
            policy = distributor.policy().name(),
            tag_match = ?config.tag_match,
            "router created"
        );

        Ok(Self {
            writable_topo,
            readonly_topo,
            resolver,
            distributor,
            tracker,
            config,
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn writable_topo(&self) -> &Arc<dyn Topology> {
        &self.writable_topo
    }

    pub fn readonly_topo(&self) -> &Arc<dyn Topology> {
        &self.readonly_topo
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Route against an explicit node list.
    pub async fn route(
        &self,
        collection_name: &str,
        partition_tags: Option<&[String]>,
        nodes: &[NodeId],
    ) -> Result<RoutingResult> {
        self.route_with_metadata(collection_name, partition_tags, nodes, None)
            .await
    }

    async fn route_with_metadata(
        &self,
        collection_name: &str,
        partition_tags: Option<&[String]>,
        nodes: &[NodeId],
        metadata: Option<&CallMetadata>,
    ) -> Result<RoutingResult> {
        let shards = self
            .resolve_bounded(collection_name, partition_tags, metadata)
            .await?;

        let mut result = RoutingResult::new();
        if shards.is_empty() {
            return Ok(result);
        }

        info!(collection = collection_name, servers = ?nodes, "Available servers");
        let assignment = self
            .distributor
            .distribute(shards, nodes)
            .map_err(|e| e.with_metadata(metadata.cloned()))?;

        // The catalog read is complete; nothing below can fail, so ledger
        // updates are never left half applied.
        for (node, files) in assignment {
            let stamps: Vec<ShardStamp> = files.iter().map(ShardRecord::stamp).collect();
            let update_files = self.tracker.diff(&node, &stamps);
            let search_files = stamps.iter().map(|s| s.id).collect();
            result.insert(
                node,
                NodeRoute {
                    search_files,
                    update_files,
                },
            );
        }

        Ok(result)
    }

    /// Resolve under the configured catalog timeout. A timed out resolve is
    /// dropped, which releases its session.
    async fn resolve_bounded(
        &self,
        collection_name: &str,
        partition_tags: Option<&[String]>,
        metadata: Option<&CallMetadata>,
    ) -> Result<Vec<ShardRecord>> {
        let resolve = self
            .resolver
            .resolve(collection_name, partition_tags, metadata);

        match self.config.catalog_timeout_duration() {
            None => resolve.await,
            Some(limit) => tokio::time::timeout(limit, resolve).await.unwrap_or_else(|_| {
                Err(RouterError::catalog(
                    CatalogError::Timeout(limit),
                    metadata.cloned(),
                ))
            }),
        }
    }
}

#[async_trait]
impl Router for FileBasedHashRingRouter {
    fn name(&self) -> &'static str {
        ROUTER_NAME
    }

    async fn routing(&self, request: RoutingRequest) -> Result<RoutingResult> {
        let RoutingRequest {
            collection_name,
            partition_tags,
            metadata,
            range_array,
        } = request;

        if let Some(ranges) = range_array.as_ref() {
            debug!(collection = %collection_name, ?ranges, "range filter accepted, not applied");
        }

        let nodes = self.readonly_topo.group_names();
        self.route_with_metadata(
            &collection_name,
            partition_tags.as_deref(),
            &nodes,
            metadata.as_ref(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FileType;
    use crate::storage::InMemoryCatalog;
    use crate::tracker::InMemoryLedger;
    use std::time::Duration;

    async fn fixture() -> (Arc<InMemoryCatalog>, Arc<StaticTopology>, FileBasedHashRingRouter) {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.create_collection("C").await.unwrap();
        catalog.add_file(1, "C", FileType::Raw, 5).await.unwrap();
        catalog.add_file(2, "C", FileType::Index, 7).await.unwrap();

        let topology = Arc::new(StaticTopology::new(["A", "B"]));
        let router = FileBasedHashRingRouter::create(
            RouterOptions::new()
                .writable_topo(topology.clone())
                .readonly_topo(topology.clone())
                .catalog(catalog.clone())
                .ledger(Arc::new(InMemoryLedger::new())),
        )
        .unwrap();

        (catalog, topology, router)
    }

    #[tokio::test]
    async fn test_routing_uses_readonly_topology() {
        let (_, topology, router) = fixture().await;

        let result = router.routing(RoutingRequest::new("C")).await.unwrap();
        assert_eq!(result.get("A").unwrap().search_files, vec![1]);
        assert_eq!(result.get("B").unwrap().search_files, vec![2]);

        topology.remove_group("B");
        let result = router.routing(RoutingRequest::new("C")).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("A").unwrap().search_files, vec![1, 2]);
        // shard 2 is new to A
        assert_eq!(result.get("A").unwrap().update_files, vec![2]);
    }

    #[tokio::test]
    async fn test_touched_file_is_reported_again() {
        let (catalog, _, router) = fixture().await;
        let nodes = vec!["A".to_string(), "B".to_string()];

        router.route("C", None, &nodes).await.unwrap();
        catalog.touch_file(2, 9).await.unwrap();

        let result = router.route("C", None, &nodes).await.unwrap();
        assert!(result.get("A").unwrap().update_files.is_empty());
        assert_eq!(result.get("B").unwrap().update_files, vec![2]);
    }

    #[tokio::test]
    async fn test_empty_collection_routes_to_nothing() {
        let (catalog, _, router) = fixture().await;
        catalog.create_collection("E").await.unwrap();

        let result = router.route("E", None, &[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_no_nodes_error_carries_metadata() {
        let (_, topology, router) = fixture().await;
        topology.set_groups(Vec::<String>::new());

        let request =
            RoutingRequest::new("C").metadata(CallMetadata::new().with("request_id", "x"));
        let err = router.routing(request).await.unwrap_err();

        assert!(matches!(err, RouterError::NoNodesAvailable { shards: 2, .. }));
        assert_eq!(err.metadata().and_then(|m| m.get("request_id")), Some("x"));
    }

    #[tokio::test]
    async fn test_catalog_timeout_releases_session_and_skips_ledger() {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.create_collection("C").await.unwrap();
        catalog.add_file(1, "C", FileType::Raw, 5).await.unwrap();
        catalog.set_latency(Duration::from_millis(200));

        let topology = Arc::new(StaticTopology::new(["A"]));
        let ledger = Arc::new(InMemoryLedger::new());
        let router = FileBasedHashRingRouter::create(
            RouterOptions::new()
                .writable_topo(topology.clone())
                .readonly_topo(topology)
                .catalog(catalog.clone())
                .ledger(ledger.clone())
                .config(RouterConfig::new().catalog_timeout(Duration::from_millis(20))),
        )
        .unwrap();

        let err = router.routing(RoutingRequest::new("C")).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::Catalog {
                source: CatalogError::Timeout(_),
                ..
            }
        ));
        assert_eq!(catalog.active_sessions(), 0);
        assert_eq!(ledger.node_count(), 0);
    }

    #[tokio::test]
    async fn test_range_array_is_accepted() {
        let (_, _, router) = fixture().await;
        let request = RoutingRequest::new("C").range_array(vec![QueryRange::new(0, 100)]);
        let result = router.routing(request).await.unwrap();
        assert_eq!(result.all_search_files().len(), 2);
    }

    #[test]
    fn test_create_requires_topologies() {
        let topology: Arc<dyn Topology> = Arc::new(StaticTopology::new(["A"]));
        let catalog: Arc<dyn MetadataCatalog> = Arc::new(InMemoryCatalog::new());

        let missing_writable = FileBasedHashRingRouter::create(
            RouterOptions::new()
                .readonly_topo(topology.clone())
                .catalog(catalog.clone()),
        );
        assert!(matches!(
            missing_writable,
            Err(RouterError::Configuration(m)) if m.contains("writable_topo")
        ));

        let missing_readonly = FileBasedHashRingRouter::create(
            RouterOptions::new()
                .writable_topo(topology)
                .catalog(catalog),
        );
        assert!(matches!(
            missing_readonly,
            Err(RouterError::Configuration(m)) if m.contains("readonly_topo")
        ));
    }
}
