use super::catalog::CatalogSnapshot;
use crate::config::millis_ceil;
use super::filter::{CollectionFilter, ShardFilter};
use super::{CatalogSession, MetadataCatalog, SessionId};
use crate::core::{
    CatalogError, CatalogResult, CollectionRecord, CollectionState, FileType, ShardId, ShardRecord,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Counters and fault knobs shared between the catalog and its sessions.
#[derive(Debug, Default)]
struct SessionAccounting {
    active: AtomicUsize,
    total: AtomicUsize,
    failing_queries: AtomicUsize,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl SessionAccounting {
    /// Consume one injected failure if any are pending.
    fn take_failure(&self) -> bool {
        self.failing_queries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn latency(&self) -> Option<Duration> {
        match self.latency_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// In-process catalog of collection and file records.
///
/// Writers swap in a new [`CatalogSnapshot`]; each read session pins the
/// snapshot that was current when it began, so one routing call sees a
/// consistent view even while the catalog is being modified.
pub struct InMemoryCatalog {
    snapshot: RwLock<CatalogSnapshot>,
    accounting: Arc<SessionAccounting>,
    url: String,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::with_url("memory://catalog")
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            snapshot: RwLock::new(CatalogSnapshot::new()),
            accounting: Arc::new(SessionAccounting::default()),
            url: url.to_string(),
        }
    }

    /// Build a catalog from fixture records.
    pub fn from_records(
        collections: Vec<CollectionRecord>,
        files: Vec<ShardRecord>,
    ) -> CatalogResult<Self> {
        let mut snapshot = CatalogSnapshot::new();
        for collection in collections {
            snapshot = snapshot.with_collection(collection)?;
        }
        for file in files {
            snapshot = snapshot.with_file(file)?;
        }

        let catalog = Self::new();
        Ok(Self {
            snapshot: RwLock::new(snapshot),
            ..catalog
        })
    }

    async fn apply(
        &self,
        change: impl FnOnce(CatalogSnapshot) -> CatalogResult<CatalogSnapshot>,
    ) -> CatalogResult<()> {
        let mut current = self.snapshot.write().await;
        *current = change(current.clone())?;
        Ok(())
    }

    pub async fn create_collection(&self, table_id: &str) -> CatalogResult<()> {
        self.apply(|s| s.with_collection(CollectionRecord::primary(table_id)))
            .await
    }

    pub async fn create_partition(
        &self,
        owner_table: &str,
        table_id: &str,
        partition_tag: &str,
    ) -> CatalogResult<()> {
        self.apply(|s| {
            if !s.collection_exists(owner_table) {
                return Err(CatalogError::Backend(format!(
                    "Collection '{}' not found",
                    owner_table
                )));
            }
            s.with_collection(CollectionRecord::partition(owner_table, table_id, partition_tag))
        })
        .await
    }

    pub async fn mark_to_delete(&self, table_id: &str) -> CatalogResult<()> {
        self.apply(|s| s.with_state(table_id, CollectionState::ToDelete))
            .await
    }

    pub async fn add_file(
        &self,
        id: ShardId,
        table_id: &str,
        file_type: FileType,
        updated_time: u64,
    ) -> CatalogResult<()> {
        self.apply(|s| s.with_file(ShardRecord::new(id, table_id, file_type, updated_time)))
            .await
    }

    /// Bump a file's update time, as a compaction or index build would.
    pub async fn touch_file(&self, id: ShardId, updated_time: u64) -> CatalogResult<()> {
        self.apply(|s| s.map_file(id, |f| f.updated_time = updated_time))
            .await
    }

    pub async fn set_file_type(&self, id: ShardId, file_type: FileType) -> CatalogResult<()> {
        self.apply(|s| s.set_file_type(id, file_type)).await
    }

    pub async fn snapshot(&self) -> CatalogSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Make the next `count` queries fail with a backend error.
    pub fn fail_queries(&self, count: usize) {
        self.accounting.failing_queries.store(count, Ordering::SeqCst);
    }

    /// Refuse new sessions while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.accounting.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every query by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.accounting
            .latency_ms
            .store(millis_ceil(latency), Ordering::SeqCst);
    }

    /// Sessions begun and not yet released.
    pub fn active_sessions(&self) -> usize {
        self.accounting.active.load(Ordering::SeqCst)
    }

    pub fn total_sessions(&self) -> usize {
        self.accounting.total.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataCatalog for InMemoryCatalog {
    async fn begin_read(&self) -> CatalogResult<Box<dyn CatalogSession>> {
        if self.accounting.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable(format!(
                "{} is not accepting sessions",
                self.url
            )));
        }

        let snapshot = self.snapshot.read().await.clone();
        self.accounting.active.fetch_add(1, Ordering::SeqCst);
        self.accounting.total.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemorySession {
            id: SessionId::new(),
            snapshot,
            accounting: Arc::clone(&self.accounting),
            released: false,
        }))
    }

    fn url(&self) -> String {
        self.url.clone()
    }
}

struct MemorySession {
    id: SessionId,
    snapshot: CatalogSnapshot,
    accounting: Arc<SessionAccounting>,
    released: bool,
}

impl MemorySession {
    async fn before_query(&self) -> CatalogResult<()> {
        if self.released {
            return Err(CatalogError::Unavailable(format!("{} already released", self.id)));
        }
        if let Some(latency) = self.accounting.latency() {
            tokio::time::sleep(latency).await;
        }
        if self.accounting.take_failure() {
            return Err(CatalogError::Backend(format!(
                "injected failure in {}",
                self.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSession for MemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn query_collections(
        &mut self,
        filter: &CollectionFilter,
    ) -> CatalogResult<Vec<CollectionRecord>> {
        self.before_query().await?;
        Ok(self.snapshot.select_collections(filter))
    }

    async fn query_shards(&mut self, filter: &ShardFilter) -> CatalogResult<Vec<ShardRecord>> {
        self.before_query().await?;
        Ok(self.snapshot.select_files(filter))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.accounting.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.release();
    }
}
