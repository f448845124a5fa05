//! Metadata catalog access.
//!
//! The catalog is an external collaborator: routing only reads it, once per
//! call, through a [`CatalogSession`] held by a [`SessionGuard`]. The guard
//! releases the session on every exit path, including early returns and
//! cancelled futures.

pub mod catalog;
pub mod filter;
pub mod memory;

pub use catalog::CatalogSnapshot;
pub use filter::{CollectionField, CollectionFilter, Filter, Record, ShardField, ShardFilter, Value};
pub use memory::InMemoryCatalog;

use crate::core::{CatalogError, CatalogResult, CollectionRecord, ShardRecord};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global session ID counter
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn new() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// Source of read sessions over collection and file records.
#[async_trait]
pub trait MetadataCatalog: Send + Sync {
    /// Open a read-only unit of work.
    async fn begin_read(&self) -> CatalogResult<Box<dyn CatalogSession>>;

    /// Location string used in diagnostics.
    fn url(&self) -> String;
}

/// A read-only unit of work against the catalog.
#[async_trait]
pub trait CatalogSession: Send {
    fn id(&self) -> SessionId;

    async fn query_collections(
        &mut self,
        filter: &CollectionFilter,
    ) -> CatalogResult<Vec<CollectionRecord>>;

    async fn query_shards(&mut self, filter: &ShardFilter) -> CatalogResult<Vec<ShardRecord>>;

    /// End the unit of work. Must be idempotent.
    fn release(&mut self);
}

/// RAII guard for catalog sessions
///
/// Releases the session when dropped or closed.
pub struct SessionGuard {
    session: Option<Box<dyn CatalogSession>>,
}

impl SessionGuard {
    pub async fn acquire(catalog: &dyn MetadataCatalog) -> CatalogResult<Self> {
        let session = catalog.begin_read().await?;
        tracing::trace!(session = %session.id(), "catalog session acquired");
        Ok(Self {
            session: Some(session),
        })
    }

    fn session(&mut self) -> CatalogResult<&mut Box<dyn CatalogSession>> {
        self.session
            .as_mut()
            .ok_or_else(|| CatalogError::Unavailable("session already released".into()))
    }

    pub async fn query_collections(
        &mut self,
        filter: &CollectionFilter,
    ) -> CatalogResult<Vec<CollectionRecord>> {
        self.session()?.query_collections(filter).await
    }

    pub async fn query_shards(&mut self, filter: &ShardFilter) -> CatalogResult<Vec<ShardRecord>> {
        self.session()?.query_shards(filter).await
    }

    /// Explicitly release the session.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
            tracing::trace!(session = %session.id(), "catalog session released");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FileType;

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let catalog = InMemoryCatalog::new();
        catalog.create_collection("C").await.unwrap();

        {
            let mut guard = SessionGuard::acquire(&catalog).await.unwrap();
            assert_eq!(catalog.active_sessions(), 1);
            let rows = guard
                .query_collections(&CollectionFilter::equals(CollectionField::TableId, "C"))
                .await
                .unwrap();
            assert_eq!(rows.len(), 1);
        }

        assert_eq!(catalog.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_guard_close_is_single_release() {
        let catalog = InMemoryCatalog::new();
        catalog.create_collection("C").await.unwrap();
        catalog.add_file(1, "C", FileType::Raw, 1).await.unwrap();

        let mut guard = SessionGuard::acquire(&catalog).await.unwrap();
        let files = guard
            .query_shards(&ShardFilter::one_of(ShardField::TableId, ["C"]))
            .await
            .unwrap();
        assert_eq!(files.len(), 1);

        guard.close();
        assert_eq!(catalog.active_sessions(), 0);
        assert_eq!(catalog.total_sessions(), 1);
    }

    #[test]
    fn test_session_ids_increase() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert!(b > a);
    }
}
