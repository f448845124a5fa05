use std::sync::Arc;

use super::filter::{CollectionFilter, ShardFilter};
use crate::core::{
    CatalogError, CatalogResult, CollectionRecord, CollectionState, FileType, ShardId, ShardRecord,
};

/// Immutable view of catalog records.
///
/// Mutations return a new snapshot (copy-on-write), so a read session can hold
/// one for its whole lifetime without blocking writers.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    collections: Arc<Vec<CollectionRecord>>,
    files: Arc<Vec<ShardRecord>>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(self, record: CollectionRecord) -> CatalogResult<Self> {
        if record.table_id.trim().is_empty() {
            return Err(CatalogError::Backend("table_id must not be empty".into()));
        }
        if self.collection_exists(&record.table_id) {
            return Err(CatalogError::Backend(format!(
                "Collection '{}' already exists",
                record.table_id
            )));
        }

        let mut collections = (*self.collections).clone();
        collections.push(record);

        Ok(Self {
            collections: Arc::new(collections),
            files: self.files,
        })
    }

    pub fn with_state(self, table_id: &str, state: CollectionState) -> CatalogResult<Self> {
        let position = self
            .collections
            .iter()
            .position(|c| c.table_id == table_id)
            .ok_or_else(|| CatalogError::Backend(format!("Collection '{}' not found", table_id)))?;

        let mut collections = (*self.collections).clone();
        collections[position].state = state;

        Ok(Self {
            collections: Arc::new(collections),
            files: self.files,
        })
    }

    pub fn with_file(self, file: ShardRecord) -> CatalogResult<Self> {
        if self.files.iter().any(|f| f.id == file.id) {
            return Err(CatalogError::Backend(format!("File {} already exists", file.id)));
        }

        let mut files = (*self.files).clone();
        files.push(file);

        Ok(Self {
            collections: self.collections,
            files: Arc::new(files),
        })
    }

    /// Rewrite one file record in place.
    pub fn map_file(
        self,
        id: ShardId,
        update: impl FnOnce(&mut ShardRecord),
    ) -> CatalogResult<Self> {
        let position = self
            .files
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| CatalogError::Backend(format!("File {} not found", id)))?;

        let mut files = (*self.files).clone();
        update(&mut files[position]);

        Ok(Self {
            collections: self.collections,
            files: Arc::new(files),
        })
    }

    pub fn collection_exists(&self, table_id: &str) -> bool {
        self.collections.iter().any(|c| c.table_id == table_id)
    }

    pub fn collections(&self) -> &[CollectionRecord] {
        &self.collections
    }

    pub fn files(&self) -> &[ShardRecord] {
        &self.files
    }

    /// Matching collection records in insertion order.
    pub fn select_collections(&self, filter: &CollectionFilter) -> Vec<CollectionRecord> {
        self.collections
            .iter()
            .filter(|c| filter.matches(*c))
            .cloned()
            .collect()
    }

    /// Matching file records in insertion order.
    pub fn select_files(&self, filter: &ShardFilter) -> Vec<ShardRecord> {
        self.files
            .iter()
            .filter(|f| filter.matches(*f))
            .cloned()
            .collect()
    }

    pub fn set_file_type(self, id: ShardId, file_type: FileType) -> CatalogResult<Self> {
        self.map_file(id, |f| f.file_type = file_type)
    }
}
