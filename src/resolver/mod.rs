//! Collection and partition resolution against the metadata catalog.

pub mod tags;

pub use tags::{ExactTagMatcher, RegexTagMatcher, TagMatchMode, TagMatcher, matcher_for};

use crate::core::{
    CallMetadata, CollectionRecord, CollectionState, FileType, Result, RouterError, ShardRecord,
};
use crate::storage::{
    CollectionField, CollectionFilter, MetadataCatalog, SessionGuard, ShardField, ShardFilter,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const DEFAULT_PARTITION_TAG: &str = "_default";

/// Resolves a collection (optionally narrowed to partition tags) into the
/// routable shard records that hold its data.
pub struct MetadataResolver {
    catalog: Arc<dyn MetadataCatalog>,
    matcher: Arc<dyn TagMatcher>,
    default_partition_tag: String,
}

impl MetadataResolver {
    pub fn new(catalog: Arc<dyn MetadataCatalog>, matcher: Arc<dyn TagMatcher>) -> Self {
        Self {
            catalog,
            matcher,
            default_partition_tag: DEFAULT_PARTITION_TAG.to_string(),
        }
    }

    pub fn with_default_partition_tag(mut self, tag: impl Into<String>) -> Self {
        self.default_partition_tag = tag.into();
        self
    }

    pub fn catalog(&self) -> &Arc<dyn MetadataCatalog> {
        &self.catalog
    }

    /// Collection records eligible for `name`.
    ///
    /// Without tags: the collection itself and all of its partitions. With
    /// tags: its partitions, plus the collection itself when the default
    /// partition tag is requested.
    pub fn membership_filter(&self, name: &str, tags: Option<&[String]>) -> CollectionFilter {
        let live =
            || CollectionFilter::not_equals(CollectionField::State, CollectionState::ToDelete);

        match tags {
            None => CollectionFilter::equals(CollectionField::TableId, name)
                .or(CollectionFilter::equals(CollectionField::OwnerTable, name))
                .and(live()),
            Some(tags) => {
                let partitions =
                    CollectionFilter::equals(CollectionField::OwnerTable, name).and(live());
                if tags.iter().any(|t| *t == self.default_partition_tag) {
                    let default_partition =
                        CollectionFilter::equals(CollectionField::TableId, name).and(live());
                    partitions.or(default_partition)
                } else {
                    partitions
                }
            }
        }
    }

    /// Collection ids whose files must be searched, de-duplicated in
    /// first-seen order.
    pub fn collect_table_ids(
        &self,
        name: &str,
        tags: Option<&[String]>,
        records: &[CollectionRecord],
    ) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(records.len());
        let mut push = |id: &str| {
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        };

        match tags {
            None => records.iter().for_each(|r| push(&r.table_id)),
            Some(tags) => {
                for record in records {
                    if record.table_id == name {
                        push(name);
                        continue;
                    }
                    // first matching tag wins
                    if tags
                        .iter()
                        .any(|tag| self.matcher.matches(tag, &record.partition_tag))
                    {
                        push(&record.table_id);
                    }
                }
            }
        }

        ids
    }

    pub fn shard_filter(table_ids: &[String]) -> ShardFilter {
        ShardFilter::one_of(ShardField::FileType, FileType::ROUTABLE)
            .and(ShardFilter::one_of(ShardField::TableId, table_ids.iter().cloned()))
    }

    /// Routable shards for `name` in catalog order.
    ///
    /// The catalog session is released before this returns, on success and
    /// on every error path.
    pub async fn resolve(
        &self,
        name: &str,
        tags: Option<&[String]>,
        metadata: Option<&CallMetadata>,
    ) -> Result<Vec<ShardRecord>> {
        let tags = tags.filter(|t| !t.is_empty());
        let catalog_error = |e| RouterError::catalog(e, metadata.cloned());

        let mut session = SessionGuard::acquire(self.catalog.as_ref())
            .await
            .map_err(catalog_error)?;

        let membership = self.membership_filter(name, tags);
        debug!(collection = name, filter = %membership, "querying collections");
        let collections = session
            .query_collections(&membership)
            .await
            .map_err(catalog_error)?;

        if collections.is_empty() {
            error!(
                collection = name,
                tags = ?tags,
                url = %self.catalog.url(),
                "Cannot find collection in metadata during routing"
            );
            return Err(RouterError::not_found(name, tags, metadata.cloned()));
        }

        let table_ids = self.collect_table_ids(name, tags, &collections);
        let shard_filter = Self::shard_filter(&table_ids);
        debug!(collection = name, filter = %shard_filter, "querying files");
        let files = session
            .query_shards(&shard_filter)
            .await
            .map_err(catalog_error)?;

        if files.is_empty() {
            warn!(collection = name, tables = ?table_ids, "Collection file is empty");
        }

        session.close();
        Ok(files)
    }
}
