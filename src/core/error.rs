use std::time::Duration;

use thiserror::Error;

use super::types::CallMetadata;

/// Failure raised by a metadata catalog backend.
///
/// Kept separate from "no rows": an empty query result is never an error at
/// this layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Catalog query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

impl<T> From<std::sync::PoisonError<T>> for CatalogError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum RouterError {
    /// The metadata store failed. Not retried internally.
    #[error("Catalog error: {source}")]
    Catalog {
        #[source]
        source: CatalogError,
        metadata: Option<CallMetadata>,
    },

    #[error("{collection}:{tags:?} not found in metadata")]
    NotFound {
        collection: String,
        tags: Option<Vec<String>>,
        metadata: Option<CallMetadata>,
    },

    #[error("No nodes available to serve {shards} shard(s)")]
    NoNodesAvailable {
        shards: usize,
        metadata: Option<CallMetadata>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;

impl RouterError {
    pub fn catalog(source: CatalogError, metadata: Option<CallMetadata>) -> Self {
        Self::Catalog { source, metadata }
    }

    pub fn not_found(
        collection: &str,
        tags: Option<&[String]>,
        metadata: Option<CallMetadata>,
    ) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            tags: tags.map(<[String]>::to_vec),
            metadata,
        }
    }

    /// Only backend failures may succeed on retry; an unknown collection or a
    /// missing topology will not fix itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Catalog { .. })
    }

    /// Call-context metadata attached when the error was raised.
    pub fn metadata(&self) -> Option<&CallMetadata> {
        match self {
            Self::Catalog { metadata, .. }
            | Self::NotFound { metadata, .. }
            | Self::NoNodesAvailable { metadata, .. } => metadata.as_ref(),
            Self::Configuration(_) => None,
        }
    }

    /// Attach call metadata unless the error already carries some.
    pub fn with_metadata(mut self, call: Option<CallMetadata>) -> Self {
        match &mut self {
            Self::Catalog { metadata, .. }
            | Self::NotFound { metadata, .. }
            | Self::NoNodesAvailable { metadata, .. } => {
                if metadata.is_none() {
                    *metadata = call;
                }
            }
            Self::Configuration(_) => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_not_found_message_names_collection_and_tags() {
        let tags = vec!["p1".to_string()];
        let err = RouterError::not_found("C", Some(&tags), None);
        assert_eq!(err.to_string(), "C:Some([\"p1\"]) not found in metadata");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_catalog_error_keeps_cause() {
        let err = RouterError::catalog(CatalogError::Backend("disk gone".into()), None);
        assert!(err.is_retryable());
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Backend error: disk gone"));
    }

    #[test]
    fn test_with_metadata_does_not_overwrite() {
        let first = CallMetadata::new().with("request_id", "a");
        let second = CallMetadata::new().with("request_id", "b");

        let err = RouterError::NoNodesAvailable { shards: 2, metadata: None }
            .with_metadata(Some(first.clone()))
            .with_metadata(Some(second));

        assert_eq!(err.metadata(), Some(&first));
    }

    #[test]
    fn test_poisoned_lock_maps_to_lock_error() {
        let err: CatalogError = std::sync::PoisonError::new(()).into();
        assert!(matches!(err, CatalogError::LockError(_)));
    }
}
