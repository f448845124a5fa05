use crate::core::CallMetadata;
use serde::{Deserialize, Serialize};

/// Inclusive range filter accepted with a routing request.
///
/// Carried through unchanged; shards are not pruned by range yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRange {
    pub start: i64,
    pub end: i64,
}

impl QueryRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
}

/// One routing call as issued by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub collection_name: String,
    #[serde(default)]
    pub partition_tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<CallMetadata>,
    #[serde(default)]
    pub range_array: Option<Vec<QueryRange>>,
}

impl RoutingRequest {
    pub fn new(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            partition_tags: None,
            metadata: None,
            range_array: None,
        }
    }

    pub fn partition_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn metadata(mut self, metadata: CallMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn range_array(mut self, ranges: Vec<QueryRange>) -> Self {
        self.range_array = Some(ranges);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = RoutingRequest::new("C")
            .partition_tags(["p1", "p2"])
            .metadata(CallMetadata::new().with("request_id", "r-9"))
            .range_array(vec![QueryRange::new(0, 10)]);

        assert_eq!(request.collection_name, "C");
        assert_eq!(
            request.partition_tags,
            Some(vec!["p1".to_string(), "p2".to_string()])
        );
        assert_eq!(request.range_array.map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_request_from_json() {
        let request: RoutingRequest =
            serde_json::from_str(r#"{"collection_name": "C", "metadata": {"trace": "t"}}"#)
                .unwrap();
        assert!(request.partition_tags.is_none());
        assert_eq!(request.metadata.unwrap().get("trace"), Some("t"));
    }
}
