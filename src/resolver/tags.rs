use lru::LruCache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

const PATTERN_CACHE_CAPACITY: usize = 256;

lazy_static::lazy_static! {
    // `None` marks a tag that does not compile as a pattern.
    static ref PATTERN_LRU_CACHE: Mutex<LruCache<String, Option<Arc<Regex>>>> = Mutex::new(
        LruCache::new(NonZeroUsize::new(PATTERN_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    );
}

/// How requested partition tags are compared with stored partition tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMatchMode {
    /// Regular expression anchored at the start of the stored tag.
    #[default]
    Regex,
    /// Plain string equality.
    Exact,
}

/// Decides whether a requested tag selects a stored partition tag.
pub trait TagMatcher: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn matches(&self, requested: &str, partition_tag: &str) -> bool;
}

/// Treats the requested tag as a regular expression that must match at the
/// beginning of the stored tag. `"2024"` therefore selects `"2024-01"`, while
/// `"2024$"` selects only `"2024"`.
///
/// A tag that is not a valid expression is compared literally.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexTagMatcher;

impl RegexTagMatcher {
    fn compiled(requested: &str) -> Option<Arc<Regex>> {
        {
            let mut cache = PATTERN_LRU_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.get(requested) {
                return entry.clone();
            }
        }

        let compiled = match Regex::new(requested) {
            Ok(regex) => Some(Arc::new(regex)),
            Err(err) => {
                tracing::debug!(
                    tag = requested,
                    error = %err,
                    "partition tag is not a pattern, matching literally"
                );
                None
            }
        };

        let mut cache = PATTERN_LRU_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(requested.to_string(), compiled.clone());
        compiled
    }
}

impl TagMatcher for RegexTagMatcher {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn matches(&self, requested: &str, partition_tag: &str) -> bool {
        match Self::compiled(requested) {
            // leftmost-first search: a match exists at 0 iff the first one starts there
            Some(regex) => regex.find(partition_tag).is_some_and(|m| m.start() == 0),
            None => requested == partition_tag,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactTagMatcher;

impl TagMatcher for ExactTagMatcher {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn matches(&self, requested: &str, partition_tag: &str) -> bool {
        requested == partition_tag
    }
}

pub fn matcher_for(mode: TagMatchMode) -> Arc<dyn TagMatcher> {
    match mode {
        TagMatchMode::Regex => Arc::new(RegexTagMatcher),
        TagMatchMode::Exact => Arc::new(ExactTagMatcher),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_matches_at_start_only() {
        let m = RegexTagMatcher;
        assert!(m.matches("2024", "2024-01"));
        assert!(m.matches("20\\d\\d", "2024"));
        assert!(!m.matches("01", "2024-01"));
        assert!(!m.matches("2024$", "2024-01"));
        assert!(m.matches(".*01", "2024-01"));
    }

    #[test]
    fn test_invalid_pattern_is_literal() {
        let m = RegexTagMatcher;
        assert!(m.matches("tag(", "tag("));
        assert!(!m.matches("tag(", "tag(x"));
        // second lookup is served from the cache
        assert!(m.matches("tag(", "tag("));
    }

    #[test]
    fn test_alternation_cannot_escape_start_anchor() {
        let m = RegexTagMatcher;
        // unbalanced group is not a pattern
        assert!(!m.matches("a)|(b", "xb"));
        assert!(m.matches("a)|(b", "a)|(b"));

        assert!(m.matches("a|b", "b-01"));
        assert!(!m.matches("a|b", "xb"));
        assert!(!m.matches("x|01", "2024-01"));
    }

    #[test]
    fn test_exact_matcher() {
        let m = ExactTagMatcher;
        assert!(m.matches("p1", "p1"));
        assert!(!m.matches("p", "p1"));
    }

    #[test]
    fn test_matcher_for_mode() {
        assert_eq!(matcher_for(TagMatchMode::Regex).name(), "regex");
        assert_eq!(matcher_for(TagMatchMode::Exact).name(), "exact");
        assert_eq!(TagMatchMode::default(), TagMatchMode::Regex);
    }
}
