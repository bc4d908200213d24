use std::collections::BTreeMap;

use crate::source::{FetchError, QuerySignature, RelationshipTuple};

/// Outcome of one source query as remembered by the cache.
///
/// Failures are stored explicitly so a query that already failed in the
/// parallel pass is not re-issued until a retry pass invalidates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    Tuples(Vec<RelationshipTuple>),
    Failed,
}

impl CacheEntry {
    pub fn is_failure(&self) -> bool {
        matches!(self, CacheEntry::Failed)
    }

    pub fn tuples(&self) -> Option<&[RelationshipTuple]> {
        match self {
            CacheEntry::Tuples(tuples) => Some(tuples),
            CacheEntry::Failed => None,
        }
    }
}

impl From<&std::result::Result<Vec<RelationshipTuple>, FetchError>> for CacheEntry {
    fn from(result: &std::result::Result<Vec<RelationshipTuple>, FetchError>) -> Self {
        match result {
            Ok(tuples) => CacheEntry::Tuples(tuples.clone()),
            Err(_) => CacheEntry::Failed,
        }
    }
}

/// Per-run memo of source query results, keyed by query signature.
///
/// Owned by a single discovery run; never shared between runs. A disabled
/// cache stores nothing and always misses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborCache {
    enabled: bool,
    entries: BTreeMap<QuerySignature, CacheEntry>,
}

impl Default for NeighborCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborCache {
    /// Create an empty, enabled cache.
    pub fn new() -> Self {
        Self {
            enabled: true,
            entries: BTreeMap::new(),
        }
    }

    /// Create a cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            entries: BTreeMap::new(),
        }
    }

    /// Rebuild a cache from persisted entries.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (QuerySignature, CacheEntry)>,
    {
        Self {
            enabled: true,
            entries: entries.into_iter().collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a signature. Lookups never mutate the cache.
    pub fn get(&self, signature: &QuerySignature) -> Option<&CacheEntry> {
        if !self.enabled {
            return None;
        }
        self.entries.get(signature)
    }

    /// Store a result, replacing any previous entry for the signature.
    pub fn put(&mut self, signature: QuerySignature, entry: CacheEntry) {
        if self.enabled {
            self.entries.insert(signature, entry);
        }
    }

    /// Drop an entry so the next lookup misses (used before a retry).
    pub fn invalidate(&mut self, signature: &QuerySignature) -> Option<CacheEntry> {
        self.entries.remove(signature)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of cached failure sentinels.
    pub fn failure_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_failure()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuerySignature, &CacheEntry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(node: &str) -> QuerySignature {
        QuerySignature::outgoing(node, "")
    }

    fn tuples() -> Vec<RelationshipTuple> {
        vec![RelationshipTuple {
            subject_id: "HGNC:1".to_string(),
            subject_name: "A".to_string(),
            predicate: "biolink:interacts_with".to_string(),
            object_id: "HGNC:2".to_string(),
            object_name: "B".to_string(),
            evidence: vec!["PMID:1".to_string()],
        }]
    }

    #[test]
    fn test_cache_put_and_get() {
        let mut cache = NeighborCache::new();
        cache.put(sig("HGNC:1"), CacheEntry::Tuples(tuples()));
        let entry = cache.get(&sig("HGNC:1")).unwrap();
        assert_eq!(entry.tuples().unwrap().len(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let cache = NeighborCache::new();
        assert!(cache.get(&sig("HGNC:404")).is_none());
    }

    #[test]
    fn test_repeated_lookups_are_idempotent() {
        let mut cache = NeighborCache::new();
        cache.put(sig("HGNC:1"), CacheEntry::Tuples(tuples()));
        let before = cache.clone();
        for _ in 0..5 {
            assert_eq!(cache.get(&sig("HGNC:1")), Some(&CacheEntry::Tuples(tuples())));
        }
        assert_eq!(cache, before);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_replaces_without_duplicating() {
        let mut cache = NeighborCache::new();
        cache.put(sig("HGNC:1"), CacheEntry::Failed);
        cache.put(sig("HGNC:1"), CacheEntry::Tuples(tuples()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.failure_count(), 0);
    }

    #[test]
    fn test_failures_are_cached_and_invalidatable() {
        let mut cache = NeighborCache::new();
        let failed: std::result::Result<Vec<RelationshipTuple>, FetchError> =
            Err(FetchError::Timeout);
        cache.put(sig("HGNC:1"), CacheEntry::from(&failed));
        assert!(cache.get(&sig("HGNC:1")).unwrap().is_failure());
        assert_eq!(cache.failure_count(), 1);

        assert_eq!(cache.invalidate(&sig("HGNC:1")), Some(CacheEntry::Failed));
        assert!(cache.get(&sig("HGNC:1")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_cache_always_misses() {
        let mut cache = NeighborCache::disabled();
        cache.put(sig("HGNC:1"), CacheEntry::Tuples(tuples()));
        assert!(cache.get(&sig("HGNC:1")).is_none());
        assert!(cache.is_empty());
        assert!(!cache.is_enabled());
    }
}
