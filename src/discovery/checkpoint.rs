//! Resumable checkpoints for long discovery runs.
//!
//! A checkpoint is a JSON snapshot of the expansion state and neighbor cache,
//! stored under a file name derived from the seed set. It is only reused when
//! the seed set (in any order), depth, fan-out cap and predicate all match and
//! it is younger than the freshness window; anything else is a miss.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ExpansionState, RunParams};
use crate::cache::{CacheEntry, NeighborCache};
use crate::config::CheckpointConfig;
use crate::error::{KgbridgeError, Result};
use crate::graph::{AdjacencyGraph, EdgeStore, NodeInfo};
use crate::source::{QuerySignature, RelationshipTuple};

/// On-disk checkpoint format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryState {
    /// Seed ids of the run.
    pub entities: Vec<String>,
    pub max_depth: usize,
    pub fan_out_cap: usize,
    pub predicate: String,
    pub all_nodes: Vec<NodeInfo>,
    pub adjacency_list: AdjacencyGraph,
    pub edges: EdgeStore,
    pub visited: Vec<String>,
    pub queue: Vec<(String, usize)>,
    /// `[signature key, tuples]`; a null value is a cached failure.
    pub cache: Vec<(String, Option<Vec<RelationshipTuple>>)>,
    #[serde(default)]
    pub failed_nodes: Vec<String>,
    pub processed_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl DiscoveryState {
    /// Snapshot a run in progress.
    pub fn capture(params: &RunParams, state: &ExpansionState, cache: &NeighborCache) -> Self {
        Self {
            entities: params.seeds.clone(),
            max_depth: params.max_depth,
            fan_out_cap: params.fan_out_cap,
            predicate: params.predicate.clone(),
            all_nodes: state.nodes.values().cloned().collect(),
            adjacency_list: state.graph.clone(),
            edges: state.edges.clone(),
            visited: state.nodes.keys().cloned().collect(),
            queue: state.queue.iter().cloned().collect(),
            cache: cache
                .iter()
                .map(|(signature, entry)| {
                    (signature.key(), entry.tuples().map(<[_]>::to_vec))
                })
                .collect(),
            failed_nodes: state.failed.iter().cloned().collect(),
            processed_count: state.processed,
            timestamp: Utc::now(),
        }
    }

    /// Rebuild expansion state and cache. Fails on internally inconsistent data.
    pub fn restore(self) -> Result<(ExpansionState, NeighborCache)> {
        let nodes: BTreeMap<String, NodeInfo> = self
            .all_nodes
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect();

        if let Some(missing) = self.visited.iter().find(|id| !nodes.contains_key(*id)) {
            return Err(KgbridgeError::Checkpoint(format!(
                "visited node {} has no node record",
                missing
            )));
        }
        if let Some((missing, _)) = self.queue.iter().find(|(id, _)| !nodes.contains_key(id)) {
            return Err(KgbridgeError::Checkpoint(format!(
                "queued node {} was never visited",
                missing
            )));
        }

        let mut entries = Vec::with_capacity(self.cache.len());
        for (key, value) in self.cache {
            let signature = QuerySignature::from_key(&key).ok_or_else(|| {
                KgbridgeError::Checkpoint(format!("bad cache key '{}'", key))
            })?;
            let entry = match value {
                Some(tuples) => CacheEntry::Tuples(tuples),
                None => CacheEntry::Failed,
            };
            entries.push((signature, entry));
        }

        let state = ExpansionState {
            nodes,
            queue: self.queue.into_iter().collect::<VecDeque<_>>(),
            graph: self.adjacency_list,
            edges: self.edges,
            failed: self.failed_nodes.into_iter().collect::<BTreeSet<_>>(),
            processed: self.processed_count,
        };
        Ok((state, NeighborCache::from_entries(entries)))
    }

    /// True if this checkpoint was written for the same run parameters.
    pub fn matches(&self, params: &RunParams) -> bool {
        seed_set(&self.entities) == seed_set(&params.seeds)
            && self.max_depth == params.max_depth
            && self.fan_out_cap == params.fan_out_cap
            && self.predicate == params.predicate
    }
}

fn seed_set(seeds: &[String]) -> BTreeSet<&str> {
    seeds.iter().map(String::as_str).collect()
}

/// Directory of checkpoint files, one per seed set.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    interval: usize,
    freshness: Duration,
}

impl CheckpointStore {
    pub fn new(dir: impl AsRef<Path>, interval: usize, freshness: Duration) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            interval: interval.max(1),
            freshness,
        }
    }

    /// `None` when checkpointing is disabled.
    pub fn from_config(config: &CheckpointConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(&config.dir, config.interval, config.freshness()))
    }

    /// Save after this many expanded nodes.
    pub fn interval(&self) -> usize {
        self.interval
    }

    /// File used for a seed set; independent of seed order.
    pub fn path_for(&self, seeds: &[String]) -> PathBuf {
        let mut hasher = Sha256::new();
        for seed in seed_set(seeds) {
            hasher.update(seed.as_bytes());
            hasher.update(b"\n");
        }
        let digest = format!("{:x}", hasher.finalize());
        self.dir.join(format!("discovery-{}.json", &digest[..16]))
    }

    /// Write a checkpoint, replacing any previous one for the same seeds.
    pub fn save(&self, state: &DiscoveryState) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&state.entities);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(state)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Read the checkpoint for a seed set, if one exists.
    pub fn load(&self, seeds: &[String]) -> Result<Option<DiscoveryState>> {
        let path = self.path_for(seeds);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        let state = serde_json::from_slice(&bytes).map_err(|e| {
            KgbridgeError::Checkpoint(format!("{} is corrupt: {}", path.display(), e))
        })?;
        Ok(Some(state))
    }

    /// A checkpoint usable for `params`, or `None` (missing, corrupt,
    /// mismatched or stale checkpoints are all treated as a miss).
    pub fn load_matching(&self, params: &RunParams) -> Option<DiscoveryState> {
        let state = match self.load(&params.seeds) {
            Ok(Some(state)) => state,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Discarding checkpoint: {}", e);
                return None;
            }
        };

        if !state.matches(params) {
            log::info!("Discarding checkpoint: written for different run parameters");
            return None;
        }

        let age = Utc::now().signed_duration_since(state.timestamp);
        // A negative age means the clock moved backwards; the file can't be trusted.
        let Ok(age) = age.to_std() else {
            log::info!(
                "Discarding checkpoint: timestamp {} is in the future",
                state.timestamp.to_rfc3339()
            );
            return None;
        };
        if age > self.freshness {
            log::info!(
                "Discarding checkpoint: {} hours old",
                age.as_secs() / 3600
            );
            return None;
        }

        Some(state)
    }

    /// Delete the checkpoint for a seed set. Returns true if one existed.
    pub fn clear(&self, seeds: &[String]) -> Result<bool> {
        let path = self.path_for(seeds);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn params() -> RunParams {
        RunParams {
            seeds: vec!["HGNC:2908".to_string(), "HGNC:2364".to_string()],
            max_depth: 2,
            fan_out_cap: 50,
            predicate: String::new(),
        }
    }

    fn tuple(s: &str, o: &str) -> RelationshipTuple {
        RelationshipTuple {
            subject_id: s.to_string(),
            subject_name: format!("{} name", s),
            predicate: "biolink:interacts_with".to_string(),
            object_id: o.to_string(),
            object_name: format!("{} name", o),
            evidence: vec!["PMID:42".to_string()],
        }
    }

    /// A run half-way through depth 1.
    fn sample_state() -> (ExpansionState, NeighborCache) {
        let params = params();
        let mut state = ExpansionState::seeded(&params.seeds, params.max_depth);
        state.queue.clear();
        let shared = tuple("HGNC:2908", "UMLS:C0037083");
        state.graph.add_edge("HGNC:2908", "UMLS:C0037083");
        state.edges.record(&shared);
        state.nodes.insert(
            "UMLS:C0037083".to_string(),
            NodeInfo {
                id: "UMLS:C0037083".to_string(),
                name: "UMLS:C0037083 name".to_string(),
                depth: 1,
            },
        );
        state.queue.push_back(("UMLS:C0037083".to_string(), 1));
        state.failed.insert("HGNC:2364".to_string());
        state.processed = 2;

        let mut cache = NeighborCache::new();
        cache.put(
            QuerySignature::outgoing("HGNC:2908", ""),
            CacheEntry::Tuples(vec![shared]),
        );
        cache.put(QuerySignature::incoming("HGNC:2364", ""), CacheEntry::Failed);
        (state, cache)
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path(), 10, Duration::from_secs(3600));
        let (state, cache) = sample_state();

        let snapshot = DiscoveryState::capture(&params(), &state, &cache);
        let path = store.save(&snapshot).unwrap();
        assert!(path.exists());

        let loaded = store.load_matching(&params()).unwrap();
        let (restored_state, restored_cache) = loaded.restore().unwrap();
        assert_eq!(restored_state.graph, state.graph);
        assert_eq!(restored_state, state);
        assert_eq!(restored_cache, cache);
        assert_eq!(restored_cache.failure_count(), 1);
    }

    #[test]
    fn test_file_uses_camel_case_fields() {
        let (state, cache) = sample_state();
        let snapshot = DiscoveryState::capture(&params(), &state, &cache);
        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();
        for key in ["entities", "allNodes", "adjacencyList", "visited", "queue", "cache", "processedCount", "timestamp"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json["adjacencyList"][0].is_array());
    }

    #[test]
    fn test_path_independent_of_seed_order() {
        let store = CheckpointStore::new("/tmp/ckpt", 10, Duration::from_secs(60));
        let forward = store.path_for(&params().seeds);
        let mut reversed = params().seeds;
        reversed.reverse();
        assert_eq!(forward, store.path_for(&reversed));
        let other = store.path_for(&["HGNC:1".to_string(), "HGNC:2".to_string()]);
        assert_ne!(forward, other);
    }

    #[test]
    fn test_mismatched_parameters_are_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path(), 10, Duration::from_secs(3600));
        let (state, cache) = sample_state();
        store
            .save(&DiscoveryState::capture(&params(), &state, &cache))
            .unwrap();

        let deeper = RunParams {
            max_depth: 3,
            ..params()
        };
        assert!(store.load_matching(&deeper).is_none());

        let filtered = RunParams {
            predicate: "biolink:regulates".to_string(),
            ..params()
        };
        assert!(store.load_matching(&filtered).is_none());
    }

    #[test]
    fn test_stale_checkpoint_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path(), 10, Duration::from_secs(24 * 3600));
        let (state, cache) = sample_state();
        let mut snapshot = DiscoveryState::capture(&params(), &state, &cache);
        snapshot.timestamp = Utc::now() - chrono::Duration::hours(25);
        store.save(&snapshot).unwrap();

        assert!(store.load(&params().seeds).unwrap().is_some());
        assert!(store.load_matching(&params()).is_none());
    }

    #[test]
    fn test_future_checkpoint_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path(), 10, Duration::from_secs(24 * 3600));
        let (state, cache) = sample_state();
        let mut snapshot = DiscoveryState::capture(&params(), &state, &cache);
        snapshot.timestamp = Utc::now() + chrono::Duration::hours(1);
        store.save(&snapshot).unwrap();

        assert!(store.load(&params().seeds).unwrap().is_some());
        assert!(store.load_matching(&params()).is_none());
    }

    #[test]
    fn test_huge_freshness_window_from_config() {
        let config = CheckpointConfig {
            freshness_hours: u64::MAX,
            ..CheckpointConfig::default()
        };
        let store = CheckpointStore::from_config(&config).unwrap();
        assert_eq!(store.freshness, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_corrupt_checkpoint_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path(), 10, Duration::from_secs(3600));
        let path = store.path_for(&params().seeds);
        std::fs::write(&path, b"{\"entities\": [").unwrap();

        assert!(matches!(
            store.load(&params().seeds),
            Err(KgbridgeError::Checkpoint(_))
        ));
        assert!(store.load_matching(&params()).is_none());
    }

    #[test]
    fn test_inconsistent_checkpoint_fails_restore() {
        let (state, cache) = sample_state();
        let mut snapshot = DiscoveryState::capture(&params(), &state, &cache);
        snapshot.queue.push(("GO:404".to_string(), 1));
        assert!(snapshot.restore().is_err());
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path(), 10, Duration::from_secs(3600));
        let (state, cache) = sample_state();
        store
            .save(&DiscoveryState::capture(&params(), &state, &cache))
            .unwrap();
        assert!(store.clear(&params().seeds).unwrap());
        assert!(!store.clear(&params().seeds).unwrap());
        assert!(store.load(&params().seeds).unwrap().is_none());
    }

    #[test]
    fn test_from_config_disabled() {
        let config = CheckpointConfig {
            enabled: false,
            ..CheckpointConfig::default()
        };
        assert!(CheckpointStore::from_config(&config).is_none());
        let enabled = CheckpointStore::from_config(&CheckpointConfig::default()).unwrap();
        assert_eq!(enabled.interval(), 25);
    }
}
