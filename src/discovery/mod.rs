//! Connecting-path discovery: one run from seed ids to a renderable subgraph.
//!
//! A run is driven by a [`DiscoveryContext`] that owns everything mutable for
//! that run (expansion state, neighbor cache, statistics). Nothing is shared
//! between runs, so concurrent discoveries for different seed sets cannot
//! interfere with each other.
//!
//! Pipeline: frontier expansion (see `expander`) → path extraction →
//! leaf pruning → materialization.

pub mod checkpoint;
mod expander;

pub use checkpoint::{CheckpointStore, DiscoveryState};
pub use expander::ExpansionState;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::NeighborCache;
use crate::config::Config;
use crate::entity::parse_seeds;
use crate::error::{KgbridgeError, Result};
use crate::graph::{extract_paths, prune_leaves, AdjacencyGraph};
use crate::materialize::{materialize, GraphPayload};
use crate::source::{NeighborFilter, RelationshipSource};

/// Deepest hop bound accepted for a run.
pub const MAX_SUPPORTED_DEPTH: usize = 4;

/// Inbound request from the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRequest {
    pub seed_entity_ids: Vec<String>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Restrict source queries to one predicate.
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub fan_out_cap: Option<usize>,
}

impl DiscoveryRequest {
    pub fn new<S: Into<String>>(seeds: impl IntoIterator<Item = S>) -> Self {
        Self {
            seed_entity_ids: seeds.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_fan_out_cap(mut self, fan_out_cap: usize) -> Self {
        self.fan_out_cap = Some(fan_out_cap);
        self
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }
}

/// Engine-wide settings shared by every run (request values override the
/// per-run defaults).
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub max_depth: usize,
    pub fan_out_cap: usize,
    /// In-flight source queries during the parallel pass.
    pub concurrency: usize,
    pub retry_passes: usize,
    /// Pause before each sequential retry.
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub filter: NeighborFilter,
    pub cache_enabled: bool,
    pub checkpoint: Option<CheckpointStore>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_depth: 2,
            fan_out_cap: 50,
            concurrency: 5,
            retry_passes: 1,
            retry_delay: Duration::from_millis(1200),
            request_timeout: Duration::from_secs(30),
            filter: NeighborFilter::default(),
            cache_enabled: true,
            checkpoint: None,
        }
    }
}

impl DiscoverySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_depth: config.discovery.max_depth,
            fan_out_cap: config.discovery.fan_out_cap,
            concurrency: config.discovery.concurrency,
            retry_passes: config.discovery.retry_passes,
            retry_delay: config.retry_delay(),
            request_timeout: config.request_timeout(),
            filter: NeighborFilter::from_config(&config.source),
            cache_enabled: config.discovery.cache_enabled,
            checkpoint: CheckpointStore::from_config(&config.checkpoint),
        }
    }
}

/// Validated parameters of a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    pub seeds: Vec<String>,
    pub max_depth: usize,
    pub fan_out_cap: usize,
    /// Empty string means any predicate.
    pub predicate: String,
}

impl RunParams {
    /// Validate a request against the settings. No network access happens here.
    pub fn resolve(request: &DiscoveryRequest, settings: &DiscoverySettings) -> Result<Self> {
        let seeds = parse_seeds(&request.seed_entity_ids)?
            .into_iter()
            .map(String::from)
            .collect();

        let max_depth = request.max_depth.unwrap_or(settings.max_depth);
        if max_depth == 0 || max_depth > MAX_SUPPORTED_DEPTH {
            return Err(KgbridgeError::InvalidInput(format!(
                "max depth must be between 1 and {}, got {}",
                MAX_SUPPORTED_DEPTH, max_depth
            )));
        }

        let fan_out_cap = request.fan_out_cap.unwrap_or(settings.fan_out_cap);
        if fan_out_cap == 0 {
            return Err(KgbridgeError::InvalidInput(
                "fan-out cap must be greater than 0".to_string(),
            ));
        }

        let predicate = request
            .predicate
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string();

        Ok(Self {
            seeds,
            max_depth,
            fan_out_cap,
            predicate,
        })
    }
}

/// Counters reported alongside the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryStats {
    pub run_id: String,
    pub seed_count: usize,
    pub max_depth: usize,
    pub nodes_discovered: usize,
    pub edges_discovered: usize,
    pub nodes_expanded: usize,
    pub failed_node_count: usize,
    pub capped_node_count: usize,
    pub network_calls: usize,
    pub cache_hits: usize,
    pub retried_queries: usize,
    pub recovered_queries: usize,
    pub path_count: usize,
    pub pruned_node_count: usize,
    pub pruned_edge_count: usize,
    pub resumed_from_checkpoint: bool,
    pub elapsed_ms: u64,
}

/// `{nodes, edges, paths, stats}` as handed to the rendering collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    #[serde(flatten)]
    pub graph: GraphPayload,
    pub stats: DiscoveryStats,
}

/// Everything mutable about one discovery run.
pub struct DiscoveryContext {
    run_id: Uuid,
    params: RunParams,
    settings: DiscoverySettings,
    cache: NeighborCache,
    state: ExpansionState,
    stats: DiscoveryStats,
}

impl DiscoveryContext {
    /// Validate the request and prepare a fresh run.
    pub fn new(request: &DiscoveryRequest, settings: DiscoverySettings) -> Result<Self> {
        let params = RunParams::resolve(request, &settings)?;
        let cache = if settings.cache_enabled {
            NeighborCache::new()
        } else {
            NeighborCache::disabled()
        };
        let state = ExpansionState::seeded(&params.seeds, params.max_depth);
        let run_id = Uuid::new_v4();
        let stats = DiscoveryStats {
            run_id: run_id.to_string(),
            seed_count: params.seeds.len(),
            max_depth: params.max_depth,
            ..DiscoveryStats::default()
        };

        Ok(Self {
            run_id,
            params,
            settings,
            cache,
            state,
            stats,
        })
    }

    /// Start from a pre-populated cache (e.g. from an earlier run on the same seeds).
    pub fn with_cache(mut self, cache: NeighborCache) -> Self {
        if self.settings.cache_enabled {
            self.cache = cache;
        }
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn params(&self) -> &RunParams {
        &self.params
    }

    pub fn cache(&self) -> &NeighborCache {
        &self.cache
    }

    pub fn state(&self) -> &ExpansionState {
        &self.state
    }

    /// The bounded (unpruned) graph collected so far.
    pub fn graph(&self) -> &AdjacencyGraph {
        &self.state.graph
    }

    /// Expand, extract paths, prune and materialize.
    pub async fn run<S: RelationshipSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<DiscoveryResult> {
        let started = Instant::now();
        log::info!(
            "Discovery run {} started: seeds={:?} max_depth={} fan_out_cap={} predicate={}",
            self.run_id,
            self.params.seeds,
            self.params.max_depth,
            self.params.fan_out_cap,
            if self.params.predicate.is_empty() { "*" } else { self.params.predicate.as_str() }
        );

        self.resume_from_checkpoint();
        self.expand(source).await;

        let paths = extract_paths(&self.state.graph, &self.params.seeds, self.params.max_depth);

        let mut pruned = self.state.graph.clone();
        prune_leaves(&mut pruned, &self.params.seeds);

        let graph = materialize(
            &pruned,
            &self.state.nodes,
            &self.state.edges,
            &self.params.seeds,
            paths,
        );

        self.stats.nodes_discovered = self.state.graph.node_count();
        self.stats.edges_discovered = self.state.graph.edge_count();
        self.stats.nodes_expanded = self.state.processed;
        self.stats.failed_node_count = self.state.failed.len();
        self.stats.path_count = graph.paths.len();
        self.stats.pruned_node_count = pruned.node_count();
        self.stats.pruned_edge_count = pruned.edge_count();
        self.stats.elapsed_ms = started.elapsed().as_millis() as u64;

        log::info!(
            "Discovery run {} finished in {}ms: {} nodes / {} edges collected, {} paths, {} nodes / {} edges after pruning, {} failed nodes, {} network calls",
            self.run_id,
            self.stats.elapsed_ms,
            self.stats.nodes_discovered,
            self.stats.edges_discovered,
            self.stats.path_count,
            self.stats.pruned_node_count,
            self.stats.pruned_edge_count,
            self.stats.failed_node_count,
            self.stats.network_calls
        );

        Ok(DiscoveryResult {
            graph,
            stats: self.stats.clone(),
        })
    }

    /// Swap in a matching checkpoint, if the store has one.
    fn resume_from_checkpoint(&mut self) {
        let Some(store) = &self.settings.checkpoint else {
            return;
        };
        let Some(saved) = store.load_matching(&self.params) else {
            return;
        };
        match saved.restore() {
            Ok((state, cache)) => {
                log::info!(
                    "Run {} resuming from checkpoint: {} nodes visited, {} queued, {} cached queries",
                    self.run_id,
                    state.nodes.len(),
                    state.queue.len(),
                    cache.len()
                );
                self.state = state;
                if self.cache.is_enabled() {
                    for (signature, entry) in cache.iter() {
                        self.cache.put(signature.clone(), entry.clone());
                    }
                }
                self.stats.resumed_from_checkpoint = true;
            }
            Err(e) => log::warn!("Ignoring unusable checkpoint: {}", e),
        }
    }

    fn save_checkpoint(&self) {
        let Some(store) = &self.settings.checkpoint else {
            return;
        };
        let snapshot = DiscoveryState::capture(&self.params, &self.state, &self.cache);
        match store.save(&snapshot) {
            Ok(path) => log::debug!(
                "Checkpoint saved to {} ({} nodes processed)",
                path.display(),
                self.state.processed
            ),
            Err(e) => log::warn!("Failed to save checkpoint: {}", e),
        }
    }
}

/// Run a complete discovery for `request` against `source`.
pub async fn discover<S: RelationshipSource + ?Sized>(
    source: &S,
    request: &DiscoveryRequest,
    settings: &DiscoverySettings,
) -> Result<DiscoveryResult> {
    let mut context = DiscoveryContext::new(request, settings.clone())?;
    context.run(source).await
}
