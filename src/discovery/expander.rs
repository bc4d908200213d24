//! Multi-source bounded BFS over the relationship source.
//!
//! Each batch of same-depth nodes is fetched in two phases: a concurrent pass
//! capped at `concurrency` in-flight queries, then strictly sequential retry
//! passes over whatever failed, with a fixed pause before every call so a
//! struggling source gets room to recover.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};

use super::DiscoveryContext;
use crate::cache::CacheEntry;
use crate::graph::{AdjacencyGraph, EdgeStore, NodeInfo};
use crate::source::{FetchError, QuerySignature, RelationshipSource, RelationshipTuple};

/// Mutable BFS state of a run; this is what checkpoints persist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    /// Every admitted node (the visited set), with depth and display name.
    pub nodes: BTreeMap<String, NodeInfo>,
    /// Nodes still waiting to be expanded, with their depth.
    pub queue: VecDeque<(String, usize)>,
    pub graph: AdjacencyGraph,
    pub edges: EdgeStore,
    /// Nodes whose own queries failed every attempt.
    pub failed: BTreeSet<String>,
    /// Number of nodes expanded so far.
    pub processed: usize,
}

impl ExpansionState {
    /// Initial state: every seed at depth 0, queued for expansion.
    pub fn seeded(seeds: &[String], max_depth: usize) -> Self {
        let mut state = Self::default();
        for seed in seeds {
            state.nodes.insert(
                seed.clone(),
                NodeInfo {
                    id: seed.clone(),
                    name: seed.clone(),
                    depth: 0,
                },
            );
            state.graph.add_node(seed);
            if max_depth > 0 {
                state.queue.push_back((seed.clone(), 0));
            }
        }
        state
    }

    /// Pop up to `limit` queued nodes that share the depth of the queue head.
    fn next_batch(&mut self, limit: usize) -> Option<(usize, Vec<String>)> {
        let depth = self.queue.front()?.1;
        let mut batch = Vec::new();
        while batch.len() < limit {
            match self.queue.front() {
                Some((_, d)) if *d == depth => {
                    if let Some((node, _)) = self.queue.pop_front() {
                        batch.push(node);
                    }
                }
                _ => break,
            }
        }
        Some((depth, batch))
    }
}

/// Source query bounded by a timeout; an elapsed timeout is a soft failure.
async fn fetch_with_timeout<S: RelationshipSource + ?Sized>(
    source: &S,
    signature: &QuerySignature,
    timeout: Duration,
) -> Result<Vec<RelationshipTuple>, FetchError> {
    match tokio::time::timeout(timeout, source.fetch_relationships(signature)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    }
}

impl DiscoveryContext {
    /// Expand the frontier until the queue is empty.
    pub(super) async fn expand<S: RelationshipSource + ?Sized>(&mut self, source: &S) {
        let batch_limit = match &self.settings.checkpoint {
            Some(store) => store.interval(),
            None => usize::MAX,
        };
        let mut processed_at_save = self.state.processed;

        while let Some((depth, batch)) = self.state.next_batch(batch_limit) {
            log::info!(
                "Run {}: expanding {} nodes at depth {} ({} still queued)",
                self.run_id,
                batch.len(),
                depth,
                self.state.queue.len()
            );

            let mut neighbors = self.fetch_batch(source, &batch).await;
            for node in &batch {
                match neighbors.remove(node).flatten() {
                    Some(tuples) => self.admit(node, depth, tuples),
                    None => {
                        log::warn!(
                            "Run {}: no neighbors for {} after retries; continuing without it",
                            self.run_id,
                            node
                        );
                        self.state.failed.insert(node.clone());
                    }
                }
                self.state.processed += 1;
            }

            if let Some(store) = &self.settings.checkpoint {
                if self.state.processed - processed_at_save >= store.interval() {
                    self.save_checkpoint();
                    processed_at_save = self.state.processed;
                }
            }
        }

        if self.state.processed != processed_at_save {
            self.save_checkpoint();
        }
    }

    /// Fetch neighbors for a batch of nodes. `None` marks a node whose queries
    /// still failed after every retry pass.
    async fn fetch_batch<S: RelationshipSource + ?Sized>(
        &mut self,
        source: &S,
        batch: &[String],
    ) -> HashMap<String, Option<Vec<RelationshipTuple>>> {
        let mut outcomes: HashMap<QuerySignature, Option<Vec<RelationshipTuple>>> = HashMap::new();
        let mut pending = Vec::new();

        for node in batch {
            for signature in QuerySignature::for_node(node, &self.params.predicate) {
                match self.cache.get(&signature) {
                    Some(entry) => {
                        self.stats.cache_hits += 1;
                        outcomes.insert(signature, entry.tuples().map(<[_]>::to_vec));
                    }
                    None => pending.push(signature),
                }
            }
        }

        // Parallel pass. Results come back as values and are merged here, so
        // the cache is only ever touched by this task.
        let timeout = self.settings.request_timeout;
        let results: Vec<(QuerySignature, Result<Vec<RelationshipTuple>, FetchError>)> =
            stream::iter(pending.into_iter().map(|signature| async move {
                let result = fetch_with_timeout(source, &signature, timeout).await;
                (signature, result)
            }))
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        for (signature, result) in results {
            self.stats.network_calls += 1;
            if let Err(e) = &result {
                log::debug!("Query {} failed: {}", signature, e);
            }
            self.cache.put(signature.clone(), CacheEntry::from(&result));
            outcomes.insert(signature, result.ok());
        }

        self.retry_failed(source, &mut outcomes).await;

        batch
            .iter()
            .map(|node| {
                let [outgoing, incoming] = QuerySignature::for_node(node, &self.params.predicate);
                let merged = match (outcomes.get(&outgoing), outcomes.get(&incoming)) {
                    (Some(Some(out)), Some(Some(inc))) => Some(
                        self.settings
                            .filter
                            .collect(node, [out.as_slice(), inc.as_slice()]),
                    ),
                    _ => None,
                };
                (node.clone(), merged)
            })
            .collect()
    }

    /// Sequential retry passes over failed queries.
    async fn retry_failed<S: RelationshipSource + ?Sized>(
        &mut self,
        source: &S,
        outcomes: &mut HashMap<QuerySignature, Option<Vec<RelationshipTuple>>>,
    ) {
        for pass in 1..=self.settings.retry_passes {
            let mut failed: Vec<QuerySignature> = outcomes
                .iter()
                .filter(|(_, outcome)| outcome.is_none())
                .map(|(signature, _)| signature.clone())
                .collect();
            if failed.is_empty() {
                return;
            }
            failed.sort();

            log::info!(
                "Run {}: retry pass {}/{} for {} failed queries ({:?} apart)",
                self.run_id,
                pass,
                self.settings.retry_passes,
                failed.len(),
                self.settings.retry_delay
            );

            for signature in failed {
                tokio::time::sleep(self.settings.retry_delay).await;
                self.cache.invalidate(&signature);
                self.stats.retried_queries += 1;
                self.stats.network_calls += 1;

                let result =
                    fetch_with_timeout(source, &signature, self.settings.request_timeout).await;
                match &result {
                    Ok(_) => self.stats.recovered_queries += 1,
                    Err(e) => log::warn!("Retry of {} failed: {}", signature, e),
                }
                self.cache.put(signature.clone(), CacheEntry::from(&result));
                outcomes.insert(signature, result.ok());
            }
        }
    }

    /// Link `node` to its (capped) neighbors and admit new ones one hop deeper.
    fn admit(&mut self, node: &str, depth: usize, tuples: Vec<RelationshipTuple>) {
        let mut order: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for tuple in &tuples {
            if let Some((other, _)) = tuple.other_end(node) {
                if seen.insert(other) {
                    order.push(other);
                }
            }
        }

        let cap = self.params.fan_out_cap;
        if order.len() > cap {
            log::debug!(
                "Fan-out cap: keeping {} of {} neighbors of {}",
                cap,
                order.len(),
                node
            );
            self.stats.capped_node_count += 1;
        }
        let allowed: HashSet<String> = order.into_iter().take(cap).map(str::to_string).collect();

        let next_depth = depth + 1;
        for tuple in &tuples {
            let Some((other, other_name)) = tuple.other_end(node) else {
                continue;
            };
            if !allowed.contains(other) {
                continue;
            }
            self.state.graph.add_edge(node, other);
            self.state.edges.record(tuple);

            if let Some(info) = self.state.nodes.get_mut(node) {
                let own_name = if tuple.subject_id == node {
                    &tuple.subject_name
                } else {
                    &tuple.object_name
                };
                if info.name == info.id && own_name != node {
                    info.name = own_name.clone();
                }
            }

            match self.state.nodes.get_mut(other) {
                Some(info) => {
                    if info.name == info.id && other_name != other {
                        info.name = other_name.to_string();
                    }
                }
                None => {
                    self.state.nodes.insert(
                        other.to_string(),
                        NodeInfo {
                            id: other.to_string(),
                            name: other_name.to_string(),
                            depth: next_depth,
                        },
                    );
                    if next_depth < self.params.max_depth {
                        self.state.queue.push_back((other.to_string(), next_depth));
                    }
                }
            }
        }
    }
}
