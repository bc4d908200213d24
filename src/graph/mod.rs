//! Connectivity graph built during discovery, plus path enumeration and pruning.
//!
//! The adjacency graph is undirected: reachability ignores tuple direction.
//! Direction and predicates survive only as [`EdgeRecord`] metadata for display.

mod paths;
mod prune;

pub use paths::{extract_paths, ConnectingPath};
pub use prune::prune_leaves;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::source::RelationshipTuple;

/// Undirected adjacency sets keyed by entity id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, Vec<String>)>", into = "Vec<(String, Vec<String>)>")]
pub struct AdjacencyGraph {
    adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl AdjacencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an isolated node. Returns false if it was already present.
    pub fn add_node(&mut self, id: &str) -> bool {
        if self.adjacency.contains_key(id) {
            return false;
        }
        self.adjacency.insert(id.to_string(), BTreeSet::new());
        true
    }

    /// Insert `a -- b` in both directions. Self-loops are ignored.
    /// Returns true if the edge is new.
    pub fn add_edge(&mut self, a: &str, b: &str) -> bool {
        if a == b {
            return false;
        }
        let inserted = self
            .adjacency
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.adjacency
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
        inserted
    }

    /// Remove a node and every incident edge, returning its former neighbors.
    pub fn remove_node(&mut self, id: &str) -> Option<BTreeSet<String>> {
        let neighbors = self.adjacency.remove(id)?;
        for neighbor in &neighbors {
            if let Some(set) = self.adjacency.get_mut(neighbor) {
                set.remove(id);
            }
        }
        Some(neighbors)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adjacency.contains_key(id)
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.adjacency.get(a).is_some_and(|set| set.contains(b))
    }

    pub fn neighbors(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.adjacency.get(id)
    }

    pub fn degree(&self, id: &str) -> usize {
        self.adjacency.get(id).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    /// Each undirected edge once, as `(smaller, larger)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.adjacency.iter().flat_map(|(a, set)| {
            set.iter()
                .filter(move |b| a.as_str() < b.as_str())
                .map(move |b| (a.as_str(), b.as_str()))
        })
    }
}

impl From<Vec<(String, Vec<String>)>> for AdjacencyGraph {
    /// Rebuild from `[node, neighbors]` pairs, restoring symmetry if needed.
    fn from(list: Vec<(String, Vec<String>)>) -> Self {
        let mut graph = AdjacencyGraph::new();
        for (node, neighbors) in list {
            graph.add_node(&node);
            for neighbor in neighbors {
                graph.add_edge(&node, &neighbor);
            }
        }
        graph
    }
}

impl From<AdjacencyGraph> for Vec<(String, Vec<String>)> {
    fn from(graph: AdjacencyGraph) -> Self {
        graph
            .adjacency
            .into_iter()
            .map(|(node, set)| (node, set.into_iter().collect()))
            .collect()
    }
}

/// What is known about a discovered node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub id: String,
    pub name: String,
    /// Hop distance from the nearest seed.
    pub depth: usize,
}

/// Display metadata for one undirected edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    /// Direction of the first tuple observed for this pair.
    pub source: String,
    pub target: String,
    pub predicates: BTreeSet<String>,
    pub evidence: Vec<String>,
}

/// Edge metadata keyed by unordered node pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<EdgeRecord>", into = "Vec<EdgeRecord>")]
pub struct EdgeStore {
    records: BTreeMap<(String, String), EdgeRecord>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl EdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a tuple into the record for its endpoint pair.
    pub fn record(&mut self, tuple: &RelationshipTuple) {
        let record = self
            .records
            .entry(pair_key(&tuple.subject_id, &tuple.object_id))
            .or_insert_with(|| EdgeRecord {
                source: tuple.subject_id.clone(),
                target: tuple.object_id.clone(),
                predicates: BTreeSet::new(),
                evidence: Vec::new(),
            });
        record.predicates.insert(tuple.predicate.clone());
        for item in &tuple.evidence {
            if !record.evidence.contains(item) {
                record.evidence.push(item.clone());
            }
        }
    }

    pub fn get(&self, a: &str, b: &str) -> Option<&EdgeRecord> {
        self.records.get(&pair_key(a, b))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<EdgeRecord>> for EdgeStore {
    fn from(records: Vec<EdgeRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (pair_key(&r.source, &r.target), r))
                .collect(),
        }
    }
}

impl From<EdgeStore> for Vec<EdgeRecord> {
    fn from(store: EdgeStore) -> Self {
        store.records.into_values().collect()
    }
}
