//! Conversion of the pruned graph into the payload handed to renderers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::graph::{AdjacencyGraph, ConnectingPath, EdgeStore, NodeInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    /// Degree within the pruned graph.
    pub degree: usize,
    pub is_seed: bool,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    /// Distinct predicates, sorted and comma separated.
    pub label: String,
    pub predicates: Vec<String>,
    pub evidence: Vec<String>,
}

/// `{nodes, edges, paths}` for visualization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphPayload {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub paths: Vec<ConnectingPath>,
}

/// Build the payload from a pruned graph.
///
/// Seeds come first in seed order, then the remaining nodes by depth and id.
/// Exactly one edge is emitted per adjacency pair; pairs with no recorded
/// metadata keep their sorted endpoint order and an empty label.
pub fn materialize(
    graph: &AdjacencyGraph,
    nodes: &BTreeMap<String, NodeInfo>,
    edges: &EdgeStore,
    seeds: &[String],
    paths: Vec<ConnectingPath>,
) -> GraphPayload {
    let node_for = |id: &str| {
        let (name, depth) = match nodes.get(id) {
            Some(info) => (info.name.clone(), info.depth),
            None => (id.to_string(), 0),
        };
        GraphNode {
            id: id.to_string(),
            name,
            entity_type: EntityType::classify(id),
            degree: graph.degree(id),
            is_seed: seeds.iter().any(|s| s == id),
            depth,
        }
    };

    let mut out_nodes: Vec<GraphNode> = seeds
        .iter()
        .filter(|seed| graph.contains(seed))
        .map(|seed| node_for(seed))
        .collect();

    let mut rest: Vec<GraphNode> = graph
        .nodes()
        .filter(|id| !seeds.iter().any(|s| s == *id))
        .map(node_for)
        .collect();
    rest.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.id.cmp(&b.id)));
    out_nodes.extend(rest);

    let out_edges = graph
        .edges()
        .map(|(a, b)| match edges.get(a, b) {
            Some(record) => {
                let predicates: Vec<String> = record.predicates.iter().cloned().collect();
                GraphEdge {
                    source: record.source.clone(),
                    target: record.target.clone(),
                    label: predicates.join(", "),
                    predicates,
                    evidence: record.evidence.clone(),
                }
            }
            None => GraphEdge {
                source: a.to_string(),
                target: b.to_string(),
                label: String::new(),
                predicates: Vec::new(),
                evidence: Vec::new(),
            },
        })
        .collect();

    GraphPayload {
        nodes: out_nodes,
        edges: out_edges,
        paths,
    }
}
