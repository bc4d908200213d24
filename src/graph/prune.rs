//! Iterative leaf pruning down to the part of the graph that connects seeds.

use std::collections::{HashSet, VecDeque};

use super::AdjacencyGraph;

/// Repeatedly strip non-seed nodes of degree <= 1 until none remain.
///
/// Seeds are kept even when isolated. Afterwards every non-seed node has
/// degree >= 2. Cycles among intermediates survive, so the result is not a
/// minimal Steiner tree. Returns the number of nodes removed.
pub fn prune_leaves(graph: &mut AdjacencyGraph, seeds: &[String]) -> usize {
    let seeds: HashSet<&str> = seeds.iter().map(String::as_str).collect();

    let mut queue: VecDeque<String> = graph
        .nodes()
        .filter(|id| !seeds.contains(id) && graph.degree(id) <= 1)
        .map(str::to_string)
        .collect();

    let mut removed = 0;
    while let Some(id) = queue.pop_front() {
        // A node can be queued twice; skip it once removed.
        if !graph.contains(&id) || graph.degree(&id) > 1 {
            continue;
        }
        let Some(neighbors) = graph.remove_node(&id) else {
            continue;
        };
        removed += 1;
        for neighbor in neighbors {
            if !seeds.contains(neighbor.as_str()) && graph.degree(&neighbor) <= 1 {
                queue.push_back(neighbor);
            }
        }
    }

    if removed > 0 {
        log::debug!(
            "Pruned {} leaf nodes, {} nodes / {} edges remain",
            removed,
            graph.node_count(),
            graph.edge_count()
        );
    }
    removed
}
