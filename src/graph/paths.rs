//! Enumeration of explicit seed-to-seed paths over the bounded graph.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::AdjacencyGraph;

/// An ordered chain of node ids from one seed to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectingPath {
    pub from: String,
    pub to: String,
    /// Full chain including both endpoints.
    pub nodes: Vec<String>,
    pub hops: usize,
}

impl ConnectingPath {
    /// Nodes strictly between the endpoints.
    pub fn intermediates(&self) -> &[String] {
        let len = self.nodes.len();
        if len <= 2 {
            &[]
        } else {
            &self.nodes[1..len - 1]
        }
    }
}

/// Enumerate every path of at most `max_hops` edges between each unordered
/// pair of seeds.
///
/// Intermediates are never seeds, and the i-th intermediate must lie exactly
/// i hops from the starting seed, so each path moves strictly away from it.
/// All such paths are returned, not only the shortest; the list is grouped
/// by seed pair (in seed order) and sorted by hop count within a pair.
pub fn extract_paths(
    graph: &AdjacencyGraph,
    seeds: &[String],
    max_hops: usize,
) -> Vec<ConnectingPath> {
    let seed_set: HashSet<&str> = seeds.iter().map(String::as_str).collect();
    let mut paths = Vec::new();

    for (i, from) in seeds.iter().enumerate() {
        if !graph.contains(from) {
            continue;
        }
        let depths = depths_from(graph, from, &seed_set, max_hops.saturating_sub(1));

        for to in &seeds[i + 1..] {
            if !graph.contains(to) {
                continue;
            }
            let mut found = Vec::new();
            let mut chain = vec![from.clone()];
            walk(graph, to, &seed_set, &depths, max_hops, &mut chain, &mut found);

            found.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
            paths.extend(found.into_iter().map(|nodes| ConnectingPath {
                from: from.clone(),
                to: to.clone(),
                hops: nodes.len() - 1,
                nodes,
            }));
        }
    }

    paths
}

/// Depth-first extension of `chain`, recording every chain that reaches `target`.
fn walk(
    graph: &AdjacencyGraph,
    target: &str,
    seeds: &HashSet<&str>,
    depths: &HashMap<String, usize>,
    max_hops: usize,
    chain: &mut Vec<String>,
    found: &mut Vec<Vec<String>>,
) {
    let Some(current) = chain.last().cloned() else {
        return;
    };

    if graph.has_edge(&current, target) {
        let mut path = chain.clone();
        path.push(target.to_string());
        found.push(path);
    }

    // Appending another intermediate plus the target must stay within max_hops.
    if chain.len() + 1 > max_hops {
        return;
    }

    let next_depth = chain.len();
    let Some(neighbors) = graph.neighbors(&current) else {
        return;
    };
    for neighbor in neighbors {
        if seeds.contains(neighbor.as_str()) {
            continue;
        }
        if depths.get(neighbor) != Some(&next_depth) {
            continue;
        }
        chain.push(neighbor.clone());
        walk(graph, target, seeds, depths, max_hops, chain, found);
        chain.pop();
    }
}

/// Hop distance from `start` to every non-seed node within `limit` hops,
/// never travelling through another seed.
fn depths_from(
    graph: &AdjacencyGraph,
    start: &str,
    seeds: &HashSet<&str>,
    limit: usize,
) -> HashMap<String, usize> {
    let mut depths = HashMap::new();
    let mut queue = VecDeque::new();
    queue.push_back((start.to_string(), 0usize));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= limit {
            continue;
        }
        let Some(neighbors) = graph.neighbors(&node) else {
            continue;
        };
        for neighbor in neighbors {
            if seeds.contains(neighbor.as_str()) || depths.contains_key(neighbor) {
                continue;
            }
            depths.insert(neighbor.clone(), depth + 1);
            queue.push_back((neighbor.clone(), depth + 1));
        }
    }

    depths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> AdjacencyGraph {
        let mut g = AdjacencyGraph::new();
        for (a, b) in edges {
            g.add_edge(a, b);
        }
        g
    }

    fn seeds(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_two_hop_paths_through_shared_neighbors() {
        let g = graph(&[("A:1", "M:1"), ("M:1", "B:1"), ("A:1", "M:2"), ("M:2", "B:1"), ("A:1", "X:1")]);
        let paths = extract_paths(&g, &seeds(&["A:1", "B:1"]), 2);
        assert_eq!(paths.len(), 2);
        for path in &paths {
            assert_eq!(path.hops, 2);
            let m = &path.intermediates()[0];
            assert!(g.has_edge("A:1", m) && g.has_edge("B:1", m));
        }
        assert_eq!(paths[0].nodes, vec!["A:1", "M:1", "B:1"]);
    }

    #[test]
    fn test_direct_edge_is_one_hop_path() {
        let g = graph(&[("A:1", "B:1")]);
        let paths = extract_paths(&g, &seeds(&["A:1", "B:1"]), 2);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].hops, 1);
        assert!(paths[0].intermediates().is_empty());
    }

    #[test]
    fn test_three_hop_respects_max_hops() {
        let g = graph(&[("A:1", "X:1"), ("X:1", "Y:1"), ("Y:1", "B:1")]);
        assert!(extract_paths(&g, &seeds(&["A:1", "B:1"]), 2).is_empty());

        let paths = extract_paths(&g, &seeds(&["A:1", "B:1"]), 3);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].nodes, vec!["A:1", "X:1", "Y:1", "B:1"]);
    }

    #[test]
    fn test_reports_longer_paths_too() {
        // A-M-B (2 hops) and A-X-Y-B (3 hops) are both reported.
        let g = graph(&[("A:1", "M:1"), ("M:1", "B:1"), ("A:1", "X:1"), ("X:1", "Y:1"), ("Y:1", "B:1")]);
        let paths = extract_paths(&g, &seeds(&["A:1", "B:1"]), 3);
        let hops: Vec<usize> = paths.iter().map(|p| p.hops).collect();
        assert_eq!(hops, vec![2, 3]);
    }

    #[test]
    fn test_intermediates_must_move_away_from_start() {
        // M is one hop from A, so A-X-M-B doubles back and is excluded.
        let g = graph(&[("A:1", "M:1"), ("M:1", "B:1"), ("A:1", "X:1"), ("X:1", "M:1")]);
        let paths = extract_paths(&g, &seeds(&["A:1", "B:1"]), 3);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].nodes, vec!["A:1", "M:1", "B:1"]);
    }

    #[test]
    fn test_seeds_are_never_intermediates() {
        let g = graph(&[("A:1", "C:1"), ("C:1", "B:1")]);
        let paths = extract_paths(&g, &seeds(&["A:1", "B:1", "C:1"]), 3);
        assert!(paths.iter().all(|p| p.intermediates().is_empty()));
        assert_eq!(paths.len(), 2);
        assert_eq!((paths[0].from.as_str(), paths[0].to.as_str()), ("A:1", "C:1"));
        assert_eq!((paths[1].from.as_str(), paths[1].to.as_str()), ("B:1", "C:1"));
    }

    #[test]
    fn test_disconnected_seeds_yield_no_paths() {
        let g = graph(&[("A:1", "X:1"), ("B:1", "Y:1")]);
        assert!(extract_paths(&g, &seeds(&["A:1", "B:1"]), 2).is_empty());
    }

    #[test]
    fn test_missing_seed_is_skipped() {
        let g = graph(&[("A:1", "X:1")]);
        assert!(extract_paths(&g, &seeds(&["A:1", "B:1"]), 2).is_empty());
    }
}
