//! Relationship source: the remote (subject, predicate, object, evidence) query API.
//!
//! `RelationshipSource` is the seam between the discovery engine and the network.
//! `HttpRelationshipSource` talks to the real service; tests plug in fixtures.
//! Neighbor collection (two directional queries merged, deduped and filtered)
//! lives here too, as `NeighborFilter::collect`.

mod http;

pub use http::{parse_tuples, HttpRelationshipSource};

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SourceConfig;
use crate::entity::namespace_of;

/// One directed fact returned by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipTuple {
    pub subject_id: String,
    pub subject_name: String,
    pub predicate: String,
    pub object_id: String,
    pub object_name: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl RelationshipTuple {
    /// The endpoint opposite `node`, if `node` is one of the two endpoints.
    pub fn other_end(&self, node: &str) -> Option<(&str, &str)> {
        if self.subject_id == node {
            Some((&self.object_id, &self.object_name))
        } else if self.object_id == node {
            Some((&self.subject_id, &self.subject_name))
        } else {
            None
        }
    }
}

/// A single source query. Exactly one of `subject`/`object` is empty (the wildcard).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuerySignature {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl QuerySignature {
    /// Query for tuples where `node` is the subject.
    pub fn outgoing(node: &str, predicate: &str) -> Self {
        Self {
            subject: node.to_string(),
            predicate: predicate.to_string(),
            object: String::new(),
        }
    }

    /// Query for tuples where `node` is the object.
    pub fn incoming(node: &str, predicate: &str) -> Self {
        Self {
            subject: String::new(),
            predicate: predicate.to_string(),
            object: node.to_string(),
        }
    }

    /// Both directional queries for a node, subject-side first.
    pub fn for_node(node: &str, predicate: &str) -> [Self; 2] {
        [Self::outgoing(node, predicate), Self::incoming(node, predicate)]
    }

    /// Stable string key used in checkpoint files: `subject|predicate|object`.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.subject, self.predicate, self.object)
    }

    /// Inverse of [`QuerySignature::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        let mut parts = key.splitn(3, '|');
        let subject = parts.next()?.to_string();
        let predicate = parts.next()?.to_string();
        let object = parts.next()?.to_string();
        Some(Self {
            subject,
            predicate,
            object,
        })
    }
}

impl fmt::Display for QuerySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wildcard = |s: &str| if s.is_empty() { "*".to_string() } else { s.to_string() };
        write!(
            f,
            "({}, {}, {})",
            wildcard(&self.subject),
            wildcard(&self.predicate),
            wildcard(&self.object)
        )
    }
}

/// Soft failure from a single source query. Never fatal to a discovery run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("source returned HTTP {0}")]
    Status(u16),

    #[error("response was not JSON: {0}")]
    NotJson(String),

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

/// Anything that can answer a relationship query.
#[async_trait]
pub trait RelationshipSource: Send + Sync {
    async fn fetch_relationships(
        &self,
        query: &QuerySignature,
    ) -> std::result::Result<Vec<RelationshipTuple>, FetchError>;
}

/// Drops low-value tuples before they reach the graph.
#[derive(Debug, Clone, Default)]
pub struct NeighborFilter {
    unreliable_namespaces: HashSet<String>,
    excluded_predicates: HashSet<String>,
}

impl NeighborFilter {
    pub fn new<I, J>(unreliable_namespaces: I, excluded_predicates: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        Self {
            unreliable_namespaces: unreliable_namespaces
                .into_iter()
                .map(|ns| ns.to_ascii_uppercase())
                .collect(),
            excluded_predicates: excluded_predicates.into_iter().collect(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            config.unreliable_namespaces.iter().cloned(),
            config.excluded_predicates.iter().cloned(),
        )
    }

    /// True if the tuple should be kept.
    pub fn accepts(&self, tuple: &RelationshipTuple) -> bool {
        if tuple.subject_id == tuple.object_id {
            return false;
        }
        if self.excluded_predicates.contains(&tuple.predicate) {
            return false;
        }
        let unreliable = |id: &str| {
            self.unreliable_namespaces
                .contains(&namespace_of(id).to_ascii_uppercase())
        };
        !(unreliable(&tuple.subject_id) || unreliable(&tuple.object_id))
    }

    /// Merge the results of a node's directional queries: keep tuples touching
    /// `node`, apply the filter, and dedupe by (source, target), first one wins.
    pub fn collect<'a, I>(&self, node: &str, batches: I) -> Vec<RelationshipTuple>
    where
        I: IntoIterator<Item = &'a [RelationshipTuple]>,
    {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut merged = Vec::new();
        for batch in batches {
            for tuple in batch {
                if tuple.other_end(node).is_none() || !self.accepts(tuple) {
                    continue;
                }
                let key = (tuple.subject_id.clone(), tuple.object_id.clone());
                if seen.insert(key) {
                    merged.push(tuple.clone());
                }
            }
        }
        merged
    }
}
