//! In-memory relationship source for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::source::{FetchError, QuerySignature, RelationshipSource, RelationshipTuple};

/// Serves a fixed edge list. Nodes can be made to fail always, fail only for
/// their first few queries, or never answer at all.
#[derive(Default)]
pub struct FixtureSource {
    tuples: Vec<RelationshipTuple>,
    failing: Vec<String>,
    hanging: Vec<String>,
    flaky: Mutex<HashMap<String, usize>>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    log: Mutex<Vec<(String, Instant)>>,
}

/// Decrements the in-flight counter when a query finishes or is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edge(mut self, subject: &str, predicate: &str, object: &str) -> Self {
        self.tuples.push(RelationshipTuple {
            subject_id: subject.to_string(),
            subject_name: format!("{} label", subject),
            predicate: predicate.to_string(),
            object_id: object.to_string(),
            object_name: format!("{} label", object),
            evidence: Vec::new(),
        });
        self
    }

    /// Every query about `node` times out.
    pub fn failing(mut self, node: &str) -> Self {
        self.failing.push(node.to_string());
        self
    }

    /// Queries about `node` never complete.
    pub fn hanging(mut self, node: &str) -> Self {
        self.hanging.push(node.to_string());
        self
    }

    /// The first `times` queries about `node` return 503.
    pub fn flaky(self, node: &str, times: usize) -> Self {
        if let Ok(mut flaky) = self.flaky.lock() {
            flaky.insert(node.to_string(), times);
        }
        self
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of queries received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most queries ever in progress at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Start times of the queries about `node`, in arrival order.
    pub fn call_times(&self, node: &str) -> Vec<Instant> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == node)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl RelationshipSource for FixtureSource {
    async fn fetch_relationships(
        &self,
        query: &QuerySignature,
    ) -> Result<Vec<RelationshipTuple>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let node = if query.subject.is_empty() {
            &query.object
        } else {
            &query.subject
        };
        self.log.lock().unwrap().push((node.clone(), Instant::now()));

        if self.hanging.contains(node) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing.contains(node) {
            return Err(FetchError::Timeout);
        }
        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(node) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Status(503));
                }
            }
        }

        Ok(self
            .tuples
            .iter()
            .filter(|t| query.subject.is_empty() || t.subject_id == query.subject)
            .filter(|t| query.object.is_empty() || t.object_id == query.object)
            .filter(|t| query.predicate.is_empty() || t.predicate == query.predicate)
            .cloned()
            .collect())
    }
}
