//! reqwest-backed relationship source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::{FetchError, QuerySignature, RelationshipSource, RelationshipTuple};
use crate::config::SourceConfig;
use crate::error::{KgbridgeError, Result};

/// Longest body excerpt kept in a `NotJson` error.
const BODY_EXCERPT_CHARS: usize = 80;

/// HTTP client for the relationship query API.
///
/// Every failure mode (transport, timeout, status, body) is reported as a
/// [`FetchError`] so the expander can retry it later.
pub struct HttpRelationshipSource {
    client: Client,
    base_url: Url,
}

impl HttpRelationshipSource {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            KgbridgeError::Config(format!("invalid source base_url '{}': {}", base_url, e))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kgbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl RelationshipSource for HttpRelationshipSource {
    async fn fetch_relationships(
        &self,
        query: &QuerySignature,
    ) -> std::result::Result<Vec<RelationshipTuple>, FetchError> {
        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[
                ("subject", query.subject.as_str()),
                ("predicate", query.predicate.as_str()),
                ("object", query.object.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        parse_tuples(&body)
    }
}

/// Parse a response body into tuples.
///
/// The source answers overloaded queries with the literal text `timeout`
/// (sometimes JSON-quoted) and a 200 status, so that is checked first.
pub fn parse_tuples(body: &str) -> std::result::Result<Vec<RelationshipTuple>, FetchError> {
    let trimmed = body.trim();
    if trimmed.eq_ignore_ascii_case("timeout") {
        return Err(FetchError::Timeout);
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|_| {
        FetchError::NotJson(trimmed.chars().take(BODY_EXCERPT_CHARS).collect())
    })?;

    let rows = match value {
        Value::Array(rows) => rows,
        Value::String(s) if s.trim().eq_ignore_ascii_case("timeout") => {
            return Err(FetchError::Timeout)
        }
        other => {
            return Err(FetchError::Malformed(format!(
                "expected an array of tuples, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = rows.len();
    let tuples: Vec<RelationshipTuple> = rows.iter().filter_map(parse_row).collect();
    if tuples.len() < total {
        log::debug!("Skipped {} malformed tuple rows", total - tuples.len());
    }
    Ok(tuples)
}

/// `[subjectId, subjectName, predicate, objectId, objectName, <reserved>, evidence[]]`
fn parse_row(row: &Value) -> Option<RelationshipTuple> {
    let fields = row.as_array()?;
    let subject_id = non_empty_str(fields.first()?)?;
    let predicate = non_empty_str(fields.get(2)?)?;
    let object_id = non_empty_str(fields.get(3)?)?;

    let name_or_id = |idx: usize, id: &str| {
        fields
            .get(idx)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(id)
            .to_string()
    };

    let evidence = match fields.get(6) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    Some(RelationshipTuple {
        subject_name: name_or_id(1, subject_id),
        object_name: name_or_id(4, object_id),
        subject_id: subject_id.to_string(),
        predicate: predicate.to_string(),
        object_id: object_id.to_string(),
        evidence,
    })
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
