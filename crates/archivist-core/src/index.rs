//! Search index client
//!
//! The index itself is an external collaborator; this module defines the
//! trait the bulk committer writes through and the HTTP implementation used
//! in production. Upsert semantics are create-if-absent, merge-if-present,
//! and the server assigns each document the deterministic content id.

use crate::error::IndexError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Timeout for one bulk round trip.
const BULK_TIMEOUT_SECS: u64 = 60;

/// One document upsert in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub id: String,
    pub doc: Value,
}

/// Per-document outcome of a bulk call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Failed { message: String },
}

/// Batched upsert surface of the search index.
///
/// Implementations must return exactly one outcome per request, in request
/// order. Per-document failures are outcomes, not errors; `Err` is reserved
/// for transport-level failure of the whole batch.
pub trait SearchIndex: Send + Sync {
    fn bulk(&self, requests: &[UpsertRequest]) -> Result<Vec<UpsertOutcome>, IndexError>;
}

/// HTTP search index speaking the archivist bulk-upsert endpoint.
pub struct HttpSearchIndex {
    base: String,
    alias: String,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct BulkWireResponse {
    items: Vec<BulkWireItem>,
}

#[derive(Deserialize)]
struct BulkWireItem {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

impl HttpSearchIndex {
    pub fn new(base: &str, alias: &str) -> Result<Self, IndexError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(BULK_TIMEOUT_SECS))
            .build()
            .map_err(|e| IndexError::Transport(e.to_string()))?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            alias: alias.to_string(),
            client,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    fn endpoint(&self) -> String {
        bulk_endpoint(&self.base, &self.alias)
    }
}

impl SearchIndex for HttpSearchIndex {
    fn bulk(&self, requests: &[UpsertRequest]) -> Result<Vec<UpsertOutcome>, IndexError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&json!({ "items": requests }))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| IndexError::Transport(e.to_string()))?;

        let wire: BulkWireResponse = response
            .json()
            .map_err(|e| IndexError::Transport(e.to_string()))?;
        if wire.items.len() != requests.len() {
            return Err(IndexError::OutcomeMismatch {
                sent: requests.len(),
                got: wire.items.len(),
            });
        }
        Ok(wire.items.into_iter().map(outcome_from_wire).collect())
    }
}

fn bulk_endpoint(base: &str, alias: &str) -> String {
    format!("{}/api/v1/index/{}/_bulkUpsert", base, alias)
}

fn outcome_from_wire(item: BulkWireItem) -> UpsertOutcome {
    match item.status.as_str() {
        "created" => UpsertOutcome::Created,
        "updated" => UpsertOutcome::Updated,
        status => UpsertOutcome::Failed {
            message: item.error.unwrap_or_else(|| status.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_endpoint_shape() {
        assert_eq!(
            bulk_endpoint("http://archivist:8066", "assets"),
            "http://archivist:8066/api/v1/index/assets/_bulkUpsert"
        );
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let index = HttpSearchIndex::new("http://archivist:8066/", "assets").unwrap();
        assert_eq!(
            index.endpoint(),
            "http://archivist:8066/api/v1/index/assets/_bulkUpsert"
        );
    }

    #[test]
    fn test_outcome_from_wire() {
        let created: BulkWireItem = serde_json::from_str(r#"{"status":"created"}"#).unwrap();
        assert_eq!(outcome_from_wire(created), UpsertOutcome::Created);

        let updated: BulkWireItem = serde_json::from_str(r#"{"status":"updated"}"#).unwrap();
        assert_eq!(outcome_from_wire(updated), UpsertOutcome::Updated);

        let failed: BulkWireItem =
            serde_json::from_str(r#"{"status":"failed","error":"index closed"}"#).unwrap();
        assert_eq!(
            outcome_from_wire(failed),
            UpsertOutcome::Failed {
                message: "index closed".to_string()
            }
        );

        // Unknown status without an error message still yields a failure
        let odd: BulkWireItem = serde_json::from_str(r#"{"status":"throttled"}"#).unwrap();
        assert_eq!(
            outcome_from_wire(odd),
            UpsertOutcome::Failed {
                message: "throttled".to_string()
            }
        );
    }
}
