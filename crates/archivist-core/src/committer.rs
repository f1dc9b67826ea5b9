//! Bulk ingest committer
//!
//! Commits processed documents into the search index one batched upsert per
//! round. Failures attributable to a single offending field (mapping or
//! parsing rejections) are remediated by stripping the field and retrying
//! the document; everything else is recorded and surfaced in the result.
//! The bulk operation always completes and reports partial success.

use crate::document::Document;
use crate::error::IndexError;
use crate::index::{SearchIndex, UpsertOutcome, UpsertRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

/// Default bound on retry rounds. The retry list converges in practice
/// because each round strips at least one field per document, but the cap
/// makes the bound explicit and configurable.
pub const DEFAULT_MAX_RETRY_ROUNDS: usize = 3;

/// Index rejections that can be fixed by dropping the captured field.
static RECOVERABLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^MapperParsingException\[failed to parse \[(.*?)\]\];")
            .expect("recoverable pattern is valid"),
        Regex::new(r#"term in field="(.*?)""#).expect("recoverable pattern is valid"),
        Regex::new(r"mapper \[(.*?)\] of different type").expect("recoverable pattern is valid"),
    ]
});

/// Accumulated outcome of a bulk upsert, merged across retry rounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkUpsertResult {
    pub created: usize,
    pub updated: usize,
    pub errors_recoverable: usize,
    pub errors_not_recoverable: usize,
    pub retries: usize,
    /// Non-recoverable error messages, `"<message>,<source path>"`.
    pub errors: Vec<String>,
}

impl BulkUpsertResult {
    /// Merge a sub-result from a retry round into this one.
    pub fn add(&mut self, other: BulkUpsertResult) {
        self.created += other.created;
        self.updated += other.updated;
        self.errors_recoverable += other.errors_recoverable;
        self.errors_not_recoverable += other.errors_not_recoverable;
        self.retries += other.retries;
        self.errors.extend(other.errors);
    }

    /// Documents that made it into the index.
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

/// Batched, retrying writer of processed documents into the search index.
pub struct BulkIngestCommitter {
    index: Arc<dyn SearchIndex>,
    max_retry_rounds: usize,
}

impl BulkIngestCommitter {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self {
            index,
            max_retry_rounds: DEFAULT_MAX_RETRY_ROUNDS,
        }
    }

    pub fn with_max_retry_rounds(mut self, rounds: usize) -> Self {
        self.max_retry_rounds = rounds;
        self
    }

    /// Upsert documents in one batch per round, retrying field-level
    /// rejections until convergence or the retry cap.
    ///
    /// Per-document failures never abort the batch; transport failure of a
    /// whole round is the only error path.
    pub fn bulk_upsert(&self, documents: Vec<Document>) -> Result<BulkUpsertResult, IndexError> {
        let mut result = BulkUpsertResult::default();
        let mut batch = documents;
        let mut round = 0;

        while !batch.is_empty() {
            let requests: Vec<UpsertRequest> = batch
                .iter()
                .map(|doc| UpsertRequest {
                    id: doc.id().to_string(),
                    doc: doc.to_value(),
                })
                .collect();
            let outcomes = self.index.bulk(&requests)?;
            if outcomes.len() != requests.len() {
                return Err(IndexError::OutcomeMismatch {
                    sent: requests.len(),
                    got: outcomes.len(),
                });
            }

            let mut retry_list = Vec::new();
            for (mut doc, outcome) in batch.into_iter().zip(outcomes) {
                match outcome {
                    UpsertOutcome::Created => result.created += 1,
                    UpsertOutcome::Updated => result.updated += 1,
                    UpsertOutcome::Failed { message } => {
                        let recovered = round < self.max_retry_rounds
                            && broken_field(&message)
                                .map(|field| doc.remove_attr(&field))
                                .unwrap_or(false);
                        if recovered {
                            result.errors_recoverable += 1;
                            retry_list.push(doc);
                        } else {
                            result
                                .errors
                                .push(format!("{},{}", message, doc.source_path()));
                            result.errors_not_recoverable += 1;
                        }
                    }
                }
            }

            if retry_list.is_empty() {
                break;
            }
            round += 1;
            result.retries += 1;
            tracing::warn!(
                "retrying {} documents after field-level rejections (round {})",
                retry_list.len(),
                round
            );
            batch = retry_list;
        }

        tracing::debug!(
            "bulk upsert done: {} created, {} updated, {} recoverable, {} failed, {} retries",
            result.created,
            result.updated,
            result.errors_recoverable,
            result.errors_not_recoverable,
            result.retries
        );
        Ok(result)
    }
}

/// Extract the offending field from a recoverable index error message.
fn broken_field(error: &str) -> Option<String> {
    RECOVERABLE_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(error))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}
