//! Pipeline execution
//!
//! A task payload deserializes into a `PipelineSpec`; the spec resolves
//! into a `Pipeline` of processor stages which runs synchronously on its
//! dedicated worker thread, producing documents that are committed in one
//! bulk upsert at the end.

use crate::cancel::CancelToken;
use crate::committer::BulkIngestCommitter;
use crate::document::Document;
use crate::error::PipelineError;
use crate::ofs::ObjectFileSystem;
use crate::processor::{Processor, ProcessorRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Pipeline ran to completion.
pub const EXIT_SUCCESS: i32 = 0;
/// One or more documents failed processing, or the final commit failed.
pub const EXIT_FAILURE: i32 = 1;
/// Pipeline observed a cancellation request (128 + SIGKILL by convention).
pub const EXIT_KILLED: i32 = 137;

/// Reference to a registered processor plus its instance args.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorRef {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Wire shape of a task payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub processors: Vec<ProcessorRef>,
    pub inputs: Vec<String>,
}

impl PipelineSpec {
    pub fn from_json(payload: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(payload).map_err(|e| PipelineError::InvalidPayload(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        serde_json::to_string(self).map_err(|e| PipelineError::InvalidPayload(e.to_string()))
    }
}

/// Everything a processor may touch while running.
pub struct PipelineContext {
    pub ofs: Arc<ObjectFileSystem>,
    pub committer: Arc<BulkIngestCommitter>,
    pub cancel: CancelToken,
    /// Server base for externally addressable object-store URLs.
    pub url_base: String,
}

/// Resolved, runnable pipeline.
pub struct Pipeline {
    stages: Vec<Box<dyn Processor>>,
}

impl Pipeline {
    /// Resolve processor refs through the registry. Unknown processors and
    /// bad args are rejected here, before any execution thread is spent.
    pub fn build(
        registry: &ProcessorRegistry,
        processors: &[ProcessorRef],
    ) -> Result<Self, PipelineError> {
        let mut stages = Vec::with_capacity(processors.len());
        for reference in processors {
            stages.push(registry.resolve(&reference.name, &reference.args)?);
        }
        Ok(Self { stages })
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run every stage over every input document, then commit the survivors
    /// in one bulk upsert. The cancel token is checked between stages; a
    /// cancelled run reports `EXIT_KILLED` and commits nothing further.
    pub fn run(&self, ctx: &PipelineContext, inputs: &[String]) -> i32 {
        let mut documents = Vec::with_capacity(inputs.len());
        let mut failed = 0usize;

        for input in inputs {
            if ctx.cancel.is_cancelled() {
                return EXIT_KILLED;
            }
            let mut doc = Document::new(input.clone());
            let mut processed = true;
            for stage in &self.stages {
                if ctx.cancel.is_cancelled() {
                    return EXIT_KILLED;
                }
                if let Err(e) = stage.process(ctx, &mut doc) {
                    tracing::warn!("processor {} failed on {}: {}", stage.name(), input, e);
                    processed = false;
                    failed += 1;
                    break;
                }
            }
            if processed {
                documents.push(doc);
            }
        }

        if ctx.cancel.is_cancelled() {
            return EXIT_KILLED;
        }

        if !documents.is_empty() {
            match ctx.committer.bulk_upsert(documents) {
                Ok(result) => {
                    tracing::info!(
                        "committed pipeline output: {} created, {} updated, {} failed",
                        result.created,
                        result.updated,
                        result.errors_not_recoverable
                    );
                }
                Err(e) => {
                    tracing::error!("bulk upsert failed: {}", e);
                    return EXIT_FAILURE;
                }
            }
        }

        if failed > 0 {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}
