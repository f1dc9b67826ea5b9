//! archivist-core: Core library for the Archivist ingestion platform
//!
//! This crate provides:
//! - Content-addressable object storage for derived artifacts
//! - The bulk ingest committer writing documents into the search index
//! - The processor registry and pipeline execution path
//! - Deterministic content identifiers shared by storage and index
//!
//! Everything here is synchronous by design: pipelines run on dedicated
//! worker threads owned by the analyst runtime.

pub mod cancel;
pub mod committer;
pub mod document;
pub mod error;
pub mod ident;
pub mod index;
pub mod ofs;
pub mod pipeline;
pub mod processor;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use committer::{BulkIngestCommitter, BulkUpsertResult, DEFAULT_MAX_RETRY_ROUNDS};
pub use document::Document;
pub use error::{IndexError, OfsError, PipelineError};
pub use ident::object_id;
pub use index::{HttpSearchIndex, SearchIndex, UpsertOutcome, UpsertRequest};
pub use ofs::{ObjectFile, ObjectFileSystem, DIR_DEPTH};
pub use pipeline::{
    Pipeline, PipelineContext, PipelineSpec, ProcessorRef, EXIT_FAILURE, EXIT_KILLED, EXIT_SUCCESS,
};
pub use processor::{Processor, ProcessorFactory, ProcessorRegistry};
