//! Error types for the core library

use thiserror::Error;

/// Errors raised by the object file system.
///
/// `InvalidId` is an input error and is never worth retrying. `Io` and
/// `Transfer` are storage errors; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum OfsError {
    #[error("invalid object id: {0}")]
    InvalidId(String),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer of {uri} failed: {reason}")]
    Transfer { uri: String, reason: String },
}

/// Errors raised by the search index client.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index transport error: {0}")]
    Transport(String),

    #[error("index returned {got} outcomes for {sent} documents")]
    OutcomeMismatch { sent: usize, got: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while building or running a processing pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unknown processor: {0}")]
    UnknownProcessor(String),

    #[error("invalid args for processor {name}: {reason}")]
    InvalidArgs { name: String, reason: String },

    #[error("invalid pipeline payload: {0}")]
    InvalidPayload(String),

    #[error("processor {name} failed: {reason}")]
    ProcessorFailed { name: String, reason: String },

    #[error("storage error: {0}")]
    Ofs(#[from] OfsError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}
