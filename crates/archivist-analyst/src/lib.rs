//! archivist-analyst: Worker daemon for the Archivist platform
//!
//! Provides:
//! - The TCP command server the master dispatches tasks to
//! - The task runtime tracking queued and executing pipelines
//! - Built-in storage-facing processors

pub mod config;
pub mod processors;
pub mod runtime;
pub mod server;

pub use processors::default_registry;
pub use runtime::{ClusterProcess, TaskRuntime, TaskState};
pub use server::Server;
