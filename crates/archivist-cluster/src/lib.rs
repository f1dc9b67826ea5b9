//! archivist-cluster: Task dispatch plumbing for the Archivist platform
//!
//! This crate provides:
//! - The framed wire protocol between master and analysts
//! - The synchronous dispatch client with round-robin host selection
//! - Lifecycle callbacks analysts make against the master over HTTP

pub mod balancer;
pub mod client;
pub mod error;
pub mod master;
pub mod protocol;

pub use balancer::LoadBalancer;
pub use client::{AnalystClient, DEFAULT_TIMEOUT_SECS};
pub use error::ClusterError;
pub use master::{AnalystSpec, MasterClient};
pub use protocol::{
    fault, read_frame, read_frame_async, write_frame, write_frame_async, ClusterFault, Request,
    Response, TaskKill, TaskResult, TaskStart, MAX_FRAME_BYTES,
};
