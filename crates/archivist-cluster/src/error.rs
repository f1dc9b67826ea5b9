//! Error types for cluster transport and dispatch

use crate::protocol::ClusterFault;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("frame of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),

    #[error("no analyst hosts available")]
    NoHosts,

    #[error("cluster fault: {0}")]
    Fault(ClusterFault),

    #[error("unexpected response from analyst")]
    UnexpectedResponse,

    #[error("master callback failed: {0}")]
    Callback(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::fault;

    #[test]
    fn test_fault_display_carries_code_and_message() {
        let err = ClusterError::Fault(ClusterFault {
            code: fault::DUPLICATE_TASK,
            message: "task 7 already executing".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.contains("already executing"));
        assert!(msg.contains(&fault::DUPLICATE_TASK.to_string()));
    }

    #[test]
    fn test_no_hosts_display() {
        assert!(ClusterError::NoHosts.to_string().contains("no analyst hosts"));
    }
}
