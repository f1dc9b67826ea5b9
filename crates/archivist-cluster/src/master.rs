//! Master lifecycle callbacks
//!
//! Analysts announce themselves to the archivist master over plain HTTP:
//! register on startup, shutdown on exit. Task results travel back over
//! the command channel, so these calls carry only membership state.

use crate::error::ClusterError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CALLBACK_TIMEOUT_SECS: u64 = 10;

/// State an analyst reports to the master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystSpec {
    /// Command-port address other cluster members dial, `host:port`.
    pub address: String,
    /// Executor threads, i.e. how many tasks run concurrently.
    pub threads: usize,
    /// Tasks currently queued or executing.
    pub task_ids: Vec<u64>,
}

/// HTTP client for the master's analyst endpoints.
pub struct MasterClient {
    base: String,
    client: reqwest::blocking::Client,
}

impl MasterClient {
    pub fn new(base: &str) -> Result<Self, ClusterError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(CALLBACK_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClusterError::Callback(e.to_string()))?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn register(&self, spec: &AnalystSpec) -> Result<(), ClusterError> {
        self.post("_register", spec)
    }

    pub fn shutdown(&self, spec: &AnalystSpec) -> Result<(), ClusterError> {
        self.post("_shutdown", spec)
    }

    fn post(&self, op: &str, spec: &AnalystSpec) -> Result<(), ClusterError> {
        let url = self.endpoint(op);
        let response = self
            .client
            .post(&url)
            .json(spec)
            .send()
            .map_err(|e| ClusterError::Callback(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClusterError::Callback(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }

    fn endpoint(&self, op: &str) -> String {
        format!("{}/api/v1/analyst/{}", self.base, op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_shape() {
        let client = MasterClient::new("http://archivist:8066/").unwrap();
        assert_eq!(
            client.endpoint("_register"),
            "http://archivist:8066/api/v1/analyst/_register"
        );
    }

    #[test]
    fn test_spec_json_shape() {
        let spec = AnalystSpec {
            address: "analyst01:8098".to_string(),
            threads: 4,
            task_ids: vec![7, 9],
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["address"], "analyst01:8098");
        assert_eq!(value["threads"], 4);
        assert_eq!(value["task_ids"][1], 9);
    }

    #[test]
    fn test_unreachable_master_is_callback_error() {
        // Bind then drop to get a port with nothing listening
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = MasterClient::new(&format!("http://{addr}")).unwrap();
        let spec = AnalystSpec {
            address: "analyst01:8098".to_string(),
            threads: 4,
            task_ids: vec![],
        };
        assert!(matches!(
            client.register(&spec),
            Err(ClusterError::Callback(_))
        ));
    }
}
