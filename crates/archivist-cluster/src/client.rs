//! Synchronous dispatch client
//!
//! The master side of the command channel. Blocking on purpose: dispatch
//! happens from job-runner threads, and a plain `TcpStream` with explicit
//! timeouts keeps failure handling obvious.

use crate::balancer::LoadBalancer;
use crate::error::ClusterError;
use crate::protocol::{
    read_frame, write_frame, Request, Response, TaskKill, TaskResult, TaskStart,
};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for the analyst command port.
///
/// Connect, write, and kill replies use the command timeout. Waiting for
/// a task's terminal result is unbounded by default, since a dispatch
/// blocks for as long as the pipeline runs.
pub struct AnalystClient {
    balancer: Arc<LoadBalancer>,
    timeout: Duration,
    result_timeout: Option<Duration>,
}

impl AnalystClient {
    pub fn new(balancer: Arc<LoadBalancer>) -> Self {
        Self {
            balancer,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            result_timeout: None,
        }
    }

    /// Timeout for connect, write, and kill replies.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bound how long a dispatch waits for the task result.
    pub fn with_result_timeout(mut self, timeout: Duration) -> Self {
        self.result_timeout = Some(timeout);
        self
    }

    /// Dispatch a task to the next analyst in rotation and wait for its
    /// terminal result. Returns the chosen host so the caller can record
    /// where the task ran.
    pub fn execute_task(&self, task: &TaskStart) -> Result<(String, TaskResult), ClusterError> {
        let host = self.balancer.next_host().ok_or(ClusterError::NoHosts)?;
        let result = self.execute_task_on(&host, task)?;
        Ok((host, result))
    }

    /// Dispatch a task to a specific analyst.
    pub fn execute_task_on(
        &self,
        host: &str,
        task: &TaskStart,
    ) -> Result<TaskResult, ClusterError> {
        match self.send(host, &Request::ExecuteTask(task.clone()), self.result_timeout)? {
            Response::TaskResult(result) => Ok(result),
            Response::Fault(fault) => Err(ClusterError::Fault(fault)),
            Response::Ok => Err(ClusterError::UnexpectedResponse),
        }
    }

    /// Ask one analyst to stop a task. `Ok(true)` means the task was
    /// running there and was signalled.
    pub fn kill_task_on(&self, host: &str, kill: &TaskKill) -> Result<bool, ClusterError> {
        match self.send(host, &Request::KillTask(kill.clone()), Some(self.timeout))? {
            Response::Ok => Ok(true),
            Response::Fault(fault) => Err(ClusterError::Fault(fault)),
            Response::TaskResult(_) => Err(ClusterError::UnexpectedResponse),
        }
    }

    /// Broadcast kill-all to every registered analyst. Hosts that cannot
    /// be reached are logged and skipped; the count of acknowledged hosts
    /// is returned.
    pub fn kill_all(&self) -> usize {
        let mut acknowledged = 0;
        for host in self.balancer.hosts() {
            match self.send(&host, &Request::KillAll, Some(self.timeout)) {
                Ok(Response::Ok) => acknowledged += 1,
                Ok(other) => {
                    tracing::warn!("unexpected kill-all reply from {}: {:?}", host, other);
                }
                Err(e) => {
                    tracing::warn!("kill-all failed for {}: {}", host, e);
                }
            }
        }
        acknowledged
    }

    fn send(
        &self,
        host: &str,
        request: &Request,
        read_timeout: Option<Duration>,
    ) -> Result<Response, ClusterError> {
        let addr = host
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, host.to_string()))?;
        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(read_timeout)?;
        stream.set_write_timeout(Some(self.timeout))?;
        write_frame(&mut stream, request)?;
        read_frame(&mut stream)
    }
}
