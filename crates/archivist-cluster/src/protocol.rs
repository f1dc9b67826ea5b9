//! Cluster RPC protocol
//!
//! Wire types for the master→analyst command channel plus the framed
//! transport: bincode bodies behind a big-endian u32 length prefix over
//! TCP. Sync and async codecs are provided; the dispatch client is
//! synchronous while the analyst server reads frames on tokio.

use crate::error::ClusterError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame body. Command traffic is small; anything
/// near this size is a corrupt or hostile frame.
pub const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// One unit of dispatched work, created by the master and executed
/// at-most-concurrently-once per id on a given analyst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStart {
    pub id: u64,
    pub name: String,
    /// Address the analyst calls back for lifecycle events.
    pub master_host: String,
    /// Opaque pipeline description (JSON), parsed by the analyst runtime.
    pub payload: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Request to stop a running task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskKill {
    pub id: u64,
    pub user: String,
    pub reason: String,
}

/// Terminal report for an executed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: u64,
    pub exit_status: i32,
}

/// Structured fault crossing the RPC boundary. Raw internal errors never
/// go over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterFault {
    pub code: u16,
    pub message: String,
}

impl fmt::Display for ClusterFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ClusterFault {}

/// Fault codes carried by [`ClusterFault`].
pub mod fault {
    /// A task with the same id is already queued or executing.
    pub const DUPLICATE_TASK: u16 = 1;
    /// The task payload did not parse into a pipeline.
    pub const INVALID_PAYLOAD: u16 = 2;
    /// The payload names a processor the analyst does not register.
    pub const UNKNOWN_PROCESSOR: u16 = 3;
    /// Any other internal failure, message included.
    pub const INTERNAL: u16 = 100;
}

/// Commands accepted by the analyst command port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    ExecuteTask(TaskStart),
    KillTask(TaskKill),
    KillAll,
}

/// Replies sent back to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    TaskResult(TaskResult),
    Ok,
    Fault(ClusterFault),
}

/// Write one framed message to a synchronous stream.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<(), ClusterError> {
    let body = bincode::serialize(msg)?;
    if body.len() > MAX_FRAME_BYTES as usize {
        return Err(ClusterError::FrameTooLarge(body.len()));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Read one framed message from a synchronous stream.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, ClusterError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(ClusterError::FrameTooLarge(len as usize));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    Ok(bincode::deserialize(&body)?)
}

/// Write one framed message to a tokio stream.
pub async fn write_frame_async<W, T>(writer: &mut W, msg: &T) -> Result<(), ClusterError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = bincode::serialize(msg)?;
    if body.len() > MAX_FRAME_BYTES as usize {
        return Err(ClusterError::FrameTooLarge(body.len()));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message from a tokio stream.
pub async fn read_frame_async<R, T>(reader: &mut R) -> Result<T, ClusterError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(ClusterError::FrameTooLarge(len as usize));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(bincode::deserialize(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn task() -> TaskStart {
        TaskStart {
            id: 42,
            name: "ingest /vol/shoot-07".to_string(),
            master_host: "https://archivist:8066".to_string(),
            payload: r#"{"processors":[],"inputs":[]}"#.to_string(),
            env: BTreeMap::from([("TMPDIR".to_string(), "/scratch".to_string())]),
        }
    }

    #[test]
    fn test_frame_roundtrip_sync() {
        let request = Request::ExecuteTask(task());
        let mut buf = Vec::new();
        write_frame(&mut buf, &request).unwrap();
        // Length prefix present
        assert_eq!(
            u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize,
            buf.len() - 4
        );
        let decoded: Request = read_frame(&mut Cursor::new(buf)).unwrap();
        assert_eq!(request, decoded);
    }

    #[tokio::test]
    async fn test_frame_roundtrip_async() {
        let response = Response::TaskResult(TaskResult {
            id: 42,
            exit_status: 0,
        });
        let mut buf = Vec::new();
        write_frame_async(&mut buf, &response).await.unwrap();
        let decoded: Response = read_frame_async(&mut Cursor::new(buf)).await.unwrap();
        assert_eq!(response, decoded);
    }

    #[test]
    fn test_sync_and_async_frames_are_identical() {
        let request = Request::KillAll;
        let mut sync_buf = Vec::new();
        write_frame(&mut sync_buf, &request).unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let mut async_buf = Vec::new();
        rt.block_on(write_frame_async(&mut async_buf, &request))
            .unwrap();

        assert_eq!(sync_buf, async_buf);
    }

    #[test]
    fn test_oversized_length_prefix_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
        let result: Result<Request, _> = read_frame(&mut Cursor::new(buf));
        assert!(matches!(result, Err(ClusterError::FrameTooLarge(_))));
    }

    #[test]
    fn test_truncated_frame_is_io_error() {
        let request = Request::KillTask(TaskKill {
            id: 7,
            user: "admin".to_string(),
            reason: "job cancelled".to_string(),
        });
        let mut buf = Vec::new();
        write_frame(&mut buf, &request).unwrap();
        buf.truncate(buf.len() - 2);
        let result: Result<Request, _> = read_frame(&mut Cursor::new(buf));
        assert!(matches!(result, Err(ClusterError::Io(_))));
    }

    #[test]
    fn test_task_start_env_defaults_empty_in_json() {
        // Task payloads also appear in JSON job specs, where env is optional
        let decoded: TaskStart = serde_json::from_str(
            r#"{"id":1,"name":"t","master_host":"https://archivist:8066","payload":"{}"}"#,
        )
        .unwrap();
        assert!(decoded.env.is_empty());
    }

    #[test]
    fn test_cluster_fault_display() {
        let fault = ClusterFault {
            code: fault::UNKNOWN_PROCESSOR,
            message: "unknown processor: face-detector".to_string(),
        };
        let msg = fault.to_string();
        assert!(msg.contains("fault 3"));
        assert!(msg.contains("face-detector"));
    }
}
