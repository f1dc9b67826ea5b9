//! TCP command server
//!
//! Accepts framed requests from the master's dispatch client. Connections
//! are cheap and usually short-lived: one request per dispatch, with the
//! connection held open until the task result is ready.

use crate::runtime::TaskRuntime;
use anyhow::{Context, Result};
use archivist_cluster::{read_frame_async, write_frame_async, Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

pub struct Server {
    listener: TcpListener,
    runtime: Arc<TaskRuntime>,
}

impl Server {
    pub async fn bind(addr: SocketAddr, runtime: Arc<TaskRuntime>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind command port {addr}"))?;
        tracing::info!("Listening on {}", listener.local_addr()?);
        Ok(Self { listener, runtime })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop.
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Server ready, accepting dispatches");
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let runtime = Arc::clone(&self.runtime);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, runtime).await {
                            tracing::error!("connection from {} failed: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, runtime: Arc<TaskRuntime>) -> Result<()> {
    loop {
        let request: Request = match read_frame_async(&mut stream).await {
            Ok(request) => request,
            Err(archivist_cluster::ClusterError::Io(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                // Clean disconnect between requests
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("dropping connection after bad frame: {}", e);
                return Ok(());
            }
        };
        let response = dispatch(request, &runtime).await;
        write_frame_async(&mut stream, &response).await?;
    }
}

async fn dispatch(request: Request, runtime: &TaskRuntime) -> Response {
    match request {
        Request::ExecuteTask(task) => match runtime.execute_task(task).await {
            Ok(result) => Response::TaskResult(result),
            Err(fault) => Response::Fault(fault),
        },
        Request::KillTask(kill) => {
            runtime.kill_task(&kill);
            Response::Ok
        }
        Request::KillAll => {
            let killed = runtime.kill_all();
            tracing::info!("kill-all signalled {} tasks", killed);
            Response::Ok
        }
    }
}
