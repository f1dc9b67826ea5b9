//! archivist-analyst: Worker daemon for the Archivist platform
//!
//! Registers with the master, accepts dispatched ingest tasks over the
//! command port, executes their pipelines and writes results to the
//! object store and search index.

use anyhow::{Context, Result};
use archivist_analyst::config::{default_config_path, load_config, Config};
use archivist_analyst::{default_registry, Server, TaskRuntime};
use archivist_cluster::{AnalystSpec, MasterClient};
use archivist_core::{BulkIngestCommitter, HttpSearchIndex, ObjectFileSystem, SearchIndex};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "archivist-analyst")]
#[command(about = "Archivist analyst - executes ingest pipelines dispatched by the master")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Command port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Object filesystem root
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Master base URL (repeatable)
    #[arg(long = "master")]
    masters: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!(
                "Failed to load config from {}: {}. Using defaults.",
                config_path.display(),
                err
            );
            Config::default()
        }
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    rt.block_on(async_main(args, config))
}

async fn async_main(args: Args, config: Config) -> Result<()> {
    let port = args.port.unwrap_or_else(|| config.command_port());
    let storage_root = args
        .storage_root
        .or_else(|| config.storage_root())
        .context("No storage root configured; pass --storage-root or set [storage] root")?;
    let url_base = config
        .storage_url_base()
        .unwrap_or_else(|| "http://localhost:8066".to_string());

    let masters = if args.masters.is_empty() {
        config.master_hosts()
    } else {
        args.masters.clone()
    };

    let ofs = Arc::new(ObjectFileSystem::new(&storage_root)?);
    tracing::info!("Object store root: {}", storage_root.display());

    let index_url = config
        .index_url()
        .context("No search index configured; set [index] url")?;
    let index: Arc<dyn SearchIndex> =
        Arc::new(HttpSearchIndex::new(&index_url, &config.index_alias())?);
    let committer = match config.max_retry_rounds() {
        Some(rounds) => BulkIngestCommitter::new(index).with_max_retry_rounds(rounds),
        None => BulkIngestCommitter::new(index),
    };
    let committer = Arc::new(committer);

    let runtime = Arc::new(TaskRuntime::new(
        default_registry(),
        ofs,
        committer,
        url_base,
        config.executor_threads(),
    ));

    let bind_addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let server = Server::bind(bind_addr, Arc::clone(&runtime)).await?;

    let spec = analyst_spec(port, &runtime);
    register_with_masters(&masters, &spec).await;

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, shutting down");
        }
    }

    let killed = runtime.kill_all();
    if killed > 0 {
        tracing::info!("Cancelled {} tasks on shutdown", killed);
    }
    let spec = analyst_spec(port, &runtime);
    shutdown_with_masters(&masters, &spec).await;

    tracing::info!("archivist-analyst stopped");
    Ok(())
}

fn analyst_spec(port: u16, runtime: &TaskRuntime) -> AnalystSpec {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    AnalystSpec {
        address: format!("{host}:{port}"),
        threads: runtime.threads(),
        task_ids: runtime.running_task_ids(),
    }
}

/// Register with every configured master. The callback client is blocking,
/// so each call runs off the async threads.
async fn register_with_masters(masters: &[String], spec: &AnalystSpec) {
    for master in masters {
        let master = master.clone();
        let spec = spec.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            MasterClient::new(&master).and_then(|client| client.register(&spec))
        })
        .await;
        match outcome {
            Ok(Ok(())) => tracing::info!("Registered with master"),
            Ok(Err(e)) => tracing::warn!("Master registration failed: {}", e),
            Err(e) => tracing::warn!("Master registration task failed: {}", e),
        }
    }
}

async fn shutdown_with_masters(masters: &[String], spec: &AnalystSpec) {
    for master in masters {
        let master = master.clone();
        let spec = spec.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            MasterClient::new(&master).and_then(|client| client.shutdown(&spec))
        })
        .await;
        if let Ok(Err(e)) = outcome {
            tracing::warn!("Master shutdown notification failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["archivist-analyst"]);
        assert!(args.config.is_none());
        assert!(args.port.is_none());
        assert!(args.storage_root.is_none());
        assert!(args.masters.is_empty());
    }

    #[test]
    fn test_args_repeatable_masters() {
        let args = Args::parse_from([
            "archivist-analyst",
            "--master",
            "http://archivist01:8066",
            "--master",
            "http://archivist02:8066",
            "--port",
            "9100",
        ]);
        assert_eq!(args.masters.len(), 2);
        assert_eq!(args.port, Some(9100));
    }

    #[test]
    fn test_args_storage_root() {
        let args = Args::parse_from(["archivist-analyst", "--storage-root", "/data/ofs"]);
        assert_eq!(
            args.storage_root.as_deref(),
            Some(std::path::Path::new("/data/ofs"))
        );
    }
}
