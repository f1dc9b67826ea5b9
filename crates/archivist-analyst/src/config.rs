//! Configuration loading for the analyst daemon.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    pub cluster: Option<ClusterConfig>,
    pub storage: Option<StorageConfig>,
    pub index: Option<IndexConfig>,
    pub executor: Option<ExecutorConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ClusterConfig {
    /// Command port this analyst listens on.
    pub port: Option<u16>,
    /// Master base URLs for register/shutdown callbacks.
    pub masters: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct StorageConfig {
    /// Object filesystem root.
    pub root: Option<PathBuf>,
    /// Server base used when mapping object files to URLs.
    pub url_base: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct IndexConfig {
    pub url: Option<String>,
    pub alias: Option<String>,
    pub max_retry_rounds: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ExecutorConfig {
    pub threads: Option<usize>,
}

/// Default command port.
pub const DEFAULT_COMMAND_PORT: u16 = 8098;

/// Default number of concurrently executing tasks.
pub const DEFAULT_EXECUTOR_THREADS: usize = 4;

/// Default search index alias.
pub const DEFAULT_INDEX_ALIAS: &str = "assets";

impl Config {
    pub fn command_port(&self) -> u16 {
        self.cluster
            .as_ref()
            .and_then(|c| c.port)
            .unwrap_or(DEFAULT_COMMAND_PORT)
    }

    pub fn master_hosts(&self) -> Vec<String> {
        self.cluster
            .as_ref()
            .and_then(|c| c.masters.clone())
            .unwrap_or_default()
    }

    pub fn storage_root(&self) -> Option<PathBuf> {
        self.storage.as_ref().and_then(|s| s.root.clone())
    }

    pub fn storage_url_base(&self) -> Option<String> {
        self.storage.as_ref().and_then(|s| s.url_base.clone())
    }

    pub fn index_url(&self) -> Option<String> {
        self.index.as_ref().and_then(|i| i.url.clone())
    }

    pub fn index_alias(&self) -> String {
        self.index
            .as_ref()
            .and_then(|i| i.alias.clone())
            .unwrap_or_else(|| DEFAULT_INDEX_ALIAS.to_string())
    }

    pub fn max_retry_rounds(&self) -> Option<usize> {
        self.index.as_ref().and_then(|i| i.max_retry_rounds)
    }

    pub fn executor_threads(&self) -> usize {
        self.executor
            .as_ref()
            .and_then(|e| e.threads)
            .unwrap_or(DEFAULT_EXECUTOR_THREADS)
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "archivist-analyst")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config =
        toml::from_str(&contents).context("Failed to parse config file as TOML")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.command_port(), DEFAULT_COMMAND_PORT);
        assert_eq!(config.executor_threads(), DEFAULT_EXECUTOR_THREADS);
        assert_eq!(config.index_alias(), "assets");
        assert!(config.master_hosts().is_empty());
        assert!(config.storage_root().is_none());
        assert!(config.max_retry_rounds().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [cluster]
            port = 9100
            masters = ["http://archivist01:8066", "http://archivist02:8066"]

            [storage]
            root = "/data/ofs"
            url_base = "http://archivist01:8066"

            [index]
            url = "http://search:9200"
            alias = "assets-v2"
            max_retry_rounds = 5

            [executor]
            threads = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.command_port(), 9100);
        assert_eq!(config.master_hosts().len(), 2);
        assert_eq!(config.storage_root().as_deref(), Some(Path::new("/data/ofs")));
        assert_eq!(config.index_alias(), "assets-v2");
        assert_eq!(config.max_retry_rounds(), Some(5));
        assert_eq!(config.executor_threads(), 8);
    }

    #[test]
    fn test_partial_sections_fall_back() {
        let config: Config = toml::from_str(
            r#"
            [cluster]
            masters = ["http://archivist:8066"]
            "#,
        )
        .unwrap();
        assert_eq!(config.command_port(), DEFAULT_COMMAND_PORT);
        assert_eq!(config.master_hosts(), vec!["http://archivist:8066".to_string()]);
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = load_config(Path::new("/nonexistent/archivist.toml")).unwrap();
        assert_eq!(config.command_port(), DEFAULT_COMMAND_PORT);
    }
}
