//! Round-robin analyst selection
//!
//! The dispatcher owns one `LoadBalancer` instance and hands it to every
//! client; hosts rotate via an atomic cursor so concurrent dispatchers
//! spread work without locking the host list for writes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Rotating view over the registered analyst hosts.
#[derive(Debug, Default)]
pub struct LoadBalancer {
    hosts: RwLock<Vec<String>>,
    cursor: AtomicUsize,
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: RwLock::new(hosts.into_iter().map(Into::into).collect()),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Register a host. Re-adding an existing host is a no-op.
    pub fn add_host(&self, host: &str) {
        let mut hosts = self.lock_write();
        if !hosts.iter().any(|h| h == host) {
            hosts.push(host.to_string());
        }
    }

    /// Remove a host, e.g. after it fails a dispatch or shuts down.
    pub fn remove_host(&self, host: &str) -> bool {
        let mut hosts = self.lock_write();
        let before = hosts.len();
        hosts.retain(|h| h != host);
        hosts.len() != before
    }

    /// Next host in rotation, or `None` when the pool is empty.
    pub fn next_host(&self) -> Option<String> {
        let hosts = self.lock_read();
        if hosts.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % hosts.len();
        Some(hosts[i].clone())
    }

    pub fn hosts(&self) -> Vec<String> {
        self.lock_read().clone()
    }

    pub fn len(&self) -> usize {
        self.lock_read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_read().is_empty()
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, Vec<String>> {
        self.hosts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<String>> {
        self.hosts.write().unwrap_or_else(|e| e.into_inner())
    }
}
