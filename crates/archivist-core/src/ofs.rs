//! Content-addressable object file system
//!
//! Derived artifacts (proxies, thumbnails) are stored under paths computed
//! from a name-based UUID of a caller-supplied identifier. The same
//! `(category, hashable-id, type, variants)` tuple always maps to the same
//! path, so storage is idempotent rather than random. Directory fan-out is
//! bounded by sharding on successive hex characters of the id.

use crate::error::OfsError;
use crate::ident::{object_id, OBJECT_ID_PATTERN};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Number of shard directories between the category and the file. One hex
/// character per level bounds fan-out to 16 entries per directory.
pub const DIR_DEPTH: usize = 4;

/// Canonical UUID string length, used when splitting variants off a name.
const ID_STR_LEN: usize = 36;

/// Handle to a stored (or storable) artifact. `prepare` returns one without
/// creating the file itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFile {
    category: String,
    id: Uuid,
    path: PathBuf,
}

impl ObjectFile {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Filename of the form `<id>[_<variant>...].<ext>`.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Composite id of the form `category/filename`, resolvable by
    /// [`ObjectFileSystem::get_by_id`].
    pub fn composite_id(&self) -> String {
        format!("{}/{}", self.category, self.file_name())
    }
}

/// Local content-addressable storage rooted at a single directory.
pub struct ObjectFileSystem {
    root: PathBuf,
}

impl ObjectFileSystem {
    /// Open the store, creating the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, OfsError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate storage for an artifact, creating parent directories but not
    /// the file. Deterministic: the same inputs always yield the same path.
    pub fn prepare(
        &self,
        category: &str,
        hashable_id: &str,
        ext: &str,
        variants: &[&str],
    ) -> Result<ObjectFile, OfsError> {
        let id = object_id(hashable_id);
        let file = self.build(category, id, ext, variants);
        if let Some(parent) = file.path.parent() {
            // create_dir_all is idempotent, safe under concurrent prepares
            std::fs::create_dir_all(parent)?;
        }
        Ok(file)
    }

    /// Resolve a stored filename of the form `<id>[_<variant>...].<ext>`
    /// back to the same path `prepare` would produce.
    ///
    /// The extension starts at the first dot after the variant block, so
    /// compound extensions ("tar.gz") survive the round trip.
    pub fn get(&self, category: &str, name: &str) -> Result<ObjectFile, OfsError> {
        if !OBJECT_ID_PATTERN.is_match(name) {
            return Err(OfsError::InvalidId(name.to_string()));
        }
        let dot = name[ID_STR_LEN..]
            .find('.')
            .map(|i| i + ID_STR_LEN)
            .ok_or_else(|| OfsError::InvalidId(name.to_string()))?;
        let (stem, ext) = (&name[..dot], &name[dot + 1..]);
        if ext.is_empty() {
            return Err(OfsError::InvalidId(name.to_string()));
        }
        let variants: Vec<&str> = match &stem[ID_STR_LEN..] {
            "" => Vec::new(),
            rest if rest.starts_with('_') => rest[1..].split('_').collect(),
            _ => return Err(OfsError::InvalidId(name.to_string())),
        };
        let id = Uuid::parse_str(&name[..ID_STR_LEN])
            .map_err(|_| OfsError::InvalidId(name.to_string()))?;
        Ok(self.build(category, id, ext, &variants))
    }

    /// Resolve a composite id of the form `category/filename`.
    pub fn get_by_id(&self, composite: &str) -> Result<ObjectFile, OfsError> {
        let (category, name) = composite
            .split_once('/')
            .ok_or_else(|| OfsError::InvalidId(composite.to_string()))?;
        self.get(category, name)
    }

    /// Copy external content into the store unless the destination already
    /// exists. Returns false when the artifact was already present.
    ///
    /// Accepts a local path, a `file://` URI, or an `http(s)://` URL.
    /// Failures are not retried here; retry policy belongs to the caller.
    pub fn transfer(&self, source: &str, dest: &ObjectFile) -> Result<bool, OfsError> {
        if dest.path.exists() {
            tracing::debug!("transfer skipped, {} already stored", dest.composite_id());
            return Ok(false);
        }
        if let Some(parent) = dest.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if source.starts_with("http://") || source.starts_with("https://") {
            let response = reqwest::blocking::get(source)
                .and_then(|r| r.error_for_status())
                .map_err(|e| OfsError::Transfer {
                    uri: source.to_string(),
                    reason: e.to_string(),
                })?;
            let body = response.bytes().map_err(|e| OfsError::Transfer {
                uri: source.to_string(),
                reason: e.to_string(),
            })?;
            std::fs::write(&dest.path, &body)?;
        } else {
            let local = source.strip_prefix("file://").unwrap_or(source);
            std::fs::copy(local, &dest.path)?;
        }
        tracing::debug!("transferred {} to {}", source, dest.path.display());
        Ok(true)
    }

    /// Externally addressable URL for a stored artifact, relative to a
    /// configured server base.
    pub fn url(&self, file: &ObjectFile, base: &str) -> String {
        let rel = file.path.strip_prefix(&self.root).unwrap_or(&file.path);
        format!(
            "{}/api/v1/fs/{}",
            base.trim_end_matches('/'),
            rel.display()
        )
    }

    fn build(&self, category: &str, id: Uuid, ext: &str, variants: &[&str]) -> ObjectFile {
        let id_str = id.to_string();
        let mut path = self.root.join(category);
        for ch in id_str.chars().take(DIR_DEPTH) {
            path.push(ch.to_string());
        }
        let mut name = id_str;
        for variant in variants {
            name.push('_');
            name.push_str(variant);
        }
        name.push('.');
        name.push_str(ext);
        path.push(name);
        ObjectFile {
            category: category.to_string(),
            id,
            path,
        }
    }
}
