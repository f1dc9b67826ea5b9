//! Processed asset documents
//!
//! A `Document` is the unit the pipeline mutates and the committer writes
//! into the search index. Attributes are addressed with dotted paths
//! ("source.date", "proxies.proxy") over a nested JSON body.

use crate::ident::object_id;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    source_path: String,
    attrs: Map<String, Value>,
}

impl Document {
    pub fn new(source_path: impl Into<String>) -> Self {
        let source_path = source_path.into();
        let mut doc = Self {
            source_path: source_path.clone(),
            attrs: Map::new(),
        };
        doc.set_attr("source.path", json!(source_path));
        doc
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Deterministic index id for this document, shared with the storage
    /// id scheme.
    pub fn id(&self) -> Uuid {
        object_id(&self.source_path)
    }

    /// Set an attribute by dotted path, creating intermediate objects.
    /// A non-object value in the middle of the path is replaced.
    pub fn set_attr(&mut self, path: &str, value: Value) {
        let mut parts = path.split('.').peekable();
        let mut node = &mut self.attrs;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                node.insert(part.to_string(), value);
                return;
            }
            let child = node
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            match child.as_object_mut() {
                Some(map) => node = map,
                // Unreachable after the object check above
                None => return,
            }
        }
    }

    /// Look up an attribute by dotted path.
    pub fn attr(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.').peekable();
        let mut node = &self.attrs;
        while let Some(part) = parts.next() {
            let child = node.get(part)?;
            if parts.peek().is_none() {
                return Some(child);
            }
            node = child.as_object()?;
        }
        None
    }

    /// Remove an attribute by dotted path. Returns true if it was present.
    pub fn remove_attr(&mut self, path: &str) -> bool {
        let mut parts = path.split('.').peekable();
        let mut node = &mut self.attrs;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                return node.remove(part).is_some();
            }
            match node.get_mut(part).and_then(Value::as_object_mut) {
                Some(map) => node = map,
                None => return false,
            }
        }
        false
    }

    /// Full document body as sent to the search index.
    pub fn to_value(&self) -> Value {
        Value::Object(self.attrs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_records_source_path() {
        let doc = Document::new("/vol/assets/beach.jpg");
        assert_eq!(doc.source_path(), "/vol/assets/beach.jpg");
        assert_eq!(doc.attr("source.path"), Some(&json!("/vol/assets/beach.jpg")));
    }

    #[test]
    fn test_id_matches_storage_scheme() {
        let doc = Document::new("/vol/assets/beach.jpg");
        assert_eq!(doc.id(), object_id("/vol/assets/beach.jpg"));
    }

    #[test]
    fn test_set_and_get_nested_attr() {
        let mut doc = Document::new("/a");
        doc.set_attr("media.width", json!(1920));
        doc.set_attr("media.height", json!(1080));
        assert_eq!(doc.attr("media.width"), Some(&json!(1920)));
        assert_eq!(doc.attr("media.height"), Some(&json!(1080)));
        assert!(doc.attr("media.depth").is_none());
    }

    #[test]
    fn test_set_attr_replaces_scalar_in_path() {
        let mut doc = Document::new("/a");
        doc.set_attr("media", json!("scalar"));
        doc.set_attr("media.width", json!(640));
        assert_eq!(doc.attr("media.width"), Some(&json!(640)));
    }

    #[test]
    fn test_remove_attr() {
        let mut doc = Document::new("/a");
        doc.set_attr("source.date", json!("not a date"));
        assert!(doc.remove_attr("source.date"));
        assert!(doc.attr("source.date").is_none());
        // Sibling keys survive
        assert!(doc.attr("source.path").is_some());
        // Removing again is false
        assert!(!doc.remove_attr("source.date"));
        assert!(!doc.remove_attr("no.such.attr"));
    }

    #[test]
    fn test_to_value_nests_dotted_paths() {
        let mut doc = Document::new("/a");
        doc.set_attr("media.width", json!(640));
        let body = doc.to_value();
        assert_eq!(body.pointer("/media/width"), Some(&json!(640)));
        assert_eq!(body.pointer("/source/path"), Some(&json!("/a")));
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut doc = Document::new("/a");
        doc.set_attr("media.width", json!(640));
        let encoded = serde_json::to_string(&doc).unwrap();
        let decoded: Document = serde_json::from_str(&encoded).unwrap();
        assert_eq!(doc, decoded);
    }
}
