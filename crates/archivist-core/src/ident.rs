//! Deterministic content identifiers
//!
//! Storage ids and index document ids come from the same name-based UUID
//! scheme, so an asset's object-store path and its search-index id always
//! agree for a given source.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

/// Pattern a stored object's filename must start with.
pub static OBJECT_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("object id pattern is valid")
});

/// Derive the deterministic identifier for a name.
///
/// Same input always yields the same UUID (v5 over the URL namespace).
pub fn object_id(name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}
