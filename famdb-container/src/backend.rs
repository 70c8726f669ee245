//! The group/attribute/dataset/link storage contract every container
//! implementation must satisfy. The vocabulary (groups, attributes, datasets,
//! symbolic links) is the HDF5 shape the record layout was designed against;
//! nothing here requires HDF5 itself.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use famdb_core::error::FamdbResult;

/// A typed attribute value. `Json` covers the structured blobs (features,
/// coding sequences, aliases, citations) and, pragmatically, whole serialized
/// records: see `famdb_container::leaf` for how a `Family` is stored as a
/// single JSON attribute rather than exploded into one scalar per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Json(JsonValue),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttrValue::UInt(v) => Some(*v),
            AttrValue::Int(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            AttrValue::Json(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        AttrValue::UInt(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<JsonValue> for AttrValue {
    fn from(value: JsonValue) -> Self {
        AttrValue::Json(value)
    }
}

/// Storage primitives a container backend must provide: named groups, typed
/// attributes on a path, byte datasets, and symbolic links (a path that
/// resolves to another path). `famdb_container::leaf`/`root` are written
/// entirely in terms of this trait, never against RocksDB directly.
pub trait ContainerBackend: Send + Sync {
    /// Marks `path` as existing, with no attributes/dataset of its own, so it
    /// shows up as a child of its parent group. Legal to call on a path that
    /// already exists (no-op).
    fn create_group(&self, path: &str) -> FamdbResult<()>;

    fn put_attr(&self, path: &str, name: &str, value: AttrValue) -> FamdbResult<()>;
    fn get_attr(&self, path: &str, name: &str) -> FamdbResult<Option<AttrValue>>;

    fn put_dataset(&self, path: &str, bytes: &[u8]) -> FamdbResult<()>;
    fn get_dataset(&self, path: &str) -> FamdbResult<Option<Vec<u8>>>;

    fn put_link(&self, link_path: &str, target_path: &str) -> FamdbResult<()>;
    fn resolve_link(&self, link_path: &str) -> FamdbResult<Option<String>>;

    /// Immediate child names of `group_path` (not full paths), in the order
    /// they were first created.
    fn list_children(&self, group_path: &str) -> FamdbResult<Vec<String>>;

    fn exists(&self, path: &str) -> bool;

    fn flush(&self) -> FamdbResult<()>;
}

/// Splits `path` into `(parent_group, leaf_name)`. The root group is `""`.
pub(crate) fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_path_nested() {
        assert_eq!(split_path("/Families/DF/00/00/DF0000001"), ("/Families/DF/00/00", "DF0000001"));
    }

    #[test]
    fn split_path_top_level() {
        assert_eq!(split_path("Families"), ("", "Families"));
    }
}
