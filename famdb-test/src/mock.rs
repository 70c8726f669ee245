//! In-memory [`ContainerBackend`] for fast unit tests that don't need a real
//! RocksDB directory on disk, modeled on the teacher's
//! `InMemoryStorageBackend` (`Arc<RwLock<HashMap<..>>>` per concern, with a
//! call recorder for assertions).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use famdb_container::backend::{AttrValue, ContainerBackend};
use famdb_core::error::FamdbResult;

/// Splits `path` into `(parent_group, leaf_name)`, mirroring
/// `famdb_container::backend::split_path` (kept crate-private there).
fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    }
}

#[derive(Default)]
pub struct MockContainer {
    attrs: RwLock<HashMap<(String, String), AttrValue>>,
    datasets: RwLock<HashMap<String, Vec<u8>>>,
    links: RwLock<HashMap<String, String>>,
    children: RwLock<HashMap<String, Vec<String>>>,
    calls: RwLock<Vec<String>>,
}

impl MockContainer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Recorded method calls, in order, for test assertions.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.write().push(call.into());
    }

    fn register_child(&self, path: &str) {
        if path.is_empty() {
            return;
        }
        let (parent, leaf) = split_path(path);
        let mut children = self.children.write();
        let entry = children.entry(parent.to_string()).or_default();
        if !entry.iter().any(|c| c == leaf) {
            entry.push(leaf.to_string());
            drop(children);
            self.register_child(parent);
        }
    }
}

impl ContainerBackend for MockContainer {
    fn create_group(&self, path: &str) -> FamdbResult<()> {
        self.record(format!("create_group({path})"));
        self.register_child(path);
        Ok(())
    }

    fn put_attr(&self, path: &str, name: &str, value: AttrValue) -> FamdbResult<()> {
        self.record(format!("put_attr({path}, {name})"));
        self.register_child(path);
        self.attrs.write().insert((path.to_string(), name.to_string()), value);
        Ok(())
    }

    fn get_attr(&self, path: &str, name: &str) -> FamdbResult<Option<AttrValue>> {
        self.record(format!("get_attr({path}, {name})"));
        Ok(self.attrs.read().get(&(path.to_string(), name.to_string())).cloned())
    }

    fn put_dataset(&self, path: &str, bytes: &[u8]) -> FamdbResult<()> {
        self.record(format!("put_dataset({path})"));
        self.register_child(path);
        self.datasets.write().insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get_dataset(&self, path: &str) -> FamdbResult<Option<Vec<u8>>> {
        self.record(format!("get_dataset({path})"));
        Ok(self.datasets.read().get(path).cloned())
    }

    fn put_link(&self, link_path: &str, target_path: &str) -> FamdbResult<()> {
        self.record(format!("put_link({link_path} -> {target_path})"));
        self.register_child(link_path);
        self.links.write().insert(link_path.to_string(), target_path.to_string());
        Ok(())
    }

    fn resolve_link(&self, link_path: &str) -> FamdbResult<Option<String>> {
        self.record(format!("resolve_link({link_path})"));
        Ok(self.links.read().get(link_path).cloned())
    }

    fn list_children(&self, group_path: &str) -> FamdbResult<Vec<String>> {
        self.record(format!("list_children({group_path})"));
        Ok(self.children.read().get(group_path).cloned().unwrap_or_default())
    }

    fn exists(&self, path: &str) -> bool {
        if path.is_empty() {
            return true;
        }
        let (parent, leaf) = split_path(path);
        self.children
            .read()
            .get(parent)
            .is_some_and(|children| children.iter().any(|c| c == leaf))
    }

    fn flush(&self) -> FamdbResult<()> {
        self.record("flush()");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get_attr_roundtrip() {
        let container = MockContainer::new();
        container.put_attr("/Families/DF/00/00/DF0000001", "name", AttrValue::from("Charlie1")).unwrap();
        let value = container.get_attr("/Families/DF/00/00/DF0000001", "name").unwrap().unwrap();
        assert_eq!(value.as_str(), Some("Charlie1"));
    }

    #[test]
    fn put_attr_registers_path_as_listable_child() {
        let container = MockContainer::new();
        container.put_attr("/Families/DF/00/00/DF0000001", "name", AttrValue::from("x")).unwrap();
        assert!(container.exists("/Families/DF/00/00/DF0000001"));
        assert_eq!(
            container.list_children("/Families/DF/00/00").unwrap(),
            vec!["DF0000001".to_string()]
        );
    }

    #[test]
    fn calls_are_recorded_in_order() {
        let container = MockContainer::new();
        container.create_group("/Taxonomy").unwrap();
        container.flush().unwrap();
        assert_eq!(container.calls(), vec!["create_group(/Taxonomy)".to_string(), "flush()".to_string()]);
    }
}
