//! RocksDB-backed `ContainerBackend`.
//!
//! One RocksDB instance lives inside each `.h5`-named directory (the
//! extension is kept for cross-implementation compatibility; the bytes
//! inside are an LSM tree, not literal HDF5). Column families mirror the
//! teacher's `cf_names` grouping-by-concern convention: one for attributes,
//! one for dataset bytes, one for links, one for the group/child index that
//! makes `list_children`/`exists` possible without a real filesystem.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{ColumnFamilyDescriptor, Options, DB};

use famdb_core::error::{FamdbError, FamdbResult};

use crate::backend::{split_path, AttrValue, ContainerBackend};

mod cf_names {
    pub const ATTRS: &str = "attrs";
    pub const DATASETS: &str = "datasets";
    pub const LINKS: &str = "links";
    pub const CHILDREN: &str = "children";
}

pub struct RocksContainer {
    db: Arc<DB>,
}

impl RocksContainer {
    /// Opens (creating if absent) the RocksDB directory at `path`.
    pub fn open(path: &Path) -> FamdbResult<Self> {
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_opts = Options::default();
        let descriptors = [
            cf_names::ATTRS,
            cf_names::DATASETS,
            cf_names::LINKS,
            cf_names::CHILDREN,
        ]
        .iter()
        .map(|name| ColumnFamilyDescriptor::new(*name, cf_opts.clone()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&db_opts, path, descriptors)
            .map_err(|e| FamdbError::Container(format!("failed to open {}: {e}", path.display())))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> FamdbResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| FamdbError::Container(format!("missing column family {name}")))
    }

    fn read_children(&self, group_path: &str) -> FamdbResult<Vec<String>> {
        let cf = self.cf(cf_names::CHILDREN)?;
        match self
            .db
            .get_cf(cf, group_path.as_bytes())
            .map_err(|e| FamdbError::Container(e.to_string()))?
        {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| FamdbError::Container(format!("corrupt children index: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    fn write_children(&self, group_path: &str, children: &[String]) -> FamdbResult<()> {
        let cf = self.cf(cf_names::CHILDREN)?;
        let bytes = bincode::serialize(children)
            .map_err(|e| FamdbError::Container(format!("failed to encode children index: {e}")))?;
        self.db
            .put_cf(cf, group_path.as_bytes(), bytes)
            .map_err(|e| FamdbError::Container(e.to_string()))
    }

    /// Registers `path` as an (idempotent) child of its parent group, and
    /// recurses up the chain so every intermediate group between `path` and
    /// the root is itself a listable child of its own parent.
    fn register_child(&self, path: &str) -> FamdbResult<()> {
        if path.is_empty() {
            return Ok(());
        }
        let (parent, leaf) = split_path(path);
        let mut children = self.read_children(parent)?;
        if !children.iter().any(|c| c == leaf) {
            children.push(leaf.to_string());
            self.write_children(parent, &children)?;
            self.register_child(parent)?;
        }
        Ok(())
    }

    fn is_registered(&self, path: &str) -> FamdbResult<bool> {
        if path.is_empty() {
            return Ok(true);
        }
        let (parent, leaf) = split_path(path);
        Ok(self.read_children(parent)?.iter().any(|c| c == leaf))
    }
}

impl ContainerBackend for RocksContainer {
    fn create_group(&self, path: &str) -> FamdbResult<()> {
        self.register_child(path)
    }

    fn put_attr(&self, path: &str, name: &str, value: AttrValue) -> FamdbResult<()> {
        self.register_child(path)?;
        let cf = self.cf(cf_names::ATTRS)?;
        let key = format!("{path}\u{0}{name}");
        let bytes = bincode::serialize(&value)
            .map_err(|e| FamdbError::Container(format!("failed to encode attribute: {e}")))?;
        self.db
            .put_cf(cf, key.as_bytes(), bytes)
            .map_err(|e| FamdbError::Container(e.to_string()))
    }

    fn get_attr(&self, path: &str, name: &str) -> FamdbResult<Option<AttrValue>> {
        let cf = self.cf(cf_names::ATTRS)?;
        let key = format!("{path}\u{0}{name}");
        match self
            .db
            .get_cf(cf, key.as_bytes())
            .map_err(|e| FamdbError::Container(e.to_string()))?
        {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes)
                    .map_err(|e| FamdbError::Container(format!("corrupt attribute: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn put_dataset(&self, path: &str, bytes: &[u8]) -> FamdbResult<()> {
        self.register_child(path)?;
        let cf = self.cf(cf_names::DATASETS)?;
        self.db
            .put_cf(cf, path.as_bytes(), bytes)
            .map_err(|e| FamdbError::Container(e.to_string()))
    }

    fn get_dataset(&self, path: &str) -> FamdbResult<Option<Vec<u8>>> {
        let cf = self.cf(cf_names::DATASETS)?;
        self.db
            .get_cf(cf, path.as_bytes())
            .map_err(|e| FamdbError::Container(e.to_string()))
    }

    fn put_link(&self, link_path: &str, target_path: &str) -> FamdbResult<()> {
        self.register_child(link_path)?;
        let cf = self.cf(cf_names::LINKS)?;
        self.db
            .put_cf(cf, link_path.as_bytes(), target_path.as_bytes())
            .map_err(|e| FamdbError::Container(e.to_string()))
    }

    fn resolve_link(&self, link_path: &str) -> FamdbResult<Option<String>> {
        let cf = self.cf(cf_names::LINKS)?;
        match self
            .db
            .get_cf(cf, link_path.as_bytes())
            .map_err(|e| FamdbError::Container(e.to_string()))?
        {
            Some(bytes) => Ok(Some(
                String::from_utf8(bytes)
                    .map_err(|e| FamdbError::Container(format!("corrupt link target: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    fn list_children(&self, group_path: &str) -> FamdbResult<Vec<String>> {
        self.read_children(group_path)
    }

    fn exists(&self, path: &str) -> bool {
        self.is_registered(path).unwrap_or(false)
    }

    fn flush(&self) -> FamdbResult<()> {
        for name in [
            cf_names::ATTRS,
            cf_names::DATASETS,
            cf_names::LINKS,
            cf_names::CHILDREN,
        ] {
            let cf = self.cf(name)?;
            self.db
                .flush_cf(cf)
                .map_err(|e| FamdbError::Container(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_and_get_attr_roundtrip() {
        let dir = TempDir::new().unwrap();
        let container = RocksContainer::open(dir.path()).unwrap();
        container
            .put_attr("/Families/DF/00/00/DF0000001", "name", AttrValue::from("Charlie1"))
            .unwrap();
        let value = container
            .get_attr("/Families/DF/00/00/DF0000001", "name")
            .unwrap()
            .unwrap();
        assert_eq!(value.as_str(), Some("Charlie1"));
    }

    #[test]
    fn put_attr_registers_path_as_child() {
        let dir = TempDir::new().unwrap();
        let container = RocksContainer::open(dir.path()).unwrap();
        container
            .put_attr("/Families/DF/00/00/DF0000001", "name", AttrValue::from("x"))
            .unwrap();
        assert!(container.exists("/Families/DF/00/00/DF0000001"));
        let children = container.list_children("/Families/DF/00/00").unwrap();
        assert_eq!(children, vec!["DF0000001".to_string()]);
    }

    #[test]
    fn create_group_is_idempotent_and_visible() {
        let dir = TempDir::new().unwrap();
        let container = RocksContainer::open(dir.path()).unwrap();
        container.create_group("/Taxonomy/NodesByTaxon/7").unwrap();
        container.create_group("/Taxonomy/NodesByTaxon/7").unwrap();
        assert!(container.exists("/Taxonomy/NodesByTaxon/7"));
        assert_eq!(
            container.list_children("/Taxonomy/NodesByTaxon/7").unwrap(),
            Vec::<String>::new()
        );
        assert_eq!(
            container.list_children("/Taxonomy/NodesByTaxon").unwrap(),
            vec!["7".to_string()]
        );
    }

    #[test]
    fn links_resolve_to_their_target() {
        let dir = TempDir::new().unwrap();
        let container = RocksContainer::open(dir.path()).unwrap();
        container
            .put_link("/Families/ByName/charlie1", "/Families/DF/00/00/DF0000001")
            .unwrap();
        assert_eq!(
            container.resolve_link("/Families/ByName/charlie1").unwrap(),
            Some("/Families/DF/00/00/DF0000001".to_string())
        );
        assert_eq!(container.resolve_link("/Families/ByName/nobody").unwrap(), None);
    }

    #[test]
    fn datasets_roundtrip() {
        let dir = TempDir::new().unwrap();
        let container = RocksContainer::open(dir.path()).unwrap();
        container
            .put_dataset("/FileHistory/2024-01-01T00:00:00/Family Added", &[0u8])
            .unwrap();
        assert_eq!(
            container
                .get_dataset("/FileHistory/2024-01-01T00:00:00/Family Added")
                .unwrap(),
            Some(vec![0u8])
        );
    }
}
