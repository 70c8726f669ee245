//! Builds a fresh partitioned store: runs the weighted partitioner, writes
//! one container per chunk, routes every family to its owning chunk(s), and
//! opens the result as a [`PartitionedStore`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use famdb_container::{AttrValue, ContainerBackend, LeafContainer, RocksContainer, RootContainer};
use famdb_core::error::FamdbResult;
use famdb_core::family::Family;
use famdb_core::manifest::{FileMapEntry, Manifest, ManifestMeta, PartitionId};
use famdb_core::taxonomy::{TaxId, Taxonomy};

use crate::store::PartitionedStore;

pub struct DbMetadata {
    pub name: String,
    pub description: String,
    pub copyright: String,
}

pub fn build_store(
    directory: &Path,
    prefix: &str,
    taxonomy: &Taxonomy,
    families: &[Family],
    filesizes: &HashMap<TaxId, u64>,
    bound: u64,
    db_version: &str,
    db_date: &str,
    db_meta: &DbMetadata,
) -> FamdbResult<PartitionedStore> {
    std::fs::create_dir_all(directory)?;

    let chunks = famdb_partition::partition(taxonomy, filesizes, bound)?;

    let mut chunk_of: HashMap<TaxId, PartitionId> = HashMap::new();
    for chunk in &chunks {
        for &node in &chunk.nodes {
            chunk_of.insert(node, chunk.chunk_id);
        }
    }

    let name_of = |id: TaxId| -> String {
        taxonomy.get(id).and_then(|t| t.scientific_name()).unwrap_or_default().to_string()
    };

    let meta = ManifestMeta {
        partition_id: uuid::Uuid::new_v4().to_string(),
        db_version: db_version.to_string(),
        db_date: db_date.to_string(),
    };

    let mut file_map = BTreeMap::new();
    for chunk in &chunks {
        let filename = format!("{prefix}.{}.h5", chunk.chunk_id);
        file_map.insert(
            chunk.chunk_id,
            FileMapEntry {
                t_root: chunk.t_root,
                filename,
                f_roots: chunk.f_roots.clone(),
                t_root_name: name_of(chunk.t_root),
                f_roots_names: chunk.f_roots.iter().map(|&id| name_of(id)).collect(),
            },
        );
    }
    let manifest = Manifest { meta, file_map };
    let manifest_value = AttrValue::Json(serde_json::to_value(&manifest)?);

    let created = chrono::Utc::now().to_rfc3339();

    for chunk in &chunks {
        let path = directory.join(format!("{prefix}.{}.h5", chunk.chunk_id));
        let backend: Arc<dyn ContainerBackend> = Arc::new(RocksContainer::open(&path)?);

        let leaf = if chunk.is_root() {
            let mut root = RootContainer::open(backend)?;
            root.write_full_tree(taxonomy, &chunk_of)?;
            root.write_names_cache(taxonomy)?;
            root.leaf().write_taxonomy(&chunk.nodes)?;
            write_families(root.leaf(), families, &chunk.nodes)?;
            write_root_metadata(root.leaf(), chunk.chunk_id, true, &created, db_version, db_date, db_meta)?;
            root.leaf().set_root_attr("file_info", manifest_value.clone())?;
            root.leaf().finalize()?;
            continue;
        } else {
            LeafContainer::new(backend)
        };
        leaf.write_taxonomy(&chunk.nodes)?;
        write_families(&leaf, families, &chunk.nodes)?;
        write_root_metadata(&leaf, chunk.chunk_id, false, &created, db_version, db_date, db_meta)?;
        leaf.set_root_attr("file_info", manifest_value.clone())?;
        leaf.finalize()?;
    }

    let store = PartitionedStore::open(directory)?;
    store.rebuild_pruned_tree_full()?;
    Ok(store)
}

/// Writes the root-attribute set spec.md §4.4 lists beyond `file_info`:
/// crate version, build timestamp, db identity fields, and which partition
/// this file is.
#[allow(clippy::too_many_arguments)]
fn write_root_metadata(
    leaf: &LeafContainer,
    chunk_id: famdb_core::manifest::PartitionId,
    is_root: bool,
    created: &str,
    db_version: &str,
    db_date: &str,
    db_meta: &DbMetadata,
) -> FamdbResult<()> {
    leaf.set_root_attr("famdb_version", AttrValue::from(famdb_core::VERSION))?;
    leaf.set_root_attr("created", AttrValue::from(created))?;
    leaf.set_root_attr("db_name", AttrValue::from(db_meta.name.as_str()))?;
    leaf.set_root_attr("db_version", AttrValue::from(db_version))?;
    leaf.set_root_attr("db_date", AttrValue::from(db_date))?;
    leaf.set_root_attr("db_description", AttrValue::from(db_meta.description.as_str()))?;
    leaf.set_root_attr("db_copyright", AttrValue::from(db_meta.copyright.as_str()))?;
    leaf.set_root_attr("partition_num", AttrValue::from(chunk_id as u64))?;
    leaf.set_root_attr("root", AttrValue::from(is_root))?;
    Ok(())
}

/// Writes every family whose clade set intersects `owned_nodes` into `leaf`,
/// once per family regardless of how many owned clades it has.
fn write_families(leaf: &LeafContainer, families: &[Family], owned_nodes: &BTreeSet<TaxId>) -> FamdbResult<()> {
    for family in families {
        if family.clades.iter().any(|c| owned_nodes.contains(c)) {
            leaf.add_family(family)?;
        }
    }
    Ok(())
}
