//! Opens a directory of partition containers, validates cross-file
//! consistency, and dispatches queries and writes across them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use famdb_container::{ContainerBackend, CuratedFilter, LeafContainer, RocksContainer, RootContainer};
use famdb_core::error::{FamdbError, FamdbResult};
use famdb_core::family::{Family, FamilyAccession};
use famdb_core::manifest::{Manifest, PartitionId};
use famdb_core::taxonomy::TaxId;

use crate::report::AppendReport;

static FILENAME_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)\.(\d+)\.h5$").unwrap());

/// A directory of one root container and zero or more leaf containers,
/// opened and cross-validated as a unit.
pub struct PartitionedStore {
    directory: PathBuf,
    prefix: String,
    manifest: Manifest,
    root: RootContainer,
    leaves: BTreeMap<PartitionId, LeafContainer>,
}

impl PartitionedStore {
    /// Enumerates `*.h5` entries in `directory`, requires exactly one
    /// `<prefix>.0.h5` root, requires every other entry to share that prefix,
    /// opens each container, and cross-checks `partition_id`/`db_version`/
    /// `db_date` against the root. Any violation is fatal.
    pub fn open(directory: &Path) -> FamdbResult<Self> {
        let mut by_partition: BTreeMap<PartitionId, (String, PathBuf)> = BTreeMap::new();

        for entry in std::fs::read_dir(directory)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(caps) = FILENAME_SHAPE.captures(&name) else {
                continue;
            };
            let prefix = caps[1].to_string();
            let partition_id: PartitionId = caps[2].parse().map_err(|_| {
                FamdbError::Container(format!("non-numeric partition index in filename {name}"))
            })?;
            by_partition.insert(partition_id, (prefix, entry.path()));
        }

        let Some((root_prefix, root_path)) = by_partition.get(&0).cloned() else {
            return Err(FamdbError::Container(format!(
                "no root file (<prefix>.0.h5) found in {}",
                directory.display()
            )));
        };

        for (partition_id, (prefix, _)) in &by_partition {
            if *prefix != root_prefix {
                return Err(FamdbError::Container(format!(
                    "file for partition {partition_id} has prefix {prefix:?}, expected {root_prefix:?}"
                )));
            }
        }

        let root_backend: Arc<dyn ContainerBackend> = Arc::new(RocksContainer::open(&root_path)?);
        let root = RootContainer::open(root_backend)?;
        check_changelog(root.leaf(), &root_path)?;
        let manifest = read_manifest(root.leaf())?;

        let mut leaves = BTreeMap::new();
        for (&partition_id, (_, path)) in &by_partition {
            if partition_id == 0 {
                continue;
            }
            let backend: Arc<dyn ContainerBackend> = Arc::new(RocksContainer::open(path)?);
            let leaf = LeafContainer::new(backend);
            check_changelog(&leaf, path)?;
            let leaf_manifest = read_manifest(&leaf)?;
            if leaf_manifest.meta != manifest.meta {
                return Err(FamdbError::Inconsistent(format!(
                    "partition {partition_id} manifest metadata does not match root"
                )));
            }
            leaves.insert(partition_id, leaf);
        }

        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: root_prefix,
            manifest,
            root,
            leaves,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn root(&self) -> &RootContainer {
        &self.root
    }

    /// `(partition_id, container)` for every open container, root included,
    /// in ascending partition order.
    pub fn containers(&self) -> impl Iterator<Item = (PartitionId, &LeafContainer)> {
        std::iter::once((0u32, self.root.leaf())).chain(self.leaves.iter().map(|(&p, l)| (p, l)))
    }

    pub fn container_for(&self, partition_id: PartitionId) -> Option<&LeafContainer> {
        if partition_id == 0 {
            Some(self.root.leaf())
        } else {
            self.leaves.get(&partition_id)
        }
    }

    /// Probes every open container in ascending partition order and returns
    /// the first hit.
    pub fn get_family_by_accession(&self, accession: &FamilyAccession) -> FamdbResult<Option<Family>> {
        for (_, container) in self.containers() {
            if let Some(family) = container.get_family_by_accession(accession)? {
                return Ok(Some(family));
            }
        }
        Ok(None)
    }

    pub fn get_family_by_name(&self, name: &str) -> FamdbResult<Option<Family>> {
        for (_, container) in self.containers() {
            if let Some(family) = container.get_family_by_name(name)? {
                return Ok(Some(family));
            }
        }
        Ok(None)
    }

    /// `None` if `tax_id` resolves to no partition at all (absent from the
    /// tree); `Some(accessions)` otherwise, possibly empty.
    pub fn get_families_for_taxon(
        &self,
        tax_id: TaxId,
        filter: CuratedFilter,
    ) -> FamdbResult<Option<Vec<FamilyAccession>>> {
        match self.root.find_taxon(tax_id)? {
            Some(partition_id) => {
                let container = self.container_for(partition_id).ok_or_else(|| {
                    FamdbError::Inconsistent(format!("taxon {tax_id} maps to unopened partition {partition_id}"))
                })?;
                Ok(Some(container.get_families_for_taxon(tax_id, filter)?))
            }
            None => Ok(None),
        }
    }

    /// Routes each family to every partition its clades resolve to, via
    /// [`LeafContainer::add_family`]. A single umbrella changelog entry per
    /// call would require a store-level changelog; per-container changelogs
    /// (one per `add_family`) already give the per-file crash-safety the
    /// contract requires.
    pub fn append(&self, families: &[Family]) -> FamdbResult<AppendReport> {
        let mut report = AppendReport::default();
        let mut was_empty_before: BTreeMap<TaxId, bool> = BTreeMap::new();

        for family in families {
            let mut targets: BTreeSet<PartitionId> = BTreeSet::new();
            for &clade in &family.clades {
                match self.root.find_taxon(clade)? {
                    Some(p) => {
                        targets.insert(p);
                    }
                    None => report.missing_partitions.push((family.accession.clone(), clade)),
                }
            }

            if targets.is_empty() {
                continue;
            }

            let mut wrote_anywhere = false;
            let mut duplicate_anywhere = false;
            for partition_id in targets {
                let Some(container) = self.container_for(partition_id) else {
                    continue;
                };

                for &clade in &family.clades {
                    if self.root.find_taxon(clade)? != Some(partition_id) {
                        continue;
                    }
                    was_empty_before.entry(clade).or_insert_with(|| {
                        container
                            .get_families_for_taxon(clade, CuratedFilter::All)
                            .map(|v| v.is_empty())
                            .unwrap_or(true)
                    });
                }

                match container.add_family(family) {
                    Ok(()) => wrote_anywhere = true,
                    Err(FamdbError::AlreadyExists(_)) => duplicate_anywhere = true,
                    Err(e) => return Err(e),
                }
            }

            if wrote_anywhere {
                report.added.push(family.accession.clone());
                for &clade in &family.clades {
                    if let Some(partition_id) = self.root.find_taxon(clade)? {
                        if let Some(container) = self.container_for(partition_id) {
                            let now_empty = container
                                .get_families_for_taxon(clade, CuratedFilter::All)?
                                .is_empty();
                            if was_empty_before.get(&clade).copied().unwrap_or(false) && !now_empty {
                                report.newly_valued_taxa.insert(clade);
                            }
                        }
                    }
                }
            } else if duplicate_anywhere {
                report.duplicates.push(family.accession.clone());
            }
        }

        if !report.newly_valued_taxa.is_empty() {
            self.update_pruned_tree_incremental(&report.newly_valued_taxa)?;
        }

        Ok(report)
    }

    fn is_valued(&self, tax_id: TaxId) -> FamdbResult<bool> {
        match self.root.find_taxon(tax_id)? {
            Some(partition_id) => match self.container_for(partition_id) {
                Some(container) => Ok(!container.get_families_for_taxon(tax_id, CuratedFilter::All)?.is_empty()),
                None => Ok(false),
            },
            None => Ok(false),
        }
    }

    /// §4.6.a: traverse the full tree once, mark every node valued or not,
    /// then compute `val_parent`/`val_children` from that labeling.
    pub fn rebuild_pruned_tree_full(&self) -> FamdbResult<()> {
        let mut all_ids = self.root.all_tax_ids();
        all_ids.sort_unstable_by_key(|id| id.value());

        let mut valued = BTreeSet::new();
        for &id in &all_ids {
            if self.is_valued(id)? {
                valued.insert(id);
            }
        }

        let mut val_parent: BTreeMap<TaxId, Option<TaxId>> = BTreeMap::new();
        let mut val_children: BTreeMap<TaxId, Vec<TaxId>> = BTreeMap::new();
        for &id in &all_ids {
            val_children.entry(id).or_default();
        }

        for &id in &all_ids {
            // Chain of ancestors from the immediate parent up to (and
            // including) the nearest valued ancestor. A valued `id` is added
            // to *every* ancestor in this chain's `val_children`, not just
            // `val_parent`'s, so an unvalued intermediate ancestor still
            // links through to it — matching the incremental update path
            // (§4.6.b) exactly.
            let mut chain = Vec::new();
            let mut current = self.root.full_parent(id)?;
            let mut parent = None;
            while let Some(ancestor) = current {
                chain.push(ancestor);
                if valued.contains(&ancestor) {
                    parent = Some(ancestor);
                    break;
                }
                current = self.root.full_parent(ancestor)?;
            }
            val_parent.insert(id, parent);
            if valued.contains(&id) {
                for ancestor in &chain {
                    val_children.entry(*ancestor).or_default().push(id);
                }
            }
        }

        let updates: Vec<famdb_container::PrunedUpdate> = all_ids
            .iter()
            .map(|&id| famdb_container::PrunedUpdate {
                tax_id: id,
                children: val_children.remove(&id).unwrap_or_default(),
                parent: val_parent.remove(&id).flatten(),
            })
            .collect();

        self.root.update_pruned_taxa(&updates)
    }

    /// §4.6.b: incremental update for a batch of newly-valued ids.
    pub fn update_pruned_tree_incremental(&self, newly_valued: &BTreeSet<TaxId>) -> FamdbResult<()> {
        let mut updates: BTreeMap<TaxId, famdb_container::PrunedUpdate> = BTreeMap::new();

        for &u in newly_valued {
            let previous_val_parent = self.nearest_pruned_valued_ancestor(u)?;

            let mut chain = Vec::new();
            let mut current = self.root.full_parent(u)?;
            while let Some(ancestor) = current {
                chain.push(ancestor);
                if Some(ancestor) == previous_val_parent {
                    break;
                }
                current = self.root.full_parent(ancestor)?;
            }

            for &ancestor in &chain {
                let descendants = self.full_descendants(u)?;
                let mut children = self.pruned_children_or_default(ancestor, &updates)?;
                children.retain(|c| !descendants.contains(c));
                if !children.contains(&u) {
                    children.push(u);
                }
                updates
                    .entry(ancestor)
                    .or_insert_with(|| famdb_container::PrunedUpdate {
                        tax_id: ancestor,
                        children: Vec::new(),
                        parent: None,
                    })
                    .children = children;
            }

            updates
                .entry(u)
                .or_insert_with(|| famdb_container::PrunedUpdate {
                    tax_id: u,
                    children: Vec::new(),
                    parent: previous_val_parent,
                })
                .parent = previous_val_parent;
        }

        let batch: Vec<_> = updates.into_values().collect();
        self.root.update_pruned_taxa(&batch)
    }

    fn nearest_pruned_valued_ancestor(&self, tax_id: TaxId) -> FamdbResult<Option<TaxId>> {
        let mut current = self.root.full_parent(tax_id)?;
        while let Some(ancestor) = current {
            if self.is_valued(ancestor)? {
                return Ok(Some(ancestor));
            }
            current = self.root.full_parent(ancestor)?;
        }
        Ok(None)
    }

    fn full_descendants(&self, tax_id: TaxId) -> FamdbResult<BTreeSet<TaxId>> {
        let mut out = BTreeSet::new();
        let mut stack = vec![tax_id];
        while let Some(id) = stack.pop() {
            out.insert(id);
            stack.extend(self.root.full_children(id)?);
        }
        Ok(out)
    }

    fn pruned_children_or_default(
        &self,
        tax_id: TaxId,
        pending: &BTreeMap<TaxId, famdb_container::PrunedUpdate>,
    ) -> FamdbResult<Vec<TaxId>> {
        if let Some(update) = pending.get(&tax_id) {
            return Ok(update.children.clone());
        }
        Ok(Vec::new())
    }
}

fn check_changelog(container: &LeafContainer, path: &Path) -> FamdbResult<()> {
    if let Some((entry_path, completed)) = container.last_changelog_entry()? {
        if !completed {
            return Err(FamdbError::InterruptedWrite(format!(
                "{} has an unfinished changelog entry at {entry_path}",
                path.display()
            )));
        }
    }
    Ok(())
}

fn read_manifest(container: &LeafContainer) -> FamdbResult<Manifest> {
    let value = container
        .get_root_attr("file_info")?
        .and_then(|v| v.as_json().cloned())
        .ok_or_else(|| FamdbError::Container("missing file_info manifest attribute".into()))?;
    serde_json::from_value(value).map_err(|e| FamdbError::Inconsistent(format!("corrupt manifest: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use famdb_core::manifest::FileMapEntry;
    use famdb_core::taxonomy::{NameKind, Taxonomy, TaxonomyBuilder};
    use tempfile::TempDir;

    use crate::query::{get_accessions_filtered, Filters};

    fn fixture_taxonomy() -> Taxonomy {
        let mut b = TaxonomyBuilder::new();
        for (id, parent) in [(1, 1), (2, 1), (3, 1), (4, 2), (5, 2), (6, 4), (7, 5)] {
            b.add_node(TaxId::new(id), TaxId::new(parent));
        }
        for (id, name) in [
            (1, "root"),
            (2, "Order"),
            (3, "Other Order"),
            (4, "Genus"),
            (5, "Other Genus"),
            (6, "Species"),
            (7, "Other Species"),
        ] {
            b.add_name(TaxId::new(id), NameKind::SCIENTIFIC_NAME, name);
        }
        b.build().unwrap()
    }

    fn family(accession: &str, clades: &[u32]) -> Family {
        Family {
            accession: FamilyAccession::new(accession).unwrap(),
            version: None,
            name: None,
            length: 100,
            title: None,
            author: None,
            description: None,
            classification: None,
            repeat_type: None,
            repeat_subtype: None,
            clades: clades.iter().map(|&c| TaxId::new(c)).collect(),
            date_created: None,
            date_modified: None,
            search_stages: vec![],
            buffer_stages: vec![],
            refineable: None,
            target_site_cons: None,
            model: None,
            consensus: None,
            max_length: None,
            is_model_masked: None,
            seed_count: None,
            build_method: None,
            search_method: None,
            taxa_thresholds: vec![],
            general_cutoff: None,
            features: None,
            coding_sequences: None,
            aliases: None,
            citations: None,
        }
    }

    /// Writes the spec's miniature fixture directly (bypassing the
    /// partitioner): partitions 0={1,2,3}, 1={4,6}, 2={5,7}.
    fn build_fixture_directory(dir: &Path, prefix: &str) {
        let partitions: [(PartitionId, Vec<u32>); 3] =
            [(0, vec![1, 2, 3]), (1, vec![4, 6]), (2, vec![5, 7])];

        let mut chunk_of = HashMap::new();
        for (pid, nodes) in &partitions {
            for &n in nodes {
                chunk_of.insert(TaxId::new(n), *pid);
            }
        }

        let taxonomy = fixture_taxonomy();

        let meta = famdb_core::manifest::ManifestMeta {
            partition_id: "fixture-run".to_string(),
            db_version: "1".to_string(),
            db_date: "2026-01-01".to_string(),
        };
        let mut file_map = BTreeMap::new();
        for (pid, nodes) in &partitions {
            file_map.insert(
                *pid,
                FileMapEntry {
                    t_root: TaxId::new(nodes[0]),
                    filename: format!("{prefix}.{pid}.h5"),
                    f_roots: nodes.iter().map(|&n| TaxId::new(n)).collect(),
                    t_root_name: String::new(),
                    f_roots_names: vec![],
                },
            );
        }
        let manifest = Manifest { meta, file_map };
        let manifest_attr = AttrValue::Json(serde_json::to_value(&manifest).unwrap());

        for (pid, nodes) in &partitions {
            let path = dir.join(format!("{prefix}.{pid}.h5"));
            let backend: Arc<dyn ContainerBackend> = Arc::new(RocksContainer::open(&path).unwrap());
            let node_set: BTreeSet<TaxId> = nodes.iter().map(|&n| TaxId::new(n)).collect();
            if *pid == 0 {
                let mut root = RootContainer::open(backend).unwrap();
                root.write_full_tree(&taxonomy, &chunk_of).unwrap();
                root.write_names_cache(&taxonomy).unwrap();
                root.leaf().write_taxonomy(&node_set).unwrap();
                root.leaf().set_root_attr("file_info", manifest_attr.clone()).unwrap();
                root.leaf().finalize().unwrap();
            } else {
                let leaf = LeafContainer::new(backend);
                leaf.write_taxonomy(&node_set).unwrap();
                leaf.set_root_attr("file_info", manifest_attr.clone()).unwrap();
                leaf.finalize().unwrap();
            }
        }
    }

    fn open_fixture(dir: &TempDir) -> PartitionedStore {
        build_fixture_directory(dir.path(), "fixture");
        PartitionedStore::open(dir.path()).unwrap()
    }

    #[test]
    fn open_rejects_directory_with_no_root_file() {
        let dir = TempDir::new().unwrap();
        let backend: Arc<dyn ContainerBackend> =
            Arc::new(RocksContainer::open(&dir.path().join("fixture.1.h5")).unwrap());
        LeafContainer::new(backend).finalize().unwrap();
        assert!(PartitionedStore::open(dir.path()).is_err());
    }

    #[test]
    fn open_rejects_mismatched_prefix() {
        let dir = TempDir::new().unwrap();
        build_fixture_directory(dir.path(), "fixture");
        let backend: Arc<dyn ContainerBackend> =
            Arc::new(RocksContainer::open(&dir.path().join("other.3.h5")).unwrap());
        LeafContainer::new(backend).finalize().unwrap();
        assert!(PartitionedStore::open(dir.path()).is_err());
    }

    #[test]
    fn append_routes_each_family_to_its_owning_partitions() {
        let dir = TempDir::new().unwrap();
        let store = open_fixture(&dir);

        let families = vec![
            family("TEST0001", &[1]),
            family("TEST0002", &[2, 3]),
            family("TEST0003", &[3]),
            family("TEST0004", &[4]),
        ];
        let report = store.append(&families).unwrap();
        assert_eq!(report.success_count(), 4);
        assert!(report.duplicates.is_empty());
        assert!(report.missing_partitions.is_empty());

        let taxon3 = store
            .get_families_for_taxon(TaxId::new(3), CuratedFilter::All)
            .unwrap()
            .unwrap();
        let mut names: Vec<&str> = taxon3.iter().map(|a| a.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["TEST0002", "TEST0003"]);
    }

    #[test]
    fn ancestors_filter_matches_taxon_three_lineage() {
        let dir = TempDir::new().unwrap();
        let store = open_fixture(&dir);
        store
            .append(&[
                family("TEST0001", &[1]),
                family("TEST0002", &[2, 3]),
                family("TEST0003", &[3]),
                family("TEST0004", &[4]),
            ])
            .unwrap();

        let filters = Filters {
            tax_id: Some(TaxId::new(3)),
            ancestors: true,
            descendants: false,
            ..Default::default()
        };
        let mut got: Vec<String> = get_accessions_filtered(&store, &filters)
            .unwrap()
            .into_iter()
            .map(|a| a.to_string())
            .collect();
        got.sort_unstable();
        assert_eq!(got, vec!["TEST0001", "TEST0002", "TEST0003"]);
    }

    #[test]
    fn uncurated_only_keeps_the_nine_digit_dr_accession() {
        let dir = TempDir::new().unwrap();
        let store = open_fixture(&dir);
        store
            .append(&[family("DR000000001", &[7]), family("DR_Repeat1", &[6])])
            .unwrap();

        let filters = Filters {
            uncurated_only: true,
            ..Filters::whole_database()
        };
        let got: Vec<String> = get_accessions_filtered(&store, &filters)
            .unwrap()
            .into_iter()
            .map(|a| a.to_string())
            .collect();
        assert_eq!(got, vec!["DR000000001"]);
    }

    #[test]
    fn stage_eighty_disables_the_stage_filter() {
        let dir = TempDir::new().unwrap();
        let store = open_fixture(&dir);
        store
            .append(&[
                family("TEST0002", &[2, 3]),
                family("TEST0004", &[4]),
                family("DR_Repeat1", &[6]),
                family("DR000000001", &[7]),
            ])
            .unwrap();

        let filters = Filters {
            tax_id: Some(TaxId::new(2)),
            descendants: true,
            stage: Some(80),
            ..Default::default()
        };
        let mut got: Vec<String> = get_accessions_filtered(&store, &filters)
            .unwrap()
            .into_iter()
            .map(|a| a.to_string())
            .collect();
        got.sort_unstable();
        assert_eq!(got, vec!["DR000000001", "DR_Repeat1", "TEST0002", "TEST0004"]);
    }

    #[test]
    fn append_marks_newly_valued_taxa_and_rebuilds_pruned_links() {
        let dir = TempDir::new().unwrap();
        let store = open_fixture(&dir);

        let report = store.append(&[family("TEST0004", &[4])]).unwrap();
        assert!(report.newly_valued_taxa.contains(&TaxId::new(4)));

        let lineage = store.root().get_lineage(TaxId::new(2), false, true, false).unwrap();
        assert_eq!(lineage.tax_id, TaxId::new(2));
        let child_ids: Vec<u32> = lineage.children.iter().map(|c| c.tax_id.value()).collect();
        assert_eq!(child_ids, vec![4]);
    }

    #[test]
    fn full_rebuild_agrees_with_incremental_update_on_unvalued_intermediate_ancestors() {
        let dir = TempDir::new().unwrap();
        let store = open_fixture(&dir);

        // Node 7 is valued, node 2 is valued, and node 5 sits strictly
        // between them unvalued. The incremental update threads 7 through
        // every ancestor up to its val_parent (2), not just val_parent
        // itself, so node 5's PrunedChildren must also contain 7.
        store
            .append(&[family("TEST0002", &[2]), family("DR000000001", &[7])])
            .unwrap();

        let incremental = store.root().get_lineage(TaxId::new(5), false, true, false).unwrap();
        let incremental_children: Vec<u32> = incremental.children.iter().map(|c| c.tax_id.value()).collect();
        assert_eq!(incremental_children, vec![7]);

        // A from-scratch full rebuild over the same valued set must produce
        // the identical link, not just a link at node 5's val_parent.
        store.rebuild_pruned_tree_full().unwrap();
        let rebuilt = store.root().get_lineage(TaxId::new(5), false, true, false).unwrap();
        let rebuilt_children: Vec<u32> = rebuilt.children.iter().map(|c| c.tax_id.value()).collect();
        assert_eq!(rebuilt_children, vec![7]);
    }

    #[test]
    fn duplicate_append_is_reported_without_error() {
        let dir = TempDir::new().unwrap();
        let store = open_fixture(&dir);
        let f = family("TEST0001", &[1]);
        store.append(std::slice::from_ref(&f)).unwrap();
        let report = store.append(std::slice::from_ref(&f)).unwrap();
        assert!(report.added.is_empty());
        assert_eq!(report.duplicates, vec![f.accession]);
    }
}
