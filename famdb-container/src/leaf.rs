//! Leaf container: per-family storage plus the indices (`ByName`, `ByStage`,
//! `NodesByTaxon`) a single partitioned file needs to answer queries about
//! its own families.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use famdb_core::error::{FamdbError, FamdbResult};
use famdb_core::family::{Family, FamilyAccession};
use famdb_core::taxonomy::TaxId;

use crate::backend::{AttrValue, ContainerBackend};

/// Curation filter for `get_families_for_taxon`, mirroring the `curated_only`/
/// `uncurated_only` query engine filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CuratedFilter {
    CuratedOnly,
    UncuratedOnly,
    All,
}

impl CuratedFilter {
    fn keeps(self, accession: &FamilyAccession) -> bool {
        match self {
            CuratedFilter::All => true,
            CuratedFilter::CuratedOnly => !accession.is_uncurated(),
            CuratedFilter::UncuratedOnly => accession.is_uncurated(),
        }
    }
}

/// A single partitioned file's family store, built entirely on the
/// `ContainerBackend` primitives.
pub struct LeafContainer {
    backend: Arc<dyn ContainerBackend>,
    count_consensus: AtomicU64,
    count_hmm: AtomicU64,
}

impl LeafContainer {
    /// Seeds the in-memory counters from whatever `count_consensus`/`count_hmm`
    /// is already persisted (0 for a brand-new container), so a later
    /// `finalize()` after appending to an existing file adds to the running
    /// total instead of overwriting it with just this session's additions.
    pub fn new(backend: Arc<dyn ContainerBackend>) -> Self {
        let count_consensus = backend.get_attr("", "count_consensus").ok().flatten().and_then(|v| v.as_u64()).unwrap_or(0);
        let count_hmm = backend.get_attr("", "count_hmm").ok().flatten().and_then(|v| v.as_u64()).unwrap_or(0);
        Self {
            backend,
            count_consensus: AtomicU64::new(count_consensus),
            count_hmm: AtomicU64::new(count_hmm),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ContainerBackend> {
        &self.backend
    }

    fn begin_changelog(&self, message: &str) -> FamdbResult<String> {
        let ts = chrono::Utc::now().to_rfc3339();
        let group = format!("/FileHistory/{ts}");
        self.backend.create_group(&group)?;
        let path = format!("{group}/{message}");
        self.backend.put_dataset(&path, &[0u8])?;
        self.backend.flush()?;
        Ok(path)
    }

    /// The most recent changelog entry's full path and whether it is marked
    /// complete (`[1u8]`), or `None` if no entry has ever been written.
    pub fn last_changelog_entry(&self) -> FamdbResult<Option<(String, bool)>> {
        let mut timestamps = self.backend.list_children("/FileHistory")?;
        timestamps.sort();
        let Some(latest) = timestamps.pop() else {
            return Ok(None);
        };
        let group = format!("/FileHistory/{latest}");
        let mut messages = self.backend.list_children(&group)?;
        messages.sort();
        let Some(message) = messages.pop() else {
            return Ok(None);
        };
        let path = format!("{group}/{message}");
        let completed = matches!(self.backend.get_dataset(&path)?, Some(bytes) if bytes == [1u8]);
        Ok(Some((path, completed)))
    }

    fn complete_changelog(&self, path: &str) -> FamdbResult<()> {
        self.backend.put_dataset(path, &[1u8])?;
        self.backend.flush()
    }

    fn family_path(&self, accession: &FamilyAccession) -> String {
        format!("{}/{}", accession.accession_bin(), accession.as_str())
    }

    /// Writes a family record and its indices. Rejects a duplicate accession
    /// (plain or `v`-suffixed form — the source's convention for a
    /// version-qualified variant of the same accession) or a colliding name.
    pub fn add_family(&self, family: &Family) -> FamdbResult<()> {
        let path = self.family_path(&family.accession);
        let v_path = format!("{path}v");
        if self.backend.exists(&path) || self.backend.exists(&v_path) {
            return Err(FamdbError::AlreadyExists(format!(
                "accession {} already present",
                family.accession
            )));
        }
        if let Some(name) = &family.name {
            let by_name = format!("/Families/ByName/{name}");
            if self.backend.resolve_link(&by_name)?.is_some() {
                return Err(FamdbError::AlreadyExists(format!("name {name} already present")));
            }
        }

        let changelog_path = self.begin_changelog("Family Added")?;

        self.backend
            .put_attr(&path, "record", AttrValue::Json(serde_json::to_value(family)?))?;

        if let Some(name) = &family.name {
            self.backend.put_link(&format!("/Families/ByName/{name}"), &path)?;
        }
        for stage in family.stage_ids() {
            self.backend
                .put_link(&format!("/Families/ByStage/{stage}/{}", family.accession), &path)?;
        }
        for clade in &family.clades {
            let group = format!("/Taxonomy/NodesByTaxon/{clade}");
            if self.backend.exists(&group) {
                self.backend
                    .put_link(&format!("{group}/{}", family.accession), &path)?;
            }
        }

        if family.has_consensus() {
            self.count_consensus.fetch_add(1, Ordering::Relaxed);
        }
        if family.has_hmm() {
            self.count_hmm.fetch_add(1, Ordering::Relaxed);
        }

        self.complete_changelog(&changelog_path)
    }

    pub fn get_family_by_accession(&self, accession: &FamilyAccession) -> FamdbResult<Option<Family>> {
        let path = self.family_path(accession);
        self.read_record(&path)
    }

    pub fn get_family_by_name(&self, name: &str) -> FamdbResult<Option<Family>> {
        match self.backend.resolve_link(&format!("/Families/ByName/{name}"))? {
            Some(target) => self.read_record(&target),
            None => Ok(None),
        }
    }

    fn read_record(&self, path: &str) -> FamdbResult<Option<Family>> {
        match self.backend.get_attr(path, "record")? {
            Some(AttrValue::Json(value)) => Ok(Some(serde_json::from_value(value)?)),
            Some(_) => Err(FamdbError::Inconsistent(format!("corrupt family record at {path}"))),
            None => Ok(None),
        }
    }

    pub fn get_families_for_taxon(
        &self,
        tax_id: TaxId,
        filter: CuratedFilter,
    ) -> FamdbResult<Vec<FamilyAccession>> {
        let group = format!("/Taxonomy/NodesByTaxon/{tax_id}");
        let mut out = Vec::new();
        for name in self.backend.list_children(&group)? {
            let accession = FamilyAccession::new(name)?;
            if filter.keeps(&accession) {
                out.push(accession);
            }
        }
        Ok(out)
    }

    pub fn filter_stages(&self, accession: &FamilyAccession, stage: u32) -> FamdbResult<bool> {
        let link = format!("/Families/ByStage/{stage}/{accession}");
        Ok(self.backend.resolve_link(&link)?.is_some())
    }

    /// Materializes an empty `NodesByTaxon/<tax_id>` group for every taxon in
    /// this leaf's chunk, ahead of any family referencing it.
    pub fn write_taxonomy(&self, nodes: &BTreeSet<TaxId>) -> FamdbResult<()> {
        for tax_id in nodes {
            self.backend.create_group(&format!("/Taxonomy/NodesByTaxon/{tax_id}"))?;
        }
        Ok(())
    }

    pub fn finalize(&self) -> FamdbResult<()> {
        self.backend.put_attr(
            "",
            "count_consensus",
            AttrValue::from(self.count_consensus.load(Ordering::Relaxed)),
        )?;
        self.backend
            .put_attr("", "count_hmm", AttrValue::from(self.count_hmm.load(Ordering::Relaxed)))?;
        self.backend.flush()
    }

    pub fn count_consensus(&self) -> u64 {
        self.count_consensus.load(Ordering::Relaxed)
    }

    pub fn count_hmm(&self) -> u64 {
        self.count_hmm.load(Ordering::Relaxed)
    }

    /// Every family name present in this leaf's `ByName` index.
    pub fn get_family_names(&self) -> FamdbResult<Vec<String>> {
        self.backend.list_children("/Families/ByName")
    }

    pub fn set_root_attr(&self, name: &str, value: AttrValue) -> FamdbResult<()> {
        self.backend.put_attr("", name, value)
    }

    pub fn get_root_attr(&self, name: &str) -> FamdbResult<Option<AttrValue>> {
        self.backend.get_attr("", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rocks::RocksContainer;
    use tempfile::TempDir;

    fn family(accession: &str, name: Option<&str>) -> Family {
        Family {
            accession: FamilyAccession::new(accession).unwrap(),
            version: None,
            name: name.map(str::to_string),
            length: 100,
            title: None,
            author: None,
            description: None,
            classification: None,
            repeat_type: None,
            repeat_subtype: None,
            clades: vec![TaxId::new(6)],
            date_created: None,
            date_modified: None,
            search_stages: vec![35],
            buffer_stages: vec!["70a-b".to_string()],
            refineable: None,
            target_site_cons: None,
            model: Some("HMM".to_string()),
            consensus: Some("ACGT".to_string()),
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

    fn leaf_with_taxon(taxon: u32) -> (TempDir, LeafContainer) {
        let dir = TempDir::new().unwrap();
        let backend: Arc<dyn ContainerBackend> =
            Arc::new(RocksContainer::open(dir.path()).unwrap());
        let leaf = LeafContainer::new(backend);
        leaf.write_taxonomy(&BTreeSet::from([TaxId::new(taxon)])).unwrap();
        (dir, leaf)
    }

    #[test]
    fn add_and_fetch_family_by_accession() {
        let (_dir, leaf) = leaf_with_taxon(6);
        let f = family("DF0000001", Some("Charlie1"));
        leaf.add_family(&f).unwrap();

        let fetched = leaf
            .get_family_by_accession(&FamilyAccession::new("DF0000001").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(fetched.accession.as_str(), "DF0000001");
        assert_eq!(fetched.name.as_deref(), Some("Charlie1"));
    }

    #[test]
    fn add_family_populates_name_and_stage_links() {
        let (_dir, leaf) = leaf_with_taxon(6);
        let f = family("DF0000001", Some("Charlie1"));
        leaf.add_family(&f).unwrap();

        let by_name = leaf.get_family_by_name("Charlie1").unwrap().unwrap();
        assert_eq!(by_name.accession.as_str(), "DF0000001");

        assert!(leaf
            .filter_stages(&FamilyAccession::new("DF0000001").unwrap(), 35)
            .unwrap());
        assert!(leaf
            .filter_stages(&FamilyAccession::new("DF0000001").unwrap(), 70)
            .unwrap());
        assert!(!leaf
            .filter_stages(&FamilyAccession::new("DF0000001").unwrap(), 50)
            .unwrap());
    }

    #[test]
    fn add_family_links_only_owned_clades() {
        let (_dir, leaf) = leaf_with_taxon(6);
        let mut f = family("DF0000001", None);
        f.clades = vec![TaxId::new(6), TaxId::new(99)];
        leaf.add_family(&f).unwrap();

        let owned = leaf
            .get_families_for_taxon(TaxId::new(6), CuratedFilter::All)
            .unwrap();
        assert_eq!(owned, vec![FamilyAccession::new("DF0000001").unwrap()]);

        // tax_id 99 was never passed to write_taxonomy, so no group/link exists.
        let unowned = leaf
            .get_families_for_taxon(TaxId::new(99), CuratedFilter::All)
            .unwrap();
        assert!(unowned.is_empty());
    }

    #[test]
    fn duplicate_accession_is_rejected() {
        let (_dir, leaf) = leaf_with_taxon(6);
        let f = family("DF0000001", None);
        leaf.add_family(&f).unwrap();
        assert!(leaf.add_family(&f).is_err());
    }

    #[test]
    fn counts_persist_on_finalize() {
        let (_dir, leaf) = leaf_with_taxon(6);
        leaf.add_family(&family("DF0000001", None)).unwrap();
        assert_eq!(leaf.count_consensus(), 1);
        assert_eq!(leaf.count_hmm(), 1);
        leaf.finalize().unwrap();
        assert_eq!(
            leaf.get_root_attr("count_consensus").unwrap().unwrap().as_u64(),
            Some(1)
        );
    }

    #[test]
    fn last_changelog_entry_is_completed_after_add_family() {
        let (_dir, leaf) = leaf_with_taxon(6);
        assert!(leaf.last_changelog_entry().unwrap().is_none());
        leaf.add_family(&family("DF0000001", None)).unwrap();
        let (_path, completed) = leaf.last_changelog_entry().unwrap().unwrap();
        assert!(completed);
    }
}
