//! Filter composition and the three accession-enumeration strategies of the
//! query engine.

use std::collections::BTreeSet;

use famdb_container::{ContainerBackend, CuratedFilter, LeafContainer};
use famdb_core::error::FamdbResult;
use famdb_core::family::FamilyAccession;
use famdb_core::manifest::PartitionId;
use famdb_core::taxonomy::TaxId;

use crate::store::PartitionedStore;

/// The filters of `get_accessions_filtered`, logically ANDed. `tax_id` of
/// `None` means the default `(1, true, true)`: every taxon, walked both
/// upward and downward from the root — which is to say, the whole database.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub curated_only: bool,
    pub uncurated_only: bool,
    pub tax_id: Option<TaxId>,
    pub ancestors: bool,
    pub descendants: bool,
    pub stage: Option<u32>,
    pub is_hmm: bool,
    pub repeat_type: Option<String>,
    pub name: Option<String>,
}

impl Filters {
    pub fn whole_database() -> Self {
        Self {
            ancestors: true,
            descendants: true,
            ..Default::default()
        }
    }

    /// The stage filter §4.7 describes: 80 is "no filter", 95 expands to the
    /// named buffer-stage set, anything else is a singleton.
    fn stage_set(&self) -> Option<BTreeSet<u32>> {
        match self.stage {
            None | Some(80) => None,
            Some(95) => Some([35, 50, 55, 60, 65, 70, 75].into_iter().collect()),
            Some(n) => Some(BTreeSet::from([n])),
        }
    }
}

pub fn get_accessions_filtered(store: &PartitionedStore, filters: &Filters) -> FamdbResult<Vec<FamilyAccession>> {
    let stage_set = filters.stage_set();
    let whole_db = filters.tax_id.is_none();

    let candidates: Vec<(PartitionId, FamilyAccession)> = if whole_db {
        match &stage_set {
            Some(stages) => enumerate_by_stage(store, stages)?,
            None => enumerate_whole_db(store)?,
        }
    } else {
        enumerate_lineage(store, filters)?
    };

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for (partition_id, accession) in candidates {
        if !seen.insert(accession.clone()) {
            continue;
        }
        if keep_candidate(store, partition_id, &accession, filters, &stage_set)? {
            out.push(accession);
        }
    }
    Ok(out)
}

/// Strategy 1: iterate `ByStage/<stage>/` across all leaves, avoiding the
/// lineage walk entirely.
fn enumerate_by_stage(
    store: &PartitionedStore,
    stages: &BTreeSet<u32>,
) -> FamdbResult<Vec<(PartitionId, FamilyAccession)>> {
    let mut out = Vec::new();
    for (partition_id, container) in store.containers() {
        for &stage in stages {
            let group = format!("/Families/ByStage/{stage}");
            for name in container.backend().list_children(&group)? {
                out.push((partition_id, FamilyAccession::new(name)?));
            }
        }
    }
    Ok(out)
}

/// Strategy 2: walk every `Families/**` leaf record across all containers.
fn enumerate_whole_db(store: &PartitionedStore) -> FamdbResult<Vec<(PartitionId, FamilyAccession)>> {
    let mut out = Vec::new();
    for (partition_id, container) in store.containers() {
        let mut accessions = Vec::new();
        walk_records(container, "Families", &mut accessions)?;
        out.extend(accessions.into_iter().map(|a| (partition_id, a)));
    }
    Ok(out)
}

fn walk_records(container: &LeafContainer, path: &str, out: &mut Vec<FamilyAccession>) -> FamdbResult<()> {
    for child in container.backend().list_children(path)? {
        let child_path = format!("{path}/{child}");
        if container.backend().get_attr(&child_path, "record")?.is_some() {
            out.push(FamilyAccession::new(child)?);
        } else {
            walk_records(container, &child_path, out)?;
        }
    }
    Ok(())
}

/// Strategy 3: resolve the requested lineage on the root, then ask the
/// owning leaf of each node in the walk for its families, deduplicating
/// across nodes.
fn enumerate_lineage(
    store: &PartitionedStore,
    filters: &Filters,
) -> FamdbResult<Vec<(PartitionId, FamilyAccession)>> {
    let tax_id = filters.tax_id.unwrap_or(TaxId::ROOT);
    let lineage = store.root().get_lineage(tax_id, filters.ancestors, filters.descendants, true)?;

    let mut nodes = Vec::new();
    let mut stack = vec![lineage];
    while let Some(node) = stack.pop() {
        nodes.push(node.tax_id);
        stack.extend(node.children);
    }

    let curated_filter = match (filters.curated_only, filters.uncurated_only) {
        (true, _) => CuratedFilter::CuratedOnly,
        (_, true) => CuratedFilter::UncuratedOnly,
        _ => CuratedFilter::All,
    };

    let mut out = Vec::new();
    for node in nodes {
        if let Some(partition_id) = store.root().find_taxon(node)? {
            if let Some(container) = store.container_for(partition_id) {
                for accession in container.get_families_for_taxon(node, curated_filter)? {
                    out.push((partition_id, accession));
                }
            }
        }
    }
    Ok(out)
}

fn keep_candidate(
    store: &PartitionedStore,
    partition_id: PartitionId,
    accession: &FamilyAccession,
    filters: &Filters,
    stage_set: &Option<BTreeSet<u32>>,
) -> FamdbResult<bool> {
    if filters.curated_only && accession.is_uncurated() {
        return Ok(false);
    }
    if filters.uncurated_only && !accession.is_uncurated() {
        return Ok(false);
    }

    if let Some(stages) = stage_set {
        if let Some(container) = store.container_for(partition_id) {
            let mut any = false;
            for &stage in stages {
                if container.filter_stages(accession, stage)? {
                    any = true;
                    break;
                }
            }
            if !any {
                return Ok(false);
            }
        }
    }

    let needs_record = filters.repeat_type.is_some() || filters.name.is_some() || filters.is_hmm;
    if !needs_record {
        return Ok(true);
    }

    let Some(family) = store.get_family_by_accession(accession)? else {
        return Ok(false);
    };

    if filters.is_hmm {
        if !family.has_hmm() {
            return Ok(false);
        }
        if let Some(stages) = stage_set {
            if !stages.iter().any(|s| family.search_stages.contains(s)) {
                return Ok(false);
            }
        }
    }

    if let Some(prefix) = &filters.repeat_type {
        let haystack = match &family.repeat_subtype {
            Some(subtype) => format!("{}/{subtype}", family.repeat_type.clone().unwrap_or_default()),
            None => family.repeat_type.clone().unwrap_or_default(),
        };
        if !haystack.to_lowercase().starts_with(&prefix.to_lowercase()) {
            return Ok(false);
        }
    }

    if let Some(prefix) = &filters.name {
        match &family.name {
            Some(name) if name.to_lowercase().starts_with(&prefix.to_lowercase()) => {}
            _ => return Ok(false),
        }
    }

    Ok(true)
}
