//! Chunk and partition-manifest types shared between the partitioner and the
//! store (the manifest is produced by one and consumed by the other).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::taxonomy::TaxId;

pub type PartitionId = u32;

/// One element of the partition manifest `F`. `chunk_id` 0 is always the
/// root chunk (residue); 1..N are leaf chunks, each a contiguous subtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: PartitionId,
    pub t_root: TaxId,
    pub bytes: u64,
    pub nodes: BTreeSet<TaxId>,
    pub f_roots: Vec<TaxId>,
}

impl Chunk {
    pub fn is_root(&self) -> bool {
        self.chunk_id == 0
    }
}

/// Metadata common to every container produced by a single partitioning run;
/// any mismatch across files at open time is fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestMeta {
    pub partition_id: String,
    pub db_version: String,
    pub db_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMapEntry {
    pub t_root: TaxId,
    pub filename: String,
    pub f_roots: Vec<TaxId>,
    pub t_root_name: String,
    pub f_roots_names: Vec<String>,
}

/// The JSON document stored (identically) in every container's `file_info`
/// attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub meta: ManifestMeta,
    pub file_map: std::collections::BTreeMap<PartitionId, FileMapEntry>,
}

impl Manifest {
    pub fn chunk_count(&self) -> usize {
        self.file_map.len()
    }
}
