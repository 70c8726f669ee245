//! Shared helpers for the subcommand modules: opening a store and resolving
//! the `term...` arguments every query command takes (`nargs="+"`, joined
//! into a single search string, matching the upstream argument grammar).

use std::path::Path;

use anyhow::{Context, Result};
use famdb_container::CuratedFilter;

use famdb_store::PartitionedStore;

pub fn open_store(database: &Path) -> Result<PartitionedStore> {
    PartitionedStore::open(database).with_context(|| format!("failed to open FamDB store at {}", database.display()))
}

pub fn join_term(term: &[String]) -> String {
    term.join(" ")
}

pub fn curated_filter(curated: bool, uncurated: bool) -> CuratedFilter {
    match (curated, uncurated) {
        (_, true) => CuratedFilter::UncuratedOnly,
        (true, _) => CuratedFilter::CuratedOnly,
        _ => CuratedFilter::All,
    }
}
