use std::io::Write;
use std::path::Path;

use anyhow::Result;

use famdb_store::Filters;

use super::common::open_store;
use crate::format::{self, FamilyFormat};

pub fn run(database: &Path, out: &mut impl Write) -> Result<()> {
    let store = open_store(database)?;

    let filters = Filters {
        curated_only: true,
        ..Filters::whole_database()
    };
    let mut accessions = famdb_store::get_accessions_filtered(&store, &filters)?;
    accessions.sort_unstable();

    for accession in accessions {
        let Some(family) = store.get_family_by_accession(&accession)? else {
            continue;
        };
        format::render_family(out, FamilyFormat::FastaAcc, &family)?;
    }

    Ok(())
}
