use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::{Args, ValueEnum};

use famdb_core::family::FamilyAccession;

use super::common::open_store;
use crate::format::{self, FamilyFormat};

#[derive(Args)]
pub struct FamilyArgs {
    /// The accession (or name) of the family to retrieve.
    pub accession: String,

    #[arg(short = 'f', long, value_enum, default_value_t = FamilyFormat::Summary)]
    pub format: FamilyFormat,
}

pub fn run(database: &Path, args: FamilyArgs, out: &mut impl Write) -> Result<()> {
    let store = open_store(database)?;

    let family = match FamilyAccession::new(args.accession.clone()).ok() {
        Some(accession) => store.get_family_by_accession(&accession)?,
        None => None,
    };
    let family = match family {
        Some(f) => Some(f),
        None => store.get_family_by_name(&args.accession)?,
    };

    match family {
        Some(family) => format::render_family(out, args.format, &family)?,
        None => format::line(out, &format!("No family found for '{}'", args.accession))?,
    }

    Ok(())
}
