use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::{Args, ValueEnum};

use super::common::{join_term, open_store};
use crate::format;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum NamesFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Args)]
pub struct NamesArgs {
    /// Search term: an NCBI taxonomy id, or part of a scientific/common name.
    #[arg(required = true)]
    pub term: Vec<String>,

    #[arg(short = 'f', long, value_enum, default_value_t = NamesFormat::Pretty)]
    pub format: NamesFormat,
}

pub fn run(database: &Path, args: NamesArgs, out: &mut impl Write) -> Result<()> {
    let store = open_store(database)?;
    let root = store.root();
    let term = join_term(&args.term);

    let matches = root.resolve_species(&term, None, true);

    match args.format {
        NamesFormat::Json => {
            let entries: Vec<_> = matches
                .iter()
                .map(|(tax_id, exact)| {
                    let partition = root.find_taxon(*tax_id).ok().flatten();
                    serde_json::json!({
                        "id": tax_id.value(),
                        "partition": partition,
                        "exact": exact,
                    })
                })
                .collect();
            writeln!(out, "{}", serde_json::to_string(&entries)?)?;
        }
        NamesFormat::Pretty => {
            if matches.is_empty() {
                format::line(out, &format!("No names found for search term '{term}'"))?;
                return Ok(());
            }

            let mut printed_non_exact_header = false;
            let mut printed_exact_header = false;
            for (tax_id, exact) in &matches {
                if *exact && !printed_exact_header {
                    format::section_header(out, "Exact Matches")?;
                    printed_exact_header = true;
                }
                if !*exact && !printed_non_exact_header {
                    format::section_header(out, "Non-exact Matches")?;
                    printed_non_exact_header = true;
                }
                let partition = root
                    .find_taxon(*tax_id)?
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "none".to_string());
                format::line(out, &format!("Taxon: {tax_id}, Partition: {partition}"))?;
            }
        }
    }

    Ok(())
}
