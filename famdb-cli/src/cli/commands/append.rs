use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use famdb_container::AttrValue;
use famdb_core::family::{Family, FamilyAccession};

use super::common::open_store;
use crate::format;

#[derive(Args)]
pub struct AppendArgs {
    /// The EMBL-style file to append.
    pub infile: PathBuf,

    /// New name for the database (replaces the existing name).
    #[arg(long)]
    pub name: Option<String>,

    /// Additional database description (appended to the existing one).
    #[arg(long)]
    pub description: Option<String>,
}

pub fn run(database: &Path, args: AppendArgs, out: &mut impl Write) -> Result<()> {
    let store = open_store(database)?;
    let text = std::fs::read_to_string(&args.infile)?;
    let lookup = store.root().get_all_taxa_names();

    let (entries, warnings) = famdb_core::parse_embl_stream(&text, &lookup);
    for warning in &warnings {
        tracing::warn!(accession = %warning.accession, species = %warning.species_name, "could not resolve species name during append");
    }

    let families: Vec<Family> = entries
        .into_iter()
        .map(|entry| Family {
            accession: FamilyAccession::new(entry.accession)?,
            version: entry.version,
            name: entry.name,
            length: entry.consensus.as_ref().map(|s| s.len() as u64).unwrap_or(0),
            title: None,
            author: None,
            description: entry.description,
            classification: None,
            repeat_type: entry.repeat_type,
            repeat_subtype: entry.repeat_subtype,
            clades: entry.clades,
            date_created: None,
            date_modified: None,
            search_stages: entry.search_stages,
            buffer_stages: entry.buffer_stages,
            refineable: entry.refineable,
            target_site_cons: None,
            model: None,
            consensus: entry.consensus,
            max_length: None,
            is_model_masked: None,
            seed_count: None,
            build_method: None,
            search_method: None,
            taxa_thresholds: Vec::new(),
            general_cutoff: None,
            features: None,
            coding_sequences: None,
            aliases: None,
            citations: None,
        })
        .collect::<famdb_core::error::FamdbResult<Vec<Family>>>()?;

    let report = store.append(&families)?;

    if let Some(name) = &args.name {
        for (_, container) in store.containers() {
            container.set_root_attr("db_name", AttrValue::from(name.as_str()))?;
        }
    }
    if let Some(description) = &args.description {
        for (_, container) in store.containers() {
            let existing = container
                .get_root_attr("db_description")?
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let updated = format!("{existing}\n{description}");
            container.set_root_attr("db_description", AttrValue::from(updated))?;
        }
    }
    for (_, container) in store.containers() {
        container.finalize()?;
    }

    format::section_header(out, "Append Report")?;
    format::tree_item(out, false, "Added", Some(&report.success_count().to_string()))?;
    format::tree_item(out, false, "Duplicates", Some(&report.duplicates.len().to_string()))?;
    format::tree_item(out, false, "Unresolved species names", Some(&warnings.len().to_string()))?;
    format::tree_item(
        out,
        true,
        "Missing partitions",
        Some(&report.missing_partitions.len().to_string()),
    )?;

    Ok(())
}
