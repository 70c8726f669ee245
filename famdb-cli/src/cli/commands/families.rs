use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::Args;

use famdb_container::ResolveOutcome;
use famdb_store::Filters;

use super::common::{join_term, open_store};
use crate::format::{self, FamilyFormat};

#[derive(Args)]
pub struct FamiliesArgs {
    /// Search term identifying a single taxon (id or unambiguous name).
    #[arg(required = true)]
    pub term: Vec<String>,

    #[arg(short = 'a', long)]
    pub ancestors: bool,

    #[arg(short = 'd', long)]
    pub descendants: bool,

    /// Include only families searched at this stage.
    #[arg(long)]
    pub stage: Option<u32>,

    /// Include only families with this repeat Type[/SubType] prefix.
    #[arg(long = "class")]
    pub repeat_type: Option<String>,

    /// Include only families whose name begins with this term.
    #[arg(long)]
    pub name: Option<String>,

    #[arg(short = 'c', long, conflicts_with = "uncurated")]
    pub curated: bool,

    #[arg(short = 'u', long, conflicts_with = "curated")]
    pub uncurated: bool,

    #[arg(short = 'f', long, value_enum, default_value_t = FamilyFormat::Summary)]
    pub format: FamilyFormat,

    /// For fasta formats, also emit a reverse-complemented copy of each family.
    #[arg(long)]
    pub add_reverse_complement: bool,

    #[arg(long)]
    pub include_class_in_name: bool,

    #[arg(long)]
    pub require_general_threshold: bool,
}

pub fn run(database: &Path, args: FamiliesArgs, out: &mut impl Write) -> Result<()> {
    let store = open_store(database)?;
    let term = join_term(&args.term);

    let target_id = match store.root().resolve_one_species(&term) {
        ResolveOutcome::Found(id) => id,
        ResolveOutcome::Ambiguous => {
            format::line(out, &format!("No species found for search term '{term}'"))?;
            return Ok(());
        }
    };

    let is_hmm = matches!(args.format, FamilyFormat::Hmm | FamilyFormat::HmmSpecies);

    let filters = Filters {
        curated_only: args.curated,
        uncurated_only: args.uncurated,
        tax_id: Some(target_id),
        ancestors: args.ancestors,
        descendants: args.descendants,
        stage: args.stage,
        is_hmm,
        repeat_type: args.repeat_type.clone(),
        name: args.name.clone(),
    };

    let mut accessions = famdb_store::get_accessions_filtered(&store, &filters)?;
    accessions.sort_unstable();

    for accession in accessions {
        let Some(mut family) = store.get_family_by_accession(&accession)? else {
            continue;
        };
        if args.require_general_threshold && family.general_cutoff.is_none() {
            tracing::debug!(accession = %accession, "skipping family with no general threshold");
            continue;
        }
        if matches!(args.format, FamilyFormat::HmmSpecies) {
            if let Some(threshold) = family.taxa_thresholds.iter().find(|t| t.tax_id == target_id).cloned() {
                family.taxa_thresholds = vec![threshold];
            }
        }
        if args.include_class_in_name {
            if let Some(classification) = &family.classification {
                let suffix = format!("#{classification}");
                family.name = Some(format!("{}{suffix}", family.name.clone().unwrap_or_else(|| family.accession.to_string())));
            }
        }
        format::render_family_opts(out, args.format, &family, args.add_reverse_complement)?;
    }

    Ok(())
}
