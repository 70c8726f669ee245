use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::{Args, ValueEnum};

use famdb_container::{CuratedFilter, Lineage, ResolveOutcome};
use famdb_core::taxonomy::TaxId;
use famdb_store::PartitionedStore;

use super::common::{curated_filter, join_term, open_store};
use crate::format;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum LineageFormat {
    #[default]
    Pretty,
    Semicolon,
    Totals,
}

#[derive(Args)]
pub struct LineageArgs {
    /// Search term identifying a single taxon (id or unambiguous name).
    #[arg(required = true)]
    pub term: Vec<String>,

    /// Include all ancestors of the matched taxon.
    #[arg(short = 'a', long)]
    pub ancestors: bool,

    /// Include all descendants of the matched taxon.
    #[arg(short = 'd', long)]
    pub descendants: bool,

    /// Walk the complete taxonomy tree instead of the pruned (valued-only) projection.
    #[arg(short = 'k', long = "complete")]
    pub complete: bool,

    #[arg(short = 'c', long, conflicts_with = "uncurated")]
    pub curated: bool,

    #[arg(short = 'u', long, conflicts_with = "curated")]
    pub uncurated: bool,

    #[arg(short = 'f', long, value_enum, default_value_t = LineageFormat::Pretty)]
    pub format: LineageFormat,
}

pub fn run(database: &Path, args: LineageArgs, out: &mut impl Write) -> Result<()> {
    let store = open_store(database)?;
    let term = join_term(&args.term);

    let target_id = match store.root().resolve_one_species(&term) {
        ResolveOutcome::Found(id) => id,
        ResolveOutcome::Ambiguous => {
            format::line(out, &format!("No unambiguous species found for search term '{term}'"))?;
            return Ok(());
        }
    };

    let ancestors = args.ancestors || matches!(args.format, LineageFormat::Semicolon);
    let lineage = store.root().get_lineage(target_id, ancestors, args.descendants, args.complete)?;
    let filter = curated_filter(args.curated, args.uncurated);

    match args.format {
        LineageFormat::Pretty => print_tree(out, &store, &lineage, filter, "", "")?,
        LineageFormat::Semicolon => print_semicolons(out, &store, &lineage, filter, String::new(), Some(target_id))?,
        LineageFormat::Totals => {
            let mut seen = std::collections::BTreeSet::new();
            let (ancestor_count, lineage_count) = totals(&store, &lineage, Some(target_id), filter, &mut seen)?;
            format::line(out, &format!("{ancestor_count} entries in ancestors; {lineage_count} lineage-specific entries"))?;
        }
    }

    Ok(())
}

fn node_label(store: &PartitionedStore, tax_id: TaxId, filter: CuratedFilter) -> Result<(String, String)> {
    let name = store
        .root()
        .get_lineage_path(tax_id)?
        .last()
        .map(|(n, _)| n.clone())
        .unwrap_or_default();
    let count = match store.get_families_for_taxon(tax_id, filter)? {
        Some(families) => families.len().to_string(),
        None => "partition not installed".to_string(),
    };
    Ok((name, count))
}

fn print_tree(
    out: &mut impl Write,
    store: &PartitionedStore,
    node: &Lineage,
    filter: CuratedFilter,
    gutter_self: &str,
    gutter_children: &str,
) -> Result<()> {
    let (name, count) = node_label(store, node.tax_id, filter)?;
    format::line(out, &format!("{gutter_self}{} {name} [{count}]", node.tax_id))?;

    if let Some((last, rest)) = node.children.split_last() {
        for child in rest {
            print_tree(out, store, child, filter, &format!("{gutter_children}├─"), &format!("{gutter_children}│ "))?;
        }
        print_tree(out, store, last, filter, &format!("{gutter_children}└─"), &format!("{gutter_children}  "))?;
    }
    Ok(())
}

fn print_semicolons(
    out: &mut impl Write,
    store: &PartitionedStore,
    node: &Lineage,
    filter: CuratedFilter,
    parent_name: String,
    starting_at: Option<TaxId>,
) -> Result<()> {
    let (own_name, _) = node_label(store, node.tax_id, filter)?;
    let name = if parent_name.is_empty() { own_name } else { format!("{parent_name};{own_name}") };

    let starting_at = if starting_at == Some(node.tax_id) { None } else { starting_at };

    if starting_at.is_none() {
        let count = store.get_families_for_taxon(node.tax_id, filter)?.map(|f| f.len()).unwrap_or(0);
        format::line(out, &format!("{}: {name} [{count}]", node.tax_id))?;
    }

    for child in &node.children {
        print_semicolons(out, store, child, filter, name.clone(), starting_at)?;
    }
    Ok(())
}

fn totals(
    store: &PartitionedStore,
    node: &Lineage,
    target_id: Option<TaxId>,
    filter: CuratedFilter,
    seen: &mut std::collections::BTreeSet<famdb_core::family::FamilyAccession>,
) -> Result<(usize, usize)> {
    let accessions = store.get_families_for_taxon(node.tax_id, filter)?.unwrap_or_default();
    let mut count_here = 0;
    for accession in accessions {
        if seen.insert(accession) {
            count_here += 1;
        }
    }

    let target_id = if target_id == Some(node.tax_id) { None } else { target_id };

    let mut ancestor_total = 0;
    let mut descendant_total = 0;
    for child in &node.children {
        let (a, d) = totals(store, child, target_id, filter, seen)?;
        ancestor_total += a;
        descendant_total += d;
    }

    if target_id.is_none() {
        descendant_total += count_here;
    } else {
        ancestor_total += count_here;
    }

    Ok((ancestor_total, descendant_total))
}
