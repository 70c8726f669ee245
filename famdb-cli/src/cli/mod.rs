pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "famdb",
    version,
    about = "Query and maintain a FamDB partitioned transposable-element family database"
)]
pub struct Cli {
    /// Directory containing the partitioned store (<prefix>.0.h5, <prefix>.k.h5, ...)
    #[arg(short = 'd', long, global = true, value_name = "DIR")]
    pub database: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dump metadata and counts.
    Info(commands::info::InfoArgs),

    /// Search taxonomy names.
    Names(commands::names::NamesArgs),

    /// Print a taxon's lineage.
    Lineage(commands::lineage::LineageArgs),

    /// List families matching a taxon query and filters.
    Families(commands::families::FamiliesArgs),

    /// Print a single family record by accession.
    Family(commands::family::FamilyArgs),

    /// Append families from an EMBL-style stream.
    Append(commands::append::AppendArgs),

    /// Dump all curated families (undocumented upstream, kept for parity).
    FastaAll,

    /// Print the RepeatPeps blob.
    RepeatPeps,

    /// Update the root container's description.
    EditDescription(commands::edit_description::EditDescriptionArgs),
}
