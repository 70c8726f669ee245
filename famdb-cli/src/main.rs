use std::io::Write;
use std::process;

use clap::Parser;
use colored::*;

mod cli;
mod format;

use crate::cli::{Cli, Commands};
use famdb_core::error::FamdbError;

fn main() {
    let cli = Cli::parse();

    let log_level = std::env::var("FAMDB_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Err(e) = run(cli) {
        if is_broken_pipe(&e) {
            process::exit(1);
        }
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn is_broken_pipe(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::BrokenPipe)
        || matches!(e.downcast_ref::<FamdbError>(), Some(FamdbError::Io(io_err)) if io_err.kind() == std::io::ErrorKind::BrokenPipe)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let result = match cli.command {
        Commands::Info(args) => cli::commands::info::run(&cli.database, args, &mut out),
        Commands::Names(args) => cli::commands::names::run(&cli.database, args, &mut out),
        Commands::Lineage(args) => cli::commands::lineage::run(&cli.database, args, &mut out),
        Commands::Families(args) => cli::commands::families::run(&cli.database, args, &mut out),
        Commands::Family(args) => cli::commands::family::run(&cli.database, args, &mut out),
        Commands::Append(args) => cli::commands::append::run(&cli.database, args, &mut out),
        Commands::FastaAll => cli::commands::fasta_all::run(&cli.database, &mut out),
        Commands::RepeatPeps => cli::commands::repeat_peps::run(&cli.database, &mut out),
        Commands::EditDescription(args) => cli::commands::edit_description::run(&cli.database, args),
    };

    // A write failure into a closed pipe (e.g. `famdb families ... | head`)
    // is not a database error; surface it distinctly so main can map it to
    // exit code 1 without printing an "Error:" line for what is ordinary
    // pipeline behavior.
    match result {
        Ok(()) => {
            out.flush().or_else(ignore_broken_pipe)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn ignore_broken_pipe(e: std::io::Error) -> std::io::Result<()> {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        Ok(())
    } else {
        Err(e)
    }
}
