use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::Args;

use famdb_container::{AttrValue, ContainerBackend};

use super::common::open_store;
use crate::format;

#[derive(Args)]
pub struct InfoArgs {
    /// Show the per-file changelog history instead of summary metadata.
    #[arg(long)]
    pub history: bool,
}

pub fn run(database: &Path, args: InfoArgs, out: &mut impl Write) -> Result<()> {
    let store = open_store(database)?;

    if args.history {
        return run_history(&store, out);
    }

    let root = store.root().leaf();
    let attr = |name: &str| -> String { attr_string(root, name) };

    format::section_header(out, &format!("FamDB: {}", store.directory().display()))?;
    format::tree_item(out, false, "Name", Some(&attr("db_name")))?;
    format::tree_item(out, false, "Version", Some(&attr("db_version")))?;
    format::tree_item(out, false, "Date", Some(&attr("db_date")))?;
    format::tree_item(out, false, "Description", Some(&attr("db_description")))?;
    format::tree_item(out, false, "Copyright", Some(&attr("db_copyright")))?;
    format::tree_item(out, false, "famdb format version", Some(&attr("famdb_version")))?;
    format::tree_item(out, false, "Created", Some(&attr("created")))?;
    format::tree_item(out, false, "Run id", Some(&store.manifest().meta.partition_id))?;

    let mut consensus_total = 0u64;
    let mut hmm_total = 0u64;
    let partitions: Vec<_> = store.containers().collect();
    for (partition_id, container) in &partitions {
        let consensus = container.get_root_attr("count_consensus")?.and_then(|v| v.as_u64()).unwrap_or(0);
        let hmm = container.get_root_attr("count_hmm")?.and_then(|v| v.as_u64()).unwrap_or(0);
        consensus_total += consensus;
        hmm_total += hmm;
        format::tree_item(
            out,
            false,
            &format!("Partition {partition_id}"),
            Some(&format!("{consensus} consensus, {hmm} HMM")),
        )?;
    }
    format::tree_item(
        out,
        true,
        "Total",
        Some(&format!(
            "{consensus_total} consensus, {hmm_total} HMM across {} files",
            store.manifest().chunk_count()
        )),
    )?;

    Ok(())
}

fn attr_string(container: &famdb_container::LeafContainer, name: &str) -> String {
    match container.get_root_attr(name) {
        Ok(Some(AttrValue::Str(s))) => s,
        Ok(Some(AttrValue::UInt(n))) => n.to_string(),
        Ok(Some(AttrValue::Int(n))) => n.to_string(),
        Ok(Some(AttrValue::Bool(b))) => b.to_string(),
        Ok(Some(other)) => format!("{other:?}"),
        _ => "-".to_string(),
    }
}

fn run_history(store: &famdb_store::PartitionedStore, out: &mut impl Write) -> Result<()> {
    format::section_header(out, "File History")?;
    for (partition_id, container) in store.containers() {
        format::line(out, &format!("Partition {partition_id}:"))?;
        let mut timestamps = container.backend().list_children("/FileHistory")?;
        timestamps.sort();
        if timestamps.is_empty() {
            format::tree_item(out, true, "(no changelog entries)", None)?;
            continue;
        }
        for (i, ts) in timestamps.iter().enumerate() {
            let is_last_ts = i + 1 == timestamps.len();
            let group = format!("/FileHistory/{ts}");
            let mut messages = container.backend().list_children(&group)?;
            messages.sort();
            for (j, message) in messages.iter().enumerate() {
                let is_last = is_last_ts && j + 1 == messages.len();
                let path = format!("{group}/{message}");
                let completed = matches!(container.backend().get_dataset(&path)?, Some(bytes) if bytes == [1u8]);
                let status = if completed { "completed" } else { "IN PROGRESS (interrupted?)" };
                format::tree_item(out, is_last, &format!("{ts} {message}"), Some(status))?;
            }
        }
    }
    Ok(())
}
