use std::io::Write;
use std::path::Path;

use anyhow::Result;

use super::common::open_store;
use crate::format;

pub fn run(database: &Path, out: &mut impl Write) -> Result<()> {
    let store = open_store(database)?;
    match store.root().repeat_peps()? {
        Some(peps) => write!(out, "{peps}")?,
        None => format::line(out, "No RepeatPeps.lib present in this database")?,
    }
    Ok(())
}
