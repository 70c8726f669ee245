use std::path::Path;

use anyhow::Result;
use clap::Args;

use famdb_container::AttrValue;

use super::common::open_store;

#[derive(Args)]
pub struct EditDescriptionArgs {
    /// Replacement text for the database description.
    pub text: String,
}

pub fn run(database: &Path, args: EditDescriptionArgs) -> Result<()> {
    let store = open_store(database)?;
    for (_, container) in store.containers() {
        container.set_root_attr("db_description", AttrValue::from(args.text.as_str()))?;
        container.finalize()?;
    }
    Ok(())
}
