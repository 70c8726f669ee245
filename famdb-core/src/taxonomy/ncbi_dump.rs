//! Parsing of NCBI's pipe-delimited `nodes.dmp` / `names.dmp` taxonomy dump
//! format, one of the two accepted taxonomy-dump interfaces (the other being
//! a relational-source row stream, which is an external collaborator).
//!
//! Field positions follow the NCBI taxdump specification: nodes are
//! `tax_id|parent_id|...`, names are `tax_id|name_txt|unique_name|name_class|...`.

use std::io::BufRead;

use crate::error::{FamdbError, FamdbResult};
use crate::taxonomy::builder::TaxonomyBuilder;
use crate::taxonomy::types::TaxId;

fn split_fields(line: &str) -> Vec<&str> {
    line.split('|').map(str::trim).collect()
}

/// Reads `nodes.dmp`-shaped lines (`tax_id|parent_id|...`) into the builder.
pub fn load_nodes<R: BufRead>(reader: R, builder: &mut TaxonomyBuilder) -> FamdbResult<()> {
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(&line);
        let tax_id: u32 = fields
            .first()
            .ok_or_else(|| FamdbError::Taxonomy("nodes.dmp: missing tax_id field".into()))?
            .parse()
            .map_err(|_| FamdbError::Taxonomy(format!("nodes.dmp: bad tax_id in {line:?}")))?;
        let parent_id: u32 = fields
            .get(1)
            .ok_or_else(|| FamdbError::Taxonomy("nodes.dmp: missing parent_id field".into()))?
            .parse()
            .map_err(|_| FamdbError::Taxonomy(format!("nodes.dmp: bad parent_id in {line:?}")))?;
        builder.add_node(TaxId::new(tax_id), TaxId::new(parent_id));
    }
    Ok(())
}

/// Reads `names.dmp`-shaped lines (`tax_id|name_txt|unique_name|name_class|...`)
/// into the builder.
pub fn load_names<R: BufRead>(reader: R, builder: &mut TaxonomyBuilder) -> FamdbResult<()> {
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(&line);
        let tax_id: u32 = fields
            .first()
            .ok_or_else(|| FamdbError::Taxonomy("names.dmp: missing tax_id field".into()))?
            .parse()
            .map_err(|_| FamdbError::Taxonomy(format!("names.dmp: bad tax_id in {line:?}")))?;
        let name_txt = fields
            .get(1)
            .ok_or_else(|| FamdbError::Taxonomy("names.dmp: missing name_txt field".into()))?;
        let name_class = fields
            .get(3)
            .ok_or_else(|| FamdbError::Taxonomy("names.dmp: missing name_class field".into()))?;
        builder.add_name(TaxId::new(tax_id), *name_class, *name_txt);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_dump_pair() {
        let nodes = "1|1|\n2|1|\n";
        let names = "1|root|root|scientific name|\n2|Bacteria|Bacteria|scientific name|\n";

        let mut b = TaxonomyBuilder::new();
        load_nodes(nodes.as_bytes(), &mut b).unwrap();
        load_names(names.as_bytes(), &mut b).unwrap();
        let tax = b.build().unwrap();

        assert!(tax.contains(TaxId::new(1)));
        assert_eq!(tax.parent_of(TaxId::new(2)), Some(TaxId::new(1)));
        assert_eq!(
            tax.get(TaxId::new(2)).unwrap().scientific_name(),
            Some("Bacteria")
        );
    }
}
