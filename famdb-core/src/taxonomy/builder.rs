//! Streaming taxonomy construction.
//!
//! Mirrors the two-pass approach of `taxonomy.py::read_taxdb`: nodes and
//! names are accumulated first (from either a relational source stream or
//! NCBI dump files), then linked into a tree in a single `build()` call.

use std::collections::HashMap;

use crate::error::{FamdbError, FamdbResult};
use crate::taxonomy::sanitize::sanitize_name;
use crate::taxonomy::types::{NameKind, TaxId, Taxonomy};

#[derive(Default)]
pub struct TaxonomyBuilder {
    parents: HashMap<TaxId, Option<TaxId>>,
    order: Vec<TaxId>,
    names: HashMap<TaxId, Vec<(NameKind, String)>>,
}

impl TaxonomyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `(tax_id, parent_id)` pair. The root's source-provided
    /// self-parent (`parent_id == tax_id == 1`) is recognized here and
    /// rewritten to "no parent" per the NCBI-source anomaly documented for
    /// this data model.
    pub fn add_node(&mut self, tax_id: TaxId, parent_id: TaxId) {
        if !self.parents.contains_key(&tax_id) {
            self.order.push(tax_id);
        }
        let parent = if tax_id == parent_id {
            None
        } else {
            Some(parent_id)
        };
        self.parents.insert(tax_id, parent);
    }

    /// Registers a name tuple for `tax_id`; names accumulate in insertion
    /// order, matching the source's `names.dmp` ordering.
    pub fn add_name(&mut self, tax_id: TaxId, kind: impl Into<NameKind>, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.names.entry(tax_id).or_default().push((kind.into(), value));
    }

    /// Links every node to its parent and builds the sanitized-name lookup.
    /// Fails if any node references a parent that was never registered via
    /// `add_node`.
    pub fn build(self) -> FamdbResult<Taxonomy> {
        let mut taxonomy = Taxonomy::default();

        for tax_id in &self.order {
            let parent_id = self.parents.get(tax_id).copied().flatten();
            if let Some(parent) = parent_id {
                if !self.parents.contains_key(&parent) {
                    return Err(FamdbError::Taxonomy(format!(
                        "node {tax_id} references missing parent {parent}"
                    )));
                }
            }
            let names = self.names.get(tax_id).cloned().unwrap_or_default();
            taxonomy.insert_raw(*tax_id, parent_id, names);
        }

        for tax_id in &self.order {
            if let Some(Some(parent)) = self.parents.get(tax_id) {
                taxonomy.push_child(*parent, *tax_id);
            }
        }

        let mut lookup = HashMap::new();
        for node in taxonomy.nodes_in_order() {
            if let Some(name) = node.scientific_name() {
                lookup.insert(sanitize_name(name).to_lowercase(), node.tax_id);
            }
        }
        taxonomy.set_name_lookup(lookup);

        Ok(taxonomy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Taxonomy {
        // 1(root) -> {2(Order), 3(Other Order)}, 2 -> {4(Genus), 5(Other Genus)},
        // 4 -> {6(Species)}, 5 -> {7(Other Species)}
        let mut b = TaxonomyBuilder::new();
        b.add_node(TaxId(1), TaxId(1));
        b.add_node(TaxId(2), TaxId(1));
        b.add_node(TaxId(3), TaxId(1));
        b.add_node(TaxId(4), TaxId(2));
        b.add_node(TaxId(5), TaxId(2));
        b.add_node(TaxId(6), TaxId(4));
        b.add_node(TaxId(7), TaxId(5));
        b.add_name(TaxId(1), NameKind::SCIENTIFIC_NAME, "root");
        b.add_name(TaxId(2), NameKind::SCIENTIFIC_NAME, "Order");
        b.add_name(TaxId(3), NameKind::SCIENTIFIC_NAME, "Other Order");
        b.add_name(TaxId(4), NameKind::SCIENTIFIC_NAME, "Genus");
        b.add_name(TaxId(5), NameKind::SCIENTIFIC_NAME, "Other Genus");
        b.add_name(TaxId(6), NameKind::SCIENTIFIC_NAME, "Species");
        b.add_name(TaxId(7), NameKind::SCIENTIFIC_NAME, "Other Species");
        b.build().unwrap()
    }

    #[test]
    fn root_self_parent_is_rewritten_to_none() {
        let tax = fixture();
        assert_eq!(tax.parent_of(TaxId(1)), None);
    }

    #[test]
    fn children_link_in_insertion_order() {
        let tax = fixture();
        assert_eq!(tax.children_of(TaxId(1)), &[TaxId(2), TaxId(3)]);
        assert_eq!(tax.children_of(TaxId(2)), &[TaxId(4), TaxId(5)]);
    }

    #[test]
    fn missing_parent_is_fatal() {
        let mut b = TaxonomyBuilder::new();
        b.add_node(TaxId(1), TaxId(1));
        b.add_node(TaxId(2), TaxId(99));
        assert!(b.build().is_err());
    }

    #[test]
    fn name_lookup_uses_sanitized_lowercase_scientific_name() {
        let tax = fixture();
        assert_eq!(tax.name_lookup().get("order"), Some(&TaxId(2)));
    }

    #[test]
    fn descendants_closed_includes_self() {
        let tax = fixture();
        let mut ds = tax.descendants_closed(TaxId(2));
        ds.sort();
        assert_eq!(ds, vec![TaxId(2), TaxId(4), TaxId(5), TaxId(6), TaxId(7)]);
    }
}
