//! Taxonomy data model: taxon identifiers, name kinds, and the in-memory tree.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// NCBI taxonomy id, newtype for type safety (mirrors the convention used
/// for other small identifier types throughout this codebase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Default)]
pub struct TaxId(pub u32);

impl TaxId {
    pub const ROOT: Self = Self(1);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == 1
    }
}

impl fmt::Display for TaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TaxId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<TaxId> for u32 {
    fn from(id: TaxId) -> Self {
        id.0
    }
}

/// The kind of a taxonomic name entry, e.g. "scientific name", "common name".
/// Kept as a string newtype rather than a closed enum: NCBI's `name_class`
/// field is an open vocabulary and new classes have appeared over time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameKind(pub String);

impl NameKind {
    pub const SCIENTIFIC_NAME: &'static str = "scientific name";
    pub const COMMON_NAME: &'static str = "common name";
    pub const SANITIZED_SCIENTIFIC_NAME: &'static str = "sanitized scientific name";
    pub const SANITIZED_SYNONYM: &'static str = "sanitized synonym";

    pub fn is_scientific(&self) -> bool {
        self.0 == Self::SCIENTIFIC_NAME
    }
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NameKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single taxon in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxon {
    pub tax_id: TaxId,
    pub parent_id: Option<TaxId>,
    /// Names in insertion order, as read from the source.
    pub names: Vec<(NameKind, String)>,
    /// Children in insertion order.
    pub children: Vec<TaxId>,
}

impl Taxon {
    pub fn scientific_name(&self) -> Option<&str> {
        self.names
            .iter()
            .find(|(kind, _)| kind.is_scientific())
            .map(|(_, value)| value.as_str())
    }
}

/// An in-memory rooted taxonomy tree.
///
/// `order` preserves the insertion order of nodes as they arrived from the
/// source stream; the partitioner's documented tie-break relies on this
/// order being stable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Taxonomy {
    nodes: HashMap<TaxId, Taxon>,
    order: Vec<TaxId>,
    /// sanitized-lowercase scientific name -> tax_id
    name_lookup: HashMap<String, TaxId>,
}

impl Taxonomy {
    pub fn get(&self, tax_id: TaxId) -> Option<&Taxon> {
        self.nodes.get(&tax_id)
    }

    pub fn contains(&self, tax_id: TaxId) -> bool {
        self.nodes.contains_key(&tax_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in stable insertion order; this order is a documented contract
    /// used by the partitioner's tie-break rule.
    pub fn nodes_in_order(&self) -> impl Iterator<Item = &Taxon> {
        self.order.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn name_lookup(&self) -> &HashMap<String, TaxId> {
        &self.name_lookup
    }

    pub fn parent_of(&self, tax_id: TaxId) -> Option<TaxId> {
        self.nodes.get(&tax_id).and_then(|n| n.parent_id)
    }

    pub fn children_of(&self, tax_id: TaxId) -> &[TaxId] {
        self.nodes
            .get(&tax_id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// All taxon ids on the path from `tax_id` to the root, inclusive,
    /// nearest-first.
    pub fn ancestors(&self, tax_id: TaxId) -> Vec<TaxId> {
        let mut out = Vec::new();
        let mut current = Some(tax_id);
        while let Some(id) = current {
            out.push(id);
            current = self.parent_of(id);
        }
        out
    }

    /// Closed descendant set of `tax_id`, including itself, via an explicit
    /// stack (see Design Notes on recursion).
    pub fn descendants_closed(&self, tax_id: TaxId) -> Vec<TaxId> {
        let mut out = Vec::new();
        let mut stack = vec![tax_id];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }

    pub(crate) fn insert_raw(
        &mut self,
        tax_id: TaxId,
        parent_id: Option<TaxId>,
        names: Vec<(NameKind, String)>,
    ) {
        if !self.nodes.contains_key(&tax_id) {
            self.order.push(tax_id);
        }
        self.nodes.insert(
            tax_id,
            Taxon {
                tax_id,
                parent_id,
                names,
                children: Vec::new(),
            },
        );
    }

    pub(crate) fn push_child(&mut self, parent: TaxId, child: TaxId) {
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
    }

    pub(crate) fn set_name_lookup(&mut self, lookup: HashMap<String, TaxId>) {
        self.name_lookup = lookup;
    }
}
