//! The miniature taxonomy and family set used throughout the core, store,
//! and CLI test suites: taxa 1(root)-2(Order)-3(Other Order)-4(Genus)-
//! 5(Other Genus)-6(Species)-7(Other Species), six families spanning
//! curated/uncurated and single/multi-clade cases, and the bound that
//! splits it into three partitions.

use famdb_core::family::{Family, FamilyAccession};
use famdb_core::taxonomy::{NameKind, TaxId, Taxonomy, TaxonomyBuilder};

/// The partition bound used in the worked example throughout the spec.
pub const FIXTURE_BOUND: u64 = 100_000_000_000;

pub fn fixture_taxonomy() -> Taxonomy {
    let mut builder = TaxonomyBuilder::new();
    for (id, parent) in [(1, 1), (2, 1), (3, 1), (4, 2), (5, 2), (6, 4), (7, 5)] {
        builder.add_node(TaxId::new(id), TaxId::new(parent));
    }
    for (id, name) in [
        (1, "root"),
        (2, "Order"),
        (3, "Other Order"),
        (4, "Genus"),
        (5, "Other Genus"),
        (6, "Species"),
        (7, "Other Species"),
    ] {
        builder.add_name(TaxId::new(id), NameKind::SCIENTIFIC_NAME, name);
    }
    builder.build().expect("fixture taxonomy is internally consistent")
}

fn minimal_family(accession: &str, clades: Vec<u32>) -> Family {
    Family {
        accession: FamilyAccession::new(accession).unwrap(),
        version: None,
        name: None,
        length: 100,
        title: None,
        author: None,
        description: None,
        classification: None,
        repeat_type: Some("Unknown".to_string()),
        repeat_subtype: None,
        clades: clades.into_iter().map(TaxId::new).collect(),
        date_created: None,
        date_modified: None,
        search_stages: vec![35],
        buffer_stages: vec![],
        refineable: None,
        target_site_cons: None,
        model: Some("HMM".to_string()),
        consensus: Some("ACGTACGTACGT".to_string()),
        max_length: None,
        is_model_masked: None,
        seed_count: None,
        build_method: None,
        search_method: None,
        taxa_thresholds: vec![],
        general_cutoff: None,
        features: None,
        coding_sequences: None,
        aliases: None,
        citations: None,
    }
}

/// `TEST0001`@{1}, `TEST0002`@{2,3}, `TEST0003`@{3}, `TEST0004`@{4},
/// `DR000000001`@{7} (uncurated), `DR_Repeat1`@{6} (curated despite the `DR`
/// prefix — it isn't nine digits).
pub fn fixture_families() -> Vec<Family> {
    let mut families = vec![
        minimal_family("TEST0001", vec![1]),
        minimal_family("TEST0002", vec![2, 3]),
        minimal_family("TEST0003", vec![3]),
        minimal_family("TEST0004", vec![4]),
        minimal_family("DR000000001", vec![7]),
        minimal_family("DR_Repeat1", vec![6]),
    ];
    for (family, name) in families.iter_mut().zip([
        "Test1", "Test2", "Test3", "Test4", "TestUncurated", "TestRepeat",
    ]) {
        family.name = Some(name.to_string());
    }
    families
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_taxonomy_has_seven_taxa_rooted_at_one() {
        let taxonomy = fixture_taxonomy();
        assert_eq!(taxonomy.len(), 7);
        assert_eq!(taxonomy.parent_of(TaxId::new(6)), Some(TaxId::new(4)));
        assert_eq!(taxonomy.parent_of(TaxId::ROOT), None);
    }

    #[test]
    fn fixture_families_cover_curated_and_uncurated_accessions() {
        let families = fixture_families();
        assert_eq!(families.len(), 6);
        assert!(families.iter().any(|f| f.accession.is_uncurated()));
        assert!(families.iter().any(|f| !f.accession.is_uncurated() && f.clades.len() > 1));
    }
}
