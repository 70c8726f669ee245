//! The family record: a closed, statically-typed product of fields replacing
//! the source's schema-on-read attribute bag (see Design Notes on dynamic
//! typing reflection).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FamdbError, FamdbResult};
use crate::taxonomy::TaxId;

static DF_DR_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(DF|DR)[0-9]{2}[0-9]{2}[0-9]{3,6}$").unwrap());
static UNCURATED_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^DR[0-9]{9}$").unwrap());

/// A validated family accession string (`DF`/`DR` + digits, or an auxiliary
/// free-form identifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FamilyAccession(String);

impl FamilyAccession {
    pub fn new(value: impl Into<String>) -> FamdbResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(FamdbError::InvalidInput("empty accession".into()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The storage group path this accession bins to. `DF`/`DR` accessions
    /// of the documented shape go to `Families/DF|DR/<d0d1>/<d2d3>`; anything
    /// else goes to `Families/Aux/<first two chars lowercased>`, bounding the
    /// number of siblings any single directory-shaped group can hold.
    pub fn accession_bin(&self) -> String {
        if DF_DR_SHAPE.is_match(&self.0) {
            let prefix = &self.0[0..2];
            let d0d1 = &self.0[2..4];
            let d2d3 = &self.0[4..6];
            format!("Families/{prefix}/{d0d1}/{d2d3}")
        } else {
            let mut chars = self.0.chars();
            let a = chars.next().map(|c| c.to_ascii_lowercase()).unwrap_or('_');
            let b = chars.next().map(|c| c.to_ascii_lowercase()).unwrap_or('_');
            format!("Families/Aux/{a}{b}")
        }
    }

    /// `true` for accessions matching the authoritative uncurated shape
    /// `DR` + exactly nine decimal digits; everything else (including
    /// shorter/longer `DR` forms) is curated.
    pub fn is_uncurated(&self) -> bool {
        UNCURATED_SHAPE.is_match(&self.0)
    }
}

impl std::fmt::Display for FamilyAccession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-taxon search/GA/TC/NC/FDR threshold line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxaThreshold {
    pub tax_id: TaxId,
    pub ga: f32,
    pub tc: f32,
    pub nc: f32,
    pub fdr: f32,
}

/// Immutable value object describing a single TE family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    // Identity
    pub accession: FamilyAccession,
    pub version: Option<u32>,
    pub name: Option<String>,
    pub length: u64,

    // Descriptive
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub classification: Option<String>,
    pub repeat_type: Option<String>,
    pub repeat_subtype: Option<String>,
    pub clades: Vec<TaxId>,
    pub date_created: Option<chrono::NaiveDate>,
    pub date_modified: Option<chrono::NaiveDate>,

    // Search metadata
    pub search_stages: Vec<u32>,
    pub buffer_stages: Vec<String>,
    pub refineable: Option<bool>,
    pub target_site_cons: Option<String>,

    // Model
    pub model: Option<String>,
    pub consensus: Option<String>,
    pub max_length: Option<u64>,
    pub is_model_masked: Option<bool>,
    pub seed_count: Option<u32>,
    pub build_method: Option<String>,
    pub search_method: Option<String>,
    pub taxa_thresholds: Vec<TaxaThreshold>,
    pub general_cutoff: Option<f32>,

    // Structured blobs (opaque JSON)
    pub features: Option<serde_json::Value>,
    pub coding_sequences: Option<serde_json::Value>,
    pub aliases: Option<serde_json::Value>,
    pub citations: Option<serde_json::Value>,
}

impl Family {
    /// `accession[.version]`, e.g. `DF0000001.3`.
    pub fn to_identity(&self) -> String {
        match self.version {
            Some(v) => format!("{}.{v}", self.accession),
            None => self.accession.to_string(),
        }
    }

    /// The stage ids this family's `ByStage` links should be created under:
    /// every `search_stages` entry, plus the `N` prefix of every `N[a-b]`
    /// buffer stage token.
    pub fn stage_ids(&self) -> Vec<u32> {
        let mut stages: Vec<u32> = self.search_stages.clone();
        for token in &self.buffer_stages {
            let prefix: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
            if let Ok(n) = prefix.parse::<u32>() {
                stages.push(n);
            }
        }
        stages.sort_unstable();
        stages.dedup();
        stages
    }

    pub fn has_hmm(&self) -> bool {
        self.model.is_some()
    }

    pub fn has_consensus(&self) -> bool {
        self.consensus.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(s: &str) -> FamilyAccession {
        FamilyAccession::new(s).unwrap()
    }

    #[test]
    fn accession_bin_for_df_shape() {
        assert_eq!(acc("DF0000123").accession_bin(), "Families/DF/00/00");
        assert_eq!(acc("DR000000001").accession_bin(), "Families/DR/00/00");
    }

    #[test]
    fn accession_bin_for_aux_shape() {
        assert_eq!(acc("RM12345").accession_bin(), "Families/Aux/rm");
    }

    #[test]
    fn curated_shape_is_exactly_dr_plus_nine_digits() {
        assert!(acc("DR000000001").is_uncurated());
        assert!(!acc("DR_Repeat1").is_uncurated());
        // A DR accession that's the wrong digit count is still curated.
        assert!(!acc("DR0000001").is_uncurated());
    }

    #[test]
    fn to_identity_includes_version_when_present() {
        let mut family = sample_family();
        family.version = Some(3);
        assert_eq!(family.to_identity(), "DF0000001.3");
        family.version = None;
        assert_eq!(family.to_identity(), "DF0000001");
    }

    #[test]
    fn stage_ids_combine_search_and_buffer_prefixes() {
        let mut family = sample_family();
        family.search_stages = vec![35, 50];
        family.buffer_stages = vec!["70".to_string(), "80a-b".to_string()];
        assert_eq!(family.stage_ids(), vec![35, 50, 70, 80]);
    }

    fn sample_family() -> Family {
        Family {
            accession: acc("DF0000001"),
            version: None,
            name: None,
            length: 0,
            title: None,
            author: None,
            description: None,
            classification: None,
            repeat_type: None,
            repeat_subtype: None,
            clades: vec![],
            date_created: None,
            date_modified: None,
            search_stages: vec![],
            buffer_stages: vec![],
            refineable: None,
            target_site_cons: None,
            model: None,
            consensus: None,
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
}
