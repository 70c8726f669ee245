//! Parsing of the EMBL-style append stream (spec.md §6, "EMBL append stream").
//!
//! Entry delimiting, field grammar, and line-prefix codes (`ID`, `AC`, `NM`,
//! `OS`, `CC`, `SQ`) are external collaborator concerns in the strict sense
//! that a full EMBL parser is out of scope; what this module implements is
//! exactly the subset spec.md §6 requires the core to consume: one `Family`
//! per `ID ... //` entry with `accession`, optional `name`, `clades` resolved
//! against the root's sanitized-name lookup, `repeat_type`/`repeat_subtype`/
//! `search_stages`/`buffer_stages`/`refineable` from `CC` comment lines, and
//! `consensus` from the `SQ` sequence body. The field shapes are reverse
//! grounded in `famdb_helper_classes.Family.to_embl` (the serializer for this
//! same format, in `examples/original_source/famdb_helper_classes.py`), since
//! no parser counterpart survived the distillation's source filtering.

use std::collections::HashMap;

use crate::taxonomy::{sanitize_name, TaxId};

/// A clade name on an `OS` line that failed to resolve against the root's
/// sanitized scientific-name lookup; recoverable per spec.md §7 ("name not
/// resolvable during EMBL parse: warn and skip the clade assignment").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedClade {
    pub accession: String,
    pub species_name: String,
}

/// One parsed EMBL entry, pre-`Family` construction. Carries only the fields
/// spec.md §6 names as in-scope for the append path; callers combine this
/// with defaults for the remaining `Family` fields.
#[derive(Debug, Clone, Default)]
pub struct EmblEntry {
    pub accession: String,
    pub version: Option<u32>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub clades: Vec<TaxId>,
    pub repeat_type: Option<String>,
    pub repeat_subtype: Option<String>,
    pub search_stages: Vec<u32>,
    pub buffer_stages: Vec<String>,
    pub refineable: Option<bool>,
    pub consensus: Option<String>,
}

/// Parses an EMBL-style stream of `ID ... //`-delimited entries. Resolves
/// `OS` species lines against `lookup` (sanitized-lowercase scientific name
/// -> tax_id, as built from the root container's name cache); unresolved
/// names are reported in the returned warning list rather than aborting the
/// parse, matching the recoverable classification in spec.md §7.
pub fn parse_embl_stream(text: &str, lookup: &HashMap<String, TaxId>) -> (Vec<EmblEntry>, Vec<UnresolvedClade>) {
    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    let mut current: Option<EmblEntry> = None;
    let mut in_sequence = false;
    let mut sequence = String::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("ID   ") {
            current = Some(EmblEntry {
                accession: rest.split(';').next().unwrap_or("").trim().to_string(),
                version: parse_sv(rest),
                ..Default::default()
            });
            in_sequence = false;
            sequence.clear();
            continue;
        }

        let Some(entry) = current.as_mut() else { continue };

        if line == "//" {
            if !sequence.is_empty() {
                entry.consensus = Some(sequence.to_uppercase());
            }
            entries.push(current.take().unwrap());
            in_sequence = false;
            sequence.clear();
            continue;
        }

        if let Some(rest) = line.strip_prefix("NM   ") {
            entry.name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("DE   ") {
            entry.description = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("OS   ") {
            let species_name = rest.trim().to_string();
            let key = sanitize_name(&species_name).to_lowercase();
            match lookup.get(&key) {
                Some(&tax_id) => entry.clades.push(tax_id),
                None => warnings.push(UnresolvedClade {
                    accession: entry.accession.clone(),
                    species_name,
                }),
            }
        } else if let Some(rest) = line.strip_prefix("CC        Type: ") {
            let value = rest.trim();
            if !value.is_empty() {
                entry.repeat_type = Some(value.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("CC        SubType: ") {
            let value = rest.trim();
            if !value.is_empty() {
                entry.repeat_subtype = Some(value.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("CC        SearchStages: ") {
            entry.search_stages = rest
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
        } else if let Some(rest) = line.strip_prefix("CC        BufferStages: ") {
            entry.buffer_stages = rest
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        } else if line.trim() == "CC        Refineable" {
            entry.refineable = Some(true);
        } else if line.starts_with("SQ   Sequence") {
            in_sequence = true;
        } else if in_sequence {
            let bases: String = line
                .chars()
                .filter(|c| c.is_ascii_alphabetic())
                .collect();
            sequence.push_str(&bases);
        }
    }

    (entries, warnings)
}

fn parse_sv(id_line_rest: &str) -> Option<u32> {
    id_line_rest
        .split(';')
        .map(str::trim)
        .find_map(|field| field.strip_prefix("SV ").and_then(|v| v.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup() -> HashMap<String, TaxId> {
        let mut m = HashMap::new();
        m.insert("genus".to_string(), TaxId::new(4));
        m.insert("other_genus".to_string(), TaxId::new(5));
        m.insert("other_order".to_string(), TaxId::new(3));
        m
    }

    const SIMPLE: &str = "\
ID   TEST0001; SV 1; linear; DNA; STD; UNC; 8 BP.
NM   Test1
XX
AC   TEST0001;
XX
XX
KW   Type/SubType.
XX
OS   Genus
OC   .
XX
CC
CC   RepeatMasker Annotations:
CC        Type: Type
CC        SubType: SubType
CC        Species: Genus
CC        SearchStages:
CC        BufferStages:
XX
SQ   Sequence 8 BP; 5 A; 1 C; 1 G; 1 T; 0 other;
     acgtaaaa                                                           8
//
";

    #[test]
    fn parses_accession_name_version_and_consensus() {
        let (entries, warnings) = parse_embl_stream(SIMPLE, &lookup());
        assert!(warnings.is_empty());
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.accession, "TEST0001");
        assert_eq!(e.version, Some(1));
        assert_eq!(e.name.as_deref(), Some("Test1"));
        assert_eq!(e.clades, vec![TaxId::new(4)]);
        assert_eq!(e.repeat_type.as_deref(), Some("Type"));
        assert_eq!(e.repeat_subtype.as_deref(), Some("SubType"));
        assert_eq!(e.consensus.as_deref(), Some("ACGTAAAA"));
    }

    const MULTI_CLADE_REFINEABLE: &str = "\
ID   TEST0005; SV 5; linear; DNA; STD; UNC; 18 BP.
NM   Test5
XX
AC   TEST0005;
XX
XX
DR   Repbase; MyLTR1.
XX
KW   Long terminal repeat of retrovirus-like element; Test5.
XX
OS   Other Genus
OC   .
OS   Other Order
OC   .
XX
CC
CC   RepeatMasker Annotations:
CC        Type: LTR
CC        SubType: BigTest
CC        Species: Other_Genus, Other_Order
CC        SearchStages:
CC        BufferStages:
CC        Refineable
XX
SQ   Sequence 18 BP; 4 A; 4 C; 4 G; 4 T; 2 other;
     acgttgcaga gakwctct                                                18
//
";

    #[test]
    fn parses_multiple_clades_and_refineable_flag() {
        let (entries, warnings) = parse_embl_stream(MULTI_CLADE_REFINEABLE, &lookup());
        assert!(warnings.is_empty());
        let e = &entries[0];
        assert_eq!(e.clades, vec![TaxId::new(5), TaxId::new(3)]);
        assert_eq!(e.refineable, Some(true));
        assert_eq!(e.consensus.as_deref(), Some("ACGTTGCAGAGAKWCTCT"));
    }

    #[test]
    fn unresolvable_species_is_a_warning_not_an_error() {
        let mut entries_text = SIMPLE.replace("OS   Genus", "OS   Nonexistent Species");
        entries_text = entries_text.replace("Species: Genus", "Species: Nonexistent_Species");
        let (entries, warnings) = parse_embl_stream(&entries_text, &lookup());
        assert_eq!(entries[0].clades, Vec::new());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].accession, "TEST0001");
        assert_eq!(warnings[0].species_name, "Nonexistent Species");
    }

    #[test]
    fn multiple_entries_in_one_stream_are_each_parsed() {
        let combined = format!("{SIMPLE}{MULTI_CLADE_REFINEABLE}");
        let (entries, _) = parse_embl_stream(&combined, &lookup());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].accession, "TEST0001");
        assert_eq!(entries[1].accession, "TEST0005");
    }
}
