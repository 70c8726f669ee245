//! Minimal output helpers for the command layer. Every command writes
//! through the `impl Write` the caller hands it (rather than `println!`,
//! which panics rather than returning a `Result` on a broken pipe) so that a
//! reader process closing its end of a pipe surfaces as an ordinary
//! `io::Error` main can map to exit code 1.

use std::io::{self, Write};

use clap::ValueEnum;
use colored::Colorize;

use famdb_core::family::Family;

pub fn section_header(out: &mut impl Write, title: &str) -> io::Result<()> {
    writeln!(out, "{}", title.bold().cyan())
}

pub fn tree_item(out: &mut impl Write, is_last: bool, label: &str, value: Option<&str>) -> io::Result<()> {
    let prefix = if is_last { "└─" } else { "├─" };
    match value {
        Some(v) => writeln!(out, "{} {}: {}", prefix, label, v),
        None => writeln!(out, "{} {}", prefix, label),
    }
}

pub fn line(out: &mut impl Write, text: &str) -> io::Result<()> {
    writeln!(out, "{text}")
}

/// The `--format` choices the `families`/`family` commands accept. Rendering
/// here is deliberately narrow: a real EMBL/HMM/FASTA serializer is an
/// external collaborator concern, so each variant emits just enough of the
/// shape to be useful from the command line without reproducing that
/// serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FamilyFormat {
    Summary,
    Hmm,
    HmmSpecies,
    FastaName,
    FastaAcc,
    Embl,
    EmblMeta,
    EmblSeq,
}

pub fn render_family(out: &mut impl Write, format: FamilyFormat, family: &Family) -> io::Result<()> {
    render_family_opts(out, format, family, false)
}

/// As [`render_family`], but for the fasta formats also emits a second,
/// reverse-complemented entry (the `families --add-reverse-complement` flag).
pub fn render_family_opts(
    out: &mut impl Write,
    format: FamilyFormat,
    family: &Family,
    add_reverse_complement: bool,
) -> io::Result<()> {
    match format {
        FamilyFormat::Summary => render_summary(out, family),
        FamilyFormat::Hmm | FamilyFormat::HmmSpecies => render_hmm(out, family),
        FamilyFormat::FastaName => {
            let header = family.name.as_deref().unwrap_or(family.accession.as_str());
            render_fasta(out, family, header)?;
            if add_reverse_complement {
                render_fasta_rc(out, family, &format!("{header}_rc"))?;
            }
            Ok(())
        }
        FamilyFormat::FastaAcc => {
            let header = family.accession.as_str();
            render_fasta(out, family, header)?;
            if add_reverse_complement {
                render_fasta_rc(out, family, &format!("{header}_rc"))?;
            }
            Ok(())
        }
        FamilyFormat::Embl => render_embl(out, family, true, true),
        FamilyFormat::EmblMeta => render_embl(out, family, true, false),
        FamilyFormat::EmblSeq => render_embl(out, family, false, true),
    }
}

pub fn reverse_complement(seq: &str) -> String {
    seq.chars().rev().map(complement_base).collect()
}

fn complement_base(c: char) -> char {
    match c.to_ascii_uppercase() {
        'A' => 'T',
        'T' => 'A',
        'C' => 'G',
        'G' => 'C',
        other => other,
    }
}

fn render_summary(out: &mut impl Write, family: &Family) -> io::Result<()> {
    writeln!(
        out,
        "{}\t{}\t{}",
        family.to_identity(),
        family.name.as_deref().unwrap_or("-"),
        family.classification.as_deref().unwrap_or("-"),
    )
}

fn render_hmm(out: &mut impl Write, family: &Family) -> io::Result<()> {
    let Some(model) = &family.model else {
        return writeln!(out, "; {} has no HMM model", family.to_identity());
    };
    writeln!(out, "{model}")?;
    for threshold in &family.taxa_thresholds {
        writeln!(
            out,
            "TH:  TaxId:{}; GA:{:.1}; TC:{:.1}; NC:{:.1}; fdr:{:.1};",
            threshold.tax_id, threshold.ga, threshold.tc, threshold.nc, threshold.fdr,
        )?;
    }
    Ok(())
}

fn render_fasta(out: &mut impl Write, family: &Family, header: &str) -> io::Result<()> {
    let Some(consensus) = &family.consensus else {
        return Ok(());
    };
    write_fasta_record(out, header, consensus)
}

fn render_fasta_rc(out: &mut impl Write, family: &Family, header: &str) -> io::Result<()> {
    let Some(consensus) = &family.consensus else {
        return Ok(());
    };
    write_fasta_record(out, header, &reverse_complement(consensus))
}

fn write_fasta_record(out: &mut impl Write, header: &str, sequence: &str) -> io::Result<()> {
    writeln!(out, ">{header}")?;
    for chunk in sequence.as_bytes().chunks(60) {
        writeln!(out, "{}", String::from_utf8_lossy(chunk))?;
    }
    Ok(())
}

fn render_embl(out: &mut impl Write, family: &Family, meta: bool, seq: bool) -> io::Result<()> {
    if meta {
        let version = family.version.map(|v| v.to_string()).unwrap_or_else(|| "1".to_string());
        writeln!(out, "ID   {}; SV {}; linear; DNA; STD; UNC; {} BP.", family.accession, version, family.length)?;
        if let Some(name) = &family.name {
            writeln!(out, "NM   {name}")?;
        }
        if let Some(description) = &family.description {
            writeln!(out, "DE   {description}")?;
        }
        writeln!(out, "CC")?;
        writeln!(out, "CC   RepeatMasker Annotations:")?;
        writeln!(out, "CC        Type: {}", family.repeat_type.as_deref().unwrap_or(""))?;
        writeln!(out, "CC        SubType: {}", family.repeat_subtype.as_deref().unwrap_or(""))?;
    }
    if seq {
        if let Some(consensus) = &family.consensus {
            writeln!(out, "SQ   Sequence {} BP;", consensus.len())?;
            for chunk in consensus.to_lowercase().as_bytes().chunks(60) {
                writeln!(out, "     {}", String::from_utf8_lossy(chunk))?;
            }
        }
    }
    if meta {
        writeln!(out, "//")?;
    }
    Ok(())
}
