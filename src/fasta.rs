//! Genome FASTA loader and base-mask construction.
//!
//! Only needed when a base filter is configured: the scorer then
//! restricts scoring to positions whose (strand-adjusted) genomic base
//! is in the configured set.

use crate::tab::{Strand, TabError};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// In-memory genome sequences keyed by chromosome name.
#[derive(Debug, Default)]
pub struct GenomeFasta {
    seqs: FxHashMap<String, Vec<u8>>,
}

/// Complement a nucleotide, preserving case; non-ACGT bytes pass through.
#[inline]
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        other => other,
    }
}

impl GenomeFasta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a plain (possibly multi-line) FASTA file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TabError> {
        let file = File::open(path.as_ref()).map_err(|e| {
            TabError::InvalidFormat(format!(
                "cannot open genome file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let reader = BufReader::with_capacity(1024 * 1024, file);

        let mut seqs: FxHashMap<String, Vec<u8>> = FxHashMap::default();
        let mut current: Option<String> = None;

        for line_result in reader.lines() {
            let line = line_result?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('>') {
                // Chromosome name is the first whitespace-delimited token
                let name = header.split_whitespace().next().unwrap_or("").to_string();
                if name.is_empty() {
                    return Err(TabError::InvalidFormat(
                        "FASTA header with empty sequence name".to_string(),
                    ));
                }
                seqs.entry(name.clone()).or_default();
                current = Some(name);
            } else {
                let name = current.as_ref().ok_or_else(|| {
                    TabError::InvalidFormat("FASTA sequence data before first header".to_string())
                })?;
                seqs.get_mut(name).unwrap().extend_from_slice(line.as_bytes());
            }
        }

        Ok(Self { seqs })
    }

    #[inline]
    pub fn has_chrom(&self, chrom: &str) -> bool {
        self.seqs.contains_key(chrom)
    }

    /// Raw (plus-strand) sequence for a chromosome.
    pub fn sequence(&self, chrom: &str) -> Option<&[u8]> {
        self.seqs.get(chrom).map(|v| v.as_slice())
    }

    /// Strand-adjusted base at a 1-based position: the complement is
    /// reported on the minus strand. Returns None out of bounds.
    #[inline]
    pub fn base_at(&self, chrom: &str, strand: Strand, pos: u64) -> Option<u8> {
        let seq = self.seqs.get(chrom)?;
        if pos == 0 || pos as usize > seq.len() {
            return None;
        }
        let base = seq[pos as usize - 1];
        Some(match strand {
            Strand::Plus => base,
            Strand::Minus => complement(base),
        })
    }
}

/// Per-chromosome base mask: `mask[p]` is true when the strand-adjusted
/// base at 1-based position `p` is in the configured set. Index 0 is
/// unused, matching the coverage arrays.
///
/// Comparison is an exact byte match, so `A` and `a` select different
/// positions (lowercase marks repeat-masked sequence).
pub fn build_base_mask(
    fasta: &GenomeFasta,
    chrom: &str,
    strand: Strand,
    bases: &[u8],
    chr_length: u64,
) -> Option<Vec<bool>> {
    let seq = fasta.sequence(chrom)?;
    let usable = (chr_length as usize).min(seq.len());

    let mut mask = vec![false; chr_length as usize + 1];
    for (i, &raw) in seq[..usable].iter().enumerate() {
        let base = match strand {
            Strand::Plus => raw,
            Strand::Minus => complement(raw),
        };
        if bases.contains(&base) {
            mask[i + 1] = true;
        }
    }
    Some(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_fasta() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ">chr1 test sequence").unwrap();
        writeln!(file, "ACGT").unwrap();
        writeln!(file, "acgt").unwrap();
        writeln!(file, ">chr2").unwrap();
        writeln!(file, "TTTT").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_and_lookup() {
        let file = sample_fasta();
        let fasta = GenomeFasta::from_file(file.path()).unwrap();

        assert!(fasta.has_chrom("chr1"));
        assert!(fasta.has_chrom("chr2"));
        assert_eq!(fasta.sequence("chr1").unwrap(), b"ACGTacgt");
        assert_eq!(fasta.base_at("chr1", Strand::Plus, 1), Some(b'A'));
        assert_eq!(fasta.base_at("chr1", Strand::Minus, 1), Some(b'T'));
        assert_eq!(fasta.base_at("chr1", Strand::Plus, 9), None);
        assert_eq!(fasta.base_at("chr1", Strand::Plus, 0), None);
    }

    #[test]
    fn test_mask_exact_case() {
        let file = sample_fasta();
        let fasta = GenomeFasta::from_file(file.path()).unwrap();

        let mask = build_base_mask(&fasta, "chr1", Strand::Plus, b"A", 8).unwrap();
        assert_eq!(mask.len(), 9);
        assert!(mask[1]); // 'A'
        assert!(!mask[5]); // 'a' is distinct from 'A'

        let mask = build_base_mask(&fasta, "chr1", Strand::Plus, b"Aa", 8).unwrap();
        assert!(mask[1] && mask[5]);
    }

    #[test]
    fn test_mask_minus_strand_complements() {
        let file = sample_fasta();
        let fasta = GenomeFasta::from_file(file.path()).unwrap();

        // chr2 is TTTT; minus strand reads AAAA
        let mask = build_base_mask(&fasta, "chr2", Strand::Minus, b"A", 4).unwrap();
        assert_eq!(&mask[1..], &[true, true, true, true]);
    }

    #[test]
    fn test_mask_missing_chrom() {
        let file = sample_fasta();
        let fasta = GenomeFasta::from_file(file.path()).unwrap();
        assert!(build_base_mask(&fasta, "chr9", Strand::Plus, b"A", 10).is_none());
    }

    #[test]
    fn test_mask_length_clamped_to_sequence() {
        let file = sample_fasta();
        let fasta = GenomeFasta::from_file(file.path()).unwrap();

        // Declared length longer than the sequence: trailing positions stay unmasked
        let mask = build_base_mask(&fasta, "chr2", Strand::Plus, b"T", 6).unwrap();
        assert_eq!(mask.len(), 7);
        assert!(mask[4]);
        assert!(!mask[5] && !mask[6]);
    }
}
