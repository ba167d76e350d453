//! Chromosome-size table keyed by chromosome+strand.
//!
//! Parses STAR-style `chrNameLength.txt` files (tab-delimited:
//! chrom\tlength). Every chromosome is entered under both strand keys
//! (`chr1+` and `chr1-`) since tab streams are grouped that way.

use crate::tab::{group_key, Strand, TabError};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Chromosome sizes, looked up by chromosome+strand key.
#[derive(Debug, Clone, Default)]
pub struct ChromSizes {
    sizes: FxHashMap<String, u64>,
}

impl ChromSizes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load sizes from a chrom\tlength file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TabError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut sizes = FxHashMap::default();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let chrom = fields.next().unwrap_or("");
            let size_field = fields.next().ok_or_else(|| TabError::Parse {
                line: line_num + 1,
                message: "size file requires two columns: chrom and length".to_string(),
            })?;
            let size: u64 = size_field.parse().map_err(|_| TabError::Parse {
                line: line_num + 1,
                message: format!("invalid chromosome length: {}", size_field),
            })?;

            sizes.insert(group_key(chrom, Strand::Plus), size);
            sizes.insert(group_key(chrom, Strand::Minus), size);
        }

        Ok(Self { sizes })
    }

    /// Look up the length for a chromosome+strand key (e.g. `chr1+`).
    #[inline]
    pub fn get(&self, key: &str) -> Option<u64> {
        self.sizes.get(key).copied()
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.sizes.contains_key(key)
    }

    pub fn insert(&mut self, chrom: &str, size: u64) {
        self.sizes.insert(group_key(chrom, Strand::Plus), size);
        self.sizes.insert(group_key(chrom, Strand::Minus), size);
    }

    pub fn len(&self) -> usize {
        self.sizes.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}
