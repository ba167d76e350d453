//! Streaming parser for sorted alignment tab files.
//!
//! A tab file carries one alignment record per line:
//!
//! ```text
//! chrom \t strand \t start \t end [\t gap_start \t gap_end]
//! ```
//!
//! `start`/`end` are 1-based inclusive genomic coordinates of the
//! alignment span. A record split across a splice junction carries the
//! implied intron as a half-open interval `[gap_start, gap_end)`.
//!
//! Records within a file must be sorted by chromosome+strand key
//! (lexicographic, e.g. `chr1+`) and then by ascending start. The
//! engine never re-sorts within a file, only merges across files.

use memchr::memchr;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading or processing tab streams.
#[derive(Error, Debug)]
pub enum TabError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid input: {0}")]
    InvalidFormat(String),
}

pub type Result<T> = std::result::Result<T, TabError>;

/// Strand orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Plus,
    Minus,
}

impl Strand {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Plus),
            '-' => Some(Strand::Minus),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Build the chromosome+strand group key, e.g. `chr1+`.
#[inline]
pub fn group_key(chrom: &str, strand: Strand) -> String {
    let mut key = String::with_capacity(chrom.len() + 1);
    key.push_str(chrom);
    key.push(strand.as_char());
    key
}

/// One alignment record from a tab stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRecord {
    pub chrom: String,
    pub strand: Strand,
    /// 1-based inclusive genomic start of the alignment span.
    pub start: u64,
    /// 1-based inclusive genomic end of the alignment span.
    pub end: u64,
    /// Half-open intron interval implied by a split alignment.
    pub gap: Option<(u64, u64)>,
}

impl TabRecord {
    pub fn new(chrom: impl Into<String>, strand: Strand, start: u64, end: u64) -> Self {
        Self {
            chrom: chrom.into(),
            strand,
            start,
            end,
            gap: None,
        }
    }

    pub fn with_gap(mut self, gap_start: u64, gap_end: u64) -> Self {
        self.gap = Some((gap_start, gap_end));
        self
    }

    /// Chromosome+strand key this record belongs to.
    #[inline]
    pub fn key(&self) -> String {
        group_key(&self.chrom, self.strand)
    }
}

/// Fast u64 parsing - no allocation, no error formatting.
#[inline(always)]
pub fn parse_u64_fast(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.wrapping_mul(10).wrapping_add(d as u64);
    }
    Some(n)
}

/// Check if a line should be skipped (empty or comment).
#[inline(always)]
pub fn should_skip_line(line: &[u8]) -> bool {
    line.is_empty() || line[0] == b'#'
}

/// Parse a tab record from raw line bytes using memchr field splits.
///
/// Returns None on any malformed field; the caller attaches line-number
/// context.
pub fn parse_tab_bytes(line: &[u8]) -> Option<TabRecord> {
    let mut fields: [&[u8]; 6] = [&[]; 6];
    let mut count = 0usize;
    let mut rest = line;
    while count < 6 {
        match memchr(b'\t', rest) {
            Some(i) => {
                fields[count] = &rest[..i];
                rest = &rest[i + 1..];
                count += 1;
            }
            None => {
                fields[count] = rest;
                count += 1;
                rest = &[];
                break;
            }
        }
    }
    if !rest.is_empty() || (count != 4 && count != 6) {
        return None;
    }

    let chrom = std::str::from_utf8(fields[0]).ok()?;
    if fields[1].len() != 1 {
        return None;
    }
    let strand = Strand::from_char(fields[1][0] as char)?;
    let start = parse_u64_fast(fields[2])?;
    let end = parse_u64_fast(fields[3])?;
    if start == 0 || end < start {
        return None;
    }

    let mut record = TabRecord::new(chrom, strand, start, end);

    if count == 6 {
        let gap_start = parse_u64_fast(fields[4])?;
        let gap_end = parse_u64_fast(fields[5])?;
        if !(start < gap_start && gap_start < gap_end && gap_end <= end) {
            return None;
        }
        record.gap = Some((gap_start, gap_end));
    }

    Some(record)
}

/// A streaming tab file reader.
pub struct TabReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    buffer: String,
}

impl TabReader<File> {
    /// Open a tab file from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            TabError::InvalidFormat(format!(
                "cannot open input file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(Self::new(file))
    }
}

impl<R: Read> TabReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(64 * 1024, reader),
            line_number: 0,
            buffer: String::with_capacity(256),
        }
    }

    /// Read the next record, skipping comments and blank lines.
    pub fn read_record(&mut self) -> Result<Option<TabRecord>> {
        loop {
            self.buffer.clear();
            let bytes_read = self.reader.read_line(&mut self.buffer)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim_end().as_bytes();
            if should_skip_line(line) {
                continue;
            }

            return match parse_tab_bytes(line) {
                Some(record) => Ok(Some(record)),
                None => Err(TabError::Parse {
                    line: self.line_number,
                    message: format!("malformed tab record: '{}'", self.buffer.trim_end()),
                }),
            };
        }
    }

    /// Get an iterator over all records.
    pub fn records(self) -> TabRecordIter<R> {
        TabRecordIter { reader: self }
    }
}

/// Iterator over tab records.
pub struct TabRecordIter<R: Read> {
    reader: TabReader<R>,
}

impl<R: Read> Iterator for TabRecordIter<R> {
    type Item = Result<TabRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u64_fast() {
        assert_eq!(parse_u64_fast(b"12345"), Some(12345));
        assert_eq!(parse_u64_fast(b"0"), Some(0));
        assert_eq!(parse_u64_fast(b""), None);
        assert_eq!(parse_u64_fast(b"12a"), None);
    }

    #[test]
    fn test_parse_plain_record() {
        let rec = parse_tab_bytes(b"chr1\t+\t100\t135").unwrap();
        assert_eq!(rec.chrom, "chr1");
        assert_eq!(rec.strand, Strand::Plus);
        assert_eq!(rec.start, 100);
        assert_eq!(rec.end, 135);
        assert_eq!(rec.gap, None);
        assert_eq!(rec.key(), "chr1+");
    }

    #[test]
    fn test_parse_gapped_record() {
        let rec = parse_tab_bytes(b"chr2\t-\t120\t180\t140\t160").unwrap();
        assert_eq!(rec.strand, Strand::Minus);
        assert_eq!(rec.gap, Some((140, 160)));
    }

    #[test]
    fn test_parse_rejects_bad_gap() {
        // Gap must lie strictly inside the alignment span
        assert!(parse_tab_bytes(b"chr1\t+\t100\t135\t90\t95").is_none());
        assert!(parse_tab_bytes(b"chr1\t+\t100\t135\t120\t110").is_none());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_tab_bytes(b"chr1\t+\t100").is_none());
        assert!(parse_tab_bytes(b"chr1\t*\t100\t200").is_none());
        assert!(parse_tab_bytes(b"chr1\t+\t200\t100").is_none());
        assert!(parse_tab_bytes(b"chr1\t+\t0\t100").is_none());
    }

    #[test]
    fn test_reader_skips_comments() {
        let content = "# header\nchr1\t+\t10\t20\n\nchr1\t+\t15\t25\n";
        let reader = TabReader::new(content.as_bytes());
        let records: Vec<_> = reader.records().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].start, 15);
    }

    #[test]
    fn test_reader_error_carries_line() {
        let content = "chr1\t+\t10\t20\nbroken line\n";
        let reader = TabReader::new(content.as_bytes());
        let result: Result<Vec<_>> = reader.records().collect();
        match result {
            Err(TabError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other.map(|v| v.len())),
        }
    }
}
