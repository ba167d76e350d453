//! Coordinate sort of a finished gTab file.
//!
//! The engine writes rows in chromosome-merge order (both strands of a
//! chromosome interleaved with other chromosomes). This pass rewrites
//! the file sorted by (ChrID lexicographic, ChrPos numeric, Strand),
//! keeping the `@` header block on top. Large files are memory-mapped;
//! small files and in-memory buffers go through buffered reads. Lines
//! are never copied during the sort, only their offsets move.

use crate::tab::{Result, TabError};
use memchr::memchr;
use memmap2::Mmap;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

const BUF_SIZE: usize = 256 * 1024;
const MMAP_THRESHOLD: usize = 64 * 1024;
const PARALLEL_THRESHOLD: usize = 10_000;

/// One data row, reduced to its sort key and byte range.
#[derive(Clone, Copy, Debug)]
struct RowEntry {
    chrom_index: u32,
    pos: u64,
    strand: u8,
    line_start: usize,
    line_len: usize,
}

/// Sort `input_path` into `output`, header block first.
pub fn sort_gtab<P: AsRef<Path>, W: Write>(input_path: P, output: &mut W) -> Result<usize> {
    let file = File::open(input_path.as_ref())?;
    let file_size = file.metadata()?.len() as usize;

    if file_size >= MMAP_THRESHOLD {
        let mmap = unsafe { Mmap::map(&file)? };
        sort_bytes(&mmap, output)
    } else {
        let mut data = Vec::with_capacity(file_size);
        let mut reader = file;
        reader.read_to_end(&mut data)?;
        sort_bytes(&data, output)
    }
}

/// Sort an in-memory gTab image into `output`. Returns the number of
/// data rows written.
pub fn sort_bytes<W: Write>(data: &[u8], output: &mut W) -> Result<usize> {
    let mut writer = BufWriter::with_capacity(BUF_SIZE, output);

    // Header lines pass through in original order; data line offsets
    // are collected for sorting.
    let mut lines: Vec<(usize, usize)> = Vec::with_capacity(data.len() / 40);
    let mut pos = 0;
    while pos < data.len() {
        let line_end = match memchr(b'\n', &data[pos..]) {
            Some(off) => pos + off,
            None => data.len(),
        };
        if line_end > pos {
            if data[pos] == b'@' {
                writer.write_all(&data[pos..line_end])?;
                writer.write_all(b"\n")?;
            } else {
                lines.push((pos, line_end));
            }
        }
        pos = line_end + 1;
    }

    // Lexicographic chromosome order, matching the size-table keying.
    let mut chroms: Vec<&[u8]> = Vec::new();
    for &(start, end) in &lines {
        let line = &data[start..end];
        let chrom = &line[..memchr(b'\t', line).unwrap_or(line.len())];
        if !chroms.iter().any(|c| *c == chrom) {
            chroms.push(chrom);
        }
    }
    chroms.sort_unstable();
    let chrom_index: FxHashMap<&[u8], u32> = chroms
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, i as u32))
        .collect();

    let parse = |&(line_start, line_end): &(usize, usize)| -> Result<RowEntry> {
        let line = &data[line_start..line_end];
        parse_row(line, &chrom_index).ok_or_else(|| {
            TabError::InvalidFormat(format!(
                "malformed output row: {}",
                String::from_utf8_lossy(line)
            ))
        })
        .map(|(chrom_idx, strand, pos)| RowEntry {
            chrom_index: chrom_idx,
            pos,
            strand,
            line_start,
            line_len: line_end - line_start,
        })
    };

    let mut entries: Vec<RowEntry> = if lines.len() >= PARALLEL_THRESHOLD {
        lines.par_iter().map(parse).collect::<Result<Vec<_>>>()?
    } else {
        lines.iter().map(parse).collect::<Result<Vec<_>>>()?
    };

    entries.par_sort_unstable_by(|a, b| {
        a.chrom_index
            .cmp(&b.chrom_index)
            .then_with(|| a.pos.cmp(&b.pos))
            .then_with(|| a.strand.cmp(&b.strand))
            .then_with(|| a.line_start.cmp(&b.line_start))
    });

    for entry in &entries {
        let start = entry.line_start;
        writer.write_all(&data[start..start + entry.line_len])?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    Ok(entries.len())
}

/// Extract (chrom index, strand byte, position) from a data row:
/// `ChrID \t Strand \t ChrPos \t ...`.
#[inline]
fn parse_row(line: &[u8], chrom_index: &FxHashMap<&[u8], u32>) -> Option<(u32, u8, u64)> {
    let tab1 = memchr(b'\t', line)?;
    let chrom_idx = *chrom_index.get(&line[..tab1])?;

    let rest = &line[tab1 + 1..];
    let tab2 = memchr(b'\t', rest)?;
    if tab2 != 1 {
        return None;
    }
    let strand = rest[0];

    let rest = &rest[2..];
    let pos_bytes = match memchr(b'\t', rest) {
        Some(tab3) => &rest[..tab3],
        None => rest,
    };
    let mut pos: u64 = 0;
    if pos_bytes.is_empty() {
        return None;
    }
    for &b in pos_bytes {
        let digit = b.wrapping_sub(b'0');
        if digit > 9 {
            return None;
        }
        pos = pos.wrapping_mul(10).wrapping_add(digit as u64);
    }
    Some((chrom_idx, strand, pos))
}
