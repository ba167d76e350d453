//! Splice-junction intervals and their resolution.
//!
//! Junctions are intron intervals removed by splicing. Alignments that
//! span one would otherwise smear coverage across the intron, so the
//! accumulator excludes intronic bases (see `coverage`). This module
//! loads declared junctions, counts read support from gapped records,
//! merges overlapping intervals and validates them against chromosome
//! bounds.
//!
//! Intervals are half-open `[start, end)` on 1-based coordinates:
//! `start` is the first intron base.

use crate::chrom::ChromSizes;
use crate::tab::{group_key, Result, Strand, TabError, TabRecord};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One intron interval with read support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionInterval {
    pub start: u64,
    pub end: u64,
    /// Number of records whose gap matched this interval.
    pub support: u64,
    /// Set when the interval absorbed at least one other during merge.
    pub combined: bool,
}

impl JunctionInterval {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            support: 0,
            combined: false,
        }
    }
}

/// Junction intervals keyed by chromosome+strand.
pub type JunctionMap = FxHashMap<String, Vec<JunctionInterval>>;

/// Load a declared junction table (chrom\tstrand\tstart\tend).
///
/// Junctions on chromosomes absent from the size table can never be
/// used and are dropped; one summary warning is emitted.
pub fn load_junctions<P: AsRef<Path>>(path: P, sizes: &ChromSizes) -> Result<JunctionMap> {
    let file = File::open(path.as_ref()).map_err(|e| {
        TabError::InvalidFormat(format!(
            "cannot open junction file {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    let reader = BufReader::new(file);

    let mut map: JunctionMap = FxHashMap::default();
    let mut dropped = 0usize;

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 4 {
            return Err(TabError::Parse {
                line: line_num + 1,
                message: "junction file requires chrom, strand, start, end".to_string(),
            });
        }
        let strand = fields[1]
            .chars()
            .next()
            .and_then(Strand::from_char)
            .ok_or_else(|| TabError::Parse {
                line: line_num + 1,
                message: format!("invalid strand: '{}'", fields[1]),
            })?;
        let start: u64 = fields[2].parse().map_err(|_| TabError::Parse {
            line: line_num + 1,
            message: format!("invalid junction start: '{}'", fields[2]),
        })?;
        let end: u64 = fields[3].parse().map_err(|_| TabError::Parse {
            line: line_num + 1,
            message: format!("invalid junction end: '{}'", fields[3]),
        })?;
        if start == 0 || end <= start {
            return Err(TabError::Parse {
                line: line_num + 1,
                message: format!("degenerate junction interval {}-{}", start, end),
            });
        }

        let key = group_key(fields[0], strand);
        if !sizes.contains(&key) {
            dropped += 1;
            continue;
        }
        map.entry(key).or_default().push(JunctionInterval::new(start, end));
    }

    if dropped > 0 {
        eprintln!(
            "Warning: dropped {} junction(s) on chromosomes absent from the size table",
            dropped
        );
    }

    Ok(map)
}

/// Count read support: every gapped record either increments the
/// matching declared interval (exact start/end) or contributes an
/// ad hoc candidate with support 1.
pub fn build_junction_support(records: &[TabRecord], junctions: &mut Vec<JunctionInterval>) {
    for record in records {
        let (gap_start, gap_end) = match record.gap {
            Some(gap) => gap,
            None => continue,
        };
        match junctions
            .iter_mut()
            .find(|j| j.start == gap_start && j.end == gap_end)
        {
            Some(junction) => junction.support += 1,
            None => {
                let mut adhoc = JunctionInterval::new(gap_start, gap_end);
                adhoc.support = 1;
                junctions.push(adhoc);
            }
        }
    }
}

/// Merge overlapping or abutting intervals into the canonical
/// non-overlapping junction set. Support of merged constituents is
/// summed, so total support is preserved.
pub fn combine_junction(junctions: &mut Vec<JunctionInterval>) {
    if junctions.is_empty() {
        return;
    }
    junctions.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let mut merged: Vec<JunctionInterval> = Vec::with_capacity(junctions.len());
    for junction in junctions.drain(..) {
        match merged.last_mut() {
            Some(last) if junction.start <= last.end => {
                last.end = last.end.max(junction.end);
                last.support += junction.support;
                last.combined = true;
            }
            _ => merged.push(junction),
        }
    }
    *junctions = merged;
}

/// Clamp intervals to chromosome bounds. Out-of-bounds intervals are
/// truncated with a warning; intervals left empty by truncation are
/// removed. Never aborts the run.
pub fn check_overlap(junctions: &mut Vec<JunctionInterval>, key: &str, chr_length: u64) {
    junctions.retain_mut(|junction| {
        if junction.end > chr_length {
            eprintln!(
                "Warning: junction {}-{} on {} exceeds chromosome length {}, truncated",
                junction.start, junction.end, key, chr_length
            );
            junction.end = chr_length;
        }
        junction.start < junction.end
    });
}

/// True when the 1-based position lies inside one of the (sorted,
/// non-overlapping) intervals.
#[inline]
pub fn is_intronic(junctions: &[JunctionInterval], pos: u64) -> bool {
    let idx = junctions.partition_point(|j| j.end <= pos);
    idx < junctions.len() && junctions[idx].start <= pos
}

/// Per-position intron mask, same indexing as the coverage arrays.
pub fn intron_mask(junctions: &[JunctionInterval], chr_length: u64) -> Vec<bool> {
    let mut mask = vec![false; chr_length as usize + 1];
    for junction in junctions {
        let end = junction.end.min(chr_length + 1);
        for p in junction.start..end {
            mask[p as usize] = true;
        }
    }
    mask
}

/// Serialize the resolved junction table for reuse in later runs.
pub fn write_junctions<P: AsRef<Path>>(map: &JunctionMap, path: P) -> Result<()> {
    let file = File::create(path.as_ref()).map_err(|e| {
        TabError::InvalidFormat(format!(
            "cannot create junction output file {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    let mut writer = BufWriter::new(file);

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        let chrom = &key[..key.len() - 1];
        let strand = &key[key.len() - 1..];
        for junction in &map[key] {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}",
                chrom, strand, junction.start, junction.end, junction.support
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}
