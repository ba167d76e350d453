//! Strand-aware RT/BD accumulation over genomic coordinates.
//!
//! For every chromosome+strand group the engine builds two integer
//! arrays per sample group: RT (reverse-transcriptase stop counts, one
//! increment at each alignment's 5'-most terminal base) and BD (base
//! density, one increment at every exonic base the alignment covers).
//! On the minus strand the 5' terminal is the record's genomic end.
//!
//! BD uses a difference array, so each record costs O(segments) and the
//! whole pass is O(records + chr_length) regardless of read length.
//! Replicates of the same sample group are summed into one pair of
//! arrays; the scorer never sees individual replicates.

use crate::junction::JunctionInterval;
use crate::tab::{Strand, TabRecord};

/// RT/BD arrays for one sample group on one chromosome+strand.
///
/// Both arrays are `chr_length + 1` long, 1-based, index 0 unused.
/// Allocated fresh per chromosome and dropped before the next one.
#[derive(Debug)]
pub struct Coverage {
    pub rt: Vec<u64>,
    pub bd: Vec<u64>,
}

impl Coverage {
    pub fn new(chr_length: u64) -> Self {
        let len = chr_length as usize + 1;
        Self {
            rt: vec![0; len],
            bd: vec![0; len],
        }
    }

    pub fn chr_length(&self) -> u64 {
        self.rt.len() as u64 - 1
    }
}

/// Exonic segments of a record's footprint: the genomic span minus the
/// record's own splice gap and minus every resolved junction interval
/// the record fully spans. Segments are inclusive on both ends.
fn exonic_segments(
    record: &TabRecord,
    junctions: &[JunctionInterval],
    chr_length: u64,
) -> Vec<(u64, u64)> {
    let start = record.start;
    let end = record.end.min(chr_length);
    if start > end {
        return Vec::new();
    }

    // Introns to exclude, as half-open intervals strictly inside the span.
    let mut introns: Vec<(u64, u64)> = Vec::new();
    if let Some((gs, ge)) = record.gap {
        introns.push((gs, ge));
    }
    let first = junctions.partition_point(|j| j.end <= start);
    for junction in &junctions[first..] {
        if junction.start > end {
            break;
        }
        if junction.start > start && junction.end <= end + 1 {
            introns.push((junction.start, junction.end));
        }
    }
    if introns.is_empty() {
        return vec![(start, end)];
    }
    introns.sort_unstable();

    let mut segments = Vec::with_capacity(introns.len() + 1);
    let mut cursor = start;
    for (intron_start, intron_end) in introns {
        if intron_start > cursor {
            segments.push((cursor, intron_start - 1));
        }
        cursor = cursor.max(intron_end);
    }
    if cursor <= end {
        segments.push((cursor, end));
    }
    segments
}

/// Accumulate one batch of records into the group's arrays.
///
/// `junction_extend` pads each junction-adjacent segment edge by that
/// many bases into the intron (clamped to the intron), compensating
/// for alignment softclipping near splice sites.
pub fn accumulate(
    records: &[TabRecord],
    junctions: &[JunctionInterval],
    strand: Strand,
    junction_extend: u64,
    cov: &mut Coverage,
) {
    let chr_length = cov.chr_length();
    let mut diff: Vec<i64> = vec![0; chr_length as usize + 2];

    for record in records {
        if record.start > chr_length {
            continue;
        }

        // RT stop at the 5'-most terminal base.
        let terminal = match strand {
            Strand::Plus => record.start,
            Strand::Minus => record.end.min(chr_length),
        };
        cov.rt[terminal as usize] += 1;

        let segments = exonic_segments(record, junctions, chr_length);
        let spliced = segments.len() > 1;
        for (i, &(seg_start, seg_end)) in segments.iter().enumerate() {
            let mut lo = seg_start;
            let mut hi = seg_end;
            if spliced && junction_extend > 0 {
                // Pad the edges that face an intron.
                if i > 0 {
                    lo = lo.saturating_sub(junction_extend).max(1);
                }
                if i + 1 < segments.len() {
                    hi = (hi + junction_extend).min(chr_length);
                }
            }
            diff[lo as usize] += 1;
            diff[hi as usize + 1] -= 1;
        }
    }

    let mut running: i64 = 0;
    for pos in 1..=chr_length as usize {
        running += diff[pos];
        cov.bd[pos] += running as u64;
    }
}
