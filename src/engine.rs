//! The chromosome loop: merge, resolve junctions, accumulate, score,
//! write.
//!
//! One chromosome+strand group is processed at a time, with all arrays
//! allocated fresh per group and dropped before the next one, so peak
//! memory is bounded by the longest chromosome rather than the genome.
//! Rows come out in merge order; `sort::sort_gtab` produces the final
//! coordinate-ordered table.

use crate::chrom::ChromSizes;
use crate::config::{EngineConfig, Mode};
use crate::coverage::{accumulate, Coverage};
use crate::fasta::{build_base_mask, GenomeFasta};
use crate::gtab::GtabWriter;
use crate::junction::{
    build_junction_support, check_overlap, combine_junction, intron_mask, JunctionInterval,
    JunctionMap,
};
use crate::score::score_chromosome;
use crate::sync::{ChromGroup, StreamSync};
use crate::tab::{Result, TabError};
use std::io::{Read, Write};

/// Counters reported after a run.
#[derive(Debug, Default, Clone)]
pub struct EngineStats {
    pub chromosomes_processed: usize,
    pub chromosomes_skipped: usize,
    pub rows_written: usize,
}

/// Result of a run: counters plus the resolved junction table, kept
/// for the optional junction-output file.
#[derive(Debug)]
pub struct EngineRun {
    pub stats: EngineStats,
    pub resolved_junctions: JunctionMap,
}

/// Scoring engine for one configured run. Holds only borrows of the
/// shared read-only tables; per-chromosome state lives inside `run`.
pub struct Engine<'a> {
    cfg: &'a EngineConfig,
    sizes: &'a ChromSizes,
    junctions: &'a JunctionMap,
    fasta: Option<&'a GenomeFasta>,
    /// Number of leading streams that carry control samples; the rest
    /// are treatment samples.
    control_count: usize,
}

impl<'a> Engine<'a> {
    pub fn new(
        cfg: &'a EngineConfig,
        sizes: &'a ChromSizes,
        junctions: &'a JunctionMap,
        fasta: Option<&'a GenomeFasta>,
        control_count: usize,
    ) -> Result<Self> {
        cfg.validate()?;
        if cfg.mode() == Mode::TrtCont && control_count == 0 {
            return Err(TabError::InvalidFormat(
                "treatment-vs-control mode requires at least one control file".to_string(),
            ));
        }
        if cfg.use_mask() && fasta.is_none() {
            return Err(TabError::InvalidFormat(
                "a base filter requires a genome file".to_string(),
            ));
        }
        Ok(Self {
            cfg,
            sizes,
            junctions,
            fasta,
            control_count,
        })
    }

    /// Process every chromosome+strand group from the synchronizer and
    /// write header plus rows (merge order) to `writer`.
    pub fn run<R: Read, W: Write>(
        &self,
        sync: &mut StreamSync<R>,
        writer: W,
    ) -> Result<EngineRun> {
        let mut out = GtabWriter::new(writer, self.cfg.mode(), self.cfg.use_mask());
        out.write_header()?;

        let mut stats = EngineStats::default();
        let mut resolved_junctions = JunctionMap::default();

        let mut index = 1usize;
        while let Some(group) = sync.next_group()? {
            let chrom = group.chrom().to_string();

            if self.cfg.use_mask() {
                let fasta = self.fasta.expect("checked at construction");
                if !fasta.has_chrom(&chrom) {
                    eprintln!(
                        "Warning: {} not found in genome file, skip it",
                        group.key
                    );
                    stats.chromosomes_skipped += 1;
                    continue;
                }
            }
            let chr_length = match self.sizes.get(&group.key) {
                Some(length) => length,
                None => {
                    eprintln!("Warning: {} not found in size file, skip it", group.key);
                    stats.chromosomes_skipped += 1;
                    continue;
                }
            };

            eprintln!(
                "{}. read_chr {}\tsite: {}\trecords: {}",
                index,
                group.key,
                chr_length,
                group.total_records()
            );
            index += 1;

            let junctions = self.resolve_junctions(&group, chr_length);
            let rows = self.score_group(&group, chr_length, &junctions, &mut out)?;
            stats.rows_written += rows;
            stats.chromosomes_processed += 1;

            resolved_junctions.insert(group.key.clone(), junctions);
        }

        out.flush()?;
        Ok(EngineRun {
            stats,
            resolved_junctions,
        })
    }

    /// Per-chromosome working copy of the junction table: support from
    /// the control batches, then merge and bounds-check.
    fn resolve_junctions(&self, group: &ChromGroup, chr_length: u64) -> Vec<JunctionInterval> {
        let mut junctions = self
            .junctions
            .get(&group.key)
            .cloned()
            .unwrap_or_default();

        if junctions.is_empty() && !self.cfg.no_sliding {
            eprintln!(
                "Warning: {} junction not found, init empty junctions",
                group.key
            );
        }
        if junctions.is_empty() {
            return junctions;
        }

        // Support comes from the control batches when present, else
        // from the treatment batches.
        let support_batches = if self.control_count > 0 {
            &group.batches[..self.control_count]
        } else {
            &group.batches[..]
        };
        for batch in support_batches {
            build_junction_support(batch, &mut junctions);
        }
        combine_junction(&mut junctions);
        check_overlap(&mut junctions, &group.key, chr_length);
        junctions
    }

    fn score_group<W: Write>(
        &self,
        group: &ChromGroup,
        chr_length: u64,
        junctions: &[JunctionInterval],
        out: &mut GtabWriter<W>,
    ) -> Result<usize> {
        let strand = group.strand();

        // Replicates sum into one pair of arrays per sample group.
        let mut treatment = Coverage::new(chr_length);
        let mut control = (self.cfg.mode() == Mode::TrtCont).then(|| Coverage::new(chr_length));
        for (i, batch) in group.batches.iter().enumerate() {
            let target = if i < self.control_count {
                control.as_mut().expect("control batches imply TrtCont")
            } else {
                &mut treatment
            };
            accumulate(batch, junctions, strand, self.cfg.junction_extend, target);
        }

        let intron = intron_mask(junctions, chr_length);
        let chrom = group.chrom();

        let mut rows = 0usize;
        let emit = |mask: Option<&[bool]>, out: &mut GtabWriter<W>| -> Result<usize> {
            let scored =
                score_chromosome(self.cfg, &treatment, control.as_ref(), &intron, mask);
            let mut written = 0usize;
            for entry in &scored {
                let base = self
                    .fasta
                    .filter(|_| self.cfg.use_mask())
                    .and_then(|f| f.base_at(chrom, strand, entry.pos));
                out.write_row(chrom, strand, entry, base)?;
                written += 1;
            }
            Ok(written)
        };

        if !self.cfg.use_mask() {
            rows += emit(None, out)?;
        } else if self.cfg.base_separate {
            // One full pass per base symbol, each with its own
            // normalization sample.
            let fasta = self.fasta.expect("checked at construction");
            for &base in &self.cfg.bases {
                let mask = build_base_mask(fasta, chrom, strand, &[base], chr_length)
                    .unwrap_or_else(|| vec![false; chr_length as usize + 1]);
                rows += emit(Some(&mask), out)?;
            }
        } else {
            let fasta = self.fasta.expect("checked at construction");
            let mask = build_base_mask(fasta, chrom, strand, &self.cfg.bases, chr_length)
                .unwrap_or_else(|| vec![false; chr_length as usize + 1]);
            rows += emit(Some(&mask), out)?;
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnrichMethod, TreatmentEnrich};
    use crate::tab::TabReader;

    fn sync_from(contents: &[&str]) -> StreamSync<&'static [u8]> {
        let readers = contents
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let leaked: &'static [u8] = Box::leak(c.as_bytes().to_vec().into_boxed_slice());
                (format!("stream{}", i), TabReader::new(leaked))
            })
            .collect();
        StreamSync::new(readers).unwrap()
    }

    fn trt_rt_config() -> EngineConfig {
        let mut cfg = EngineConfig::trt();
        cfg.enrich = EnrichMethod::Treatment(TreatmentEnrich::Rt);
        cfg.no_sliding = true;
        cfg.min_cov = 10;
        cfg.out_min_cov = 1;
        cfg
    }

    #[test]
    fn test_whole_chromosome_aggregate_run() {
        let mut sizes = ChromSizes::new();
        sizes.insert("chr1", 30);
        let junctions = JunctionMap::default();
        let cfg = trt_rt_config();
        let engine = Engine::new(&cfg, &sizes, &junctions, None, 0).unwrap();

        let mut sync = sync_from(&["chr1\t+\t10\t20\nchr1\t+\t15\t25\n"]);
        let mut buf = Vec::new();
        let run = engine.run(&mut sync, &mut buf).unwrap();

        assert_eq!(run.stats.chromosomes_processed, 1);
        assert_eq!(run.stats.rows_written, 16); // positions 10..=25

        let out = String::from_utf8(buf).unwrap();
        assert!(out.starts_with("@ColNum 8\n"));
        // Aggregate RT score is 2 for every covered base, ShapeNum 1
        for line in out.lines().filter(|l| !l.starts_with('@')) {
            let cols: Vec<&str> = line.split('\t').collect();
            assert_eq!(cols.len(), 8);
            assert_eq!(cols[0], "chr1");
            assert_eq!(cols[5], "2.0");
            assert_eq!(cols[6], "1");
        }
    }

    #[test]
    fn test_missing_chromosome_skipped_with_zero_rows() {
        let mut sizes = ChromSizes::new();
        sizes.insert("chr1", 30);
        let junctions = JunctionMap::default();
        let cfg = trt_rt_config();
        let engine = Engine::new(&cfg, &sizes, &junctions, None, 0).unwrap();

        let mut sync = sync_from(&["chr1\t+\t10\t20\nchrUn\t+\t5\t9\n"]);
        let mut buf = Vec::new();
        let run = engine.run(&mut sync, &mut buf).unwrap();

        assert_eq!(run.stats.chromosomes_processed, 1);
        assert_eq!(run.stats.chromosomes_skipped, 1);
        let out = String::from_utf8(buf).unwrap();
        assert!(!out.contains("chrUn"));
    }

    #[test]
    fn test_trt_cont_requires_control() {
        let sizes = ChromSizes::new();
        let junctions = JunctionMap::default();
        let cfg = EngineConfig::trt_cont();
        assert!(Engine::new(&cfg, &sizes, &junctions, None, 0).is_err());
    }

    #[test]
    fn test_trt_cont_control_and_treatment_streams() {
        let mut sizes = ChromSizes::new();
        sizes.insert("chr1", 40);
        let junctions = JunctionMap::default();
        let mut cfg = EngineConfig::trt_cont();
        cfg.no_sliding = true;
        cfg.min_cov = 1;
        cfg.out_min_cov = 1;
        let engine = Engine::new(&cfg, &sizes, &junctions, None, 1).unwrap();

        // Stream 0 is control, stream 1 treatment
        let mut sync = sync_from(&[
            "chr1\t+\t5\t15\n",
            "chr1\t+\t5\t15\nchr1\t+\t10\t20\n",
        ]);
        let mut buf = Vec::new();
        let run = engine.run(&mut sync, &mut buf).unwrap();
        assert!(run.stats.rows_written > 0);

        let out = String::from_utf8(buf).unwrap();
        assert!(out.starts_with("@ColNum 10\n"));
        // Position 12 is covered by the control once and the treatment twice
        let row = out
            .lines()
            .find(|l| l.starts_with("chr1\t+\t12\t"))
            .expect("row for position 12");
        let cols: Vec<&str> = row.split('\t').collect();
        assert_eq!(cols[4], "2"); // N_BD
        assert_eq!(cols[6], "1"); // D_BD
    }

    #[test]
    fn test_base_separate_scores_each_base_independently() {
        use std::io::Write as _;

        let mut fasta_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(fasta_file, ">chr1").unwrap();
        writeln!(fasta_file, "AAAAAACCCCCC").unwrap();
        fasta_file.flush().unwrap();
        let fasta = GenomeFasta::from_file(fasta_file.path()).unwrap();

        let mut sizes = ChromSizes::new();
        sizes.insert("chr1", 12);
        let junctions = JunctionMap::default();

        let mut cfg = trt_rt_config();
        cfg.min_cov = 5;
        cfg.bases = b"AC".to_vec();
        cfg.base_separate = true;
        let engine = Engine::new(&cfg, &sizes, &junctions, Some(&fasta), 0).unwrap();

        // Stops at 2 and 3 fall on A positions, the stop at 8 on a C
        let mut sync = sync_from(&["chr1\t+\t2\t6\nchr1\t+\t3\t6\nchr1\t+\t8\t12\n"]);
        let mut buf = Vec::new();
        let run = engine.run(&mut sync, &mut buf).unwrap();
        assert_eq!(run.stats.rows_written, 10); // 5 A rows + 5 C rows

        let out = String::from_utf8(buf).unwrap();
        assert!(out.starts_with("@ColNum 9\n"));
        // Each base symbol is scored in its own pass: A rows aggregate
        // the two A-side stops, C rows the single C-side stop
        for line in out.lines().filter(|l| !l.starts_with('@')) {
            let cols: Vec<&str> = line.split('\t').collect();
            assert_eq!(cols.len(), 9);
            match cols[3] {
                "A" => assert_eq!(cols[6], "2.0", "row {}", line),
                "C" => assert_eq!(cols[6], "1.0", "row {}", line),
                other => panic!("unexpected base {}", other),
            }
        }
    }

    #[test]
    fn test_resolved_junctions_reported() {
        let mut sizes = ChromSizes::new();
        sizes.insert("chr1", 200);
        let mut junctions = JunctionMap::default();
        junctions.insert(
            "chr1+".to_string(),
            vec![JunctionInterval::new(50, 80), JunctionInterval::new(70, 90)],
        );
        let cfg = trt_rt_config();
        let engine = Engine::new(&cfg, &sizes, &junctions, None, 0).unwrap();

        let mut sync = sync_from(&["chr1\t+\t10\t100\n"]);
        let mut buf = Vec::new();
        let run = engine.run(&mut sync, &mut buf).unwrap();

        let resolved = &run.resolved_junctions["chr1+"];
        assert_eq!(resolved.len(), 1);
        assert_eq!((resolved[0].start, resolved[0].end), (50, 90));
    }
}
