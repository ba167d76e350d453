//! Run-parameter log.
//!
//! Every run writes `<output>.param.log` next to the output table so a
//! result file can always be traced back to the exact invocation and
//! configuration that produced it.

use crate::config::{EngineConfig, Mode};
use crate::tab::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Input/output paths of one run, as resolved by the CLI layer.
#[derive(Debug)]
pub struct RunInfo<'a> {
    pub control_files: &'a [PathBuf],
    pub treatment_files: &'a [PathBuf],
    pub size_file: &'a Path,
    pub junction_file: Option<&'a Path>,
    pub out_junction_file: Option<&'a Path>,
    pub genome_file: Option<&'a Path>,
    pub out_file: &'a Path,
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Write the parameter log for a finished configuration.
pub fn write_param_log(info: &RunInfo, cfg: &EngineConfig) -> Result<()> {
    let log_path = format!("{}.param.log", info.out_file.display());
    let file = File::create(&log_path)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "Prog version: {}", env!("CARGO_PKG_VERSION"))?;
    if let Ok(elapsed) = SystemTime::now().duration_since(UNIX_EPOCH) {
        writeln!(out, "Run time (unix): {}", elapsed.as_secs())?;
    }
    let argv: Vec<String> = std::env::args().collect();
    writeln!(out, "{}", argv.join(" "))?;

    writeln!(out, "Calculate with [{}] mode", cfg.mode())?;
    if cfg.mode() == Mode::TrtCont {
        writeln!(out, "\t control files: {}", join_paths(info.control_files))?;
    }
    writeln!(out, "\t treatment files: {}", join_paths(info.treatment_files))?;
    writeln!(out, "\t chromosome size file: {}", info.size_file.display())?;
    if let Some(p) = info.junction_file {
        writeln!(out, "\t junction file: {}", p.display())?;
    }
    if let Some(p) = info.out_junction_file {
        writeln!(out, "\t output junction file: {}", p.display())?;
    }
    writeln!(out, "\t output file: {}", info.out_file.display())?;
    writeln!(out)?;

    writeln!(
        out,
        "Use sliding window: {}",
        if cfg.no_sliding { "No" } else { "Yes" }
    )?;
    writeln!(out)?;

    writeln!(out, "\t winsor_factor: {}", cfg.winsor_factor)?;
    writeln!(out, "\t sub_factor: {}", cfg.factors.sub)?;
    writeln!(out, "\t div_factor: {}", cfg.factors.div)?;
    writeln!(out, "\t add_factor: {}", cfg.factors.add)?;
    writeln!(out, "\t out_min_cov: {}", cfg.out_min_cov)?;
    writeln!(out, "\t min_cov: {}", cfg.min_cov)?;
    writeln!(out, "\t window size: {}", cfg.wsize)?;
    writeln!(out, "\t window step: {}", cfg.wstep)?;
    writeln!(out, "\t junction extension: {}", cfg.junction_extend)?;
    writeln!(out)?;

    if let Some(p) = info.genome_file {
        writeln!(out, "\t genome file: {}", p.display())?;
        writeln!(out, "\t bases: {}", String::from_utf8_lossy(&cfg.bases))?;
        writeln!(
            out,
            "\t separate calculate: {}",
            if cfg.base_separate { "Yes" } else { "No" }
        )?;
        writeln!(out)?;
    }

    // Normalization only applies to treatment-vs-control runs; the
    // sink index only exists in treatment-only runs.
    match cfg.mode() {
        Mode::TrtCont => {
            writeln!(out, "\t norm_sample_method: {}", cfg.norm_sample.as_str())?;
            writeln!(out, "\t norm_calc_method: {}", cfg.norm_calc.as_str())?;
            writeln!(out, "\t norm_sample_factor: {}", cfg.norm_sample_factor)?;
            writeln!(out, "\t winsor_scaling: {}", cfg.winsor_scaling)?;
        }
        Mode::Trt => {
            writeln!(out, "\t sink_index: {}", cfg.sink_index)?;
        }
    }
    writeln!(out, "\t enrich_method: {}", cfg.enrich.as_str())?;

    out.flush()?;
    Ok(())
}
