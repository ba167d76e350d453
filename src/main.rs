// Clippy allows
#![allow(clippy::too_many_arguments)]

//! slideshape: sliding-window SHAPE reactivity scoring
//!
//! Usage: slideshape <COMMAND> [OPTIONS]

use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;

use slideshape::chrom::ChromSizes;
use slideshape::config::{
    ContrastEnrich, EngineConfig, EnrichMethod, Factors, NormCalcMethod, NormSampleMethod,
    TreatmentEnrich,
};
use slideshape::engine::Engine;
use slideshape::fasta::GenomeFasta;
use slideshape::junction::{load_junctions, write_junctions, JunctionMap};
use slideshape::params::{write_param_log, RunInfo};
use slideshape::sort::sort_gtab;
use slideshape::sync::StreamSync;
use slideshape::tab::TabError;

#[derive(Parser)]
#[command(name = "slideshape")]
#[command(version)]
#[command(about = "Sliding-window SHAPE reactivity scoring from sorted alignment tab files", long_about = None)]
struct Cli {
    /// Number of threads for the final sort (default: number of CPUs)
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by both scoring modes.
#[derive(Args, Debug, Clone)]
struct ScoreArgs {
    /// Treatment (e.g. NAI-N3) tab files, each sorted by chromosome+strand
    #[arg(short = 'N', long = "treatment", required = true, num_args = 1..)]
    treatment: Vec<PathBuf>,

    /// Chromosome size file (chrom<TAB>length)
    #[arg(short = 's', long = "size")]
    size: PathBuf,

    /// Input splice-junction file (chrom, strand, start, end)
    #[arg(long = "ijf")]
    junction: Option<PathBuf>,

    /// Write the resolved junction table to this file
    #[arg(long = "ojf")]
    out_junction: Option<PathBuf>,

    /// Output gTab file (coordinate-sorted)
    #[arg(short = 'o', long = "out")]
    out: PathBuf,

    /// Sliding window size in bases
    #[arg(long, default_value_t = 200)]
    wsize: usize,

    /// Window anchor step in bases
    #[arg(long, default_value_t = 5)]
    wstep: usize,

    /// Pad junction-adjacent coverage by this many bases
    #[arg(long = "ext", default_value_t = 0)]
    junction_extend: u64,

    /// Winsorization factor (fraction of each tail clamped)
    #[arg(long = "wf", default_value_t = 0.05)]
    winsor_factor: f64,

    /// Subtraction factor for sub/complex enrichment
    #[arg(long = "sf", default_value_t = 0.25)]
    sub_factor: f64,

    /// Division factor for div/complex enrichment
    #[arg(long = "df", default_value_t = 10.0)]
    div_factor: f64,

    /// Addition factor for log enrichment
    #[arg(long = "af", default_value_t = 1.0)]
    add_factor: f64,

    /// Minimum coverage for a row to appear in the output
    #[arg(long = "omc", default_value_t = 50)]
    out_min_cov: u32,

    /// Minimum coverage for a valid score
    #[arg(long = "mc", default_value_t = 100)]
    min_cov: u32,

    /// Normalization sampling method (sm/upp/qua/dec/vigi)
    #[arg(long = "nom", default_value = "dec")]
    norm_sample: String,

    /// Reserved normalization tuning parameter
    #[arg(long = "nomi", default_value_t = 2)]
    norm_sample_factor: u32,

    /// Normalization aggregation method (mean/median/peak)
    #[arg(long = "nocm", default_value = "median")]
    norm_calc: String,

    /// Genome FASTA, required for base filtering
    #[arg(long)]
    genome: Option<PathBuf>,

    /// Restrict scoring to these bases, exact case (e.g. AC)
    #[arg(long)]
    bases: Option<String>,

    /// Score each filtered base with its own normalization sample
    #[arg(long = "separate")]
    base_separate: bool,

    /// Whole-transcript mode: one aggregate window per chromosome
    #[arg(long = "non-sliding")]
    non_sliding: bool,

    /// Skip writing the .param.log file
    #[arg(long = "no-param")]
    no_param: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Score treatment samples against control samples
    TrtCont {
        /// Control (e.g. DMSO) tab files, each sorted
        #[arg(short = 'D', long = "control", required = true, num_args = 1..)]
        control: Vec<PathBuf>,

        /// Enrichment method (sub/div/complex/log)
        #[arg(long = "enm", default_value = "complex")]
        enrich: String,

        #[command(flatten)]
        args: ScoreArgs,
    },

    /// Score treatment samples only
    Trt {
        /// Enrichment method (rt/div/log)
        #[arg(long = "enm", default_value = "rt")]
        enrich: String,

        /// Reserved tuning parameter
        #[arg(long = "sink", default_value_t = 0.0)]
        sink_index: f64,

        #[command(flatten)]
        args: ScoreArgs,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .expect("Failed to initialize thread pool");
    }

    let result = match cli.command {
        Commands::TrtCont {
            control,
            enrich,
            args,
        } => ContrastEnrich::from_str(&enrich)
            .and_then(|m| run_score(control, args, EnrichMethod::Contrast(m), 0.0)),
        Commands::Trt {
            enrich,
            sink_index,
            args,
        } => TreatmentEnrich::from_str(&enrich)
            .and_then(|m| run_score(Vec::new(), args, EnrichMethod::Treatment(m), sink_index)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn build_config(
    args: &ScoreArgs,
    enrich: EnrichMethod,
    sink_index: f64,
) -> Result<EngineConfig, TabError> {
    Ok(EngineConfig {
        enrich,
        norm_sample: NormSampleMethod::from_str(&args.norm_sample)?,
        norm_calc: NormCalcMethod::from_str(&args.norm_calc)?,
        factors: Factors {
            sub: args.sub_factor,
            div: args.div_factor,
            add: args.add_factor,
        },
        winsor_factor: args.winsor_factor,
        winsor_scaling: 1.0,
        out_min_cov: args.out_min_cov,
        min_cov: args.min_cov,
        wsize: args.wsize,
        wstep: args.wstep,
        no_sliding: args.non_sliding,
        junction_extend: args.junction_extend,
        sink_index,
        norm_sample_factor: args.norm_sample_factor,
        bases: args
            .bases
            .as_ref()
            .map(|b| b.bytes().collect())
            .unwrap_or_default(),
        base_separate: args.base_separate,
    })
}

fn run_score(
    control: Vec<PathBuf>,
    args: ScoreArgs,
    enrich: EnrichMethod,
    sink_index: f64,
) -> Result<(), TabError> {
    let cfg = build_config(&args, enrich, sink_index)?;

    let sizes = ChromSizes::from_file(&args.size)?;
    let junctions = match &args.junction {
        Some(path) => load_junctions(path, &sizes)?,
        None => {
            if !cfg.no_sliding {
                eprintln!("Warning: no junction file, proceeding without splice correction");
            }
            JunctionMap::default()
        }
    };
    let fasta = match &args.genome {
        Some(path) => Some(GenomeFasta::from_file(path)?),
        None => None,
    };

    if !args.no_param {
        let info = RunInfo {
            control_files: &control,
            treatment_files: &args.treatment,
            size_file: &args.size,
            junction_file: args.junction.as_deref(),
            out_junction_file: args.out_junction.as_deref(),
            genome_file: args.genome.as_deref(),
            out_file: &args.out,
        };
        write_param_log(&info, &cfg)?;
    }

    let engine = Engine::new(&cfg, &sizes, &junctions, fasta.as_ref(), control.len())?;

    let mut input_paths: Vec<PathBuf> = control;
    input_paths.extend(args.treatment.iter().cloned());
    let mut sync = StreamSync::from_paths(&input_paths)?;

    // Rows come out in merge order; write them to a scratch file next
    // to the output, then sort into the final table.
    let out_dir = args.out.parent().filter(|p| !p.as_os_str().is_empty());
    let mut scratch = tempfile::NamedTempFile::new_in(out_dir.unwrap_or(Path::new(".")))?;
    let run = engine.run(&mut sync, BufWriter::new(scratch.as_file_mut()))?;

    let mut out_file = File::create(&args.out)?;
    let rows = sort_gtab(scratch.path(), &mut out_file)?;

    if let Some(path) = &args.out_junction {
        write_junctions(&run.resolved_junctions, path)?;
    }

    eprintln!(
        "Done: {} chromosome group(s) processed, {} skipped, {} row(s) written to {}",
        run.stats.chromosomes_processed,
        run.stats.chromosomes_skipped,
        rows,
        args.out.display()
    );
    Ok(())
}
