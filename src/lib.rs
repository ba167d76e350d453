// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::should_implement_trait)]

//! slideshape: sliding-window SHAPE reactivity scoring
//!
//! Computes per-nucleotide RNA structure reactivity scores from sorted
//! alignment tab streams: reverse-transcriptase stop counts (RT) and
//! base-density coverage (BD) from treatment samples, optionally
//! contrasted against controls, with splice-junction correction and
//! windowed enrichment scoring.
//!
//! # Features
//!
//! - **Streaming merge**: K sorted inputs advance in lock-step, one
//!   chromosome+strand at a time, in O(longest chromosome) memory
//! - **Junction-aware coverage**: intronic bases never receive signal
//! - **Configurable scoring**: enrichment formulas, normalization
//!   sampling and winsorization as closed enums
//!
//! # Example
//!
//! ```rust,no_run
//! use slideshape::chrom::ChromSizes;
//! use slideshape::config::EngineConfig;
//! use slideshape::engine::Engine;
//! use slideshape::junction::JunctionMap;
//! use slideshape::sync::StreamSync;
//!
//! let sizes = ChromSizes::from_file("chrNameLength.txt").unwrap();
//! let junctions = JunctionMap::default();
//! let cfg = EngineConfig::trt();
//!
//! let engine = Engine::new(&cfg, &sizes, &junctions, None, 0).unwrap();
//! let mut sync = StreamSync::from_paths(&["nai_rep1.tab"]).unwrap();
//! let mut out = Vec::new();
//! let run = engine.run(&mut sync, &mut out).unwrap();
//! eprintln!("{} rows", run.stats.rows_written);
//! ```

pub mod chrom;
pub mod config;
pub mod coverage;
pub mod engine;
pub mod fasta;
pub mod gtab;
pub mod junction;
pub mod params;
pub mod score;
pub mod sort;
pub mod sync;
pub mod tab;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{Engine, EngineRun, EngineStats};
pub use tab::{Strand, TabError, TabReader, TabRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::chrom::ChromSizes;
    pub use crate::config::{EngineConfig, EnrichMethod, Mode};
    pub use crate::engine::{Engine, EngineRun};
    pub use crate::junction::JunctionMap;
    pub use crate::sync::StreamSync;
    pub use crate::tab::{Strand, TabError, TabReader, TabRecord};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_basic_workflow() {
        use crate::chrom::ChromSizes;
        use crate::config::{EngineConfig, EnrichMethod, TreatmentEnrich};
        use crate::engine::Engine;
        use crate::junction::JunctionMap;
        use crate::sync::StreamSync;
        use crate::tab::TabReader;

        let mut sizes = ChromSizes::new();
        sizes.insert("chr1", 50);
        let junctions = JunctionMap::default();

        let mut cfg = EngineConfig::trt();
        cfg.enrich = EnrichMethod::Treatment(TreatmentEnrich::Rt);
        cfg.no_sliding = true;
        cfg.min_cov = 5;
        cfg.out_min_cov = 1;

        let engine = Engine::new(&cfg, &sizes, &junctions, None, 0).unwrap();
        let input: &[u8] = b"chr1\t+\t10\t20\nchr1\t+\t12\t22\n";
        let mut sync =
            StreamSync::new(vec![("nai".to_string(), TabReader::new(input))]).unwrap();

        let mut out = Vec::new();
        let run = engine.run(&mut sync, &mut out).unwrap();
        assert_eq!(run.stats.chromosomes_processed, 1);
        assert!(run.stats.rows_written > 0);
        assert!(String::from_utf8(out).unwrap().starts_with("@ColNum 8\n"));
    }
}
