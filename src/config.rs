//! Run configuration for the scoring engine.
//!
//! Built once from parsed options, validated at construction, then
//! shared read-only across the chromosome loop. Method names arriving
//! as option strings map to closed enums here; unknown names are
//! configuration errors, never runtime fallthroughs.

use crate::tab::TabError;
use std::fmt;

/// Scoring mode: treatment contrasted against control, or treatment only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Treatment (e.g. NAI-N3) vs control (e.g. DMSO) samples.
    TrtCont,
    /// Treatment samples only.
    Trt,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::TrtCont => write!(f, "TrtCont"),
            Mode::Trt => write!(f, "Trt"),
        }
    }
}

/// Enrichment formula for treatment-vs-control scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContrastEnrich {
    /// `N_rt - sf * D_rt`
    Sub,
    /// `df * N_bd / D_bd`
    Div,
    /// `df * (N_rt - sf * D_rt) / D_bd`
    Complex,
    /// `log2((N_rt + af) / (D_rt + af))`
    Log,
}

impl ContrastEnrich {
    pub fn from_str(s: &str) -> Result<Self, TabError> {
        match s {
            "sub" => Ok(Self::Sub),
            "div" => Ok(Self::Div),
            "complex" => Ok(Self::Complex),
            "log" => Ok(Self::Log),
            other => Err(TabError::InvalidFormat(format!(
                "unknown enrich method '{}' (TrtCont mode accepts sub/div/complex/log)",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sub => "sub",
            Self::Div => "div",
            Self::Complex => "complex",
            Self::Log => "log",
        }
    }

    /// Evaluate the formula on window sums. Returns a non-finite value
    /// when the denominator is empty; callers treat that as no score.
    #[inline]
    pub fn score(self, n_rt: f64, n_bd: f64, d_rt: f64, d_bd: f64, f: &Factors) -> f64 {
        match self {
            Self::Sub => n_rt - f.sub * d_rt,
            Self::Div => f.div * n_bd / d_bd,
            Self::Complex => f.div * (n_rt - f.sub * d_rt) / d_bd,
            Self::Log => ((n_rt + f.add) / (d_rt + f.add)).log2(),
        }
    }
}

/// Enrichment formula for treatment-only scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreatmentEnrich {
    /// Raw RT stop count.
    Rt,
    /// `N_rt / N_bd`
    Div,
    /// `log2(N_rt + af)`
    Log,
}

impl TreatmentEnrich {
    pub fn from_str(s: &str) -> Result<Self, TabError> {
        match s {
            "rt" => Ok(Self::Rt),
            "div" => Ok(Self::Div),
            "log" => Ok(Self::Log),
            other => Err(TabError::InvalidFormat(format!(
                "unknown enrich method '{}' (Trt mode accepts rt/div/log)",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rt => "rt",
            Self::Div => "div",
            Self::Log => "log",
        }
    }

    #[inline]
    pub fn score(self, n_rt: f64, n_bd: f64, f: &Factors) -> f64 {
        match self {
            Self::Rt => n_rt,
            Self::Div => n_rt / n_bd,
            Self::Log => (n_rt + f.add).log2(),
        }
    }
}

/// Mode-specific enrichment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichMethod {
    Contrast(ContrastEnrich),
    Treatment(TreatmentEnrich),
}

impl EnrichMethod {
    pub fn mode(self) -> Mode {
        match self {
            Self::Contrast(_) => Mode::TrtCont,
            Self::Treatment(_) => Mode::Trt,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contrast(m) => m.as_str(),
            Self::Treatment(m) => m.as_str(),
        }
    }
}

/// Range of the sorted (descending) normalization sample to keep.
/// Index 0 is the largest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormSampleMethod {
    /// All sorted non-zero values.
    Smart,
    /// Upper half of the values: `[0, (n-1)/2]`.
    Upper,
    /// `[(n-1)/4, n/4]`.
    Quartile,
    /// `[(n-1)/10, n/10]`.
    Decile,
    /// `[(n-1)/20, n/20]`.
    Vigintile,
}

impl NormSampleMethod {
    pub fn from_str(s: &str) -> Result<Self, TabError> {
        match s {
            "sm" => Ok(Self::Smart),
            "upp" => Ok(Self::Upper),
            "qua" => Ok(Self::Quartile),
            "dec" => Ok(Self::Decile),
            "vigi" => Ok(Self::Vigintile),
            other => Err(TabError::InvalidFormat(format!(
                "unknown normalization sample method '{}' (accepts sm/upp/qua/dec/vigi)",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Smart => "smart",
            Self::Upper => "upper",
            Self::Quartile => "quartile",
            Self::Decile => "decile",
            Self::Vigintile => "vigintile",
        }
    }

    /// Inclusive index range selected from a sorted sequence of length n.
    pub fn sample_range(self, n: usize) -> (usize, usize) {
        match self {
            Self::Smart => (0, n.saturating_sub(1)),
            Self::Upper => (0, n.saturating_sub(1) / 2),
            Self::Quartile => (n.saturating_sub(1) / 4, n / 4),
            Self::Decile => (n.saturating_sub(1) / 10, n / 10),
            Self::Vigintile => (n.saturating_sub(1) / 20, n / 20),
        }
    }
}

/// Aggregation of the normalization sample into one scaling factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormCalcMethod {
    Mean,
    Median,
    Peak,
}

impl NormCalcMethod {
    pub fn from_str(s: &str) -> Result<Self, TabError> {
        match s {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "peak" => Ok(Self::Peak),
            other => Err(TabError::InvalidFormat(format!(
                "unknown normalization calc method '{}' (accepts mean/median/peak)",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Peak => "peak",
        }
    }
}

/// Numeric factors shared by the enrichment formulas.
#[derive(Debug, Clone, Copy)]
pub struct Factors {
    /// Subtraction factor (`sf`).
    pub sub: f64,
    /// Division factor (`df`).
    pub div: f64,
    /// Addition factor (`af`).
    pub add: f64,
}

impl Default for Factors {
    fn default() -> Self {
        Self {
            sub: 0.25,
            div: 10.0,
            add: 1.0,
        }
    }
}

/// Immutable engine configuration, selected once per run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub enrich: EnrichMethod,
    pub norm_sample: NormSampleMethod,
    pub norm_calc: NormCalcMethod,
    pub factors: Factors,
    pub winsor_factor: f64,
    pub winsor_scaling: f64,
    /// Minimum governing BD for a row to appear in the output table.
    pub out_min_cov: u32,
    /// Minimum governing BD for a valid (non-sentinel) score.
    pub min_cov: u32,
    pub wsize: usize,
    pub wstep: usize,
    pub no_sliding: bool,
    /// BD extension around junction edges (bases).
    pub junction_extend: u64,
    /// Reserved tuning parameter, recorded but not consumed.
    pub sink_index: f64,
    /// Reserved tuning parameter, recorded but not consumed.
    pub norm_sample_factor: u32,
    /// Base filter; empty means score every position.
    pub bases: Vec<u8>,
    /// Score each filtered base with its own normalization sample.
    pub base_separate: bool,
}

impl EngineConfig {
    /// Defaults for treatment-vs-control runs.
    pub fn trt_cont() -> Self {
        Self::with_enrich(EnrichMethod::Contrast(ContrastEnrich::Complex))
    }

    /// Defaults for treatment-only runs.
    pub fn trt() -> Self {
        Self::with_enrich(EnrichMethod::Treatment(TreatmentEnrich::Rt))
    }

    fn with_enrich(enrich: EnrichMethod) -> Self {
        Self {
            enrich,
            norm_sample: NormSampleMethod::Decile,
            norm_calc: NormCalcMethod::Median,
            factors: Factors::default(),
            winsor_factor: 0.05,
            winsor_scaling: 1.0,
            out_min_cov: 50,
            min_cov: 100,
            wsize: 200,
            wstep: 5,
            no_sliding: false,
            junction_extend: 0,
            sink_index: 0.0,
            norm_sample_factor: 2,
            bases: Vec::new(),
            base_separate: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.enrich.mode()
    }

    pub fn use_mask(&self) -> bool {
        !self.bases.is_empty()
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), TabError> {
        if self.wsize == 0 || self.wstep == 0 {
            return Err(TabError::InvalidFormat(
                "window size and step must be positive".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&self.winsor_factor) {
            return Err(TabError::InvalidFormat(format!(
                "winsor factor {} outside [0, 0.5)",
                self.winsor_factor
            )));
        }
        if self.base_separate && self.bases.is_empty() {
            return Err(TabError::InvalidFormat(
                "per-base separate scoring requires a base filter".to_string(),
            ));
        }
        Ok(())
    }
}
