//! Windowed enrichment scoring, normalization and winsorization.
//!
//! The scorer consumes the per-chromosome coverage arrays and produces
//! one scored entry per retained base position. Sliding mode anchors a
//! window every `wstep` bases, scores each window whose governing
//! coverage clears `min_cov`, and averages the covering window scores
//! into a per-base point estimate. Treatment-vs-control runs then
//! derive a chromosome-wide scaling factor from the window-score
//! distribution, divide every point estimate by it and winsorize the
//! result. Non-sliding mode treats the whole chromosome as a single
//! window and skips normalization.
//!
//! Intronic positions never receive a score and never contribute to
//! window sums: window sums are taken over masked prefix arrays, so a
//! window near a junction shrinks instead of absorbing intron zeros.

use crate::config::{EngineConfig, EnrichMethod, Mode, NormCalcMethod};
use crate::coverage::Coverage;

/// Scored entry for one retained base position. Control fields are
/// zero in treatment-only mode.
#[derive(Debug, Clone)]
pub struct PositionScore {
    pub pos: u64,
    pub n_rt: u64,
    pub n_bd: u64,
    pub d_rt: u64,
    pub d_bd: u64,
    /// Final per-base score; None is the no-data sentinel.
    pub shape: Option<f64>,
    /// Number of valid windows contributing to the point estimate.
    pub shape_num: u32,
    /// Mean of final per-base scores over the window centered here.
    pub window_shape: Option<f64>,
}

/// Cumulative sums over 1-based positions, with intronic entries
/// contributing zero. `sums[p] - sums[lo-1]` is the masked window sum.
fn masked_prefix(values: &[u64], intron: &[bool]) -> Vec<f64> {
    let mut sums = vec![0.0; values.len()];
    for p in 1..values.len() {
        let v = if intron[p] { 0 } else { values[p] };
        sums[p] = sums[p - 1] + v as f64;
    }
    sums
}

#[inline]
fn window_sum(prefix: &[f64], lo: usize, hi: usize) -> f64 {
    prefix[hi] - prefix[lo - 1]
}

/// Aggregate the normalization sample into one scaling factor.
///
/// Scores are sorted descending and reduced to the sub-range the
/// sampling method selects; empty or degenerate samples yield 1.0 so
/// scoring degrades to unnormalized output instead of failing.
pub fn scaling_factor(mut scores: Vec<f64>, cfg: &EngineConfig) -> f64 {
    scores.retain(|s| s.is_finite() && *s != 0.0);
    if scores.is_empty() {
        return 1.0;
    }
    scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let (lo, hi) = cfg.norm_sample.sample_range(scores.len());
    let hi = hi.min(scores.len() - 1);
    let sample = &scores[lo..=hi];

    let factor = match cfg.norm_calc {
        NormCalcMethod::Mean => sample.iter().sum::<f64>() / sample.len() as f64,
        NormCalcMethod::Median => sample[sample.len() / 2],
        NormCalcMethod::Peak => sample[0],
    };
    if factor.is_finite() && factor != 0.0 {
        factor
    } else {
        1.0
    }
}

/// Clamp the top and bottom `winsor_factor` fraction of the finite
/// values to the corresponding percentile bounds, in place.
pub fn winsorize(scores: &mut [Option<f64>], winsor_factor: f64) {
    let mut valid: Vec<f64> = scores.iter().filter_map(|s| *s).collect();
    if valid.is_empty() || winsor_factor <= 0.0 {
        return;
    }
    valid.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let k = (valid.len() as f64 * winsor_factor) as usize;
    if k == 0 {
        return;
    }
    let lower = valid[k];
    let upper = valid[valid.len() - 1 - k];
    for slot in scores.iter_mut() {
        if let Some(v) = slot {
            *slot = Some(v.clamp(lower, upper));
        }
    }
}

/// True when position `p` is scoreable at all: exonic and, with a base
/// filter configured, matching the base mask.
#[inline]
fn retained(p: usize, intron: &[bool], base_mask: Option<&[bool]>) -> bool {
    !intron[p] && base_mask.map_or(true, |m| m[p])
}

/// Score one chromosome+strand, dispatching on the run mode.
pub fn score_chromosome(
    cfg: &EngineConfig,
    treatment: &Coverage,
    control: Option<&Coverage>,
    intron: &[bool],
    base_mask: Option<&[bool]>,
) -> Vec<PositionScore> {
    if cfg.no_sliding {
        score_whole(cfg, treatment, control, intron, base_mask)
    } else {
        score_sliding(cfg, treatment, control, intron, base_mask)
    }
}

/// Raw score for one window's sums under the configured formula.
#[inline]
fn window_score(cfg: &EngineConfig, n_rt: f64, n_bd: f64, d_rt: f64, d_bd: f64) -> f64 {
    match cfg.enrich {
        EnrichMethod::Contrast(m) => m.score(n_rt, n_bd, d_rt, d_bd, &cfg.factors),
        EnrichMethod::Treatment(m) => m.score(n_rt, n_bd, &cfg.factors),
    }
}

fn score_sliding(
    cfg: &EngineConfig,
    treatment: &Coverage,
    control: Option<&Coverage>,
    intron: &[bool],
    base_mask: Option<&[bool]>,
) -> Vec<PositionScore> {
    let chr_length = treatment.chr_length() as usize;
    if chr_length == 0 {
        return Vec::new();
    }
    let half = cfg.wsize / 2;

    let n_rt_sums = masked_prefix(&treatment.rt, intron);
    let n_bd_sums = masked_prefix(&treatment.bd, intron);
    let (d_rt_sums, d_bd_sums) = match control {
        Some(c) => (
            Some(masked_prefix(&c.rt, intron)),
            Some(masked_prefix(&c.bd, intron)),
        ),
        None => (None, None),
    };

    // Valid window scores, spread over covered positions via
    // difference arrays; also collected as the normalization sample.
    let mut sum_diff = vec![0.0f64; chr_length + 2];
    let mut cnt_diff = vec![0i64; chr_length + 2];
    let mut window_scores: Vec<f64> = Vec::new();

    let mut anchor = 1usize;
    while anchor <= chr_length {
        let lo = anchor.saturating_sub(half).max(1);
        let hi = (anchor + half).min(chr_length);

        let governing = match &d_bd_sums {
            Some(d_bd) => window_sum(d_bd, lo, hi),
            None => window_sum(&n_bd_sums, lo, hi),
        };
        if governing >= cfg.min_cov as f64 {
            let score = window_score(
                cfg,
                window_sum(&n_rt_sums, lo, hi),
                window_sum(&n_bd_sums, lo, hi),
                d_rt_sums.as_ref().map_or(0.0, |p| window_sum(p, lo, hi)),
                d_bd_sums.as_ref().map_or(0.0, |p| window_sum(p, lo, hi)),
            );
            if score.is_finite() {
                sum_diff[lo] += score;
                sum_diff[hi + 1] -= score;
                cnt_diff[lo] += 1;
                cnt_diff[hi + 1] -= 1;
                window_scores.push(score);
            }
        }
        anchor += cfg.wstep;
    }

    // Per-base point estimates: mean of covering valid window scores.
    let governing_bd = |p: usize| match control {
        Some(c) => c.bd[p],
        None => treatment.bd[p],
    };
    let mut shapes: Vec<Option<f64>> = vec![None; chr_length + 1];
    let mut shape_nums: Vec<u32> = vec![0; chr_length + 1];
    let mut running_sum = 0.0f64;
    let mut running_cnt = 0i64;
    for p in 1..=chr_length {
        running_sum += sum_diff[p];
        running_cnt += cnt_diff[p];
        if !retained(p, intron, base_mask) {
            continue;
        }
        if running_cnt > 0 && governing_bd(p) >= cfg.min_cov as u64 {
            shapes[p] = Some(running_sum / running_cnt as f64);
            shape_nums[p] = running_cnt as u32;
        }
    }

    // Normalize and winsorize (treatment-vs-control runs only).
    if cfg.mode() == Mode::TrtCont {
        let factor = scaling_factor(window_scores, cfg);
        for slot in shapes.iter_mut().flatten() {
            *slot /= factor;
        }
        winsorize(&mut shapes, cfg.winsor_factor);
        if cfg.winsor_scaling != 1.0 {
            for slot in shapes.iter_mut().flatten() {
                *slot *= cfg.winsor_scaling;
            }
        }
    }

    // Window-smoothed score over the final per-base estimates.
    let mut shape_sums = vec![0.0f64; chr_length + 1];
    let mut shape_cnts = vec![0u32; chr_length + 1];
    for p in 1..=chr_length {
        shape_sums[p] = shape_sums[p - 1] + shapes[p].unwrap_or(0.0);
        shape_cnts[p] = shape_cnts[p - 1] + shapes[p].is_some() as u32;
    }

    let mut out = Vec::new();
    for p in 1..=chr_length {
        if !retained(p, intron, base_mask) {
            continue;
        }
        if governing_bd(p) < cfg.out_min_cov as u64 {
            continue;
        }
        let lo = p.saturating_sub(half).max(1);
        let hi = (p + half).min(chr_length);
        let cnt = shape_cnts[hi] - shape_cnts[lo - 1];
        let window_shape = if cnt > 0 {
            Some((shape_sums[hi] - shape_sums[lo - 1]) / cnt as f64)
        } else {
            None
        };
        out.push(PositionScore {
            pos: p as u64,
            n_rt: treatment.rt[p],
            n_bd: treatment.bd[p],
            d_rt: control.map_or(0, |c| c.rt[p]),
            d_bd: control.map_or(0, |c| c.bd[p]),
            shape: shapes[p],
            shape_num: shape_nums[p],
            window_shape,
        });
    }
    out
}

/// Whole-chromosome scoring: one aggregate window, no normalization.
/// Intended for short RNAs where position-resolved windows are noisier
/// than a single transcript-wide ratio.
fn score_whole(
    cfg: &EngineConfig,
    treatment: &Coverage,
    control: Option<&Coverage>,
    intron: &[bool],
    base_mask: Option<&[bool]>,
) -> Vec<PositionScore> {
    let chr_length = treatment.chr_length() as usize;

    let mut n_rt = 0.0f64;
    let mut n_bd = 0.0f64;
    let mut d_rt = 0.0f64;
    let mut d_bd = 0.0f64;
    for p in 1..=chr_length {
        if !retained(p, intron, base_mask) {
            continue;
        }
        n_rt += treatment.rt[p] as f64;
        n_bd += treatment.bd[p] as f64;
        if let Some(c) = control {
            d_rt += c.rt[p] as f64;
            d_bd += c.bd[p] as f64;
        }
    }

    let governing = if control.is_some() { d_bd } else { n_bd };
    let score = if governing >= cfg.min_cov as f64 {
        let s = window_score(cfg, n_rt, n_bd, d_rt, d_bd);
        s.is_finite().then_some(s)
    } else {
        None
    };

    let mut out = Vec::new();
    for p in 1..=chr_length {
        if !retained(p, intron, base_mask) {
            continue;
        }
        let bd = match control {
            Some(c) => c.bd[p],
            None => treatment.bd[p],
        };
        if bd < cfg.out_min_cov as u64 {
            continue;
        }
        out.push(PositionScore {
            pos: p as u64,
            n_rt: treatment.rt[p],
            n_bd: treatment.bd[p],
            d_rt: control.map_or(0, |c| c.rt[p]),
            d_bd: control.map_or(0, |c| c.bd[p]),
            shape: score,
            shape_num: score.is_some() as u32,
            window_shape: score,
        });
    }
    out
}
