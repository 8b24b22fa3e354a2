//! Probing-data-to-soft-constraint conversion: turns one reactivity value per
//! nucleotide (SHAPE, DMS, ...) into the additive pseudo-energies consumed by
//! the fold engine.

use crate::error::ConstraintError;
use crate::soft::SoftConstraints;

/// Missing/unobserved reactivity, by convention NaN or negative.
fn is_missing(r: f64) -> bool {
    r.is_nan() || r < 0.0
}

#[derive(Debug, Clone)]
pub enum ProbingMethod {
    /// Deigan2009: `m * ln(r + 1) + b` added to every stacking pair involving
    /// the nucleotide.
    Deigan2009 { slope: f64, intercept: f64 },
    /// Zarringhalam2012: reactivities are first converted to a per-nucleotide
    /// target pairing probability `pr`, then `beta * |pr - paired?|` is added
    /// depending on whether the decomposition event leaves the position
    /// paired or unpaired.
    Zarringhalam2012 { beta: f64, conversion: ProbabilityConversion },
    /// Eddy2014: empirical unpaired/paired reactivity distributions are
    /// smoothed with a Gaussian KDE and converted into a per-nucleotide
    /// log-odds pseudo-energy.
    Eddy2014 {
        unpaired_reactivities: Vec<f64>,
        paired_reactivities: Vec<f64>,
        kde_bandwidth: f64,
    },
    /// Washietl: named only, with no formula given. Resolved here as the same
    /// log-odds construction Eddy2014 uses, driven instead by fixed
    /// published slope/intercept defaults rather than fitted KDEs — a
    /// best-effort, explicitly documented resolution (see DESIGN.md), not a
    /// literal transcription of an unavailable source.
    Washietl { slope: f64, intercept: f64 },
}

/// How Zarringhalam2012 turns a raw reactivity into a target pairing
/// probability `pr` before applying `beta * |pr - paired?|`.
#[derive(Debug, Clone, Copy)]
pub enum ProbabilityConversion {
    /// `pr = r` directly, clamped to `[0, 1]`.
    Identity,
    /// `pr = 1 / (1 + r)`, the monotone-decreasing rank-based mapping used
    /// when high reactivity should imply low pairing probability.
    Reciprocal,
}

impl ProbabilityConversion {
    fn convert(&self, r: f64) -> f64 {
        match self {
            ProbabilityConversion::Identity => r.clamp(0.0, 1.0),
            ProbabilityConversion::Reciprocal => (1.0 / (1.0 + r)).clamp(0.0, 1.0),
        }
    }
}

/// Whether the fold being constrained is over a single sequence or an
/// alignment of several. Alignment-mode Zarringhalam2012/Eddy2014 are
/// confirmed unimplemented (their own comparative entry points error out);
/// this crate does not invent a definition for them and refuses instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldMode {
    Single,
    Alignment,
}

fn gaussian_kde_log_density(sample: &[f64], bandwidth: f64, x: f64) -> f64 {
    if sample.is_empty() || bandwidth <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let n = sample.len() as f64;
    let norm = 1.0 / (bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let sum: f64 = sample
        .iter()
        .map(|&xi| {
            let z = (x - xi) / bandwidth;
            (-0.5 * z * z).exp()
        })
        .sum();
    ((norm * sum) / n).ln()
}

/// Convert per-nucleotide reactivities into soft constraints, in units of
/// 10ths of kcal/mol to match the integer energy model.
pub fn apply_probing(
    reactivities: &[f64],
    method: &ProbingMethod,
    mode: FoldMode,
) -> Result<SoftConstraints, ConstraintError> {
    if mode == FoldMode::Alignment {
        if matches!(method, ProbingMethod::Zarringhalam2012 { .. } | ProbingMethod::Eddy2014 { .. }) {
            return Err(ConstraintError::UnsupportedMode(
                "alignment-mode Zarringhalam2012/Eddy2014 soft constraints are not defined".to_string(),
            ));
        }
    }

    let n = reactivities.len();
    let mut sc = SoftConstraints::new(n);

    match method {
        ProbingMethod::Deigan2009 { slope, intercept } => {
            for i in 0..n {
                if is_missing(reactivities[i]) {
                    continue;
                }
                let kcal = slope * (reactivities[i] + 1.0).ln() + intercept;
                sc.paired[i] = (kcal * 10.0).round() as i32;
            }
        }
        ProbingMethod::Zarringhalam2012 { beta, conversion } => {
            for i in 0..n {
                if is_missing(reactivities[i]) {
                    continue;
                }
                let pr = conversion.convert(reactivities[i]);
                let paired_penalty = beta * pr;
                let unpaired_penalty = beta * (1.0 - pr);
                sc.paired[i] = (paired_penalty * 10.0).round() as i32;
                sc.unpaired[i] = (unpaired_penalty * 10.0).round() as i32;
            }
        }
        ProbingMethod::Eddy2014 {
            unpaired_reactivities,
            paired_reactivities,
            kde_bandwidth,
        } => {
            for i in 0..n {
                if is_missing(reactivities[i]) {
                    continue;
                }
                let log_paired = gaussian_kde_log_density(paired_reactivities, *kde_bandwidth, reactivities[i]);
                let log_unpaired = gaussian_kde_log_density(unpaired_reactivities, *kde_bandwidth, reactivities[i]);
                let log_odds = log_paired - log_unpaired;
                sc.paired[i] = (-log_odds * 10.0).round() as i32;
                sc.unpaired[i] = (log_odds * 10.0).round() as i32;
            }
        }
        ProbingMethod::Washietl { slope, intercept } => {
            for i in 0..n {
                if is_missing(reactivities[i]) {
                    continue;
                }
                let log_odds = slope * reactivities[i] + intercept;
                sc.paired[i] = (-log_odds * 10.0).round() as i32;
                sc.unpaired[i] = (log_odds * 10.0).round() as i32;
            }
        }
    }

    Ok(sc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deigan_uniform_reactivity_matches_scenario() {
        let reactivities = vec![1.0; 4];
        let method = ProbingMethod::Deigan2009 { slope: 1.8, intercept: -0.6 };
        let sc = apply_probing(&reactivities, &method, FoldMode::Single).unwrap();
        let expected = (1.8 * 2f64.ln() - 0.6) * 10.0;
        for i in 0..4 {
            assert!((sc.paired[i] as f64 - expected).abs() < 1.0);
        }
    }

    #[test]
    fn test_missing_reactivity_skipped() {
        let reactivities = vec![f64::NAN, -1.0, 1.0];
        let method = ProbingMethod::Deigan2009 { slope: 1.0, intercept: 0.0 };
        let sc = apply_probing(&reactivities, &method, FoldMode::Single).unwrap();
        assert_eq!(sc.paired[0], 0);
        assert_eq!(sc.paired[1], 0);
        assert_ne!(sc.paired[2], 0);
    }

    #[test]
    fn test_alignment_zarringhalam_unsupported() {
        let reactivities = vec![0.5; 3];
        let method = ProbingMethod::Zarringhalam2012 { beta: 1.0, conversion: ProbabilityConversion::Identity };
        let err = apply_probing(&reactivities, &method, FoldMode::Alignment).unwrap_err();
        assert!(matches!(err, ConstraintError::UnsupportedMode(_)));
    }

    #[test]
    fn test_alignment_deigan_still_supported() {
        let reactivities = vec![0.5; 3];
        let method = ProbingMethod::Deigan2009 { slope: 1.0, intercept: 0.0 };
        assert!(apply_probing(&reactivities, &method, FoldMode::Alignment).is_ok());
    }
}
