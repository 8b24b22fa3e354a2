//! Partition-function DP (C7): structurally parallel to the MFE fill with
//! `min` replaced by `+` and energies by Boltzmann weights, each contribution
//! multiplied by the numerical scaling factor for the span of sequence it
//! newly covers.

use ff_constraints::{UnpairedContext, CTX_EXT, CTX_INT_ENC, CTX_ML_BRANCH};
use ff_energy::loop_energy::{MAXLOOP, TURN};
use ff_gquad::{GquadPfTable, GquadTable};

use crate::compound::FoldCompound;
use crate::error::FoldError;
use crate::matrix::TriMatrix;

/// `|log(Q)|` beyond this indicates `pf_scale` needs re-tuning (spec.md §7).
pub const LOG_Q_THRESHOLD: f64 = 700.0;

pub struct PfTables {
    pub n: usize,
    pub scale: Vec<f64>,
    pub qb: TriMatrix<f64>,
    pub qm: TriMatrix<f64>,
    pub qm1: TriMatrix<f64>,
    pub q: Vec<f64>,
    pub q_suffix: Vec<f64>,
    pub gquad_pf: Option<GquadPfTable>,
}

fn bw(energy: i32, kt: f64) -> f64 {
    (-(energy as f64 / 100.0) / kt).exp()
}

/// Prefix sums of `fc.soft.unpaired_energy`, mirroring `mfe::soft_unpaired_prefix`.
fn soft_unpaired_prefix(fc: &FoldCompound) -> Vec<i32> {
    let n = fc.len();
    let mut prefix = vec![0i32; n + 1];
    for i in 0..n {
        prefix[i + 1] = prefix[i] + fc.soft.unpaired_energy(i);
    }
    prefix
}

fn soft_range(prefix: &[i32], a: usize, b: usize) -> i32 {
    if a > b {
        0
    } else {
        prefix[b + 1] - prefix[a]
    }
}

impl PfTables {
    pub fn fill(fc: &FoldCompound) -> Result<Self, FoldError> {
        if fc.options.circular {
            return Err(FoldError::Unsupported(
                "circular partition function (Qo/Qho/Qio/Qmo) is not implemented; \
                 only the linear Q/Qb/Qm/Qm1 recursion is".to_string(),
            ));
        }
        let n = fc.len();
        let kt = fc.kt();
        let lm = fc.loop_model();
        let seq = &fc.sequence;
        let ml_base = fc.tables.ml_base();
        let ml_closing = fc.tables.ml_closing();
        let pf_scale = fc.default_pf_scale();
        let soft_u = soft_unpaired_prefix(fc);

        let mut scale = vec![1.0; n + 1];
        for k in 1..=n {
            scale[k] = scale[k - 1] / pf_scale;
        }

        let gquad_pf = if fc.options.gquad {
            Some(GquadTable::fill_pf(seq, &fc.gquad_params, kt))
        } else {
            None
        };

        let mut qb = TriMatrix::new(n, 0.0);
        let mut qm = TriMatrix::new(n, 0.0);
        let mut qm1 = TriMatrix::new(n, 0.0);
        let mut q = vec![0.0; n + 1];
        q[0] = 1.0;

        for j in 0..n {
            for i in (0..=j).rev() {
                if j - i <= TURN {
                    continue;
                }
                if lm.pair_allowed(seq[i], seq[j]) {
                    let pair_bw = bw(fc.soft.paired_energy(i, j), kt);
                    let mut sum = pair_bw
                        * bw(lm.hairpin(seq, i, j), kt)
                        * bw(soft_range(&soft_u, i + 1, j - 1), kt)
                        * scale[j - i + 1];

                    for k in (i + 1)..j {
                        if k - i - 1 > MAXLOOP {
                            break;
                        }
                        for l in (k + 1)..j {
                            if j - l - 1 + k - i - 1 > MAXLOOP {
                                continue;
                            }
                            if !fc.hard.admits(i, j, Some((k, l)), CTX_INT_ENC) {
                                continue;
                            }
                            let inner = qb.get(k, l);
                            if inner <= 0.0 {
                                continue;
                            }
                            let span_here = (j - i + 1) - (l - k + 1);
                            let soft_w = bw(soft_range(&soft_u, i + 1, k - 1) + soft_range(&soft_u, l + 1, j - 1), kt);
                            sum += pair_bw * bw(lm.interior(seq, i, j, k, l), kt) * soft_w * scale[span_here] * inner;
                        }
                    }

                    if j > i + 2 {
                        for u in (i + 2)..(j - 1) {
                            if !fc.hard.admits(i, j, Some((i + 1, u)), CTX_ML_BRANCH) {
                                continue;
                            }
                            let left = qm.get(i + 1, u);
                            let right = qm1.get(u + 1, j - 1);
                            if left <= 0.0 || right <= 0.0 {
                                continue;
                            }
                            let stem_w = pair_bw * bw(ml_closing, kt) * bw(lm.multibranch_stem(seq, i, j), kt);
                            sum += stem_w * scale[2] * left * right;
                        }
                    }

                    if let Some(ref gq) = gquad_pf {
                        if let Some(w) = gq.get(i, j) {
                            sum += w * scale[j - i + 1];
                        }
                    }

                    qb.set(i, j, sum);
                }

                let mut m1_sum = 0.0;
                if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
                    m1_sum += qm1.get(i, j - 1) * bw(ml_base, kt) * bw(soft_range(&soft_u, j, j), kt) * scale[1];
                }
                let stem_here = qb.get(i, j) * bw(lm.multibranch_stem(seq, i, j), kt) * scale[2];
                m1_sum += stem_here;
                qm1.set(i, j, m1_sum);

                let mut m_sum = 0.0;
                if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
                    m_sum += qm.get(i, j - 1) * bw(ml_base, kt) * bw(soft_range(&soft_u, j, j), kt) * scale[1];
                }
                if j > i && fc.hard.unpaired_ok(i, UnpairedContext::Multibranch) {
                    m_sum += qm.get(i + 1, j) * bw(ml_base, kt) * bw(soft_range(&soft_u, i, i), kt) * scale[1];
                }
                for u in i..=j {
                    let left = if u == i { 1.0 } else { qm.get(i, u - 1) };
                    let right = qm1.get(u, j);
                    if right > 0.0 {
                        m_sum += left * right;
                    }
                }
                qm.set(i, j, m_sum);
            }

            let j1 = j + 1;
            let mut sum = if fc.hard.unpaired_ok(j, UnpairedContext::Exterior) {
                q[j1 - 1] * bw(soft_range(&soft_u, j, j), kt) * scale[1]
            } else {
                0.0
            };
            for i in 0..=j {
                if j - i <= TURN {
                    continue;
                }
                if !fc.hard.admits(i, j, None, CTX_EXT) {
                    continue;
                }
                let stem = qb.get(i, j);
                if stem <= 0.0 {
                    continue;
                }
                sum += q[i] * bw(lm.exterior_stem(seq, i, j), kt) * stem;
            }
            q[j1] = sum;
        }

        let q_suffix = Self::fill_suffix(fc, &qb, &scale, kt);

        let total = q[n];
        if total > 0.0 {
            let log_q = total.ln().abs();
            if log_q > LOG_Q_THRESHOLD {
                return Err(FoldError::NumericalOverflow { log_q, threshold: LOG_Q_THRESHOLD });
            }
        }

        Ok(PfTables { n, scale, qb, qm, qm1, q, q_suffix, gquad_pf })
    }

    /// `q_suffix[k]` = partition function over structures on `[k, n)`,
    /// mirroring `q` from the opposite end; used by the outside recursion's
    /// exterior-loop term.
    fn fill_suffix(fc: &FoldCompound, qb: &TriMatrix<f64>, scale: &[f64], kt: f64) -> Vec<f64> {
        let n = fc.len();
        let lm = fc.loop_model();
        let seq = &fc.sequence;
        let soft_u = soft_unpaired_prefix(fc);
        let mut q_suffix = vec![0.0; n + 1];
        q_suffix[n] = 1.0;
        for k in (0..n).rev() {
            let mut sum = if fc.hard.unpaired_ok(k, UnpairedContext::Exterior) {
                q_suffix[k + 1] * bw(soft_range(&soft_u, k, k), kt) * scale[1]
            } else {
                0.0
            };
            for j in (k + TURN + 1)..n {
                if !fc.hard.admits(k, j, None, CTX_EXT) {
                    continue;
                }
                let stem = qb.get(k, j);
                if stem <= 0.0 {
                    continue;
                }
                sum += stem * bw(lm.exterior_stem(seq, k, j), kt) * q_suffix[j + 1];
            }
            q_suffix[k] = sum;
        }
        q_suffix
    }

    pub fn partition_function(&self) -> f64 {
        self.q[self.n]
    }
}

pub fn fold_pf(fc: &FoldCompound) -> Result<PfTables, FoldError> {
    PfTables::fill(fc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::{FoldCompound, FoldOptions};
    use ff_energy::{EnergyTables, NucleotideVec};
    use std::rc::Rc;

    #[test]
    fn test_partition_function_at_least_one() {
        let tables = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from("GGGAAAUCCC").unwrap();
        let fc = FoldCompound::new(nv, tables, FoldOptions::default()).unwrap();
        let pf = fold_pf(&fc).unwrap();
        assert!(pf.partition_function() >= 1.0 - 1e-9);
    }

    #[test]
    fn test_forward_and_suffix_agree_on_full_length() {
        let tables = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from("GCGCAAGCGC").unwrap();
        let fc = FoldCompound::new(nv, tables, FoldOptions::default()).unwrap();
        let pf = fold_pf(&fc).unwrap();
        assert!((pf.q[pf.n] - pf.q_suffix[0]).abs() / pf.q[pf.n] < 1e-6);
    }

    #[test]
    fn test_circular_partition_function_is_unsupported() {
        let tables = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from("GGGAAAUCCC").unwrap();
        let mut opts = FoldOptions::default();
        opts.circular = true;
        let fc = FoldCompound::new(nv, tables, opts).unwrap();
        assert!(matches!(fold_pf(&fc), Err(FoldError::Unsupported(_))));
    }
}
