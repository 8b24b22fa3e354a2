//! 2D distance-class partition function DP (C10 PF-analogue): structurally
//! parallel to `mfe.rs` with `min`/`rem`-min replaced by `+`/`rem`-add and
//! energies replaced by Boltzmann weights scaled the same way as
//! `ff_fold::pf`.

use ff_constraints::{UnpairedContext, CTX_EXT, CTX_HP, CTX_INT_CLOSE, CTX_INT_ENC, CTX_ML_BRANCH, CTX_ML_CLOSE};
use ff_energy::loop_energy::{MAXLOOP, TURN};

use crate::cell::{TwoDCell, TwoDGrid};
use crate::compound::TwoDFoldCompound;

pub struct TwoDPfTables {
    pub n: usize,
    pub scale: Vec<f64>,
    pub qb: TwoDGrid<f64>,
    pub qm: TwoDGrid<f64>,
    pub qm1: TwoDGrid<f64>,
    pub q: Vec<TwoDCell<f64>>,
}

fn bw(energy: i32, kt: f64) -> f64 {
    (-(energy as f64 / 100.0) / kt).exp()
}

/// Insert `(k,l) -> value` into `dest`, routing into `rem` when either
/// component exceeds its declared cap (mirrors `mfe::route`, `+` instead
/// of `min`).
fn route(dest: &mut TwoDCell<f64>, k: u32, l: u32, value: f64, cap1: u32, cap2: u32) {
    if k > cap1 || l > cap2 {
        dest.merge_rem_add(value);
    } else {
        dest.merge_add(k, l, value);
    }
}

impl TwoDPfTables {
    fn fill(tdc: &TwoDFoldCompound) -> Self {
        let n = tdc.n();
        let fc = tdc.fc;
        let kt = fc.kt();
        let lm = fc.loop_model();
        let seq = &fc.sequence;
        let ml_base = fc.tables.ml_base();
        let ml_closing = fc.tables.ml_closing();
        let pf_scale = fc.default_pf_scale();
        let (cap1, cap2) = (tdc.cap1(), tdc.cap2());

        let mut scale = vec![1.0; n + 1];
        for k in 1..=n {
            scale[k] = scale[k - 1] / pf_scale;
        }

        let mut qb: TwoDGrid<f64> = TwoDGrid::new(n);
        let mut qm: TwoDGrid<f64> = TwoDGrid::new(n);
        let mut qm1: TwoDGrid<f64> = TwoDGrid::new(n);
        let mut q: Vec<TwoDCell<f64>> = (0..=n).map(|_| TwoDCell::empty()).collect();
        q[0].merge_add(0, 0, 1.0);

        for j in 0..n {
            for i in (0..=j).rev() {
                if j - i <= TURN {
                    continue;
                }

                let t_ok = lm.pair_allowed(seq[i], seq[j]) && fc.hard.admits(i, j, None, CTX_HP | CTX_INT_CLOSE | CTX_ML_CLOSE);
                if t_ok {
                    let mut cell = TwoDCell::empty();
                    let (dk0, dl0) = tdc.pair_delta(i, j);

                    let hp_w = bw(lm.hairpin(seq, i, j), kt) * scale[j - i + 1];
                    if hp_w > 0.0 {
                        let (uk, ul) = tdc.unpaired_range(i + 1, j.saturating_sub(1));
                        route(&mut cell, dk0 + uk, dl0 + ul, hp_w, cap1, cap2);
                    }

                    for p in (i + 1)..j {
                        if p - i - 1 > MAXLOOP {
                            break;
                        }
                        let l_min = (p + 1).max(j.saturating_sub(MAXLOOP - (p - i - 1)));
                        for q_ in l_min..j {
                            if q_ <= p {
                                continue;
                            }
                            if !fc.hard.admits(i, j, Some((p, q_)), CTX_INT_ENC) {
                                continue;
                            }
                            let inner = qb.get(p, q_);
                            if inner.is_empty() {
                                continue;
                            }
                            let span_here = (j - i + 1) - (q_ - p + 1);
                            let w = bw(lm.interior(seq, i, j, p, q_), kt) * scale[span_here];
                            if w <= 0.0 {
                                continue;
                            }
                            let (uk, ul) = tdc.unpaired_range(i + 1, p - 1);
                            let (uk2, ul2) = tdc.unpaired_range(q_ + 1, j - 1);
                            let (dk, dl) = (dk0 + uk + uk2, dl0 + ul + ul2);
                            for (k, l, val) in inner.iter() {
                                route(&mut cell, k + dk, l + dl, w * val, cap1, cap2);
                            }
                        }
                    }

                    if j - i > TURN + 2 {
                        let stem_w = bw(ml_closing, kt) * bw(lm.multibranch_stem(seq, i, j), kt) * scale[2];
                        if stem_w > 0.0 {
                            for u in (i + 2)..(j - 1) {
                                if !fc.hard.admits(i, j, Some((i + 1, u)), CTX_ML_BRANCH) {
                                    continue;
                                }
                                let left = qm.get(i + 1, u);
                                let right = qm1.get(u + 1, j - 1);
                                if left.is_empty() || right.is_empty() {
                                    continue;
                                }
                                for (kl, ll, vl) in left.iter() {
                                    for (kr, lr, vr) in right.iter() {
                                        route(&mut cell, dk0 + kl + kr, dl0 + ll + lr, stem_w * vl * vr, cap1, cap2);
                                    }
                                }
                            }
                        }
                    }

                    *qb.get_mut(i, j) = cell;
                }

                {
                    let mut cell = TwoDCell::empty();
                    let stem_w = bw(lm.multibranch_stem(seq, i, j), kt) * scale[2];
                    if stem_w > 0.0 {
                        for (k, l, val) in qb.get(i, j).iter() {
                            route(&mut cell, k, l, val * stem_w, cap1, cap2);
                        }
                    }
                    if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
                        let w = bw(ml_base, kt) * scale[1];
                        let (uk, ul) = tdc.unpaired_range(j, j);
                        for (k, l, val) in qm1.get(i, j - 1).iter() {
                            route(&mut cell, k + uk, l + ul, val * w, cap1, cap2);
                        }
                    }
                    *qm1.get_mut(i, j) = cell;
                }

                {
                    let mut cell = TwoDCell::empty();
                    if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
                        let w = bw(ml_base, kt) * scale[1];
                        let (uk, ul) = tdc.unpaired_range(j, j);
                        for (k, l, val) in qm.get(i, j - 1).iter() {
                            route(&mut cell, k + uk, l + ul, val * w, cap1, cap2);
                        }
                    }
                    if j > i && fc.hard.unpaired_ok(i, UnpairedContext::Multibranch) {
                        let w = bw(ml_base, kt) * scale[1];
                        let (uk, ul) = tdc.unpaired_range(i, i);
                        for (k, l, val) in qm.get(i + 1, j).iter() {
                            route(&mut cell, k + uk, l + ul, val * w, cap1, cap2);
                        }
                    }
                    for (k, l, val) in qm1.get(i, j).iter() {
                        route(&mut cell, k, l, val, cap1, cap2);
                    }
                    for u in (i + 1)..=j {
                        let right = qm1.get(u, j);
                        if right.is_empty() {
                            continue;
                        }
                        let left = qm.get(i, u - 1);
                        for (kr, lr, vr) in right.iter() {
                            for (kl, ll, vl) in left.iter() {
                                route(&mut cell, kl + kr, ll + lr, vl * vr, cap1, cap2);
                            }
                        }
                    }
                    *qm.get_mut(i, j) = cell;
                }
            }

            let j1 = j + 1;
            let mut cell = TwoDCell::empty();
            if fc.hard.unpaired_ok(j, UnpairedContext::Exterior) {
                let (uk, ul) = tdc.unpaired_range(j, j);
                for (k, l, val) in q[j1 - 1].iter() {
                    route(&mut cell, k + uk, l + ul, val * scale[1], cap1, cap2);
                }
            }
            for i in 0..=j {
                if j - i <= TURN {
                    continue;
                }
                if !fc.hard.admits(i, j, None, CTX_EXT) {
                    continue;
                }
                let stem = qb.get(i, j);
                if stem.is_empty() {
                    continue;
                }
                let e = bw(lm.exterior_stem(seq, i, j), kt);
                for (ks, ls, vs) in stem.iter() {
                    for (kp, lp, vp) in q[i].iter() {
                        route(&mut cell, ks + kp, ls + lp, e * vs * vp, cap1, cap2);
                    }
                }
            }
            q[j1] = cell;
        }

        TwoDPfTables { n, scale, qb, qm, qm1, q }
    }

    /// Every `(k,l)` partition-function contribution in the root `Q[n]`
    /// cell, plus the overflow bucket if non-empty, mirroring
    /// `TwoDpfold_solution` (spec.md §6).
    pub fn solutions(&self) -> Vec<TwoDpfoldSolution> {
        let root = &self.q[self.n];
        let mut out: Vec<TwoDpfoldSolution> =
            root.iter().map(|(k, l, q)| TwoDpfoldSolution { k: k as i32, l: l as i32, q }).collect();
        out.sort_by_key(|s| (s.k, s.l));
        if let Some(q) = root.rem {
            out.push(TwoDpfoldSolution { k: -1, l: -1, q });
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoDpfoldSolution {
    pub k: i32,
    pub l: i32,
    pub q: f64,
}

pub fn two_d_pfold(tdc: &TwoDFoldCompound) -> TwoDPfTables {
    TwoDPfTables::fill(tdc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_constraints::Reference;
    use ff_energy::{EnergyTables, NucleotideVec};
    use ff_fold::{FoldCompound, FoldOptions};
    use ff_structure::PairTable;
    use std::rc::Rc;

    fn compound(seq: &str) -> FoldCompound {
        let tables = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from(seq).unwrap();
        FoldCompound::new(nv, tables, FoldOptions::default()).unwrap()
    }

    #[test]
    fn test_pf_solutions_sum_at_least_one() {
        // Every Q[n] class weight is non-negative and the unstructured
        // (0 pairs formed) class is always present with weight >= 1.
        let fc = compound("GCGCAAGCGC");
        let r1 = Reference::new(&fc.sequence, &PairTable::try_from("((((..))))").unwrap()).unwrap();
        let r2 = Reference::new(&fc.sequence, &PairTable::try_from("..........").unwrap()).unwrap();
        let tdc = TwoDFoldCompound::new(&fc, r1, r2, None, None);
        let pf = two_d_pfold(&tdc);
        let sols = pf.solutions();
        assert!(!sols.is_empty());
        let total: f64 = sols.iter().map(|s| s.q).sum();
        assert!(total >= 1.0 - 1e-6);
    }

    #[test]
    fn test_pf_total_matches_unrestricted_scalar_pf() {
        let fc = compound("GGGAAAUCCC");
        let r1 = Reference::new(&fc.sequence, &PairTable::try_from("..........").unwrap()).unwrap();
        let r2 = Reference::new(&fc.sequence, &PairTable::try_from("..........").unwrap()).unwrap();
        let tdc = TwoDFoldCompound::new(&fc, r1, r2, None, None);
        let pf = two_d_pfold(&tdc);
        let total: f64 = pf.solutions().iter().map(|s| s.q).sum();
        let scalar = ff_fold::fold_pf(&fc).unwrap().partition_function();
        assert!((total - scalar).abs() / scalar < 1e-6);
    }
}
