//! 2D distance-class MFE DP (C10): the same `C`/`M`/`M1`/`F5` recursion as
//! `ff_fold::mfe`, except every cell is a `TwoDCell<i32>` keyed by `(k,l)` =
//! base-pair distance to `R1`/`R2`, rather than a single scalar. The
//! composition rule (spec.md §4.6) adds children's distances plus a local
//! delta determined by whether the newly-added pair/unpaired position
//! belongs to `R1`/`R2`; buckets outside the declared `maxD1`/`maxD2`
//! collapse into the cell's `rem` overflow scalar.

use ff_constraints::{UnpairedContext, CTX_EXT, CTX_HP, CTX_INT_CLOSE, CTX_INT_ENC, CTX_ML_BRANCH, CTX_ML_CLOSE};
use ff_energy::loop_energy::{INF, MAXLOOP, TURN};

use crate::cell::{TwoDCell, TwoDGrid};
use crate::compound::TwoDFoldCompound;

pub struct TwoDMfeTables {
    pub n: usize,
    pub c: TwoDGrid<i32>,
    pub m: TwoDGrid<i32>,
    pub m1: TwoDGrid<i32>,
    pub f5: Vec<TwoDCell<i32>>,
}

fn add(a: i32, b: i32) -> i32 {
    if a >= INF || b >= INF {
        INF
    } else {
        a + b
    }
}

/// Insert `(k,l) -> value` into `dest`, routing into `rem` when either
/// component exceeds its declared cap.
fn route(dest: &mut TwoDCell<i32>, k: u32, l: u32, value: i32, cap1: u32, cap2: u32) {
    if k > cap1 || l > cap2 {
        dest.merge_rem_min(value);
    } else {
        dest.merge_min(k, l, value);
    }
}

impl TwoDMfeTables {
    fn fill(tdc: &TwoDFoldCompound) -> Self {
        let n = tdc.n();
        let fc = tdc.fc;
        let lm = fc.loop_model();
        let seq = &fc.sequence;
        let ml_base = fc.tables.ml_base();
        let ml_closing = fc.tables.ml_closing();
        let (cap1, cap2) = (tdc.cap1(), tdc.cap2());

        let mut c: TwoDGrid<i32> = TwoDGrid::new(n);
        let mut m: TwoDGrid<i32> = TwoDGrid::new(n);
        let mut m1: TwoDGrid<i32> = TwoDGrid::new(n);
        let mut f5: Vec<TwoDCell<i32>> = (0..=n).map(|_| TwoDCell::empty()).collect();
        f5[0].merge_min(0, 0, 0);

        for j in 0..n {
            for i in (0..=j).rev() {
                if j - i <= TURN {
                    continue;
                }

                let t_ok = lm.pair_allowed(seq[i], seq[j]) && fc.hard.admits(i, j, None, CTX_HP | CTX_INT_CLOSE | CTX_ML_CLOSE);
                if t_ok {
                    let mut cell = TwoDCell::empty();
                    let (dk0, dl0) = tdc.pair_delta(i, j);

                    // Hairpin.
                    let hp = lm.hairpin(seq, i, j);
                    if hp < INF {
                        let (uk, ul) = tdc.unpaired_range(i + 1, j.saturating_sub(1));
                        route(&mut cell, dk0 + uk, dl0 + ul, hp, cap1, cap2);
                    }

                    // Interior/bulge/stack, enclosing (p,q).
                    for p in (i + 1)..j {
                        if p - i - 1 > MAXLOOP {
                            break;
                        }
                        let l_min = (p + 1).max(j.saturating_sub(MAXLOOP - (p - i - 1)));
                        for q in l_min..j {
                            if q <= p {
                                continue;
                            }
                            if !fc.hard.admits(i, j, Some((p, q)), CTX_INT_ENC) {
                                continue;
                            }
                            let inner = c.get(p, q);
                            if inner.is_empty() {
                                continue;
                            }
                            let e = lm.interior(seq, i, j, p, q);
                            if e >= INF {
                                continue;
                            }
                            let (uk, ul) = tdc.unpaired_range(i + 1, p - 1);
                            let (uk2, ul2) = tdc.unpaired_range(q + 1, j - 1);
                            let (dk, dl) = (dk0 + uk + uk2, dl0 + ul + ul2);
                            for (k, l, val) in inner.iter() {
                                route(&mut cell, k + dk, l + dl, add(e, val), cap1, cap2);
                            }
                        }
                    }

                    // Multi-branch closure: M[i+1,u] x M1[u+1,j-1].
                    if j - i > TURN + 2 {
                        let stem = add(ml_closing, lm.multibranch_stem(seq, i, j));
                        if stem < INF {
                            for u in (i + 2)..(j - 1) {
                                if !fc.hard.admits(i, j, Some((i + 1, u)), CTX_ML_BRANCH) {
                                    continue;
                                }
                                let left = m.get(i + 1, u);
                                let right = m1.get(u + 1, j - 1);
                                if left.is_empty() || right.is_empty() {
                                    continue;
                                }
                                for (kl, ll, vl) in left.iter() {
                                    for (kr, lr, vr) in right.iter() {
                                        let val = add(stem, add(vl, vr));
                                        route(&mut cell, dk0 + kl + kr, dl0 + ll + lr, val, cap1, cap2);
                                    }
                                }
                            }
                        }
                    }

                    *c.get_mut(i, j) = cell;
                }

                // M1[i,j]: C[i,j]+stem, or M1[i,j-1]+MLbase.
                {
                    let mut cell = TwoDCell::empty();
                    let stem_e = lm.multibranch_stem(seq, i, j);
                    for (k, l, val) in c.get(i, j).iter() {
                        route(&mut cell, k, l, add(val, stem_e), cap1, cap2);
                    }
                    if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
                        let (uk, ul) = tdc.unpaired_range(j, j);
                        for (k, l, val) in m1.get(i, j - 1).iter() {
                            route(&mut cell, k + uk, l + ul, add(val, ml_base), cap1, cap2);
                        }
                    }
                    *m1.get_mut(i, j) = cell;
                }

                // M[i,j]: M[i,j-1]+MLbase, or M[i,u-1] x M1[u,j] for u in [i+1,j], or bare M1[i,j].
                {
                    let mut cell = TwoDCell::empty();
                    if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
                        let (uk, ul) = tdc.unpaired_range(j, j);
                        for (k, l, val) in m.get(i, j - 1).iter() {
                            route(&mut cell, k + uk, l + ul, add(val, ml_base), cap1, cap2);
                        }
                    }
                    if j > i && fc.hard.unpaired_ok(i, UnpairedContext::Multibranch) {
                        let (uk, ul) = tdc.unpaired_range(i, i);
                        for (k, l, val) in m.get(i + 1, j).iter() {
                            route(&mut cell, k + uk, l + ul, add(val, ml_base), cap1, cap2);
                        }
                    }
                    for (k, l, val) in m1.get(i, j).iter() {
                        route(&mut cell, k, l, val, cap1, cap2);
                    }
                    for u in (i + 1)..=j {
                        let right = m1.get(u, j);
                        if right.is_empty() {
                            continue;
                        }
                        let left = m.get(i, u - 1);
                        for (kr, lr, vr) in right.iter() {
                            for (kl, ll, vl) in left.iter() {
                                route(&mut cell, kl + kr, ll + lr, add(vl, vr), cap1, cap2);
                            }
                        }
                    }
                    *m.get_mut(i, j) = cell;
                }
            }

            // F5[j+1].
            let j1 = j + 1;
            let mut cell = TwoDCell::empty();
            if fc.hard.unpaired_ok(j, UnpairedContext::Exterior) {
                let (uk, ul) = tdc.unpaired_range(j, j);
                for (k, l, val) in f5[j1 - 1].iter() {
                    route(&mut cell, k + uk, l + ul, val, cap1, cap2);
                }
            }
            for i in 0..=j {
                if j - i <= TURN {
                    continue;
                }
                if !fc.hard.admits(i, j, None, CTX_EXT) {
                    continue;
                }
                let stem = c.get(i, j);
                if stem.is_empty() {
                    continue;
                }
                let e = lm.exterior_stem(seq, i, j);
                for (ks, ls, vs) in stem.iter() {
                    for (kp, lp, vp) in f5[i].iter() {
                        route(&mut cell, ks + kp, ls + lp, add(e, add(vs, vp)), cap1, cap2);
                    }
                }
            }
            f5[j1] = cell;
        }

        TwoDMfeTables { n, c, m, m1, f5 }
    }

    /// Every `(k,l)` solution in the root `F5[n]` cell, plus the overflow
    /// bucket if non-empty, mirroring `TwoDfold_solution` (spec.md §6).
    pub fn solutions(&self) -> Vec<TwoDfoldSolution> {
        let root = &self.f5[self.n];
        let mut out: Vec<TwoDfoldSolution> = root
            .iter()
            .map(|(k, l, en)| TwoDfoldSolution { k: k as i32, l: l as i32, en: en as f32 / 100.0 })
            .collect();
        out.sort_by_key(|s| (s.k, s.l));
        if let Some(en) = root.rem {
            out.push(TwoDfoldSolution { k: -1, l: -1, en: en as f32 / 100.0 });
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoDfoldSolution {
    pub k: i32,
    pub l: i32,
    pub en: f32,
}

pub fn two_d_fold(tdc: &TwoDFoldCompound) -> TwoDMfeTables {
    TwoDMfeTables::fill(tdc)
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
    fn test_scenario_has_expected_distance_classes() {
        // spec.md §8 scenario 5: GCGCAAGCGC with references ((((..)))) and
        // the fully unstructured reference, maxD1=maxD2=unrestricted.
        let fc = compound("GCGCAAGCGC");
        let r1 = Reference::new(&fc.sequence, &PairTable::try_from("((((..))))").unwrap()).unwrap();
        let r2 = Reference::new(&fc.sequence, &PairTable::try_from("..........").unwrap()).unwrap();
        let tdc = TwoDFoldCompound::new(&fc, r1, r2, None, None);
        let tables = two_d_fold(&tdc);
        let sols = tables.solutions();
        assert!(!sols.is_empty());
        // l is always the distance to the fully-unstructured reference, i.e.
        // the number of base pairs formed -- so k + l should equal the pairs
        // in R1 that matter plus those newly formed; at minimum every
        // solution's l equals 2 * (number of pairs in the folded structure).
        for s in &sols {
            assert!(s.l % 2 == 0 || s.k == -1);
        }
    }

    #[test]
    fn test_zero_distance_to_self_is_among_solutions() {
        // Folding with R1 == R2 == the MFE-ish hairpin should find a (0,0) class.
        let fc = compound("GGGGAAACCCC");
        let db = PairTable::try_from("((((...))))").unwrap();
        let r1 = Reference::new(&fc.sequence, &db).unwrap();
        let r2 = Reference::new(&fc.sequence, &db).unwrap();
        let tdc = TwoDFoldCompound::new(&fc, r1, r2, None, None);
        let tables = two_d_fold(&tdc);
        let sols = tables.solutions();
        assert!(sols.iter().any(|s| s.k == 0 && s.l == 0));
    }
}
