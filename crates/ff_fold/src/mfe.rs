//! Minimum-free-energy DP (C6): fills `C`, `M`, `M1`, `F5`, and (for circular
//! sequences) `Fc`.

use ff_constraints::{UnpairedContext, CTX_EXT, CTX_HP, CTX_INT_CLOSE, CTX_INT_ENC, CTX_ML_BRANCH, CTX_ML_CLOSE};
use ff_energy::loop_energy::{INF, MAXLOOP, TURN};
use ff_gquad::{self, GquadTable};

use crate::compound::FoldCompound;
use crate::matrix::TriMatrix;

pub struct MfeTables {
    pub n: usize,
    pub c: TriMatrix<i32>,
    pub m: TriMatrix<i32>,
    pub m1: TriMatrix<i32>,
    pub f5: Vec<i32>,
    pub fc: Option<i32>,
    pub gquad: Option<GquadTable>,
}

fn add(a: i32, b: i32) -> i32 {
    if a >= INF || b >= INF {
        INF
    } else {
        a + b
    }
}

/// Prefix sums of `fc.soft.unpaired_energy` for O(1) range queries over
/// newly-covered unpaired stretches (hairpin/interior-loop interiors,
/// multi-loop and exterior-loop extensions).
fn soft_unpaired_prefix(fc: &FoldCompound) -> Vec<i32> {
    let n = fc.len();
    let mut prefix = vec![0i32; n + 1];
    for i in 0..n {
        prefix[i + 1] = prefix[i] + fc.soft.unpaired_energy(i);
    }
    prefix
}

/// Sum of `fc.soft.unpaired_energy` over `[a,b]` inclusive, `0` if `a > b`.
fn soft_range(prefix: &[i32], a: usize, b: usize) -> i32 {
    if a > b {
        0
    } else {
        prefix[b + 1] - prefix[a]
    }
}

impl MfeTables {
    /// `C[i,i]` ("pair i with itself") is never read; `TURN`-close pairs
    /// hold `INF` by construction since the fill loop never visits them.
    fn fill(fc: &FoldCompound) -> Self {
        let n = fc.len();
        let lm = fc.loop_model();
        let seq = &fc.sequence;
        let ml_base = fc.tables.ml_base();
        let ml_closing = fc.tables.ml_closing();
        let soft_u = soft_unpaired_prefix(fc);

        let gquad = if fc.options.gquad {
            Some(GquadTable::fill_mfe(seq, &fc.gquad_params))
        } else {
            None
        };

        let mut c = TriMatrix::new(n, INF);
        let mut m = TriMatrix::new(n, INF);
        let mut m1 = TriMatrix::new(n, INF);
        let mut f5 = vec![INF; n + 1];
        f5[0] = 0;

        for j in 0..n {
            for i in (0..=j).rev() {
                if j - i <= TURN {
                    continue;
                }
                let t_ok = lm.pair_allowed(seq[i], seq[j]) && fc.hard.admits(i, j, None, CTX_HP | CTX_INT_CLOSE | CTX_ML_CLOSE);
                if t_ok {
                    let mut best = add(lm.hairpin(seq, i, j), soft_range(&soft_u, i + 1, j - 1));

                    let max_span = MAXLOOP;
                    for k in (i + 1)..j {
                        if k - i - 1 > max_span {
                            break;
                        }
                        let l_min = (k + 1).max(j.saturating_sub(max_span - (k - i - 1)));
                        for l in l_min..j {
                            if l <= k {
                                continue;
                            }
                            if !fc.hard.admits(i, j, Some((k, l)), CTX_INT_ENC) {
                                continue;
                            }
                            let inner = c.get(k, l);
                            if inner >= INF {
                                continue;
                            }
                            let mut cost = add(lm.interior(seq, i, j, k, l), inner);
                            cost = add(cost, soft_range(&soft_u, i + 1, k - 1));
                            cost = add(cost, soft_range(&soft_u, l + 1, j - 1));
                            if cost < best {
                                best = cost;
                            }
                        }
                    }

                    if j - i > TURN + 2 {
                        let mut closure = INF;
                        for u in (i + 2)..(j - 1) {
                            if !fc.hard.admits(i, j, Some((i + 1, u)), CTX_ML_BRANCH) {
                                continue;
                            }
                            let left = m.get(i + 1, u);
                            let right = m1.get(u + 1, j - 1);
                            let cand = add(left, right);
                            if cand < closure {
                                closure = cand;
                            }
                        }
                        if closure < INF {
                            let cand = add(closure, add(ml_closing, lm.multibranch_stem(seq, i, j)));
                            if cand < best {
                                best = cand;
                            }
                        }
                    }

                    if best < INF {
                        best = add(best, fc.soft.paired_energy(i, j));
                    }

                    if let Some(ref gq) = gquad {
                        if let Some(v) = gq.get(i, j) {
                            if v < best {
                                best = v;
                            }
                        }
                    }

                    c.set(i, j, best);
                }

                let mut m1_best = if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
                    add(add(m1.get(i, j - 1), ml_base), soft_range(&soft_u, j, j))
                } else {
                    INF
                };
                let stem_here = add(c.get(i, j), lm.multibranch_stem(seq, i, j));
                if stem_here < m1_best {
                    m1_best = stem_here;
                }
                m1.set(i, j, m1_best);

                let mut m_best = INF;
                if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
                    m_best = add(add(m.get(i, j - 1), ml_base), soft_range(&soft_u, j, j));
                }
                if j > i && fc.hard.unpaired_ok(i, UnpairedContext::Multibranch) {
                    let cand = add(add(m.get(i + 1, j), ml_base), soft_range(&soft_u, i, i));
                    if cand < m_best {
                        m_best = cand;
                    }
                }
                for u in i..=j {
                    let left = if u == i { 0 } else { m.get(i, u - 1) };
                    let right = m1.get(u, j);
                    let cand = add(left, right);
                    if cand < m_best {
                        m_best = cand;
                    }
                }
                m.set(i, j, m_best);
            }

            let j1 = j + 1;
            let mut best = if fc.hard.unpaired_ok(j, UnpairedContext::Exterior) {
                add(f5[j1 - 1], soft_range(&soft_u, j, j))
            } else {
                INF
            };
            for i in 0..=j {
                if j - i <= TURN {
                    continue;
                }
                if !fc.hard.admits(i, j, None, CTX_EXT) {
                    continue;
                }
                let stem = c.get(i, j);
                if stem >= INF {
                    continue;
                }
                let cand = add(f5[i], add(stem, lm.exterior_stem(seq, i, j)));
                if cand < best {
                    best = cand;
                }
            }
            f5[j1] = best;
        }

        let fc_val = if fc.options.circular { Some(Self::fill_circular(fc, &c, &m, &m1)) } else { None };

        MfeTables { n, c, m, m1, f5, fc: fc_val, gquad }
    }

    /// Circular closure `Fc = min(FcH, FcI, FcM)` plus a G-quadruplex
    /// wraparound term, reusing the existing hairpin/interior kernels on a
    /// doubled sequence `seq2 = seq ++ seq` rather than introducing new
    /// energy formulas: any loop that threads through the circular origin
    /// corresponds to an interval of `seq2` that crosses position `n`.
    ///
    /// - `FcH(i,j)`: exactly one branch, `(i,j)`. `C[i,j]` already covers
    ///   whatever sits inside `[i+1,j-1]`; the complement arc
    ///   `[j+1,n-1]++[0,i-1]` is the hairpin loop closing the circle, read on
    ///   `seq2` as the pair `(j, i+n)`.
    /// - `FcI(i,j,p,q)`: exactly two branches, `(i,j)` and `(p,q)` with
    ///   `j < p`, connected by two gaps (`[j+1,p-1]` directly, `[q+1,i-1]`
    ///   wrapping). Read on `seq2` as an interior loop closed by `(j, i+n)`
    ///   and enclosing `(p,q)`.
    /// - `FcM`: two or more branches. `M[0,u]` (>=1 branch) concatenated with
    ///   `M1[u+1,n-1]` (exactly one branch) over every split `u`, which by
    ///   construction forces at least two branches meeting at the wrap.
    fn fill_circular(fc: &FoldCompound, c: &TriMatrix<i32>, m: &TriMatrix<i32>, m1: &TriMatrix<i32>) -> i32 {
        let n = fc.len();
        if n == 0 {
            return 0;
        }
        let seq = &fc.sequence;
        let lm = fc.loop_model();
        let seq2: Vec<_> = seq.iter().chain(seq.iter()).copied().collect();

        let mut best = INF;

        // FcH: one branch (i,j), wrap arc closes as a hairpin loop.
        for i in 0..n {
            for j in (i + TURN + 1)..n {
                let inner = c.get(i, j);
                if inner >= INF {
                    continue;
                }
                let wrap = lm.hairpin(&seq2, j, i + n);
                let cand = add(inner, wrap);
                if cand < best {
                    best = cand;
                }
            }
        }

        // FcI: two branches (i,j) then (p,q), j < p, connected by the direct
        // gap [j+1,p-1] and the wrap gap [q+1,i-1], MAXLOOP-bounded as usual.
        for i in 0..n {
            for j in (i + TURN + 1)..n {
                let inner_a = c.get(i, j);
                if inner_a >= INF {
                    continue;
                }
                for p in (j + 1)..n {
                    if p - j - 1 > MAXLOOP {
                        break;
                    }
                    for q in (p + TURN + 1)..n {
                        let wrap_gap = (n - 1 - q) + i;
                        if wrap_gap > MAXLOOP {
                            continue;
                        }
                        let inner_b = c.get(p, q);
                        if inner_b >= INF {
                            continue;
                        }
                        let wrap = lm.interior(&seq2, j, i + n, p, q);
                        let cand = add(add(inner_a, inner_b), wrap);
                        if cand < best {
                            best = cand;
                        }
                    }
                }
            }
        }

        // FcM: >=2 branches, forced by splitting into a >=1-branch M region
        // and an exactly-one-branch M1 region meeting at the wrap.
        for u in 0..(n - 1) {
            let left = m.get(0, u);
            if left >= INF {
                continue;
            }
            let right = m1.get(u + 1, n - 1);
            let cand = add(left, right);
            if cand < best {
                best = cand;
            }
        }

        // G-quadruplex wraparound: a quadruplex box may itself straddle the
        // circular origin, duplicating a prefix of length `GQUAD_MAX_BOX_SIZE - 1`
        // so `enumerate` can see runs on both sides of the join.
        if fc.options.gquad {
            let gg2 = ff_gquad::g_runs(&seq2);
            let lo = n.saturating_sub(ff_gquad::GQUAD_MAX_BOX_SIZE - 1);
            for i in lo..n {
                for j in n..(i + ff_gquad::GQUAD_MAX_BOX_SIZE).min(2 * n) {
                    if let Some((_, e)) = ff_gquad::best_layout(&gg2, i, j, &fc.gquad_params) {
                        if e < best {
                            best = e;
                        }
                    }
                }
            }
        }
        best
    }

    pub fn mfe(&self) -> i32 {
        if let Some(v) = self.fc {
            v
        } else {
            self.f5[self.n]
        }
    }
}

pub fn fold_mfe(fc: &FoldCompound) -> MfeTables {
    MfeTables::fill(fc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::{FoldCompound, FoldOptions};
    use ff_energy::{EnergyTables, NucleotideVec};
    use std::rc::Rc;

    fn compound(seq: &str, opts: FoldOptions) -> FoldCompound {
        let tables = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from(seq).unwrap();
        FoldCompound::new(nv, tables, opts).unwrap()
    }

    #[test]
    fn test_hairpin_mfe_is_negative() {
        let fc = compound("GGGAAAUCCC", FoldOptions::default());
        let tables = fold_mfe(&fc);
        assert!(tables.mfe() < 0);
    }

    #[test]
    fn test_poly_a_is_unstructured() {
        let fc = compound("AAAAAAAAAA", FoldOptions::default());
        let tables = fold_mfe(&fc);
        assert_eq!(tables.mfe(), 0);
    }

    #[test]
    fn test_circular_closure_not_worse_than_linear_for_same_sequence() {
        let seq = "GGGGAAACCCC";
        let linear = compound(seq, FoldOptions::default());
        let mut circ_opts = FoldOptions::default();
        circ_opts.circular = true;
        let circular = compound(seq, circ_opts);

        let linear_tables = fold_mfe(&linear);
        let circular_tables = fold_mfe(&circular);

        assert!(circular_tables.mfe() <= linear_tables.mfe());
    }
}
