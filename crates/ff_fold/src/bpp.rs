//! Base-pair probabilities (C8): McCaskill outside recursion. `probs[i,j] =
//! Qb[i,j] * Qo[i,j] / Q[n]`, where `Qo[i,j]` is the partition function of
//! everything outside the pair `(i,j)` given that `i` and `j` are paired.
//!
//! The exterior-loop, interior-loop-enclosed, and multiloop-enclosed outside
//! terms are all exact. The multiloop term threads `(i,j)` as one branch of a
//! multiloop closed by some `(p,q)`: zero or more further branches precede it
//! (via `Qm`, or the trivial all-unpaired run) and zero or more follow it
//! (same shape, mirrored), so every branch position -- not only the last one
//! -- is accounted for.

use ff_constraints::{UnpairedContext, CTX_EXT, CTX_INT_ENC, CTX_ML_BRANCH};
use ff_energy::loop_energy::{MAXLOOP, TURN};

use crate::compound::FoldCompound;
use crate::error::FoldError;
use crate::matrix::TriMatrix;
use crate::pf::PfTables;

fn bw(energy: i32, kt: f64) -> f64 {
    (-(energy as f64 / 100.0) / kt).exp()
}

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

/// Weight of "zero or more unpaired nucleotides, no branch" spanning `[a,b]`
/// inside a multiloop, mirroring the trailing/leading-unpaired term added to
/// `Qm`'s forward recursion; `1.0` for the empty range.
fn unpaired_run_weight(prefix: &[i32], ml_base: i32, kt: f64, scale: &[f64], a: usize, b: usize) -> f64 {
    if a > b {
        1.0
    } else {
        let count = b - a + 1;
        bw(ml_base * count as i32, kt) * bw(soft_range(prefix, a, b), kt) * scale[count]
    }
}

pub struct BasePairProbabilities {
    pub n: usize,
    pub probs: TriMatrix<f64>,
}

impl BasePairProbabilities {
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i <= j {
            self.probs.get(i, j)
        } else {
            self.probs.get(j, i)
        }
    }
}

pub fn compute_bpp(fc: &FoldCompound, pf: &PfTables) -> Result<BasePairProbabilities, FoldError> {
    let n = pf.n;
    let total = pf.q[n];
    if total <= 0.0 {
        return Ok(BasePairProbabilities { n, probs: TriMatrix::new(n, 0.0) });
    }
    let kt = fc.kt();
    let lm = fc.loop_model();
    let seq = &fc.sequence;
    let ml_closing = fc.tables.ml_closing();
    let ml_base = fc.tables.ml_base();
    let scale = &pf.scale;
    let soft_u = soft_unpaired_prefix(fc);

    let mut qo = TriMatrix::new(n, 0.0);

    for span in (TURN + 1..n).rev() {
        for i in 0..(n - span) {
            let j = i + span;
            if !lm.pair_allowed(seq[i], seq[j]) {
                continue;
            }

            let mut acc = 0.0;

            // Exterior loop: (i,j) is the outermost base pair.
            if fc.hard.admits(i, j, None, CTX_EXT) {
                acc += pf.q[i] * bw(lm.exterior_stem(seq, i, j), kt) * pf.q_suffix[j + 1];
            }

            // Interior-loop-enclosed: (i,j) sits inside a closing pair (p,q).
            for p in i.saturating_sub(MAXLOOP + 1)..i {
                for q in (j + 1)..n.min(j + 1 + MAXLOOP + 1) {
                    if (i - p - 1) + (q - j - 1) > MAXLOOP {
                        continue;
                    }
                    if !fc.hard.admits(p, q, Some((i, j)), CTX_INT_ENC) {
                        continue;
                    }
                    let outer = qo.get(p, q);
                    if outer <= 0.0 {
                        continue;
                    }
                    let span_here = (q - p + 1) - (j - i + 1);
                    let pair_bw = bw(fc.soft.paired_energy(p, q), kt);
                    let soft_w = bw(soft_range(&soft_u, p + 1, i - 1) + soft_range(&soft_u, j + 1, q - 1), kt);
                    acc += outer * pair_bw * bw(lm.interior(seq, p, q, i, j), kt) * soft_w * scale[span_here];
                }
            }

            // Multiloop-enclosed: (i,j) is one branch of a multiloop closed
            // by (p,q), with zero or more further branches on each side.
            for p in 0..i {
                for q in (j + 1)..n {
                    if !fc.hard.admits(p, q, Some((i, j)), CTX_ML_BRANCH) {
                        continue;
                    }
                    let outer = qo.get(p, q);
                    if outer <= 0.0 {
                        continue;
                    }
                    let pair_bw = bw(fc.soft.paired_energy(p, q), kt);
                    let closure_w = pair_bw * bw(ml_closing, kt) * bw(lm.multibranch_stem(seq, p, q), kt) * scale[2];
                    let branch_w = bw(lm.multibranch_stem(seq, i, j), kt) * scale[2];

                    let preceding = unpaired_run_weight(&soft_u, ml_base, kt, scale, p + 1, i - 1)
                        + if i >= p + 2 { pf.qm.get(p + 1, i - 1) } else { 0.0 };
                    if preceding <= 0.0 {
                        continue;
                    }

                    let trailing = unpaired_run_weight(&soft_u, ml_base, kt, scale, j + 1, q - 1)
                        + if q >= j + 2 { pf.qm.get(j + 1, q - 1) } else { 0.0 };
                    if trailing <= 0.0 {
                        continue;
                    }

                    acc += outer * closure_w * branch_w * preceding * trailing;
                }
            }

            qo.set(i, j, acc);
        }
    }

    let mut probs = TriMatrix::new(n, 0.0);
    for i in 0..n {
        for j in (i + TURN + 1)..n {
            let p = pf.qb.get(i, j) * qo.get(i, j) / total;
            probs.set(i, j, p.clamp(0.0, 1.0));
        }
    }

    if let Some(ref gq) = pf.gquad_pf {
        for i in 0..n {
            for j in (i + TURN + 1)..n {
                if let Some(w) = gq.get(i, j) {
                    let contribution = w * scale[j - i + 1] * qo.get(i, j) / total;
                    let cur = probs.get(i, j);
                    probs.set(i, j, (cur + contribution).clamp(0.0, 1.0));
                }
            }
        }
    }

    Ok(BasePairProbabilities { n, probs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::{FoldCompound, FoldOptions};
    use crate::pf::fold_pf;
    use ff_energy::{EnergyTables, NucleotideVec};
    use std::rc::Rc;

    #[test]
    fn test_probabilities_are_bounded() {
        let tables = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from("GGGAAAUCCC").unwrap();
        let fc = FoldCompound::new(nv, tables, FoldOptions::default()).unwrap();
        let pf = fold_pf(&fc).unwrap();
        let bpp = compute_bpp(&fc, &pf).unwrap();
        for i in 0..bpp.n {
            for j in 0..bpp.n {
                let p = bpp.get(i, j);
                assert!((0.0..=1.0).contains(&p), "prob out of range at ({i},{j}): {p}");
            }
        }
    }

    /// Every valid non-crossing pairing of `seq[a..b)` respecting `TURN` and
    /// `pair_allowed`, as a list of branch-sets -- the same decomposition the
    /// DP folds over, but enumerated exhaustively rather than optimized.
    fn enumerate_structures(
        a: usize,
        b: usize,
        seq: &ff_energy::NucleotideVec,
        lm: &ff_energy::loop_energy::LoopEnergyModel,
    ) -> Vec<Vec<(usize, usize)>> {
        if a >= b {
            return vec![Vec::new()];
        }
        let mut out = enumerate_structures(a + 1, b, seq, lm);
        for j in (a + TURN + 1)..b {
            if !lm.pair_allowed(seq[a], seq[j]) {
                continue;
            }
            for inner in enumerate_structures(a + 1, j, seq, lm) {
                for tail in enumerate_structures(j + 1, b, seq, lm) {
                    let mut combined = vec![(a, j)];
                    combined.extend(inner.iter().copied());
                    combined.extend(tail.iter().copied());
                    out.push(combined);
                }
            }
        }
        out
    }

    #[test]
    fn test_probabilities_match_brute_force_enumeration_with_genuine_multiloop() {
        use ff_structure::PairTable;
        use std::collections::HashMap;

        // (0,12) closes a genuine two-branch multiloop over (1,5) and
        // (7,11), with position 6 the lone unpaired nucleotide between
        // them -- exactly the case the multiloop outside term undercounted.
        let tables = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from("GGAAACAGAAACC").unwrap();
        let fc = FoldCompound::new(nv, tables, FoldOptions::default()).unwrap();
        let pf = fold_pf(&fc).unwrap();
        let bpp = compute_bpp(&fc, &pf).unwrap();

        let n = fc.len();
        let lm = fc.loop_model();
        let kt = fc.kt();
        let seq = &fc.sequence;

        let structures = enumerate_structures(0, n, seq, &lm);
        assert!(structures.iter().any(|s| s.contains(&(0, 12)) && s.contains(&(1, 5)) && s.contains(&(7, 11))));

        let mut q_total = 0.0f64;
        let mut pair_weight: HashMap<(usize, usize), f64> = HashMap::new();
        for branches in &structures {
            let mut table = vec![None; n];
            for &(p, q) in branches {
                table[p] = Some(q as u16);
                table[q] = Some(p as u16);
            }
            let pt = PairTable(table);
            let e = lm.energy_of_structure(seq, &pt);
            let w = (-(e as f64 / 100.0) / kt).exp();
            q_total += w;
            for &(p, q) in branches {
                *pair_weight.entry((p, q)).or_insert(0.0) += w;
            }
        }

        let scale_n = pf.scale[n];
        assert!((q_total - pf.partition_function() / scale_n).abs() / q_total < 1e-6);

        for (&(i, j), &w) in &pair_weight {
            let expected = w / q_total;
            let got = bpp.get(i, j);
            assert!((expected - got).abs() < 1e-6, "mismatch at ({i},{j}): expected {expected}, got {got}");
        }

        for i in 0..n {
            let row_sum: f64 = (0..n).map(|j| bpp.get(i, j)).sum();
            assert!(row_sum <= 1.0 + 1e-6, "row sum exceeds 1 at i={i}: {row_sum}");
        }
    }

    #[test]
    fn test_strong_hairpin_has_nonzero_closing_pair_probability() {
        let tables = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from("GGGGAAAACCCC").unwrap();
        let fc = FoldCompound::new(nv, tables, FoldOptions::default()).unwrap();
        let pf = fold_pf(&fc).unwrap();
        let bpp = compute_bpp(&fc, &pf).unwrap();
        assert!(bpp.get(0, 11) > 0.0);
    }
}
