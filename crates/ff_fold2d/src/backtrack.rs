//! Restricted traceback and stochastic sampling within one distance class
//! (spec.md §4.6 "Backtrack", §6 `TwoDfold_backtrack` / `TwoDpfold_pbacktrack`):
//! given a target `(k,l)`, walk the already-filled 2D tables picking, at each
//! cell, the child `(k,l)` split that reproduces the parent's stored value
//! (deterministic) or is drawn with probability proportional to its Boltzmann
//! weight (stochastic).

use rand::Rng;

use ff_constraints::{UnpairedContext, CTX_EXT, CTX_INT_ENC, CTX_ML_BRANCH};
use ff_energy::loop_energy::{INF, MAXLOOP, TURN};
use ff_structure::PairTable;

use crate::compound::TwoDFoldCompound;
use crate::mfe::TwoDMfeTables;
use crate::pf::TwoDPfTables;

fn add(a: i32, b: i32) -> i32 {
    if a >= INF || b >= INF {
        INF
    } else {
        a + b
    }
}

/// Deterministic MFE traceback restricted to one `(k,l)` distance class.
pub struct TwoDTraceback<'a> {
    tdc: &'a TwoDFoldCompound<'a>,
    tables: &'a TwoDMfeTables,
    pairs: Vec<Option<usize>>,
}

impl<'a> TwoDTraceback<'a> {
    pub fn new(tdc: &'a TwoDFoldCompound<'a>, tables: &'a TwoDMfeTables) -> Self {
        TwoDTraceback { tdc, tables, pairs: vec![None; tdc.n()] }
    }

    /// Reconstructs one optimal structure whose `(k,l)` distance is exactly
    /// the class requested, or `None` if that class is empty at the root.
    pub fn run(mut self, k: u32, l: u32) -> Option<PairTable> {
        let n = self.tdc.n();
        let target = self.tables.f5[n].get(k, l)?;
        self.trace_f5(n, k, l, target);
        Some(PairTable(self.pairs.iter().map(|p| p.map(|x| x as u16)).collect()))
    }

    fn pair(&mut self, i: usize, j: usize) {
        self.pairs[i] = Some(j);
        self.pairs[j] = Some(i);
    }

    fn trace_f5(&mut self, j: usize, k: u32, l: u32, target: i32) {
        if j == 0 {
            return;
        }
        let fc = self.tdc.fc;
        if fc.hard.unpaired_ok(j - 1, UnpairedContext::Exterior) {
            let (uk, ul) = self.tdc.unpaired_range(j - 1, j - 1);
            if k >= uk && l >= ul {
                if let Some(v) = self.tables.f5[j - 1].get(k - uk, l - ul) {
                    if v == target {
                        self.trace_f5(j - 1, k - uk, l - ul, target);
                        return;
                    }
                }
            }
        }
        let lm = fc.loop_model();
        let seq = &fc.sequence;
        for i in 0..j {
            if j - 1 - i <= TURN {
                continue;
            }
            if !fc.hard.admits(i, j - 1, None, CTX_EXT) {
                continue;
            }
            let e = lm.exterior_stem(seq, i, j - 1);
            let stem = self.tables.c.get(i, j - 1);
            let prefix = &self.tables.f5[i];
            for (ks, ls, vs) in stem.iter() {
                if ks > k || ls > l {
                    continue;
                }
                let (kp, lp) = (k - ks, l - ls);
                if let Some(vp) = prefix.get(kp, lp) {
                    if add(vp, add(vs, e)) == target {
                        self.trace_f5(i, kp, lp, vp);
                        self.trace_c(i, j - 1, ks, ls, vs);
                        return;
                    }
                }
            }
        }
    }

    fn trace_c(&mut self, i: usize, j: usize, k: u32, l: u32, target: i32) {
        self.pair(i, j);
        let fc = self.tdc.fc;
        let lm = fc.loop_model();
        let seq = &fc.sequence;
        let (dk0, dl0) = self.tdc.pair_delta(i, j);

        let hp = lm.hairpin(seq, i, j);
        if hp < INF {
            let (uk, ul) = self.tdc.unpaired_range(i + 1, j.saturating_sub(1));
            if dk0 + uk == k && dl0 + ul == l && hp == target {
                return;
            }
        }

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
                let e = lm.interior(seq, i, j, p, q);
                if e >= INF {
                    continue;
                }
                let (uk, ul) = self.tdc.unpaired_range(i + 1, p - 1);
                let (uk2, ul2) = self.tdc.unpaired_range(q + 1, j - 1);
                let (dk, dl) = (dk0 + uk + uk2, dl0 + ul + ul2);
                if k < dk || l < dl {
                    continue;
                }
                let (kk, ll) = (k - dk, l - dl);
                if let Some(inner) = self.tables.c.get(p, q).get(kk, ll) {
                    if add(e, inner) == target {
                        self.trace_c(p, q, kk, ll, inner);
                        return;
                    }
                }
            }
        }

        if j - i > TURN + 2 {
            let ml_closing = fc.tables.ml_closing();
            let stem = add(ml_closing, lm.multibranch_stem(seq, i, j));
            if stem < INF {
                for u in (i + 2)..(j - 1) {
                    if !fc.hard.admits(i, j, Some((i + 1, u)), CTX_ML_BRANCH) {
                        continue;
                    }
                    let left = self.tables.m.get(i + 1, u);
                    let right = self.tables.m1.get(u + 1, j - 1);
                    for (kl, ll, vl) in left.iter() {
                        if kl > k || ll > l {
                            continue;
                        }
                        let rk = k - kl - dk0;
                        let rl = l - ll - dl0;
                        if (k as i64) < (kl as i64 + dk0 as i64) || (l as i64) < (ll as i64 + dl0 as i64) {
                            continue;
                        }
                        if let Some(vr) = right.get(rk, rl) {
                            if add(stem, add(vl, vr)) == target {
                                self.trace_m(i + 1, u, kl, ll, vl);
                                self.trace_m1(u + 1, j - 1, rk, rl, vr);
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    fn trace_m(&mut self, i: usize, j: usize, k: u32, l: u32, target: i32) {
        let fc = self.tdc.fc;
        if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
            let ml_base = fc.tables.ml_base();
            let (uk, ul) = self.tdc.unpaired_range(j, j);
            if k >= uk && l >= ul {
                if let Some(v) = self.tables.m.get(i, j - 1).get(k - uk, l - ul) {
                    if add(v, ml_base) == target {
                        self.trace_m(i, j - 1, k - uk, l - ul, v);
                        return;
                    }
                }
            }
        }
        if j > i && fc.hard.unpaired_ok(i, UnpairedContext::Multibranch) {
            let ml_base = fc.tables.ml_base();
            let (uk, ul) = self.tdc.unpaired_range(i, i);
            if k >= uk && l >= ul {
                if let Some(v) = self.tables.m.get(i + 1, j).get(k - uk, l - ul) {
                    if add(v, ml_base) == target {
                        self.trace_m(i + 1, j, k - uk, l - ul, v);
                        return;
                    }
                }
            }
        }
        if let Some(v) = self.tables.m1.get(i, j).get(k, l) {
            if v == target {
                self.trace_m1(i, j, k, l, v);
                return;
            }
        }
        for u in (i + 1)..=j {
            let right = self.tables.m1.get(u, j);
            let left = self.tables.m.get(i, u - 1);
            for (kr, lr, vr) in right.iter() {
                if kr > k || lr > l {
                    continue;
                }
                let (kl, ll) = (k - kr, l - lr);
                if let Some(vl) = left.get(kl, ll) {
                    if add(vl, vr) == target {
                        self.trace_m(i, u - 1, kl, ll, vl);
                        self.trace_m1(u, j, kr, lr, vr);
                        return;
                    }
                }
            }
        }
    }

    fn trace_m1(&mut self, i: usize, j: usize, k: u32, l: u32, target: i32) {
        let fc = self.tdc.fc;
        let lm = fc.loop_model();
        let seq = &fc.sequence;
        let stem_e = lm.multibranch_stem(seq, i, j);
        if let Some(v) = self.tables.c.get(i, j).get(k, l) {
            if add(v, stem_e) == target {
                self.trace_c(i, j, k, l, v);
                return;
            }
        }
        if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
            let ml_base = fc.tables.ml_base();
            let (uk, ul) = self.tdc.unpaired_range(j, j);
            if k >= uk && l >= ul {
                if let Some(v) = self.tables.m1.get(i, j - 1).get(k - uk, l - ul) {
                    if add(v, ml_base) == target {
                        self.trace_m1(i, j - 1, k - uk, l - ul, v);
                    }
                }
            }
        }
    }
}

/// Reconstructs one optimal structure in distance class `(k,l)`, or `None`
/// if that class has no solution.
pub fn two_d_backtrack(tdc: &TwoDFoldCompound, tables: &TwoDMfeTables, k: u32, l: u32) -> Option<PairTable> {
    TwoDTraceback::new(tdc, tables).run(k, l)
}

fn bw(energy: i32, kt: f64) -> f64 {
    (-(energy as f64 / 100.0) / kt).exp()
}

/// Stochastic Boltzmann sampler restricted to one `(k,l)` distance class,
/// mirroring `ff_fold::sample` with every weight restricted to the child
/// bucket that keeps the running total on-class.
pub struct TwoDSampler<'a> {
    tdc: &'a TwoDFoldCompound<'a>,
    pf: &'a TwoDPfTables,
    pairs: Vec<Option<usize>>,
}

impl<'a> TwoDSampler<'a> {
    pub fn new(tdc: &'a TwoDFoldCompound<'a>, pf: &'a TwoDPfTables) -> Self {
        TwoDSampler { tdc, pf, pairs: vec![None; tdc.n()] }
    }

    pub fn run<R: Rng + ?Sized>(mut self, k: u32, l: u32, rng: &mut R) -> Option<PairTable> {
        let n = self.tdc.n();
        let total = self.pf.q[n].get(k, l)?;
        if total <= 0.0 {
            return None;
        }
        self.sample_q(n, k, l, total, rng);
        Some(PairTable(self.pairs.iter().map(|p| p.map(|x| x as u16)).collect()))
    }

    fn pair(&mut self, i: usize, j: usize) {
        self.pairs[i] = Some(j);
        self.pairs[j] = Some(i);
    }

    fn sample_q<R: Rng + ?Sized>(&mut self, j: usize, k: u32, l: u32, total: f64, rng: &mut R) {
        if j == 0 {
            return;
        }
        let mut roll = rng.random::<f64>() * total;
        let fc = self.tdc.fc;

        if fc.hard.unpaired_ok(j - 1, UnpairedContext::Exterior) {
            let (uk, ul) = self.tdc.unpaired_range(j - 1, j - 1);
            if k >= uk && l >= ul {
                if let Some(v) = self.pf.q[j - 1].get(k - uk, l - ul) {
                    let w = v * self.pf.scale[1];
                    if roll < w {
                        self.sample_q(j - 1, k - uk, l - ul, v, rng);
                        return;
                    }
                    roll -= w;
                }
            }
        }

        let lm = fc.loop_model();
        let seq = &fc.sequence;
        let kt = fc.kt();
        for i in 0..j {
            if j - 1 - i <= TURN {
                continue;
            }
            if !fc.hard.admits(i, j - 1, None, CTX_EXT) {
                continue;
            }
            let e = bw(lm.exterior_stem(seq, i, j - 1), kt);
            let stem = self.pf.qb.get(i, j - 1);
            for (ks, ls, vs) in stem.iter() {
                if ks > k || ls > l {
                    continue;
                }
                let (kp, lp) = (k - ks, l - ls);
                if let Some(vp) = self.pf.q[i].get(kp, lp) {
                    let w = vp * vs * e;
                    if roll < w {
                        self.sample_q(i, kp, lp, vp, rng);
                        self.sample_qb(i, j - 1, ks, ls, vs, rng);
                        return;
                    }
                    roll -= w;
                }
            }
        }
    }

    fn sample_qb<R: Rng + ?Sized>(&mut self, i: usize, j: usize, k: u32, l: u32, total: f64, rng: &mut R) {
        self.pair(i, j);
        let mut roll = rng.random::<f64>() * total;
        let fc = self.tdc.fc;
        let lm = fc.loop_model();
        let seq = &fc.sequence;
        let kt = fc.kt();
        let scale = &self.pf.scale;
        let (dk0, dl0) = self.tdc.pair_delta(i, j);

        let hp_w = bw(lm.hairpin(seq, i, j), kt) * scale[j - i + 1];
        if hp_w > 0.0 {
            let (uk, ul) = self.tdc.unpaired_range(i + 1, j.saturating_sub(1));
            if dk0 + uk == k && dl0 + ul == l {
                if roll < hp_w {
                    return;
                }
                roll -= hp_w;
            }
        }

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
                let span_here = (j - i + 1) - (q - p + 1);
                let w = bw(lm.interior(seq, i, j, p, q), kt) * scale[span_here];
                if w <= 0.0 {
                    continue;
                }
                let (uk, ul) = self.tdc.unpaired_range(i + 1, p - 1);
                let (uk2, ul2) = self.tdc.unpaired_range(q + 1, j - 1);
                let (dk, dl) = (dk0 + uk + uk2, dl0 + ul + ul2);
                if k < dk || l < dl {
                    continue;
                }
                let (kk, ll) = (k - dk, l - dl);
                if let Some(inner) = self.pf.qb.get(p, q).get(kk, ll) {
                    let ww = w * inner;
                    if roll < ww {
                        self.sample_qb(p, q, kk, ll, inner, rng);
                        return;
                    }
                    roll -= ww;
                }
            }
        }

        if j - i > TURN + 2 {
            let ml_closing = fc.tables.ml_closing();
            let stem_w = bw(ml_closing, kt) * bw(lm.multibranch_stem(seq, i, j), kt) * scale[2];
            for u in (i + 2)..(j - 1) {
                if !fc.hard.admits(i, j, Some((i + 1, u)), CTX_ML_BRANCH) {
                    continue;
                }
                let left = self.pf.qm.get(i + 1, u);
                let right = self.pf.qm1.get(u + 1, j - 1);
                for (kl, ll, vl) in left.iter() {
                    if (kl as u32) + dk0 > k || (ll as u32) + dl0 > l {
                        continue;
                    }
                    let rk = k - kl - dk0;
                    let rl = l - ll - dl0;
                    if let Some(vr) = right.get(rk, rl) {
                        let w = stem_w * vl * vr;
                        if roll < w {
                            self.sample_qm(i + 1, u, kl, ll, vl, rng);
                            self.sample_qm1(u + 1, j - 1, rk, rl, vr, rng);
                            return;
                        }
                        roll -= w;
                    }
                }
            }
        }
    }

    fn sample_qm<R: Rng + ?Sized>(&mut self, i: usize, j: usize, k: u32, l: u32, total: f64, rng: &mut R) {
        let mut roll = rng.random::<f64>() * total;
        let fc = self.tdc.fc;
        let kt = fc.kt();
        let ml_base = fc.tables.ml_base();

        if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
            let (uk, ul) = self.tdc.unpaired_range(j, j);
            if k >= uk && l >= ul {
                if let Some(v) = self.pf.qm.get(i, j - 1).get(k - uk, l - ul) {
                    let w = v * bw(ml_base, kt) * self.pf.scale[1];
                    if roll < w {
                        self.sample_qm(i, j - 1, k - uk, l - ul, v, rng);
                        return;
                    }
                    roll -= w;
                }
            }
        }

        if j > i && fc.hard.unpaired_ok(i, UnpairedContext::Multibranch) {
            let (uk, ul) = self.tdc.unpaired_range(i, i);
            if k >= uk && l >= ul {
                if let Some(v) = self.pf.qm.get(i + 1, j).get(k - uk, l - ul) {
                    let w = v * bw(ml_base, kt) * self.pf.scale[1];
                    if roll < w {
                        self.sample_qm(i + 1, j, k - uk, l - ul, v, rng);
                        return;
                    }
                    roll -= w;
                }
            }
        }

        if let Some(v) = self.pf.qm1.get(i, j).get(k, l) {
            if roll < v {
                self.sample_qm1(i, j, k, l, v, rng);
                return;
            }
            roll -= v;
        }

        for u in (i + 1)..=j {
            let right = self.pf.qm1.get(u, j);
            let left = self.pf.qm.get(i, u - 1);
            for (kr, lr, vr) in right.iter() {
                if kr > k || lr > l {
                    continue;
                }
                let (kl, ll) = (k - kr, l - lr);
                if let Some(vl) = left.get(kl, ll) {
                    let w = vl * vr;
                    if roll < w {
                        self.sample_qm(i, u - 1, kl, ll, vl, rng);
                        self.sample_qm1(u, j, kr, lr, vr, rng);
                        return;
                    }
                    roll -= w;
                }
            }
        }
    }

    fn sample_qm1<R: Rng + ?Sized>(&mut self, i: usize, j: usize, k: u32, l: u32, total: f64, rng: &mut R) {
        let mut roll = rng.random::<f64>() * total;
        let fc = self.tdc.fc;
        let lm = fc.loop_model();
        let seq = &fc.sequence;
        let kt = fc.kt();

        let stem_w = bw(lm.multibranch_stem(seq, i, j), kt);
        if let Some(v) = self.pf.qb.get(i, j).get(k, l) {
            let w = v * stem_w;
            if roll < w {
                self.sample_qb(i, j, k, l, v, rng);
                return;
            }
            roll -= w;
        }

        if j > i && fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
            let ml_base = fc.tables.ml_base();
            let (uk, ul) = self.tdc.unpaired_range(j, j);
            if k >= uk && l >= ul {
                if let Some(v) = self.pf.qm1.get(i, j - 1).get(k - uk, l - ul) {
                    let w = v * bw(ml_base, kt) * self.pf.scale[1];
                    if roll < w {
                        self.sample_qm1(i, j - 1, k - uk, l - ul, v, rng);
                    }
                }
            }
        }
    }
}

/// Draws one structure from the Boltzmann ensemble restricted to distance
/// class `(k,l)`, or `None` if that class is empty.
pub fn two_d_pbacktrack<R: Rng + ?Sized>(
    tdc: &TwoDFoldCompound,
    pf: &TwoDPfTables,
    k: u32,
    l: u32,
    rng: &mut R,
) -> Option<PairTable> {
    TwoDSampler::new(tdc, pf).run(k, l, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_constraints::Reference;
    use ff_energy::{EnergyTables, NucleotideVec};
    use ff_fold::{FoldCompound, FoldOptions};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::rc::Rc;

    fn compound(seq: &str) -> FoldCompound {
        let tables = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from(seq).unwrap();
        FoldCompound::new(nv, tables, FoldOptions::default()).unwrap()
    }

    #[test]
    fn test_backtrack_reproduces_a_solution_class() {
        let fc = compound("GGGGAAACCCC");
        let db = PairTable::try_from("((((...))))").unwrap();
        let r1 = Reference::new(&fc.sequence, &db).unwrap();
        let r2 = Reference::new(&fc.sequence, &db).unwrap();
        let tdc = TwoDFoldCompound::new(&fc, r1, r2, None, None);
        let tables = crate::mfe::two_d_fold(&tdc);
        let sols = tables.solutions();
        let s = sols.iter().find(|s| s.k >= 0).expect("at least one solution");
        let pt = two_d_backtrack(&tdc, &tables, s.k as u32, s.l as u32).expect("class is populated");
        assert!(pt.is_well_formed(0, pt.len()));
    }

    #[test]
    fn test_pbacktrack_draws_well_formed_structure() {
        let fc = compound("GCGCAAGCGC");
        let r1 = Reference::new(&fc.sequence, &PairTable::try_from("((((..))))").unwrap()).unwrap();
        let r2 = Reference::new(&fc.sequence, &PairTable::try_from("..........").unwrap()).unwrap();
        let tdc = TwoDFoldCompound::new(&fc, r1, r2, None, None);
        let pf = crate::pf::two_d_pfold(&tdc);
        let sols = pf.solutions();
        let s = sols.iter().find(|s| s.k >= 0 && s.q > 0.0).expect("at least one solution");
        let mut rng = StdRng::seed_from_u64(11);
        let pt = two_d_pbacktrack(&tdc, &pf, s.k as u32, s.l as u32, &mut rng).expect("class is populated");
        assert!(pt.is_well_formed(0, pt.len()));
    }
}
