//! Stochastic Boltzmann backtracking (C8): draws structures with probability
//! proportional to their Boltzmann weight, reusing the already-filled
//! partition-function tables. Circular compounds only support full-length
//! sampling; linear compounds support prefix sampling via `sample_prefix`.

use rand::Rng;

use ff_constraints::{UnpairedContext, CTX_EXT, CTX_INT_ENC, CTX_ML_BRANCH};
use ff_energy::loop_energy::{MAXLOOP, TURN};
use ff_structure::PairTable;

use crate::compound::FoldCompound;
use crate::error::FoldError;
use crate::pf::PfTables;

fn bw(energy: i32, kt: f64) -> f64 {
    (-(energy as f64 / 100.0) / kt).exp()
}

pub struct Sampler<'a> {
    fc: &'a FoldCompound,
    pf: &'a PfTables,
    pairs: Vec<Option<usize>>,
}

impl<'a> Sampler<'a> {
    pub fn new(fc: &'a FoldCompound, pf: &'a PfTables) -> Self {
        Sampler { fc, pf, pairs: vec![None; fc.len()] }
    }

    /// Draws one structure over the prefix `[0, j)`.
    pub fn sample_prefix<R: Rng + ?Sized>(mut self, j: usize, rng: &mut R) -> Result<PairTable, FoldError> {
        self.sample_q(j, rng)?;
        Ok(PairTable(self.pairs.iter().map(|p| p.map(|x| x as u16)).collect()))
    }

    fn pair(&mut self, i: usize, j: usize) {
        self.pairs[i] = Some(j);
        self.pairs[j] = Some(i);
    }

    fn sample_q<R: Rng + ?Sized>(&mut self, j: usize, rng: &mut R) -> Result<(), FoldError> {
        if j == 0 {
            return Ok(());
        }
        let total = self.pf.q[j];
        if total <= 0.0 {
            return Err(FoldError::NumericalOverflow { log_q: f64::NEG_INFINITY, threshold: 0.0 });
        }
        let mut roll = rng.random::<f64>() * total;

        let seq = &self.fc.sequence;
        let lm = self.fc.loop_model();
        let kt = self.fc.kt();

        if self.fc.hard.unpaired_ok(j - 1, UnpairedContext::Exterior) {
            let w = self.pf.q[j - 1] * self.pf.scale[1];
            if roll < w {
                return self.sample_q(j - 1, rng);
            }
            roll -= w;
        }

        for i in 0..j {
            if j - 1 - i <= TURN {
                continue;
            }
            if !self.fc.hard.admits(i, j - 1, None, CTX_EXT) {
                continue;
            }
            let stem = self.pf.qb.get(i, j - 1);
            if stem <= 0.0 {
                continue;
            }
            let w = self.pf.q[i] * bw(lm.exterior_stem(seq, i, j - 1), kt) * stem;
            if roll < w {
                self.sample_q(i, rng)?;
                self.sample_qb(i, j - 1, rng)?;
                return Ok(());
            }
            roll -= w;
        }

        // Numerical residue; treat as the last exterior-stem option examined
        // rather than panicking on floating-point rounding at the boundary.
        Ok(())
    }

    fn sample_qb<R: Rng + ?Sized>(&mut self, i: usize, j: usize, rng: &mut R) -> Result<(), FoldError> {
        self.pair(i, j);
        let total = self.pf.qb.get(i, j);
        if total <= 0.0 {
            return Ok(());
        }
        let mut roll = rng.random::<f64>() * total;

        let seq = &self.fc.sequence;
        let lm = self.fc.loop_model();
        let kt = self.fc.kt();
        let scale = &self.pf.scale;
        let ml_closing = self.fc.tables.ml_closing();

        let hp_w = bw(lm.hairpin(seq, i, j), kt) * scale[j - i + 1];
        if roll < hp_w {
            return Ok(());
        }
        roll -= hp_w;

        for k in (i + 1)..j {
            if k - i - 1 > MAXLOOP {
                break;
            }
            for l in (k + 1)..j {
                if j - l - 1 + k - i - 1 > MAXLOOP {
                    continue;
                }
                if !self.fc.hard.admits(i, j, Some((k, l)), CTX_INT_ENC) {
                    continue;
                }
                let inner = self.pf.qb.get(k, l);
                if inner <= 0.0 {
                    continue;
                }
                let span_here = (j - i + 1) - (l - k + 1);
                let w = bw(lm.interior(seq, i, j, k, l), kt) * scale[span_here] * inner;
                if roll < w {
                    return self.sample_qb(k, l, rng);
                }
                roll -= w;
            }
        }

        if j > i + 2 {
            for u in (i + 2)..(j - 1) {
                if !self.fc.hard.admits(i, j, Some((i + 1, u)), CTX_ML_BRANCH) {
                    continue;
                }
                let left = self.pf.qm.get(i + 1, u);
                let right = self.pf.qm1.get(u + 1, j - 1);
                if left <= 0.0 || right <= 0.0 {
                    continue;
                }
                let stem_w = bw(ml_closing, kt) * bw(lm.multibranch_stem(seq, i, j), kt);
                let w = stem_w * scale[2] * left * right;
                if roll < w {
                    self.sample_qm(i + 1, u, rng)?;
                    self.sample_qm1(u + 1, j - 1, rng)?;
                    return Ok(());
                }
                roll -= w;
            }
        }

        Ok(())
    }

    fn sample_qm<R: Rng + ?Sized>(&mut self, i: usize, j: usize, rng: &mut R) -> Result<(), FoldError> {
        let total = self.pf.qm.get(i, j);
        if total <= 0.0 {
            return Ok(());
        }
        let mut roll = rng.random::<f64>() * total;
        let kt = self.fc.kt();
        let ml_base = self.fc.tables.ml_base();

        if j > i && self.fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
            let w = self.pf.qm.get(i, j - 1) * bw(ml_base, kt) * self.pf.scale[1];
            if roll < w {
                return self.sample_qm(i, j - 1, rng);
            }
            roll -= w;
        }

        if j > i && self.fc.hard.unpaired_ok(i, UnpairedContext::Multibranch) {
            let w = self.pf.qm.get(i + 1, j) * bw(ml_base, kt) * self.pf.scale[1];
            if roll < w {
                return self.sample_qm(i + 1, j, rng);
            }
            roll -= w;
        }

        for u in i..=j {
            let left = if u == i { 1.0 } else { self.pf.qm.get(i, u - 1) };
            let right = self.pf.qm1.get(u, j);
            if right <= 0.0 {
                continue;
            }
            let w = left * right;
            if roll < w {
                if u > i {
                    self.sample_qm(i, u - 1, rng)?;
                }
                return self.sample_qm1(u, j, rng);
            }
            roll -= w;
        }
        Ok(())
    }

    fn sample_qm1<R: Rng + ?Sized>(&mut self, i: usize, j: usize, rng: &mut R) -> Result<(), FoldError> {
        let total = self.pf.qm1.get(i, j);
        if total <= 0.0 {
            return Ok(());
        }
        let mut roll = rng.random::<f64>() * total;
        let seq = &self.fc.sequence;
        let lm = self.fc.loop_model();
        let kt = self.fc.kt();
        let ml_base = self.fc.tables.ml_base();

        if j > i && self.fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
            let w = self.pf.qm1.get(i, j - 1) * bw(ml_base, kt) * self.pf.scale[1];
            if roll < w {
                return self.sample_qm1(i, j - 1, rng);
            }
            roll -= w;
        }

        let stem_w = self.pf.qb.get(i, j) * bw(lm.multibranch_stem(seq, i, j), kt) * self.pf.scale[2];
        if roll < stem_w {
            return self.sample_qb(i, j, rng);
        }
        Ok(())
    }
}

pub fn sample_structure<R: Rng + ?Sized>(fc: &FoldCompound, pf: &PfTables, rng: &mut R) -> Result<PairTable, FoldError> {
    if fc.options.circular {
        return Err(FoldError::Unsupported(
            "stochastic sampling over a circular ensemble is not implemented".to_string(),
        ));
    }
    let n = fc.len();
    Sampler::new(fc, pf).sample_prefix(n, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::{FoldCompound, FoldOptions};
    use crate::pf::fold_pf;
    use ff_energy::{EnergyTables, NucleotideVec};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::rc::Rc;

    #[test]
    fn test_sampled_structure_is_well_formed() {
        let tables = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from("GGGAAAUCCC").unwrap();
        let fc = FoldCompound::new(nv, tables, FoldOptions::default()).unwrap();
        let pf = fold_pf(&fc).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let pt = sample_structure(&fc, &pf, &mut rng).unwrap();
            assert!(pt.is_well_formed(0, pt.len()));
        }
    }
}
