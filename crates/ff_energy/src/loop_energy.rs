//! Closed-form loop energy kernels (C4): hairpin, interior/bulge/stack, and the
//! exterior-/multi-branch-stem contributions under a configurable dangle model.
//!
//! These are the per-decomposition "cost of one step" functions the DP engines
//! in `ff_fold` call once per cell; unlike `LoopEnergyModel::energy_of_structure`
//! (which walks a fully decomposed structure) these take raw sequence positions
//! so the DP can call them inside a tight `i..j` / `k..l` loop.

use crate::{Base, PairTypeRNA};
use crate::parameters::EnergyTables;
use crate::{LoopDecomposition, NearestNeighborLoop};

/// Minimum number of unpaired bases between hairpin-pairing partners.
pub const TURN: usize = 3;

/// Tabulated loop lengths run 0..=30; lengths beyond this use the logarithmic
/// extrapolation `round(lxc37 * ln(n/30))` added to the `[30]` entry.
pub const MAXLOOP: usize = 30;

/// `dangles` configuration option (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dangles {
    /// No dangling ends or mismatches are considered.
    D0,
    /// Take the minimum over {none, 5', 3'} dangle variants (no simultaneous both-side).
    D1,
    /// Always add the terminal-mismatch energy on both sides of a stem.
    D2,
    /// Like `D1`, but additionally allows the simultaneous both-sides variant.
    D3,
}

impl Dangles {
    pub fn from_u8(d: u8) -> Self {
        match d {
            0 => Dangles::D0,
            1 => Dangles::D1,
            2 => Dangles::D2,
            3 => Dangles::D3,
            other => panic!("invalid dangles setting: {other} (must be 0..=3)"),
        }
    }
}

/// Configuration shared by every loop-energy call for one `fold_compound`.
#[derive(Debug, Clone, Copy)]
pub struct LoopEnergyConfig {
    pub dangles: Dangles,
    pub no_gu: bool,
    pub no_closing_gu: bool,
    /// Non-default salt correction is an explicit Open Question (spec.md §9b);
    /// this hook always evaluates to 0 -- there is no closed-form model wired up.
    pub salt_correction: f64,
}

impl Default for LoopEnergyConfig {
    fn default() -> Self {
        LoopEnergyConfig {
            dangles: Dangles::D2,
            no_gu: false,
            no_closing_gu: false,
            salt_correction: 0.0,
        }
    }
}

/// Sentinel "infinitely bad" energy for hard-forbidden decompositions (spec.md §7).
pub const INF: i32 = i32::MAX / 4;

fn is_ru(pt: PairTypeRNA) -> bool {
    matches!(pt, PairTypeRNA::AU | PairTypeRNA::UA | PairTypeRNA::GU | PairTypeRNA::UG)
}

/// `round(lxc37 * ln(n/30))`, the canonical (non-provisional) extrapolation formula.
fn loop_extrapolation(lxc37: f64, n: usize) -> i32 {
    (lxc37 * ((n as f64) / (MAXLOOP as f64)).ln()).round() as i32
}

pub struct LoopEnergyModel<'t> {
    pub tables: &'t EnergyTables,
    pub config: LoopEnergyConfig,
}

impl<'t> LoopEnergyModel<'t> {
    pub fn new(tables: &'t EnergyTables, config: LoopEnergyConfig) -> Self {
        LoopEnergyModel { tables, config }
    }

    /// Whether `(a,b)` may pair at all under the current `noGU` setting.
    pub fn pair_allowed(&self, a: Base, b: Base) -> bool {
        let pt = PairTypeRNA::from((a, b));
        if pt == PairTypeRNA::NN {
            return false;
        }
        if self.config.no_gu && pt.is_wobble() {
            return false;
        }
        true
    }

    fn closing_gu_ok(&self, pt: PairTypeRNA) -> bool {
        !(self.config.no_closing_gu && pt.is_wobble())
    }

    fn terminal_au(&self, pt: PairTypeRNA) -> i32 {
        if is_ru(pt) { self.tables.terminal_au() } else { 0 }
    }

    /// Energy of the hairpin loop closed by `(i,j)` on encoded sequence `seq`
    /// (0-based, `seq[i]`/`seq[j]` are the closing pair).
    pub fn hairpin(&self, seq: &[Base], i: usize, j: usize) -> i32 {
        let t = PairTypeRNA::from((seq[i], seq[j]));
        if !t.can_pair() || !self.closing_gu_ok(t) {
            return INF;
        }
        let n = j - i - 1;
        if n < TURN {
            return INF;
        }

        if n <= 6 {
            if let Some(&(en37, _)) = self.tables.hairpin_sequences.get(&seq[i..=j]) {
                return en37;
            }
        }

        let mut en = if n <= MAXLOOP {
            match self.tables.hairpin[n] {
                Some(v) => v,
                None => return INF,
            }
        } else {
            let base = self.tables.hairpin[MAXLOOP].unwrap_or(0);
            base + loop_extrapolation(self.tables.lxc37(), n)
        };

        if n == TURN {
            en += self.terminal_au(t);
        } else {
            en += self.tables.mismatch_hairpin[t as usize][seq[i + 1] as usize][seq[j - 1] as usize]
                .unwrap_or(0);
        }
        en + self.config.salt_correction.round() as i32
    }

    fn ninio(&self, n1: usize, n2: usize) -> i32 {
        let diff = (n1 as i32 - n2 as i32).unsigned_abs() as i32;
        (diff * self.tables.ninio_m()).min(self.tables.max_ninio())
    }

    /// Energy of the interior/bulge/stack loop closed by `(i,j)` and enclosing
    /// `(k,l)` with `i<k<l<j`.
    pub fn interior(&self, seq: &[Base], i: usize, j: usize, k: usize, l: usize) -> i32 {
        let t1 = PairTypeRNA::from((seq[i], seq[j]));
        let t2 = PairTypeRNA::from((seq[l], seq[k]));
        if !t1.can_pair() || !t2.can_pair() {
            return INF;
        }
        if !self.closing_gu_ok(t1) || !self.closing_gu_ok(t2) {
            return INF;
        }

        let n1 = k - i - 1;
        let n2 = j - l - 1;

        let en = match (n1, n2) {
            (0, 0) => {
                self.tables.stack[t1 as usize][t2 as usize].unwrap_or(0)
            }
            (0, _) | (_, 0) => {
                let m = n1.max(n2);
                let base = if m <= MAXLOOP {
                    self.tables.bulge[m].unwrap_or(0)
                } else {
                    self.tables.bulge[MAXLOOP].unwrap_or(0) + loop_extrapolation(self.tables.lxc37(), m)
                };
                if m == 1 {
                    base + self.tables.stack[t1 as usize][t2 as usize].unwrap_or(0)
                } else {
                    base + self.terminal_au(t1) + self.terminal_au(t2)
                }
            }
            (1, 1) => self.tables.int11[t1 as usize][t2 as usize][seq[i + 1] as usize][seq[j - 1] as usize].unwrap_or(0),
            (1, 2) => self.tables.int21[t2 as usize][t1 as usize][seq[l + 1] as usize][seq[l + 2] as usize][seq[i + 1] as usize].unwrap_or(0),
            (2, 1) => self.tables.int21[t1 as usize][t2 as usize][seq[i + 1] as usize][seq[i + 2] as usize][seq[j - 1] as usize].unwrap_or(0),
            (2, 2) => {
                // int22 never tabulates an `N`-containing entry; fall back to 0
                // for non-canonical bases rather than indexing out of bounds.
                if [seq[i + 1], seq[i + 2], seq[j - 2], seq[j - 1]].iter().any(|b| *b == Base::N) {
                    0
                } else {
                    self.tables.int22[t1 as usize][t2 as usize]
                        [seq[i + 1] as usize][seq[i + 2] as usize]
                        [seq[j - 2] as usize][seq[j - 1] as usize].unwrap_or(0)
                }
            }
            (n1, n2) if n1.min(n2) == 1 && n1.max(n2) >= 3 => {
                let nsum = n1 + n2;
                let base = if nsum <= MAXLOOP {
                    self.tables.interior[nsum].unwrap_or(0)
                } else {
                    self.tables.interior[MAXLOOP].unwrap_or(0) + loop_extrapolation(self.tables.lxc37(), nsum)
                };
                base + self.ninio(n1, n2)
                     + self.tables.mismatch_interior_1n[t1 as usize][seq[i + 1] as usize][seq[j - 1] as usize].unwrap_or(0)
                     + self.tables.mismatch_interior_1n[t2 as usize][seq[l + 1] as usize][seq[k - 1] as usize].unwrap_or(0)
            }
            ((2, 3) | (3, 2)) => {
                let base = self.tables.interior[5].unwrap_or(0);
                base + self.ninio(n1, n2)
                     + self.tables.mismatch_interior_23[t1 as usize][seq[i + 1] as usize][seq[j - 1] as usize].unwrap_or(0)
                     + self.tables.mismatch_interior_23[t2 as usize][seq[l + 1] as usize][seq[k - 1] as usize].unwrap_or(0)
            }
            (n1, n2) => {
                let nsum = n1 + n2;
                let base = if nsum <= MAXLOOP {
                    self.tables.interior[nsum].unwrap_or(0)
                } else {
                    self.tables.interior[MAXLOOP].unwrap_or(0) + loop_extrapolation(self.tables.lxc37(), nsum)
                };
                base + self.ninio(n1, n2)
                     + self.tables.mismatch_interior[t1 as usize][seq[i + 1] as usize][seq[j - 1] as usize].unwrap_or(0)
                     + self.tables.mismatch_interior[t2 as usize][seq[l + 1] as usize][seq[k - 1] as usize].unwrap_or(0)
            }
        };

        en + self.config.salt_correction.round() as i32
    }

    /// Mismatch/dangle contribution of a stem closed by `(i,j)` with the given
    /// exterior/multi-branch mismatch table, using neighboring bases `left`
    /// (position `i-1`, if it exists and is free to dangle) and `right`
    /// (position `j+1`).
    fn stem_dangle(
        &self,
        t: PairTypeRNA,
        left: Option<Base>,
        right: Option<Base>,
        mismatch: &[[[Option<i32>; 5]; 5]; 7],
        dangle5: &[[Option<i32>; 5]; 7],
        dangle3: &[[Option<i32>; 5]; 7],
    ) -> i32 {
        match self.config.dangles {
            Dangles::D0 => 0,
            Dangles::D2 => match (left, right) {
                (Some(b5), Some(b3)) => mismatch[t as usize][b5 as usize][b3 as usize].unwrap_or(0),
                (Some(b5), None) => dangle5[t as usize][b5 as usize].unwrap_or(0),
                (None, Some(b3)) => dangle3[t as usize][b3 as usize].unwrap_or(0),
                (None, None) => 0,
            },
            Dangles::D1 | Dangles::D3 => {
                let mut best = 0; // no dangle
                if let Some(b5) = left {
                    best = best.min(dangle5[t as usize][b5 as usize].unwrap_or(0));
                }
                if let Some(b3) = right {
                    best = best.min(dangle3[t as usize][b3 as usize].unwrap_or(0));
                }
                if matches!(self.config.dangles, Dangles::D3) {
                    if let (Some(b5), Some(b3)) = (left, right) {
                        best = best.min(mismatch[t as usize][b5 as usize][b3 as usize].unwrap_or(0));
                    }
                }
                best
            }
        }
    }

    /// Exterior-loop contribution of a stem closed by `(i,j)`, given the
    /// sequence positions immediately outside it (`None` at a sequence end).
    pub fn exterior_stem(&self, seq: &[Base], i: usize, j: usize) -> i32 {
        let t = PairTypeRNA::from((seq[i], seq[j]));
        let left = i.checked_sub(1).map(|p| seq[p]);
        let right = seq.get(j + 1).copied();
        let dangle = self.stem_dangle(
            t, left, right,
            &self.tables.mismatch_exterior,
            &self.tables.dangle5,
            &self.tables.dangle3,
        );
        dangle + self.terminal_au(t)
    }

    /// Multi-branch-loop contribution of a stem closed by `(i,j)`.
    pub fn multibranch_stem(&self, seq: &[Base], i: usize, j: usize) -> i32 {
        let t = PairTypeRNA::from((seq[i], seq[j]));
        let left = i.checked_sub(1).map(|p| seq[p]);
        let right = seq.get(j + 1).copied();
        let dangle = self.stem_dangle(
            t, left, right,
            &self.tables.mismatch_multi,
            &self.tables.dangle5,
            &self.tables.dangle3,
        );
        dangle + self.terminal_au(t) + self.tables.ml_intern()
    }

    /// Energy of one already-classified loop (spec.md §4.1); this is the
    /// per-loop building block `energy_of_structure` sums over.
    pub fn energy_of_loop(&self, seq: &[Base], nn_loop: &NearestNeighborLoop) -> i32 {
        match nn_loop {
            NearestNeighborLoop::Hairpin { closing: (i, j) } => self.hairpin(seq, *i, *j),
            NearestNeighborLoop::Interior { closing: (i, j), inner: (k, l) } => {
                self.interior(seq, *i, *j, *k, *l)
            }
            NearestNeighborLoop::Multibranch { closing: (i, j), branches } => {
                let mut en = add(self.tables.ml_closing(), self.multibranch_stem(seq, *i, *j));
                for &(p, q) in branches {
                    en = add(en, self.multibranch_stem(seq, p, q));
                }
                en += self.tables.ml_base() * nn_loop.unpaired_indices(seq.len()).len() as i32;
                en
            }
            NearestNeighborLoop::Exterior { branches } => {
                branches.iter().fold(0, |en, &(p, q)| add(en, self.exterior_stem(seq, p, q)))
            }
        }
    }

    /// Total free energy of a fully paired structure, by decomposing it into
    /// its constituent loops and summing `energy_of_loop` over each
    /// (spec.md §4.1-4.2, the static, non-DP counterpart of `ff_fold::fold_mfe`).
    pub fn energy_of_structure<T: LoopDecomposition>(&self, seq: &[Base], structure: &T) -> i32 {
        let mut total = 0;
        structure.for_each_loop(|l| total = add(total, self.energy_of_loop(seq, l)));
        total
    }
}

fn add(a: i32, b: i32) -> i32 {
    if a >= INF || b >= INF {
        INF
    } else {
        a + b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EnergyTables;

    fn model() -> EnergyTables {
        EnergyTables::turner2004()
    }

    #[test]
    fn test_hairpin_matches_tabulated_ggg_c_loop() {
        let tables = model();
        let lm = LoopEnergyModel::new(&tables, LoopEnergyConfig::default());
        let seq: Vec<Base> = "GGGAAAUCCC".chars().map(|c| Base::try_from(c).unwrap()).collect();
        // (i,j) = (0,9): G...C, closing pair GC? actually G-C here is G (0) and C (9)
        let e = lm.hairpin(&seq, 2, 7);
        assert!(e < INF);
    }

    #[test]
    fn test_hairpin_below_turn_is_infeasible() {
        let tables = model();
        let lm = LoopEnergyModel::new(&tables, LoopEnergyConfig::default());
        let seq: Vec<Base> = "GGGGGG".chars().map(|c| Base::try_from(c).unwrap()).collect();
        assert_eq!(lm.hairpin(&seq, 0, 3), INF);
    }

    #[test]
    fn test_interior_stack() {
        let tables = model();
        let lm = LoopEnergyModel::new(&tables, LoopEnergyConfig::default());
        let seq: Vec<Base> = "CGCG".chars().map(|c| Base::try_from(c).unwrap()).collect();
        let e = lm.interior(&seq, 0, 3, 1, 2);
        assert_eq!(e, tables.stack[PairTypeRNA::CG as usize][PairTypeRNA::CG as usize].unwrap());
    }

    #[test]
    fn test_no_closing_gu_rejects() {
        let tables = model();
        let mut cfg = LoopEnergyConfig::default();
        cfg.no_closing_gu = true;
        let lm = LoopEnergyModel::new(&tables, cfg);
        let seq: Vec<Base> = "GAAAAU".chars().map(|c| Base::try_from(c).unwrap()).collect();
        assert_eq!(lm.hairpin(&seq, 0, 5), INF);
    }

    #[test]
    fn test_energy_of_structure_sums_hairpin_and_exterior() {
        use ff_structure::PairTable;

        let tables = model();
        let lm = LoopEnergyModel::new(&tables, LoopEnergyConfig::default());
        let dbn = ".(.....).";
        let seq: Vec<Base> = "CGGAAAACG".chars().map(|c| Base::try_from(c).unwrap()).collect();
        assert_eq!(seq.len(), dbn.len());
        let pt = PairTable::try_from(dbn).expect("valid");

        let expected = add(lm.hairpin(&seq, 1, 7), lm.exterior_stem(&seq, 1, 7));
        let total = lm.energy_of_structure(&seq, &pt);
        assert_eq!(total, expected);
    }

    #[test]
    fn test_energy_of_loop_matches_energy_of_structure_per_loop() {
        use ff_structure::PairTable;

        let tables = model();
        let lm = LoopEnergyModel::new(&tables, LoopEnergyConfig::default());
        let dbn = ".(.((...))()((()))).((...()))";
        let seq: Vec<Base> = "CGGACGGCAGCCGCGCCGGCGCCGGCAGC"[..dbn.len()]
            .chars()
            .map(|c| Base::try_from(c).unwrap())
            .collect();
        let pt = PairTable::try_from(dbn).expect("valid");

        let mut summed = 0;
        pt.for_each_loop(|l| summed = add(summed, lm.energy_of_loop(&seq, l)));
        assert_eq!(summed, lm.energy_of_structure(&seq, &pt));
    }
}
