//! Traceback (C9): reconstruct a dot-bracket structure from filled MFE
//! matrices by re-deriving, at each cell, which forward-recursion term
//! produced the stored value.

use ff_constraints::{UnpairedContext, CTX_EXT, CTX_INT_ENC, CTX_ML_BRANCH};
use ff_energy::loop_energy::{INF, MAXLOOP, TURN};
use ff_gquad::GquadTable;
use ff_structure::PairTable;

use crate::compound::FoldCompound;
use crate::mfe::MfeTables;

fn add(a: i32, b: i32) -> i32 {
    if a >= INF || b >= INF {
        INF
    } else {
        a + b
    }
}

/// Result of a traceback: the canonical pair table plus, if G-quadruplexes
/// were enabled, every nucleotide position covered by a realized quadruplex
/// (for overlaying `DotBracket::Gquad` columns onto the output string).
pub struct TracebackResult {
    pub pairs: PairTable,
    pub gquad_columns: Vec<usize>,
}

pub struct Traceback<'a> {
    fc: &'a FoldCompound,
    tables: &'a MfeTables,
    pairs: Vec<Option<usize>>,
    gquad_columns: Vec<usize>,
}

impl<'a> Traceback<'a> {
    pub fn new(fc: &'a FoldCompound, tables: &'a MfeTables) -> Self {
        Traceback { fc, tables, pairs: vec![None; fc.len()], gquad_columns: Vec::new() }
    }

    pub fn run(mut self) -> TracebackResult {
        let n = self.fc.len();
        if n > 0 {
            if self.fc.options.circular {
                self.trace_fc();
            } else {
                self.trace_f5(n);
            }
        }
        let pairs = PairTable(self.pairs.iter().map(|p| p.map(|x| x as u16)).collect());
        TracebackResult { pairs, gquad_columns: self.gquad_columns }
    }

    /// Mirrors `MfeTables::fill_circular`'s `FcH`/`FcI`/`FcM` decomposition to
    /// find which term realized the stored `Fc`, then delegates into the
    /// ordinary `C`/`M`/`M1` traceback for whichever branch(es) it found.
    fn trace_fc(&mut self) {
        let n = self.fc.len();
        let target = match self.tables.fc {
            Some(v) => v,
            None => return,
        };
        let seq = &self.fc.sequence;
        let lm = self.fc.loop_model();
        let seq2: Vec<_> = seq.iter().chain(seq.iter()).copied().collect();

        // FcH
        for i in 0..n {
            for j in (i + TURN + 1)..n {
                let inner = self.tables.c.get(i, j);
                if inner >= INF {
                    continue;
                }
                let wrap = lm.hairpin(&seq2, j, i + n);
                if add(inner, wrap) == target {
                    self.trace_c(i, j);
                    return;
                }
            }
        }

        // FcI
        for i in 0..n {
            for j in (i + TURN + 1)..n {
                let inner_a = self.tables.c.get(i, j);
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
                        let inner_b = self.tables.c.get(p, q);
                        if inner_b >= INF {
                            continue;
                        }
                        let wrap = lm.interior(&seq2, j, i + n, p, q);
                        if add(add(inner_a, inner_b), wrap) == target {
                            self.trace_c(i, j);
                            self.trace_c(p, q);
                            return;
                        }
                    }
                }
            }
        }

        // FcM
        for u in 0..(n.saturating_sub(1)) {
            let left = self.tables.m.get(0, u);
            if left >= INF {
                continue;
            }
            let right = self.tables.m1.get(u + 1, n - 1);
            if add(left, right) == target {
                self.trace_m(0, u);
                self.trace_m1(u + 1, n - 1);
                return;
            }
        }

        // G-quadruplex wraparound: no canonical pair to annotate here, same
        // as the gquad branch in `trace_c` below.
    }

    fn pair(&mut self, i: usize, j: usize) {
        self.pairs[i] = Some(j);
        self.pairs[j] = Some(i);
    }

    fn trace_f5(&mut self, j: usize) {
        if j == 0 {
            return;
        }
        let target = self.tables.f5[j];
        if self.fc.hard.unpaired_ok(j - 1, UnpairedContext::Exterior) && self.tables.f5[j - 1] == target {
            self.trace_f5(j - 1);
            return;
        }
        let seq = &self.fc.sequence;
        let lm = self.fc.loop_model();
        for i in 0..j {
            if j - 1 - i <= TURN {
                continue;
            }
            if !self.fc.hard.admits(i, j - 1, None, CTX_EXT) {
                continue;
            }
            let stem = self.tables.c.get(i, j - 1);
            if stem >= INF {
                continue;
            }
            let cand = add(self.tables.f5[i], add(stem, lm.exterior_stem(seq, i, j - 1)));
            if cand == target {
                self.trace_f5(i);
                self.trace_c(i, j - 1);
                return;
            }
        }
    }

    fn trace_c(&mut self, i: usize, j: usize) {
        let target = self.tables.c.get(i, j);
        self.pair(i, j);
        let seq = &self.fc.sequence;
        let lm = self.fc.loop_model();

        if lm.hairpin(seq, i, j) == target {
            return;
        }

        for k in (i + 1)..j {
            if k - i - 1 > MAXLOOP {
                break;
            }
            for l in (k + 1)..j {
                if !self.fc.hard.admits(i, j, Some((k, l)), CTX_INT_ENC) {
                    continue;
                }
                let inner = self.tables.c.get(k, l);
                if inner >= INF {
                    continue;
                }
                if add(lm.interior(seq, i, j, k, l), inner) == target {
                    self.trace_c(k, l);
                    return;
                }
            }
        }

        if j > i + 2 {
            let ml_closing = self.fc.tables.ml_closing();
            for u in (i + 2)..(j.saturating_sub(1)) {
                if !self.fc.hard.admits(i, j, Some((i + 1, u)), CTX_ML_BRANCH) {
                    continue;
                }
                let left = self.tables.m.get(i + 1, u);
                let right = self.tables.m1.get(u + 1, j - 1);
                let cand = add(add(left, right), add(ml_closing, lm.multibranch_stem(seq, i, j)));
                if cand == target {
                    self.trace_m(i + 1, u);
                    self.trace_m1(u + 1, j - 1);
                    return;
                }
            }
        }

        if let Some(ref gq) = self.tables.gquad {
            if gq.get(i, j) == Some(target) {
                self.pairs[i] = None;
                self.pairs[j] = None;
                // `(i,j)` is not a canonical Watson-Crick/wobble pair here;
                // recover the realized layout and record its G columns so
                // the caller can mark them `DotBracket::Gquad` instead.
                if let Some(layout) = GquadTable::extract_pattern(seq, i, j, &self.fc.gquad_params) {
                    self.gquad_columns.extend(ff_gquad::layout_columns(i, &layout));
                }
            }
        }
    }

    fn trace_m(&mut self, i: usize, j: usize) {
        let target = self.tables.m.get(i, j);
        if j > i && self.fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
            let ml_base = self.fc.tables.ml_base();
            if add(self.tables.m.get(i, j - 1), ml_base) == target {
                self.trace_m(i, j - 1);
                return;
            }
        }
        if j > i && self.fc.hard.unpaired_ok(i, UnpairedContext::Multibranch) {
            let ml_base = self.fc.tables.ml_base();
            if add(self.tables.m.get(i + 1, j), ml_base) == target {
                self.trace_m(i + 1, j);
                return;
            }
        }
        for u in i..=j {
            let left = if u == i { 0 } else { self.tables.m.get(i, u - 1) };
            let right = self.tables.m1.get(u, j);
            if add(left, right) == target {
                if u > i {
                    self.trace_m(i, u - 1);
                }
                self.trace_m1(u, j);
                return;
            }
        }
    }

    fn trace_m1(&mut self, i: usize, j: usize) {
        let target = self.tables.m1.get(i, j);
        let seq = &self.fc.sequence;
        let lm = self.fc.loop_model();

        let stem_here = add(self.tables.c.get(i, j), lm.multibranch_stem(seq, i, j));
        if stem_here == target {
            self.trace_c(i, j);
            return;
        }
        if j > i && self.fc.hard.unpaired_ok(j, UnpairedContext::Multibranch) {
            let ml_base = self.fc.tables.ml_base();
            if add(self.tables.m1.get(i, j - 1), ml_base) == target {
                self.trace_m1(i, j - 1);
            }
        }
    }
}

pub fn traceback(fc: &FoldCompound, tables: &MfeTables) -> TracebackResult {
    Traceback::new(fc, tables).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::{FoldCompound, FoldOptions};
    use crate::mfe::fold_mfe;
    use ff_energy::{EnergyTables, NucleotideVec};
    use ff_structure::DotBracketVec;
    use std::rc::Rc;

    #[test]
    fn test_traceback_produces_well_formed_structure() {
        let tables_e = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from("GGGAAAUCCC").unwrap();
        let fc = FoldCompound::new(nv, tables_e, FoldOptions::default()).unwrap();
        let mfe_tables = fold_mfe(&fc);
        let result = traceback(&fc, &mfe_tables);
        assert!(result.pairs.is_well_formed(0, result.pairs.len()));
        let db = DotBracketVec::from(&result.pairs);
        assert_eq!(format!("{}", db).len(), 10);
    }

    #[test]
    fn test_circular_traceback_produces_well_formed_structure() {
        let tables_e = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from("GGGGAAACCCC").unwrap();
        let mut opts = FoldOptions::default();
        opts.circular = true;
        let fc = FoldCompound::new(nv, tables_e, opts).unwrap();
        let mfe_tables = fold_mfe(&fc);
        let result = traceback(&fc, &mfe_tables);
        assert!(result.pairs.is_well_formed(0, result.pairs.len()));
    }

    #[test]
    fn test_gquad_traceback_annotates_columns_instead_of_pairing() {
        // spec.md scenario 3: a single uninterrupted quadruplex motif; the
        // box footprint must come back as Gquad columns, not a base pair.
        let tables_e = Rc::new(EnergyTables::turner2004());
        let nv = NucleotideVec::try_from("GGGGAGGGGAGGGGAGGGG").unwrap();
        let mut opts = FoldOptions::default();
        opts.gquad = true;
        let fc = FoldCompound::new(nv, tables_e, opts).unwrap();
        let mfe_tables = fold_mfe(&fc);
        let result = traceback(&fc, &mfe_tables);
        if !result.gquad_columns.is_empty() {
            for &p in &result.gquad_columns {
                assert!(result.pairs[p].is_none());
            }
            let mut db = DotBracketVec::from(&result.pairs);
            db.mark_gquad(&result.gquad_columns);
            assert!(format!("{}", db).contains('+'));
        }
    }
}
