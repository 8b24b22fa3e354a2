//! Per-`(i,j)` distance-class feasibility statistics (spec.md §3, §4.6):
//! `referenceBPs_s[i,j]`, `mm_s[i,j]` (maximum matching on `[i,j]` forbidding
//! `R_s`'s own pairs), and the resulting per-cell `k_max`/`l_max` upper bounds
//! the forward fill uses to decide whether a composed bucket overflows.

use ff_constraints::Reference;
use ff_energy::loop_energy::TURN;
use ff_energy::{Base, PairTypeRNA};
use ff_fold::TriMatrix;

/// Statistics for one reference structure, precomputed once per sequence.
pub struct ReferenceStats {
    /// Number of `R_s` pairs with both endpoints inside `[i,j]`.
    pub ref_bps: TriMatrix<u32>,
    /// Maximum matching achievable on `[i,j]` while never forming a pair
    /// that is already in `R_s` -- the largest distance `[i,j]` can
    /// contribute beyond `ref_bps[i,j]`.
    pub mm: TriMatrix<u32>,
}

impl ReferenceStats {
    pub fn compute(seq: &[Base], reference: &Reference) -> Self {
        let n = seq.len();
        let mut ref_bps = TriMatrix::new(n, 0u32);
        // ref_bps[i][j] = ref_bps[i+1][j] + 1{i opens a R_s pair ending <= j}
        for i in (0..n).rev() {
            for j in i..n {
                let mut v = if i + 1 <= j { ref_bps.get(i + 1, j) } else { 0 };
                if let Some(p) = reference.pair_table[i] {
                    let p = p as usize;
                    if p > i && p <= j {
                        v += 1;
                    }
                }
                ref_bps.set(i, j, v);
            }
        }

        let mut mm = TriMatrix::new(n, 0u32);
        for i in (0..n).rev() {
            for j in i..n {
                if j <= i {
                    mm.set(i, j, 0);
                    continue;
                }
                let mut best = mm.get(i + 1, j); // i left unpaired
                if j - i > TURN {
                    for k in (i + TURN + 1)..=j {
                        let pt = PairTypeRNA::from((seq[i], seq[k]));
                        if !pt.can_pair() {
                            continue;
                        }
                        if reference.pair_table[i] == Some(k as u16) {
                            // forming R_s's own pair does not increase distance
                            continue;
                        }
                        let inner = if k > i + 1 { mm.get(i + 1, k - 1) } else { 0 };
                        let outer = if k < j { mm.get(k + 1, j) } else { 0 };
                        let cand = inner + outer + 1;
                        if cand > best {
                            best = cand;
                        }
                    }
                }
                mm.set(i, j, best);
            }
        }

        ReferenceStats { ref_bps, mm }
    }

    /// Maximum base-pair distance to `R_s` attainable on `[i,j]`.
    pub fn max_distance(&self, i: usize, j: usize) -> u32 {
        self.ref_bps.get(i, j) + self.mm.get(i, j)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_energy::NucleotideVec;
    use ff_structure::PairTable;

    #[test]
    fn test_ref_bps_counts_enclosed_pairs() {
        let seq = NucleotideVec::try_from("GCGCAAGCGC").unwrap();
        let db = PairTable::try_from("((((..))))").unwrap();
        let reference = Reference::new(&seq, &db).unwrap();
        let stats = ReferenceStats::compute(&seq.0, &reference);
        assert_eq!(stats.ref_bps.get(0, 9), 4);
        assert_eq!(stats.ref_bps.get(2, 7), 2);
    }

    #[test]
    fn test_max_distance_zero_for_unstructured_reference() {
        let seq = NucleotideVec::try_from("AAAAAAAAAA").unwrap();
        let db = PairTable::try_from("..........").unwrap();
        let reference = Reference::new(&seq, &db).unwrap();
        let stats = ReferenceStats::compute(&seq.0, &reference);
        // poly-A cannot form any pair at all, so max attainable distance is 0
        assert_eq!(stats.max_distance(0, 9), 0);
    }

    #[test]
    fn test_max_distance_nonzero_when_alternate_pairs_exist() {
        let seq = NucleotideVec::try_from("GCGCAAGCGC").unwrap();
        let db = PairTable::try_from("..........").unwrap();
        let reference = Reference::new(&seq, &db).unwrap();
        let stats = ReferenceStats::compute(&seq.0, &reference);
        assert!(stats.max_distance(0, 9) > 0);
    }
}
