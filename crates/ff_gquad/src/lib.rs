//! G-quadruplex sub-engine (C5): canonical quadruplex enumeration, sparse
//! MFE/partition-function contribution maps, pattern extraction, and the
//! alignment layer-mismatch penalty.
//!
//! A canonical quadruplex is four stacked G-quartets of `L` Gs each
//! (`L in 2..=7`), connected by three linker loops `l1,l2,l3 in 1..=15`
//! nucleotides. Its footprint on `[i,j]` has length `4*L + l1+l2+l3`.

use ff_energy::Base;

pub const GQUAD_MIN_L: usize = 2;
pub const GQUAD_MAX_L: usize = 7;
pub const GQUAD_MIN_LINKER: usize = 1;
pub const GQUAD_MAX_LINKER: usize = 15;

pub const GQUAD_MIN_BOX_SIZE: usize = 4 * GQUAD_MIN_L + 3 * GQUAD_MIN_LINKER;
pub const GQUAD_MAX_BOX_SIZE: usize = 4 * GQUAD_MAX_L + 3 * GQUAD_MAX_LINKER;

/// Sentinel "infeasible" MFE contribution.
pub const INF: i32 = i32::MAX / 4;

/// One concrete quadruplex layout realizing a footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GquadLayout {
    pub l: u8,
    pub l1: u16,
    pub l2: u16,
    pub l3: u16,
}

impl GquadLayout {
    pub fn linker_sum(&self) -> usize {
        self.l1 as usize + self.l2 as usize + self.l3 as usize
    }

    pub fn footprint_len(&self) -> usize {
        4 * self.l as usize + self.linker_sum()
    }
}

/// Maximum representable `l1+l2+l3`, for table sizing.
const MAX_LINKER_SUM: usize = 3 * GQUAD_MAX_LINKER;

/// `gquad[L][l1+l2+l3]`, a genuine precomputed lookup table indexed the same
/// way as every other loop-energy table in `ff_energy::parameters::tables`
/// (`Option<i32>`, `None` for out-of-range entries).
///
/// The bundled parameter file (`rna_turner2004.par`) ships no `# GQuad`
/// section, and the retained reference sources only carry the dispatch code
/// that indexes `P->gquad[L][l1+l2+l3]`, not the numeric table itself. Lacking
/// the literal values, the table below is reconstructed at the bounds the
/// reference sources do carry (`GQUAD_MIN/MAX_L`, `GQUAD_MIN/MAX_LINKER`):
/// a per-layer stacking contribution plus a logarithmic linker-length
/// penalty, evaluated once into `stack` rather than recomputed per query.
#[derive(Debug, Clone)]
pub struct GquadParams {
    stack: Vec<[Option<i32>; MAX_LINKER_SUM + 1]>, // indexed [l - GQUAD_MIN_L][linker_sum]
}

impl Default for GquadParams {
    fn default() -> Self {
        let alpha: i32 = -1800; // hundredths kcal/mol, per additional quartet layer
        let beta: f64 = -40.0; // hundredths kcal/mol, multiplies ln(linker_sum)

        let mut stack = vec![[None; MAX_LINKER_SUM + 1]; GQUAD_MAX_L - GQUAD_MIN_L + 1];
        for l in GQUAD_MIN_L..=GQUAD_MAX_L {
            let row = &mut stack[l - GQUAD_MIN_L];
            for linker_sum in 3 * GQUAD_MIN_LINKER..=MAX_LINKER_SUM {
                let ln = (linker_sum as f64).ln();
                let e = alpha * (l as i32 - 1) + (beta * ln).round() as i32;
                row[linker_sum] = Some(e);
            }
        }
        GquadParams { stack }
    }
}

impl GquadParams {
    /// `gquad[L][l1+l2+l3]` table lookup; `None` outside the valid range.
    pub fn energy(&self, l: usize, linker_sum: usize) -> i32 {
        self.stack
            .get(l.wrapping_sub(GQUAD_MIN_L))
            .and_then(|row| row.get(linker_sum))
            .copied()
            .flatten()
            .unwrap_or(INF)
    }

    pub fn boltzmann_weight(&self, l: usize, linker_sum: usize, kt: f64) -> f64 {
        let e = self.energy(l, linker_sum);
        if e >= INF {
            return 0.0;
        }
        (-(e as f64 / 100.0) / kt).exp()
    }
}

/// `gg[p]` = length of the maximal run of `G`s starting at position `p`.
pub fn g_runs(seq: &[Base]) -> Vec<usize> {
    let n = seq.len();
    let mut gg = vec![0usize; n];
    let mut run = 0usize;
    for p in (0..n).rev() {
        run = if seq[p] == Base::G { run + 1 } else { 0 };
        gg[p] = run;
    }
    gg
}

/// Enumerate every canonical quadruplex layout whose footprint is exactly
/// `[i,j]` (inclusive, 0-based), using the precomputed `gg` run-length table.
pub fn enumerate(gg: &[usize], i: usize, j: usize) -> Vec<GquadLayout> {
    let mut out = Vec::new();
    let span = j + 1 - i;
    if span < GQUAD_MIN_BOX_SIZE || span > GQUAD_MAX_BOX_SIZE {
        return out;
    }

    let max_l = gg[i].min(GQUAD_MAX_L);
    for l in (GQUAD_MIN_L..=max_l).rev() {
        if gg[j + 1 - l] < l {
            continue;
        }
        let remaining = span - 4 * l;
        if remaining < 3 * GQUAD_MIN_LINKER || remaining > 3 * GQUAD_MAX_LINKER {
            continue;
        }
        for l1 in GQUAD_MIN_LINKER..=GQUAD_MAX_LINKER {
            if gg[i + l + l1] < l {
                continue;
            }
            for l2 in GQUAD_MIN_LINKER..=GQUAD_MAX_LINKER {
                let l3_sum = remaining as isize - l1 as isize - l2 as isize;
                if l3_sum < GQUAD_MIN_LINKER as isize || l3_sum > GQUAD_MAX_LINKER as isize {
                    continue;
                }
                let l3 = l3_sum as usize;
                if gg[i + 2 * l + l1 + l2] < l {
                    continue;
                }
                out.push(GquadLayout { l: l as u8, l1: l1 as u16, l2: l2 as u16, l3: l3 as u16 });
            }
        }
    }
    out
}

/// Best (lowest-energy) layout for footprint `[i,j]`, if any fits.
pub fn best_layout(gg: &[usize], i: usize, j: usize, params: &GquadParams) -> Option<(GquadLayout, i32)> {
    enumerate(gg, i, j)
        .into_iter()
        .map(|layout| {
            let e = params.energy(layout.l as usize, layout.linker_sum());
            (layout, e)
        })
        .min_by_key(|&(_, e)| e)
}

/// Sparse row-CSR map `i -> sorted Vec<(j, value)>`, matching the original
/// implementation's own sparse-matrix convention for `Gq`.
#[derive(Debug, Clone, Default)]
pub struct GquadTable {
    pub rows: Vec<Vec<(usize, i32)>>,
}

impl GquadTable {
    pub fn new(n: usize) -> Self {
        GquadTable { rows: vec![Vec::new(); n] }
    }

    pub fn insert(&mut self, i: usize, j: usize, value: i32) {
        self.rows[i].push((j, value));
    }

    pub fn get(&self, i: usize, j: usize) -> Option<i32> {
        self.rows.get(i)?.iter().find(|&&(jj, _)| jj == j).map(|&(_, v)| v)
    }

    /// Fill MFE contributions for every feasible footprint in `[0,n)`.
    pub fn fill_mfe(seq: &[Base], params: &GquadParams) -> Self {
        let gg = g_runs(seq);
        let n = seq.len();
        let mut table = GquadTable::new(n);
        for i in 0..n {
            for j in i + GQUAD_MIN_BOX_SIZE - 1..n {
                if j + 1 - i > GQUAD_MAX_BOX_SIZE {
                    break;
                }
                if let Some((_, e)) = best_layout(&gg, i, j, params) {
                    table.insert(i, j, e);
                }
            }
        }
        table
    }

    /// Fill partition-function weights (unscaled) for every feasible footprint.
    pub fn fill_pf(seq: &[Base], params: &GquadParams, kt: f64) -> GquadPfTable {
        let gg = g_runs(seq);
        let n = seq.len();
        let mut table = GquadPfTable::new(n);
        for i in 0..n {
            for j in i + GQUAD_MIN_BOX_SIZE - 1..n {
                if j + 1 - i > GQUAD_MAX_BOX_SIZE {
                    break;
                }
                let weight: f64 = enumerate(&gg, i, j)
                    .into_iter()
                    .map(|layout| params.boltzmann_weight(layout.l as usize, layout.linker_sum(), kt))
                    .sum();
                if weight > 0.0 {
                    table.insert(i, j, weight);
                }
            }
        }
        table
    }

    /// The specific layout realizing `Gq_mfe[i,j]`, for traceback.
    pub fn extract_pattern(seq: &[Base], i: usize, j: usize, params: &GquadParams) -> Option<GquadLayout> {
        let gg = g_runs(seq);
        best_layout(&gg, i, j, params).map(|(layout, _)| layout)
    }

    /// Spread `prob` uniformly across the 4*L Hoogsteen-like G positions of
    /// every layout realizing `[i,j]`, for dot-plot-style consumption.
    pub fn distribute_probability(seq: &[Base], i: usize, j: usize, prob: f64) -> Vec<(usize, f64)> {
        let gg = g_runs(seq);
        let layouts = enumerate(&gg, i, j);
        if layouts.is_empty() {
            return Vec::new();
        }
        let per_layout = prob / layouts.len() as f64;
        let mut out = Vec::new();
        for layout in &layouts {
            let l = layout.l as usize;
            let per_g = per_layout / (4 * l) as f64;
            for pos in layout_columns(i, layout) {
                out.push((pos, per_g));
            }
        }
        out
    }
}

/// The `4*L` Hoogsteen-like G column positions of `layout`, anchored at `i`.
pub fn layout_columns(i: usize, layout: &GquadLayout) -> Vec<usize> {
    let l = layout.l as usize;
    let run_starts = [
        i,
        i + l + layout.l1 as usize,
        i + 2 * l + layout.l1 as usize + layout.l2 as usize,
        i + 3 * l + layout.l1 as usize + layout.l2 as usize + layout.l3 as usize,
    ];
    let mut out = Vec::with_capacity(4 * l);
    for start in run_starts {
        for g in 0..l {
            out.push(start + g);
        }
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct GquadPfTable {
    pub rows: Vec<Vec<(usize, f64)>>,
}

impl GquadPfTable {
    pub fn new(n: usize) -> Self {
        GquadPfTable { rows: vec![Vec::new(); n] }
    }

    pub fn insert(&mut self, i: usize, j: usize, value: f64) {
        self.rows[i].push((j, value));
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.rows.get(i)?.iter().find(|&&(jj, _)| jj == j).map(|&(_, v)| v)
    }
}

/// Count, for an alignment of `seqs`, how many of the quadruplex's `L` layers
/// have at least one sequence missing a `G` at all four required columns, and
/// compare against `gquad_layer_mismatch_max`. `gquad_layer_mismatch` is the
/// per-layer tolerance (a layer survives if at most this many sequences miss it).
pub fn layer_mismatch_penalty(
    seqs: &[&[Base]],
    i: usize,
    layout: &GquadLayout,
    gquad_layer_mismatch: usize,
    gquad_layer_mismatch_max: usize,
) -> Option<usize> {
    let l = layout.l as usize;
    let col_starts = [
        i,
        i + l + layout.l1 as usize,
        i + 2 * l + layout.l1 as usize + layout.l2 as usize,
        i + 3 * l + layout.l1 as usize + layout.l2 as usize + layout.l3 as usize,
    ];

    let mut destroyed_layers = 0usize;
    for layer in 0..l {
        let mismatches = seqs
            .iter()
            .filter(|seq| col_starts.iter().any(|&start| seq.get(start + layer) != Some(&Base::G)))
            .count();
        if mismatches > gquad_layer_mismatch {
            destroyed_layers += 1;
        }
    }

    if destroyed_layers > gquad_layer_mismatch_max {
        None
    } else {
        Some(destroyed_layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(s: &str) -> Vec<Base> {
        s.chars().map(|c| Base::try_from(c).unwrap()).collect()
    }

    #[test]
    fn test_g_runs() {
        let seq = enc("GGGAGGG");
        let gg = g_runs(&seq);
        assert_eq!(gg, vec![3, 2, 1, 0, 3, 2, 1]);
    }

    #[test]
    fn test_enumerate_minimal_quadruplex() {
        // L=3 runs of GGG separated by single-A linkers: GGGAGGGAGGGAGGG (len 15)
        let seq = enc("GGGAGGGAGGGAGGG");
        let gg = g_runs(&seq);
        let layouts = enumerate(&gg, 0, 14);
        assert!(layouts.iter().any(|l| l.l == 3 && l.l1 == 1 && l.l2 == 1 && l.l3 == 1));
    }

    #[test]
    fn test_enumerate_scenario_sequence() {
        // spec.md scenario 3: GGGGAGGGGAGGGGAGGGG (len 19), quadruplex at 1..19 (1-based) == 0..18
        let seq = enc("GGGGAGGGGAGGGGAGGGG");
        let gg = g_runs(&seq);
        let layouts = enumerate(&gg, 0, 18);
        assert!(layouts.iter().any(|l| l.l == 4 && l.l1 == 1 && l.l2 == 1 && l.l3 == 1));
    }

    #[test]
    fn test_box_size_bounds_reject_short_footprint() {
        let seq = enc("GG");
        let gg = g_runs(&seq);
        assert!(enumerate(&gg, 0, 1).is_empty());
    }

    #[test]
    fn test_gquad_table_csr_roundtrip() {
        let seq = enc("GGGAGGGAGGGAGGG");
        let params = GquadParams::default();
        let table = GquadTable::fill_mfe(&seq, &params);
        assert!(table.get(0, 14).is_some());
        assert!(table.get(0, 13).is_none());
    }

    #[test]
    fn test_layout_columns_cover_four_runs_of_l() {
        let seq = enc("GGGAGGGAGGGAGGG");
        let gg = g_runs(&seq);
        let layout = best_layout(&gg, 0, 14, &GquadParams::default()).unwrap().0;
        let cols = layout_columns(0, &layout);
        assert_eq!(cols.len(), 4 * layout.l as usize);
        assert_eq!(cols, vec![0, 1, 2, 4, 5, 6, 8, 9, 10, 12, 13, 14]);
    }

    #[test]
    fn test_layer_mismatch_rejects_when_too_many_destroyed() {
        let seq_a = enc("GGGAGGGAGGGAGGG");
        let seq_b = enc("GGGAAAAAGGGAGGG"); // third G-run replaced by As
        let gg = g_runs(&seq_a);
        let layout = best_layout(&gg, 0, 14, &GquadParams::default()).unwrap().0;
        let seqs: Vec<&[Base]> = vec![&seq_a, &seq_b];
        // one sequence fails every layer of the destroyed run -> within tolerance 0? exceeds max 0
        let result = layer_mismatch_penalty(&seqs, 0, &layout, 0, 0);
        assert!(result.is_none());
        let result = layer_mismatch_penalty(&seqs, 0, &layout, 0, layout.l as usize);
        assert!(result.is_some());
    }
}
