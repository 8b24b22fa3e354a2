//! The owning container for one fold problem: an encoded sequence, an
//! immutable parameter snapshot, the constraint set, and configuration.
//! DP tables are filled into separate owned structs (`MfeTables`,
//! `PfTables`) rather than into this struct directly, matching the
//! "by-value ownership per table" redesign note.

use std::rc::Rc;

use ff_constraints::{HardConstraints, SoftConstraints};
use ff_energy::loop_energy::{Dangles, LoopEnergyConfig, LoopEnergyModel};
use ff_energy::{EnergyTables, NucleotideVec};
use ff_gquad::GquadParams;

use crate::error::FoldError;

pub const K0: f64 = 273.15;
pub const GAS_CONST: f64 = 1.98717;

/// Configuration options controlling one fold (spec.md §6).
#[derive(Debug, Clone)]
pub struct FoldOptions {
    pub dangles: Dangles,
    pub temperature: f64,
    pub pf_scale: Option<f64>,
    pub circular: bool,
    pub gquad: bool,
    pub no_gu: bool,
    pub no_closing_gu: bool,
    pub gquad_layer_mismatch: u32,
    pub gquad_layer_mismatch_max: u32,
}

impl Default for FoldOptions {
    fn default() -> Self {
        FoldOptions {
            dangles: Dangles::D2,
            temperature: 37.0,
            pf_scale: None,
            circular: false,
            gquad: false,
            no_gu: false,
            no_closing_gu: false,
            gquad_layer_mismatch: 1,
            gquad_layer_mismatch_max: 1,
        }
    }
}

/// `kT` in kcal/mol, the unit the Boltzmann factor is evaluated in.
pub fn kt(temperature_c: f64) -> f64 {
    GAS_CONST * (temperature_c + K0) / 1000.0
}

pub struct FoldCompound {
    pub sequence: NucleotideVec,
    pub tables: Rc<EnergyTables>,
    pub options: FoldOptions,
    pub hard: HardConstraints,
    pub soft: SoftConstraints,
    pub gquad_params: GquadParams,
}

impl FoldCompound {
    pub fn new(sequence: NucleotideVec, tables: Rc<EnergyTables>, options: FoldOptions) -> Result<Self, FoldError> {
        if sequence.is_empty() {
            return Err(FoldError::EmptySequence);
        }
        let n = sequence.len();
        Ok(FoldCompound {
            hard: HardConstraints::new(n),
            soft: SoftConstraints::new(n),
            sequence,
            tables,
            options,
            gquad_params: GquadParams::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn loop_model(&self) -> LoopEnergyModel<'_> {
        LoopEnergyModel::new(
            &self.tables,
            LoopEnergyConfig {
                dangles: self.options.dangles,
                no_gu: self.options.no_gu,
                no_closing_gu: self.options.no_closing_gu,
                salt_correction: 0.0,
            },
        )
    }

    pub fn kt(&self) -> f64 {
        kt(self.options.temperature)
    }

    /// Conservative default `pf_scale`: `exp(-e_min_per_nt / kT)`, the
    /// standard heuristic using the most favorable stacking energy as an
    /// estimate of the lowest achievable per-nucleotide free energy.
    pub fn default_pf_scale(&self) -> f64 {
        if let Some(s) = self.options.pf_scale {
            return s;
        }
        let e_min_per_nt = self
            .tables
            .stack
            .iter()
            .flatten()
            .filter_map(|v| *v)
            .min()
            .unwrap_or(0) as f64
            / 100.0;
        (-e_min_per_nt / self.kt()).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kt_at_37c() {
        let v = kt(37.0);
        assert!((v - 0.6163).abs() < 0.001);
    }

    #[test]
    fn test_new_rejects_empty_sequence() {
        let tables = Rc::new(EnergyTables::turner2004());
        let seq = NucleotideVec(vec![]);
        let err = FoldCompound::new(seq, tables, FoldOptions::default()).unwrap_err();
        assert!(matches!(err, FoldError::EmptySequence));
    }
}
