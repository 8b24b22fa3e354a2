mod parsing;
mod tables;

pub use parsing::{ParamFileSection, SectionParser};
pub use tables::{EnergyTables, ParamError};

/// Bundled Turner-2004-format parameter set at 37C, embedded at compile time.
pub const TURNER2004_PAR: &str = include_str!("../../params/rna_turner2004.par");

impl EnergyTables {
    /// Load the bundled 37C parameter set.
    pub fn turner2004() -> Self {
        Self::from_str_data(TURNER2004_PAR)
            .expect("bundled rna_turner2004.par must parse")
    }
}
