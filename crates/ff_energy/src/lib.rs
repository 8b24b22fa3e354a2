/// Parameter file parsing & corresponding energy tables (C2).
pub mod parameters;

/// Closed-form loop energy kernels operating directly on encoded sequences (C4).
pub mod loop_energy;

/// Base, NucleotideVec, PairTypeRNA, ....
mod nucleotides;

/// Everything for loop decomosition!
mod loop_decomposition;

pub use nucleotides::*;
pub use loop_decomposition::*;
pub use parameters::{EnergyTables, ParamError};



