//! # fuzzyfold
//!
//! The main entry point for the fuzzyfold nucleic acid folding package, with
//! interfaces to multiple crates that are organized as a workspace. At this
//! level, you can also find argument parsers for the binaries shipped with the
//! fuzzyfold package.
//!
//! This crate re-exports the main functionality from its submodules.


/// Exposing fuzzyfold::structure. A collection of practical data structures
/// for RNA structure representations.
pub mod structure {
    pub use ::ff_structure::*;
}

/// Exposing fuzzyfold::energy. Handling of nucleotide sequences, nearest
/// neighbor loop decompositions and closed-form loop energy kernels.
pub mod energy {
    pub use ::ff_energy::*;
}

/// Exposing fuzzyfold::constraints. Hard/soft constraints and SHAPE/DMS
/// probing-data conversion.
pub mod constraints {
    pub use ::ff_constraints::*;
}

/// Exposing fuzzyfold::fold. The MFE/partition-function DP, base-pair
/// probabilities, stochastic sampling, and traceback.
pub mod fold {
    pub use ::ff_fold::*;
}

/// Exposing fuzzyfold::fold2d. The distance-class (2D) folding extension.
pub mod fold2d {
    pub use ::ff_fold2d::*;
}

/// Various flavors of handling sequence/structure input.
pub mod input_parsers;

/// Exposing the currently supported parameters of fuzzyfold's energy models.
pub mod energy_parsers;
