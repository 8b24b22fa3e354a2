//! Hard and soft decomposition constraints (C3): admissibility masks the DP
//! consults at every decomposition event, additive pseudo-energies layered on
//! top of the nearest-neighbor model, and probing-data conversion feeding the
//! latter.

mod error;
mod hard;
mod probing;
mod reference;
mod soft;

pub use error::ConstraintError;
pub use hard::{
    DecompositionCallback, HardConstraints, UnpairedContext, CTX_ALL, CTX_EXT, CTX_HP, CTX_INT_CLOSE, CTX_INT_ENC,
    CTX_ML_BRANCH, CTX_ML_CLOSE, UNPAIRED_CONTEXTS,
};
pub use probing::{apply_probing, FoldMode, ProbabilityConversion, ProbingMethod};
pub use reference::Reference;
pub use soft::SoftConstraints;
