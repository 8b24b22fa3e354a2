//! `fuzzyfold`'s folding engine: minimum-free-energy structure prediction,
//! the partition function, base-pair probabilities, and stochastic Boltzmann
//! sampling under the nearest-neighbor thermodynamic model.

mod bpp;
mod compound;
mod error;
mod matrix;
mod mfe;
mod pf;
mod sample;
mod traceback;

pub use bpp::{compute_bpp, BasePairProbabilities};
pub use compound::{kt, FoldCompound, FoldOptions, GAS_CONST, K0};
pub use error::FoldError;
pub use matrix::TriMatrix;
pub use mfe::{fold_mfe, MfeTables};
pub use pf::{fold_pf, PfTables, LOG_Q_THRESHOLD};
pub use sample::{sample_structure, Sampler};
pub use traceback::{traceback, TracebackResult};
