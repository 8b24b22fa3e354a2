//! Distance-class (2D) folding (C10): restricts the nearest-neighbor DP to
//! structures classified by base-pair distance `(k,l)` to two reference
//! structures `R1`/`R2`, mirroring ViennaRNA's `RNA2Dfold`/`RNA2Dpfold`.
//!
//! Each scalar DP cell of [`ff_fold::mfe`]/[`ff_fold::pf`] becomes a
//! [`cell::TwoDCell`]: a sparse `(k,l) -> value` table plus a `rem` overflow
//! bucket for distance pairs beyond the caller's declared `maxD1`/`maxD2`.
//! See `SPEC_FULL.md` §4.6 and §9 for the composition rule and storage
//! rationale.

pub mod backtrack;
pub mod cell;
pub mod compound;
pub mod mfe;
pub mod pf;
pub mod ranges;

pub use backtrack::{two_d_backtrack, two_d_pbacktrack, TwoDSampler, TwoDTraceback};
pub use cell::{TwoDCell, TwoDGrid};
pub use compound::{MaxDistance, TwoDFoldCompound};
pub use mfe::{two_d_fold, TwoDMfeTables, TwoDfoldSolution};
pub use pf::{two_d_pfold, TwoDPfTables, TwoDpfoldSolution};
pub use ranges::ReferenceStats;
