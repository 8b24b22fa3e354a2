use std::fmt;

#[derive(Debug)]
pub enum ConstraintError {
    ReferenceLengthMismatch { expected: usize, got: usize },
    ReferenceIncompatiblePair(usize, usize),
    UnequalAlignmentColumns,
    UnsupportedMode(String),
}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintError::ReferenceLengthMismatch { expected, got } => {
                write!(f, "reference structure length {} does not match sequence length {}", got, expected)
            }
            ConstraintError::ReferenceIncompatiblePair(i, j) => {
                write!(f, "reference pair ({}, {}) is not allowed by the pair-type rule", i, j)
            }
            ConstraintError::UnequalAlignmentColumns => {
                write!(f, "alignment rows do not all have the same number of columns")
            }
            ConstraintError::UnsupportedMode(msg) => {
                write!(f, "unsupported mode combination: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConstraintError {}
