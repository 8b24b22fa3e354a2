use std::fmt;

#[derive(Debug)]
pub enum FoldError {
    EmptySequence,
    IllegalBase(char, usize),
    AlignmentLengthMismatch { row: usize, expected: usize, got: usize },
    TooShortForTurn { len: usize, turn: usize },
    NumericalOverflow { log_q: f64, threshold: f64 },
    Constraint(ff_constraints::ConstraintError),
    /// A requested combination of options has no implementation yet
    /// (spec.md §7: unimplemented mode combinations return a structured
    /// "not supported" result rather than silently wrong numbers).
    Unsupported(String),
}

impl fmt::Display for FoldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoldError::EmptySequence => write!(f, "sequence must contain at least one nucleotide"),
            FoldError::IllegalBase(c, i) => write!(f, "illegal base '{}' at position {}", c, i),
            FoldError::AlignmentLengthMismatch { row, expected, got } => {
                write!(f, "alignment row {} has {} columns, expected {}", row, got, expected)
            }
            FoldError::TooShortForTurn { len, turn } => {
                write!(f, "sequence of length {} is too short for TURN={}", len, turn)
            }
            FoldError::NumericalOverflow { log_q, threshold } => {
                write!(f, "|log(Q)|={:.1} exceeds threshold {:.1}; re-tune pf_scale", log_q, threshold)
            }
            FoldError::Constraint(e) => write!(f, "{}", e),
            FoldError::Unsupported(msg) => write!(f, "not supported: {}", msg),
        }
    }
}

impl std::error::Error for FoldError {}

impl From<ff_constraints::ConstraintError> for FoldError {
    fn from(e: ff_constraints::ConstraintError) -> Self {
        FoldError::Constraint(e)
    }
}
