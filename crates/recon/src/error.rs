use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    /// Input rejected before any computation (broken record invariants, duplicate ids).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Unexpected condition while building or solving the cost matrix.
    #[error("matching failure: {0}")]
    MatchingFailure(#[from] SolverFault),
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (weights, thresholds, column mapping).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Missing required column in input data.
    #[error("{source_name}: missing column '{column}'")]
    MissingColumn { source_name: String, column: String },
    /// A field could not be parsed into its typed value.
    #[error("{source_name}, record '{record_id}': cannot parse {column} '{value}'")]
    FieldParse {
        source_name: String,
        record_id: String,
        column: String,
        value: String,
    },
    /// IO / CSV framing error.
    #[error("IO error: {0}")]
    Io(String),
}

/// Solver phase in which a fault was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStage {
    Prepare,
    Cover,
    Adjust,
    Extract,
}

impl fmt::Display for SolverStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => write!(f, "prepare"),
            Self::Cover => write!(f, "cover"),
            Self::Adjust => write!(f, "adjust"),
            Self::Extract => write!(f, "extract"),
        }
    }
}

/// Numerical inconsistency inside the assignment solver, with the state that
/// triggered it.
#[derive(Debug, Clone, Error)]
#[error("{detail} (stage={stage}, iteration={iteration}, matched={matched}/{size})")]
pub struct SolverFault {
    pub stage: SolverStage,
    pub detail: String,
    pub iteration: usize,
    pub matched: usize,
    pub size: usize,
}
