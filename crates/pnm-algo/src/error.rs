use pnm_core::{LinearSolverKind, SolverError};
use thiserror::Error;

/// Errors from matrix construction and sensitivity computation.
#[derive(Debug, Error)]
pub enum SensitivityError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Topology error: {0}")]
    Topology(String),

    #[error("Invalid slack configuration: {0}")]
    InvalidSlackConfiguration(String),

    #[error("Singular system: {0}")]
    SingularSystem(String),

    #[error("Solver '{solver}' is not supported for {matrix} construction")]
    UnsupportedSolver {
        solver: LinearSolverKind,
        matrix: &'static str,
    },

    #[error("Matrix shape mismatch: {0}")]
    Shape(String),
}

impl From<SolverError> for SensitivityError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::UnknownSolver(_) => SensitivityError::Configuration(err.to_string()),
            other => SensitivityError::SingularSystem(other.to_string()),
        }
    }
}
