use super::backend::{
    DenseLuSolver, LinearSystemBackend, SolverError, SparseCholeskySolver, SparseLuSolver,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Recognized linear-solver identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LinearSolverKind {
    /// Sparse LU (default)
    #[default]
    SparseDirect,
    /// Dense LU
    Dense,
    /// Sparse Cholesky
    AltDirect,
}

impl LinearSolverKind {
    pub fn build_solver(self) -> Arc<dyn LinearSystemBackend> {
        match self {
            LinearSolverKind::SparseDirect => Arc::new(SparseLuSolver),
            LinearSolverKind::Dense => Arc::new(DenseLuSolver),
            LinearSolverKind::AltDirect => Arc::new(SparseCholeskySolver),
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["sparse-direct", "dense", "alt-direct"]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinearSolverKind::SparseDirect => "sparse-direct",
            LinearSolverKind::Dense => "dense",
            LinearSolverKind::AltDirect => "alt-direct",
        }
    }
}

impl FromStr for LinearSolverKind {
    type Err = SolverError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "sparse-direct" | "sparse" | "klu" | "lu" | "default" => {
                Ok(LinearSolverKind::SparseDirect)
            }
            "dense" | "lapack" => Ok(LinearSolverKind::Dense),
            "alt-direct" | "cholesky" => Ok(LinearSolverKind::AltDirect),
            other => Err(SolverError::UnknownSolver(other.to_string())),
        }
    }
}

impl TryFrom<String> for LinearSolverKind {
    type Error = SolverError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LinearSolverKind> for String {
    fn from(kind: LinearSolverKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for LinearSolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
