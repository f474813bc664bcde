//! Construction options shared by every matrix builder.
//!
//! The configuration is an explicit value passed to each construction call;
//! there is no process-wide default solver. Independent matrices can be built
//! concurrently with different settings.

use crate::error::SensitivityError;
use pnm_core::LinearSolverKind;
use serde::{Deserialize, Serialize};

/// What to do with an island that has no flagged reference bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceBusPolicy {
    /// Fail with a topology error.
    #[default]
    Strict,
    /// Use the island's first bus (record order) and log the choice.
    AutoAssign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensitivityConfig {
    /// Factorization backend
    pub linear_solver: LinearSolverKind,
    /// Per-bus slack participation; empty means single reference bus
    pub distributed_slack: Vec<f64>,
    /// Entries with smaller magnitude are dropped after construction
    pub tolerance: f64,
    pub reference_policy: ReferenceBusPolicy,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            linear_solver: LinearSolverKind::SparseDirect,
            distributed_slack: Vec::new(),
            tolerance: f64::EPSILON,
            reference_policy: ReferenceBusPolicy::Strict,
        }
    }
}

impl SensitivityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_linear_solver(mut self, kind: LinearSolverKind) -> Self {
        self.linear_solver = kind;
        self
    }

    /// Select the backend by identifier. Unknown identifiers fail here,
    /// before any matrix is built.
    pub fn with_solver_name(self, name: &str) -> Result<Self, SensitivityError> {
        let kind: LinearSolverKind = name.parse()?;
        Ok(self.with_linear_solver(kind))
    }

    pub fn with_distributed_slack(mut self, weights: Vec<f64>) -> Self {
        self.distributed_slack = weights;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_reference_policy(mut self, policy: ReferenceBusPolicy) -> Self {
        self.reference_policy = policy;
        self
    }

    /// True when results are sparsified after construction.
    pub fn sparsifies(&self) -> bool {
        self.tolerance > f64::EPSILON
    }

    pub fn validate(&self) -> Result<(), SensitivityError> {
        validate_tolerance(self.tolerance)?;
        if let Some(w) = self.distributed_slack.iter().find(|w| !w.is_finite()) {
            return Err(SensitivityError::Configuration(format!(
                "distributed slack weights must be finite, got {w}"
            )));
        }
        Ok(())
    }
}

/// Tolerances live in `[0, 1)`: every PTDF/LODF entry other than the LODF
/// diagonal has magnitude at most one.
pub(crate) fn validate_tolerance(tol: f64) -> Result<(), SensitivityError> {
    if !tol.is_finite() || !(0.0..1.0).contains(&tol) {
        return Err(SensitivityError::Configuration(format!(
            "tolerance must be in [0, 1), got {tol}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SensitivityConfig::default();
        assert_eq!(config.linear_solver, LinearSolverKind::SparseDirect);
        assert!(config.distributed_slack.is_empty());
        assert_eq!(config.tolerance, f64::EPSILON);
        assert!(!config.sparsifies());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_solver_is_configuration_error() {
        let err = SensitivityConfig::new()
            .with_solver_name("pardiso")
            .unwrap_err();
        assert!(matches!(err, SensitivityError::Configuration(_)));
    }

    #[test]
    fn test_tolerance_validation() {
        assert!(SensitivityConfig::new().with_tolerance(-1e-3).validate().is_err());
        assert!(SensitivityConfig::new().with_tolerance(f64::NAN).validate().is_err());
        assert!(SensitivityConfig::new().with_tolerance(1.0).validate().is_err());
        assert!(SensitivityConfig::new().with_tolerance(1e-4).validate().is_ok());
    }

    #[test]
    fn test_slack_weights_must_be_finite() {
        let config = SensitivityConfig::new().with_distributed_slack(vec![1.0, f64::INFINITY]);
        assert!(matches!(
            config.validate(),
            Err(SensitivityError::Configuration(_))
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SensitivityConfig =
            serde_json::from_str(r#"{"linear_solver": "dense", "tolerance": 0.001}"#).unwrap();
        assert_eq!(config.linear_solver, LinearSolverKind::Dense);
        assert_eq!(config.reference_policy, ReferenceBusPolicy::Strict);
        assert!(config.sparsifies());

        let auto: SensitivityConfig =
            serde_json::from_str(r#"{"reference_policy": "auto-assign"}"#).unwrap();
        assert_eq!(auto.reference_policy, ReferenceBusPolicy::AutoAssign);
    }
}
