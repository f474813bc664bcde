//! Power Transfer Distribution Factors.
//!
//! PTDF[ℓ,n] = sensitivity of flow on branch ℓ to injection at bus n,
//! withdrawn at the reference bus of n's island:
//! ```text
//! ΔP_ℓ = PTDF[ℓ,n] × ΔP_injection_n
//! ```
//!
//! The body is stored transposed (rows = buses, columns = branches) so that
//! one factorized solve produces it directly:
//! ```text
//! PTDFᵗ[non-ref, :] = ABA⁻¹ · BAᵗ
//! PTDFᵗ[ref, :]     = 0
//! ```
//!
//! With distributed slack the single reference is replaced by a weighted set
//! of participating buses: every column is re-centered by its weighted mean.

use super::incidence::IncidenceMatrix;
use super::labeled::{Axis, LabeledMatrix, SensitivityBody};
use super::sparsify::{retighten, sparsify};
use super::susceptance::{check_compatible, AbaMatrix, BaMatrix};
use crate::config::{validate_tolerance, SensitivityConfig};
use crate::error::SensitivityError;
use crate::graph::Subnetworks;
use faer::Mat;
use pnm_core::{BusId, Network};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PtdfMatrix {
    /// bus × branch
    matrix: LabeledMatrix<SensitivityBody, BusId, String>,
    ref_positions: Vec<usize>,
    subnetworks: Subnetworks,
    /// Normalized participation weights; empty in single-reference mode
    distributed_slack: Vec<f64>,
    tolerance: f64,
}

impl PtdfMatrix {
    /// Build incidence, BA and ABA from the topology, then the PTDF.
    pub fn from_network(
        network: &Network,
        config: &SensitivityConfig,
    ) -> Result<Self, SensitivityError> {
        config.validate()?;
        let incidence = IncidenceMatrix::from_network_with_policy(network, config.reference_policy)?;
        let ba = BaMatrix::from_incidence(&incidence, network)?;
        Self::from_incidence_ba(&incidence, &ba, config)
    }

    pub fn from_incidence_ba(
        incidence: &IncidenceMatrix,
        ba: &BaMatrix,
        config: &SensitivityConfig,
    ) -> Result<Self, SensitivityError> {
        let aba = AbaMatrix::from_matrices(incidence, ba)?;
        Self::from_matrices(incidence, ba, &aba, config)
    }

    /// Build from precomputed topology matrices without repeating them.
    pub fn from_matrices(
        incidence: &IncidenceMatrix,
        ba: &BaMatrix,
        aba: &AbaMatrix,
        config: &SensitivityConfig,
    ) -> Result<Self, SensitivityError> {
        config.validate()?;
        check_compatible(incidence, ba)?;
        if aba.column_positions() != ba.column_positions() {
            return Err(SensitivityError::Shape(
                "ABA and BA matrices use different reference buses".into(),
            ));
        }

        let weights = normalized_slack(incidence, &config.distributed_slack)?;

        let reduced = solve_reduced(ba, aba, config)?;
        let mut body = Mat::<f64>::zeros(incidence.num_buses(), incidence.num_branches());
        for (r, &pos) in aba.column_positions().iter().enumerate() {
            for l in 0..reduced.ncols() {
                body.write(pos, l, reduced.read(r, l));
            }
        }

        if !weights.is_empty() {
            redistribute_slack(&mut body, &weights);
        }

        let mut body = SensitivityBody::Dense(body);
        sparsify(&mut body, config.tolerance);

        let matrix = LabeledMatrix::new(
            body,
            incidence.bus_axis().clone(),
            incidence.branch_axis().clone(),
        )?;
        debug!(
            buses = incidence.num_buses(),
            branches = incidence.num_branches(),
            solver = %config.linear_solver,
            distributed = !weights.is_empty(),
            sparse = matrix.body().is_sparse(),
            "PTDF matrix built"
        );

        Ok(Self {
            matrix,
            ref_positions: incidence.ref_positions().to_vec(),
            subnetworks: incidence.subnetworks().clone(),
            distributed_slack: weights,
            tolerance: config.tolerance,
        })
    }

    /// Reassemble a matrix from stored parts (used when loading from disk).
    pub fn from_parts(
        matrix: LabeledMatrix<SensitivityBody, BusId, String>,
        ref_positions: Vec<usize>,
        subnetworks: Subnetworks,
        distributed_slack: Vec<f64>,
        tolerance: f64,
    ) -> Result<Self, SensitivityError> {
        validate_tolerance(tolerance)?;
        let n_bus = matrix.rows().len();
        if let Some(&bad) = ref_positions.iter().find(|&&p| p >= n_bus) {
            return Err(SensitivityError::Shape(format!(
                "reference position {bad} outside {n_bus} buses"
            )));
        }
        if !distributed_slack.is_empty() && distributed_slack.len() != n_bus {
            return Err(SensitivityError::Shape(format!(
                "{} slack weights for {n_bus} buses",
                distributed_slack.len()
            )));
        }
        Ok(Self {
            matrix,
            ref_positions,
            subnetworks,
            distributed_slack,
            tolerance,
        })
    }

    /// PTDF[branch, bus].
    pub fn get(&self, branch: &str, bus: BusId) -> Option<f64> {
        self.matrix.get(&bus, branch)
    }

    /// Sensitivities of one branch to every bus, in bus order.
    pub fn branch_row(&self, branch: &str) -> Option<Vec<f64>> {
        self.matrix.column(branch)
    }

    /// Sensitivities of every branch to one bus, in branch order.
    pub fn bus_column(&self, bus: BusId) -> Option<Vec<f64>> {
        self.matrix.row(&bus)
    }

    /// Flow change on `branch` per MW injected at `source` and withdrawn at `sink`.
    pub fn transfer_sensitivity(&self, branch: &str, source: BusId, sink: BusId) -> Option<f64> {
        Some(self.get(branch, source)? - self.get(branch, sink)?)
    }

    pub fn matrix(&self) -> &LabeledMatrix<SensitivityBody, BusId, String> {
        &self.matrix
    }

    /// Transposed body (bus × branch).
    pub fn body(&self) -> &SensitivityBody {
        self.matrix.body()
    }

    pub fn bus_axis(&self) -> &Axis<BusId> {
        self.matrix.rows()
    }

    pub fn branch_axis(&self) -> &Axis<String> {
        self.matrix.cols()
    }

    pub fn bus_lookup(&self) -> &HashMap<BusId, usize> {
        self.matrix.rows().lookup()
    }

    pub fn branch_lookup(&self) -> &HashMap<String, usize> {
        self.matrix.cols().lookup()
    }

    /// (buses, branches)
    pub fn shape(&self) -> (usize, usize) {
        self.matrix.shape()
    }

    pub fn num_buses(&self) -> usize {
        self.matrix.rows().len()
    }

    pub fn num_branches(&self) -> usize {
        self.matrix.cols().len()
    }

    pub fn ref_positions(&self) -> &[usize] {
        &self.ref_positions
    }

    pub fn reference_buses(&self) -> Vec<BusId> {
        self.ref_positions
            .iter()
            .filter_map(|&p| self.bus_axis().label(p).copied())
            .collect()
    }

    pub fn subnetworks(&self) -> &Subnetworks {
        &self.subnetworks
    }

    pub fn distributed_slack(&self) -> &[f64] {
        &self.distributed_slack
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Tighten the sparsification tolerance, dropping newly small entries.
    pub fn set_tolerance(&mut self, tol: f64) -> Result<(), SensitivityError> {
        retighten(self.matrix.body_mut(), self.tolerance, tol)?;
        self.tolerance = tol;
        Ok(())
    }
}

/// Solve `ABA · X = BAᵗ` for the non-reference rows of PTDFᵗ.
pub(crate) fn solve_reduced(
    ba: &BaMatrix,
    aba: &AbaMatrix,
    config: &SensitivityConfig,
) -> Result<Mat<f64>, SensitivityError> {
    let (n_branch, n_red) = ba.matrix().shape();
    let mut rhs = Mat::<f64>::zeros(n_red, n_branch);
    for (&v, (k, j)) in ba.body().iter() {
        rhs.write(j, k, v);
    }

    let factor = aba.factorize(config.linear_solver)?;
    let solution = factor.solve(rhs.as_ref()).map_err(|e| {
        SensitivityError::SingularSystem(format!(
            "PTDF solve with {} failed: {e}",
            config.linear_solver
        ))
    })?;
    debug!(dim = n_red, rhs = n_branch, "reduced PTDF system solved");
    Ok(solution)
}

/// Validate and normalize distributed-slack weights.
///
/// The reference count is checked first: distributed slack only makes sense
/// for a single island with a single reference bus.
fn normalized_slack(
    incidence: &IncidenceMatrix,
    weights: &[f64],
) -> Result<Vec<f64>, SensitivityError> {
    if weights.is_empty() {
        return Ok(Vec::new());
    }
    let refs = incidence.ref_positions().len();
    if refs != 1 {
        return Err(SensitivityError::InvalidSlackConfiguration(format!(
            "distributed slack requires exactly one reference bus, network has {refs} \
             ({} islands)",
            incidence.subnetworks().len()
        )));
    }
    if weights.len() != incidence.num_buses() {
        return Err(SensitivityError::Configuration(format!(
            "distributed slack has {} weights for {} buses",
            weights.len(),
            incidence.num_buses()
        )));
    }
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(SensitivityError::Configuration(format!(
            "distributed slack weights must sum to a positive value, got {total}"
        )));
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

/// Subtract each column's weighted mean.
fn redistribute_slack(body: &mut Mat<f64>, weights: &[f64]) {
    for l in 0..body.ncols() {
        let mean: f64 = weights
            .iter()
            .enumerate()
            .map(|(b, w)| w * body.read(b, l))
            .sum();
        for b in 0..body.nrows() {
            body.write(b, l, body.read(b, l) - mean);
        }
    }
}
