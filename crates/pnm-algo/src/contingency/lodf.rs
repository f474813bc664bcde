//! Line Outage Distribution Factor (LODF) matrix computation.
//!
//! LODFs quantify how flow redistributes when a branch is outaged:
//! ```text
//! LODF[ℓ,m] = (flow change on ℓ when m trips) / (pre-trip flow on m)
//! ```
//!
//! With `denom = A · PTDFᵗ` (branch × branch, `denom[m,ℓ]` is the flow on ℓ
//! per unit transferred across m's terminals) the transposed matrix is the
//! solution of a diagonal system:
//! ```text
//! D       = diag(1 − denom[m,m])
//! LODFᵗ   = D⁻¹ · denom
//! LODF[m,m] = −1
//! ```
//!
//! A self term `1 − denom[m,m]` below [`LODF_SELF_TERM_THRESHOLD`] means the
//! outage of m islands part of the network (m is radial). The factor is then
//! clamped to `1.0` so no entry blows up.

use crate::config::{validate_tolerance, SensitivityConfig};
use crate::error::SensitivityError;
use crate::sparse::incidence::IncidenceMatrix;
use crate::sparse::labeled::{Axis, LabeledMatrix, SensitivityBody};
use crate::sparse::sensitivity::{solve_reduced, PtdfMatrix};
use crate::sparse::sparsify::{retighten, sparsify};
use crate::sparse::susceptance::{check_compatible, reduced_index, AbaMatrix, BaMatrix};
use faer::Mat;
use pnm_core::{LinearSolverKind, Network};
use sprs::TriMat;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Self terms below this value are clamped to a correction factor of `1.0`.
pub const LODF_SELF_TERM_THRESHOLD: f64 = 1e-6;

/// LODF matrix, logical orientation: rows = monitored, columns = outaged.
#[derive(Debug, Clone)]
pub struct LodfMatrix {
    matrix: LabeledMatrix<SensitivityBody, String, String>,
    tolerance: f64,
}

impl LodfMatrix {
    /// Build from an incidence matrix and a PTDF computed over the same
    /// topology.
    pub fn from_ptdf(
        incidence: &IncidenceMatrix,
        ptdf: &PtdfMatrix,
        config: &SensitivityConfig,
    ) -> Result<Self, SensitivityError> {
        ensure_supported(config)?;
        config.validate()?;
        if ptdf.branch_axis().labels() != incidence.branch_axis().labels()
            || ptdf.bus_axis().labels() != incidence.bus_axis().labels()
        {
            return Err(SensitivityError::Shape(
                "PTDF axes do not match the incidence matrix".into(),
            ));
        }
        if ptdf.tolerance() > f64::EPSILON {
            warn!(
                tolerance = ptdf.tolerance(),
                "building LODF from a sparsified PTDF; truncated entries carry into the result"
            );
        }

        let ptdf_t = ptdf.body().to_dense();
        let n = incidence.num_branches();
        let mut denom = Mat::<f64>::zeros(n, n);
        for (k, row) in incidence.body().outer_iterator().enumerate() {
            for (bus, &a) in row.iter() {
                for l in 0..n {
                    denom.write(k, l, denom.read(k, l) + a * ptdf_t.read(bus, l));
                }
            }
        }

        Self::from_denominator(denom, incidence.branch_axis().clone(), config)
    }

    /// Same algebra as [`LodfMatrix::from_ptdf`] with
    /// `denom = A_red · ABA⁻¹ · BAᵗ`, never materializing the PTDF.
    pub fn from_matrices(
        incidence: &IncidenceMatrix,
        ba: &BaMatrix,
        aba: &AbaMatrix,
        config: &SensitivityConfig,
    ) -> Result<Self, SensitivityError> {
        ensure_supported(config)?;
        config.validate()?;
        check_compatible(incidence, ba)?;
        if aba.column_positions() != ba.column_positions() {
            return Err(SensitivityError::Shape(
                "ABA and BA matrices use different reference buses".into(),
            ));
        }

        let x = solve_reduced(ba, aba, config)?;
        let reduced = reduced_index(incidence.num_buses(), aba.column_positions());
        let n = incidence.num_branches();
        let mut denom = Mat::<f64>::zeros(n, n);
        for (k, row) in incidence.body().outer_iterator().enumerate() {
            for (bus, &a) in row.iter() {
                let Some(r) = reduced[bus] else { continue };
                for l in 0..n {
                    denom.write(k, l, denom.read(k, l) + a * x.read(r, l));
                }
            }
        }

        Self::from_denominator(denom, incidence.branch_axis().clone(), config)
    }

    /// End-to-end construction from topology.
    ///
    /// The intermediate PTDF is built without sparsification; the configured
    /// tolerance applies to the LODF only.
    pub fn from_network(
        network: &Network,
        config: &SensitivityConfig,
    ) -> Result<Self, SensitivityError> {
        ensure_supported(config)?;
        config.validate()?;
        let incidence = IncidenceMatrix::from_network_with_policy(network, config.reference_policy)?;
        let ba = BaMatrix::from_incidence(&incidence, network)?;
        let ptdf_config = config.clone().with_tolerance(f64::EPSILON);
        let ptdf = PtdfMatrix::from_incidence_ba(&incidence, &ba, &ptdf_config)?;
        Self::from_ptdf(&incidence, &ptdf, config)
    }

    /// Reassemble from stored parts. The diagonal must be exactly −1.
    pub fn from_parts(
        matrix: LabeledMatrix<SensitivityBody, String, String>,
        tolerance: f64,
    ) -> Result<Self, SensitivityError> {
        validate_tolerance(tolerance)?;
        if matrix.rows() != matrix.cols() {
            return Err(SensitivityError::Shape(
                "LODF row and column axes differ".into(),
            ));
        }
        if let Some(i) = (0..matrix.rows().len()).find(|&i| matrix.value(i, i) != -1.0) {
            return Err(SensitivityError::Shape(format!(
                "LODF diagonal entry for '{}' is {}, expected -1",
                matrix.rows().labels()[i],
                matrix.value(i, i)
            )));
        }
        Ok(Self { matrix, tolerance })
    }

    fn from_denominator(
        denom: Mat<f64>,
        axis: Axis<String>,
        config: &SensitivityConfig,
    ) -> Result<Self, SensitivityError> {
        let n = denom.nrows();
        let factors = lodf_correction_factors(&denom);
        let clamped = (0..n)
            .filter(|&i| 1.0 - denom.read(i, i) < LODF_SELF_TERM_THRESHOLD)
            .count();
        if clamped > 0 {
            warn!(
                clamped,
                branches = n,
                "LODF self terms below threshold clamped to 1.0 (radial branches)"
            );
        }

        let mut diag = TriMat::new((n, n));
        for (i, &f) in factors.iter().enumerate() {
            diag.add_triplet(i, i, f);
        }
        let backend = config.linear_solver.build_solver();
        let factor = backend.factorize(&diag.to_csr()).map_err(|e| {
            SensitivityError::SingularSystem(format!("LODF correction factorization failed: {e}"))
        })?;
        let lodf_t = factor.solve(denom.as_ref())?;

        let body = Mat::from_fn(n, n, |i, j| if i == j { -1.0 } else { lodf_t.read(j, i) });
        let mut body = SensitivityBody::Dense(body);
        sparsify(&mut body, config.tolerance);

        debug!(
            branches = n,
            clamped,
            solver = %config.linear_solver,
            sparse = body.is_sparse(),
            "LODF matrix built"
        );

        Ok(Self {
            matrix: LabeledMatrix::new(body, axis.clone(), axis)?,
            tolerance: config.tolerance,
        })
    }

    /// Get LODF for branch `monitored` when branch `outaged` trips.
    pub fn get(&self, monitored: &str, outaged: &str) -> Option<f64> {
        self.matrix.get(monitored, outaged)
    }

    /// Factors of every monitored branch for one outage, in branch order.
    pub fn outage_column(&self, outaged: &str) -> Option<Vec<f64>> {
        self.matrix.column(outaged)
    }

    /// Factors of one monitored branch across every outage.
    pub fn monitored_row(&self, monitored: &str) -> Option<Vec<f64>> {
        self.matrix.row(monitored)
    }

    /// Estimate post-contingency flow on `monitored` after `outaged` trips.
    /// `flow_l_post = flow_l_pre + LODF[ℓ,m] × flow_m_pre`
    pub fn estimate_post_outage_flow(
        &self,
        monitored: &str,
        outaged: &str,
        flow_monitored_pre: f64,
        flow_outaged_pre: f64,
    ) -> Option<f64> {
        let lodf = self.get(monitored, outaged)?;
        Some(flow_monitored_pre + lodf * flow_outaged_pre)
    }

    /// Post-contingency flows on every branch for one outage. The outaged
    /// branch itself ends at zero.
    pub fn estimate_post_outage_flows(
        &self,
        pre_flows: &[f64],
        outaged: &str,
    ) -> Result<Vec<f64>, SensitivityError> {
        if pre_flows.len() != self.num_branches() {
            return Err(SensitivityError::Shape(format!(
                "{} pre-outage flows for {} branches",
                pre_flows.len(),
                self.num_branches()
            )));
        }
        let m = self.branch_axis().index_of(outaged).ok_or_else(|| {
            SensitivityError::Configuration(format!("unknown branch '{outaged}'"))
        })?;
        let flow_m = pre_flows[m];
        Ok(pre_flows
            .iter()
            .enumerate()
            .map(|(l, &flow_l)| flow_l + self.matrix.value(l, m) * flow_m)
            .collect())
    }

    pub fn matrix(&self) -> &LabeledMatrix<SensitivityBody, String, String> {
        &self.matrix
    }

    pub fn body(&self) -> &SensitivityBody {
        self.matrix.body()
    }

    pub fn branch_axis(&self) -> &Axis<String> {
        self.matrix.rows()
    }

    pub fn branch_lookup(&self) -> &HashMap<String, usize> {
        self.matrix.rows().lookup()
    }

    pub fn num_branches(&self) -> usize {
        self.matrix.rows().len()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Tighten the sparsification tolerance. The −1 diagonal always survives.
    pub fn set_tolerance(&mut self, tol: f64) -> Result<(), SensitivityError> {
        retighten(self.matrix.body_mut(), self.tolerance, tol)?;
        self.tolerance = tol;
        Ok(())
    }
}

/// Per-branch diagonal correction factors `1 − denom[i,i]`, clamped to `1.0`
/// below [`LODF_SELF_TERM_THRESHOLD`].
pub fn lodf_correction_factors(denom: &Mat<f64>) -> Vec<f64> {
    (0..denom.nrows().min(denom.ncols()))
        .map(|i| {
            let self_term = 1.0 - denom.read(i, i);
            if self_term < LODF_SELF_TERM_THRESHOLD {
                1.0
            } else {
                self_term
            }
        })
        .collect()
}

fn ensure_supported(config: &SensitivityConfig) -> Result<(), SensitivityError> {
    match config.linear_solver {
        LinearSolverKind::SparseDirect | LinearSolverKind::Dense => Ok(()),
        other => Err(SensitivityError::UnsupportedSolver {
            solver: other,
            matrix: "LODF",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnm_core::{Branch, BranchId, Bus, BusId, BusKind};

    fn create_3bus_network() -> Network {
        let mut net = Network::new();
        net.add_bus(Bus::new(BusId::new(1), "Bus 1").with_kind(BusKind::Ref));
        net.add_bus(Bus::new(BusId::new(2), "Bus 2"));
        net.add_bus(Bus::new(BusId::new(3), "Bus 3"));
        for (k, (f, t)) in [(1, 2), (2, 3), (1, 3)].into_iter().enumerate() {
            net.add_branch(Branch::new(
                BranchId::new(k + 1),
                format!("L{}", k + 1),
                BusId::new(f),
                BusId::new(t),
                0.0,
                0.1,
            ));
        }
        net
    }

    #[test]
    fn test_lodf_diagonal() {
        let lodf = LodfMatrix::from_network(&create_3bus_network(), &SensitivityConfig::default())
            .unwrap();
        for name in ["L1", "L2", "L3"] {
            assert_eq!(lodf.get(name, name), Some(-1.0));
        }
    }

    #[test]
    fn test_lodf_triangle_values() {
        // Losing one side of an equal triangle pushes all of its flow onto
        // the remaining path.
        let lodf = LodfMatrix::from_network(&create_3bus_network(), &SensitivityConfig::default())
            .unwrap();
        assert!((lodf.get("L2", "L1").unwrap() + 1.0).abs() < 1e-9);
        assert!((lodf.get("L3", "L1").unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(lodf.outage_column("L1").unwrap().len(), 3);
    }

    #[test]
    fn test_lodf_flow_estimate() {
        let lodf = LodfMatrix::from_network(&create_3bus_network(), &SensitivityConfig::default())
            .unwrap();
        let post = lodf
            .estimate_post_outage_flow("L3", "L1", 20.0, 50.0)
            .unwrap();
        assert!((post - 70.0).abs() < 1e-9);

        let flows = lodf.estimate_post_outage_flows(&[50.0, -30.0, 20.0], "L1").unwrap();
        assert!(flows[0].abs() < 1e-9);
        assert!((flows[2] - 70.0).abs() < 1e-9);
        assert!(lodf.estimate_post_outage_flows(&[1.0], "L1").is_err());
        assert!(lodf.estimate_post_outage_flows(&[1.0; 3], "L9").is_err());
    }

    #[test]
    fn test_correction_factor_clamp() {
        let denom = Mat::from_fn(3, 3, |i, j| match (i, j) {
            (0, 0) => 0.4,
            (1, 1) => 1.0 - 1e-9,
            (2, 2) => 1.0 + 1e-12,
            _ => 0.1,
        });
        let factors = lodf_correction_factors(&denom);
        assert!((factors[0] - 0.6).abs() < 1e-12);
        assert_eq!(factors[1], 1.0);
        assert_eq!(factors[2], 1.0);
    }

    #[test]
    fn test_radial_branch_stays_finite() {
        let mut net = create_3bus_network();
        net.add_bus(Bus::new(BusId::new(4), "Bus 4"));
        net.add_branch(Branch::new(
            BranchId::new(4),
            "L4".to_string(),
            BusId::new(3),
            BusId::new(4),
            0.0,
            0.1,
        ));
        let lodf = LodfMatrix::from_network(&net, &SensitivityConfig::default()).unwrap();
        assert_eq!(lodf.get("L4", "L4"), Some(-1.0));
        for v in lodf.outage_column("L4").unwrap() {
            assert!(v.is_finite() && v.abs() <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_alt_direct_rejected() {
        let config = SensitivityConfig::default().with_linear_solver(LinearSolverKind::AltDirect);
        let err = LodfMatrix::from_network(&create_3bus_network(), &config).unwrap_err();
        assert!(matches!(
            err,
            SensitivityError::UnsupportedSolver {
                solver: LinearSolverKind::AltDirect,
                matrix: "LODF"
            }
        ));
    }

    #[test]
    fn test_from_parts_checks_diagonal() {
        let lodf = LodfMatrix::from_network(&create_3bus_network(), &SensitivityConfig::default())
            .unwrap();
        let (body, rows, cols) = lodf.matrix().clone().into_parts();
        let mut dense = body.to_dense();
        assert!(LodfMatrix::from_parts(
            LabeledMatrix::new(SensitivityBody::Dense(dense.clone()), rows.clone(), cols.clone())
                .unwrap(),
            lodf.tolerance()
        )
        .is_ok());

        dense.write(1, 1, 0.0);
        let broken = LabeledMatrix::new(SensitivityBody::Dense(dense), rows, cols).unwrap();
        assert!(LodfMatrix::from_parts(broken, lodf.tolerance()).is_err());
    }
}
