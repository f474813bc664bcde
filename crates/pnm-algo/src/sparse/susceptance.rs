//! Weighted incidence (BA) and reduced susceptance (ABA) matrices.
//!
//! ```text
//! BA[k, j]  = b_k · A[k, j]          for every non-reference bus j
//! ABA       = Aᵗ · BA                restricted to non-reference rows/columns
//!
//! ABA[i,i]  = Σ_k b_k                over branches touching bus i
//! ABA[i,j]  = -Σ_k b_k               over branches between buses i and j
//! ```
//!
//! ABA is the operator whose inverse, applied to BAᵗ, yields the PTDF.

use super::incidence::IncidenceMatrix;
use super::labeled::{Axis, LabeledMatrix};
use crate::error::SensitivityError;
use pnm_core::{BusId, Factorization, LinearSolverKind, Network};
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use tracing::debug;

use crate::graph::Subnetworks;

/// Incidence scaled per row by series susceptance, reference columns dropped.
#[derive(Debug, Clone)]
pub struct BaMatrix {
    matrix: LabeledMatrix<CsMat<f64>, String, BusId>,
    susceptances: Vec<f64>,
    ref_positions: Vec<usize>,
    /// Full bus position of each column
    column_positions: Vec<usize>,
}

impl BaMatrix {
    /// Susceptances come from the network's branch records, matched by name.
    ///
    /// A branch whose effective reactance is (near) zero and that carries no
    /// explicit susceptance is a topology error.
    pub fn from_incidence(
        incidence: &IncidenceMatrix,
        network: &Network,
    ) -> Result<Self, SensitivityError> {
        let by_name: HashMap<&str, _> = network
            .active_branches()
            .map(|b| (b.name.as_str(), b))
            .collect();

        let susceptances = incidence
            .branch_axis()
            .labels()
            .iter()
            .map(|name| {
                let branch = by_name.get(name.as_str()).ok_or_else(|| {
                    SensitivityError::Topology(format!(
                        "branch '{name}' is not an in-service branch of the network"
                    ))
                })?;
                branch.series_susceptance().ok_or_else(|| {
                    SensitivityError::Topology(format!(
                        "branch '{name}' has zero or near-zero reactance"
                    ))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        Self::from_susceptances(incidence, susceptances)
    }

    /// Build from one susceptance per incidence row.
    pub fn from_susceptances(
        incidence: &IncidenceMatrix,
        susceptances: Vec<f64>,
    ) -> Result<Self, SensitivityError> {
        if susceptances.len() != incidence.num_branches() {
            return Err(SensitivityError::Shape(format!(
                "{} susceptances for {} branches",
                susceptances.len(),
                incidence.num_branches()
            )));
        }
        if let Some(pos) = susceptances.iter().position(|b| !b.is_finite()) {
            return Err(SensitivityError::Topology(format!(
                "branch '{}' has a non-finite susceptance",
                incidence.branch_axis().labels()[pos]
            )));
        }

        let column_positions = incidence.non_reference_positions();
        let reduced = reduced_index(incidence.num_buses(), &column_positions);

        let mut triplets = TriMat::new((incidence.num_branches(), column_positions.len()));
        for (k, row) in incidence.body().outer_iterator().enumerate() {
            let b = susceptances[k];
            if b == 0.0 {
                // structurally zero row
                continue;
            }
            for (bus, &a) in row.iter() {
                if let Some(j) = reduced[bus] {
                    triplets.add_triplet(k, j, b * a);
                }
            }
        }

        let cols = incidence.bus_axis().select(&column_positions);
        let matrix = LabeledMatrix::new(triplets.to_csr(), incidence.branch_axis().clone(), cols)?;
        debug!(
            rows = matrix.shape().0,
            cols = matrix.shape().1,
            nnz = matrix.body().nnz(),
            "BA matrix built"
        );

        Ok(Self {
            matrix,
            susceptances,
            ref_positions: incidence.ref_positions().to_vec(),
            column_positions,
        })
    }

    pub fn matrix(&self) -> &LabeledMatrix<CsMat<f64>, String, BusId> {
        &self.matrix
    }

    pub fn body(&self) -> &CsMat<f64> {
        self.matrix.body()
    }

    pub fn susceptances(&self) -> &[f64] {
        &self.susceptances
    }

    pub fn ref_positions(&self) -> &[usize] {
        &self.ref_positions
    }

    pub fn column_positions(&self) -> &[usize] {
        &self.column_positions
    }

    pub fn get(&self, branch: &str, bus: BusId) -> Option<f64> {
        self.matrix.get(branch, &bus)
    }
}

/// Reduced susceptance operator `Aᵗ·BA` over non-reference buses.
#[derive(Debug, Clone)]
pub struct AbaMatrix {
    matrix: LabeledMatrix<CsMat<f64>, BusId, BusId>,
    ref_positions: Vec<usize>,
    column_positions: Vec<usize>,
    subnetworks: Subnetworks,
}

impl AbaMatrix {
    pub fn from_network(network: &Network) -> Result<Self, SensitivityError> {
        let incidence = IncidenceMatrix::from_network(network)?;
        let ba = BaMatrix::from_incidence(&incidence, network)?;
        Self::from_matrices(&incidence, &ba)
    }

    /// Multiply the sparse rows of A and BA; the partition of the incidence
    /// matrix is attached to the result.
    pub fn from_matrices(
        incidence: &IncidenceMatrix,
        ba: &BaMatrix,
    ) -> Result<Self, SensitivityError> {
        check_compatible(incidence, ba)?;
        check_grounded(incidence, ba)?;

        let column_positions = ba.column_positions().to_vec();
        let reduced = reduced_index(incidence.num_buses(), &column_positions);
        let n = column_positions.len();

        let mut triplets = TriMat::new((n, n));
        for (a_row, ba_row) in incidence
            .body()
            .outer_iterator()
            .zip(ba.body().outer_iterator())
        {
            for (bus, &a) in a_row.iter() {
                let Some(i) = reduced[bus] else { continue };
                for (j, &v) in ba_row.iter() {
                    triplets.add_triplet(i, j, a * v);
                }
            }
        }

        let axis = ba.matrix().cols().clone();
        let matrix = LabeledMatrix::new(triplets.to_csr(), axis.clone(), axis)?;
        debug!(dim = n, nnz = matrix.body().nnz(), "ABA matrix built");

        Ok(Self {
            matrix,
            ref_positions: incidence.ref_positions().to_vec(),
            column_positions,
            subnetworks: incidence.subnetworks().clone(),
        })
    }

    /// Factorize with the requested backend; the factorization is released
    /// when dropped.
    pub fn factorize(
        &self,
        kind: LinearSolverKind,
    ) -> Result<Box<dyn Factorization>, SensitivityError> {
        let backend = kind.build_solver();
        backend.factorize(self.body()).map_err(|e| {
            SensitivityError::SingularSystem(format!(
                "ABA factorization with {kind} failed: {e}"
            ))
        })
    }

    pub fn matrix(&self) -> &LabeledMatrix<CsMat<f64>, BusId, BusId> {
        &self.matrix
    }

    pub fn body(&self) -> &CsMat<f64> {
        self.matrix.body()
    }

    pub fn bus_axis(&self) -> &Axis<BusId> {
        self.matrix.rows()
    }

    pub fn ref_positions(&self) -> &[usize] {
        &self.ref_positions
    }

    /// Full bus position of each row/column
    pub fn column_positions(&self) -> &[usize] {
        &self.column_positions
    }

    pub fn subnetworks(&self) -> &Subnetworks {
        &self.subnetworks
    }

    pub fn dim(&self) -> usize {
        self.column_positions.len()
    }

    pub fn get(&self, row: BusId, col: BusId) -> Option<f64> {
        self.matrix.get(&row, &col)
    }

    pub fn nnz(&self) -> usize {
        self.body().nnz()
    }

    /// Matrix density (nnz / n²).
    pub fn density(&self) -> f64 {
        let n = self.dim();
        if n == 0 {
            return 0.0;
        }
        self.nnz() as f64 / (n * n) as f64
    }

    /// Memory usage in bytes (approximate, CSR layout).
    pub fn memory_bytes(&self) -> usize {
        let nnz = self.nnz();
        nnz * 8 + nnz * 8 + (self.dim() + 1) * 8
    }
}

/// Every island of the electrical graph (branches with non-zero susceptance)
/// must hold a reference bus, otherwise ABA is singular.
///
/// A topologically connected island can still split electrically, e.g.
/// through a branch whose susceptance override is zero.
fn check_grounded(incidence: &IncidenceMatrix, ba: &BaMatrix) -> Result<(), SensitivityError> {
    let edges = incidence
        .endpoints()
        .iter()
        .zip(ba.susceptances())
        .filter(|(_, &b)| b != 0.0)
        .map(|(&edge, _)| edge);
    let electrical = Subnetworks::detect(incidence.num_buses(), edges);

    for (_, members) in electrical.iter() {
        if members.iter().any(|&pos| incidence.is_reference(pos)) {
            continue;
        }
        let buses: Vec<String> = members
            .iter()
            .filter_map(|&pos| incidence.bus_axis().label(pos))
            .map(|id| id.to_string())
            .collect();
        return Err(SensitivityError::SingularSystem(format!(
            "buses [{}] are not electrically connected to a reference bus",
            buses.join(", ")
        )));
    }
    Ok(())
}

/// Full bus position → reduced (non-reference) index.
pub(crate) fn reduced_index(num_buses: usize, column_positions: &[usize]) -> Vec<Option<usize>> {
    let mut reduced = vec![None; num_buses];
    for (j, &pos) in column_positions.iter().enumerate() {
        reduced[pos] = Some(j);
    }
    reduced
}

pub(crate) fn check_compatible(
    incidence: &IncidenceMatrix,
    ba: &BaMatrix,
) -> Result<(), SensitivityError> {
    if ba.matrix().rows().labels() != incidence.branch_axis().labels() {
        return Err(SensitivityError::Shape(
            "BA rows do not match the incidence branch axis".into(),
        ));
    }
    if ba.ref_positions() != incidence.ref_positions() {
        return Err(SensitivityError::Shape(
            "BA and incidence matrices use different reference buses".into(),
        ));
    }
    Ok(())
}
