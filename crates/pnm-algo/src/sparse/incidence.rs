//! Signed branch-to-bus incidence matrix.
//!
//! ```text
//! A[k, i] = +1   if branch k leaves bus i (from side)
//! A[k, j] = -1   if branch k enters bus j (to side)
//! ```
//!
//! Rows follow the in-service branches in record order, columns follow the
//! buses in record order. Reference-bus columns stay in the matrix; the
//! reference positions are carried alongside for the BA/ABA reductions.

use super::labeled::{Axis, LabeledMatrix};
use crate::config::ReferenceBusPolicy;
use crate::error::SensitivityError;
use crate::graph::Subnetworks;
use pnm_core::{BusId, Network};
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct IncidenceMatrix {
    matrix: LabeledMatrix<CsMat<f64>, String, BusId>,
    /// (from, to) bus positions per branch row
    endpoints: Vec<(usize, usize)>,
    ref_positions: Vec<usize>,
    subnetworks: Subnetworks,
}

impl IncidenceMatrix {
    /// Build with the strict reference policy.
    pub fn from_network(network: &Network) -> Result<Self, SensitivityError> {
        Self::from_network_with_policy(network, ReferenceBusPolicy::Strict)
    }

    pub fn from_network_with_policy(
        network: &Network,
        policy: ReferenceBusPolicy,
    ) -> Result<Self, SensitivityError> {
        let topology = BusTopology::from_network(network)?;
        if topology.endpoints.is_empty() {
            return Err(SensitivityError::Topology(
                "network has no in-service branches".into(),
            ));
        }
        let (subnetworks, ref_positions) = topology.assign_reference_buses(policy)?;
        let BusTopology {
            bus_axis,
            branch_names,
            endpoints,
            ..
        } = topology;

        let branch_axis = Axis::new(branch_names).map_err(|dup| {
            SensitivityError::Topology(format!("duplicate branch name '{dup}'"))
        })?;

        let n_bus = bus_axis.len();
        let mut triplets = TriMat::new((endpoints.len(), n_bus));
        for (k, &(from, to)) in endpoints.iter().enumerate() {
            triplets.add_triplet(k, from, 1.0);
            triplets.add_triplet(k, to, -1.0);
        }

        debug!(
            branches = endpoints.len(),
            buses = n_bus,
            references = ref_positions.len(),
            islands = subnetworks.len(),
            "incidence matrix built"
        );

        Ok(Self {
            matrix: LabeledMatrix::new(triplets.to_csr(), branch_axis, bus_axis)?,
            endpoints,
            ref_positions,
            subnetworks,
        })
    }

    pub fn matrix(&self) -> &LabeledMatrix<CsMat<f64>, String, BusId> {
        &self.matrix
    }

    pub fn body(&self) -> &CsMat<f64> {
        self.matrix.body()
    }

    pub fn branch_axis(&self) -> &Axis<String> {
        self.matrix.rows()
    }

    pub fn bus_axis(&self) -> &Axis<BusId> {
        self.matrix.cols()
    }

    pub fn branch_lookup(&self) -> &HashMap<String, usize> {
        self.matrix.rows().lookup()
    }

    pub fn bus_lookup(&self) -> &HashMap<BusId, usize> {
        self.matrix.cols().lookup()
    }

    pub fn num_branches(&self) -> usize {
        self.endpoints.len()
    }

    pub fn num_buses(&self) -> usize {
        self.matrix.cols().len()
    }

    pub fn endpoints(&self) -> &[(usize, usize)] {
        &self.endpoints
    }

    /// Sorted reference-bus positions (one per island).
    pub fn ref_positions(&self) -> &[usize] {
        &self.ref_positions
    }

    pub fn reference_buses(&self) -> Vec<BusId> {
        self.ref_positions
            .iter()
            .map(|&p| self.bus_axis().labels()[p])
            .collect()
    }

    pub fn is_reference(&self, pos: usize) -> bool {
        self.ref_positions.binary_search(&pos).is_ok()
    }

    /// Bus positions that remain after dropping reference columns, in order.
    pub fn non_reference_positions(&self) -> Vec<usize> {
        (0..self.num_buses())
            .filter(|&p| !self.is_reference(p))
            .collect()
    }

    pub fn subnetworks(&self) -> &Subnetworks {
        &self.subnetworks
    }

    /// Entry by branch name and bus number.
    pub fn get(&self, branch: &str, bus: BusId) -> Option<f64> {
        self.matrix.get(branch, &bus)
    }
}

/// Bus positions, branch endpoints and islands of a network before any
/// reference bus is assigned.
///
/// [`IncidenceMatrix`] is built from this; it is also useful on its own to
/// inspect a topology whose reference assignment fails.
#[derive(Debug, Clone)]
pub struct BusTopology {
    bus_axis: Axis<BusId>,
    branch_names: Vec<String>,
    endpoints: Vec<(usize, usize)>,
    flagged: Vec<usize>,
    islands: Subnetworks,
}

impl BusTopology {
    pub fn from_network(network: &Network) -> Result<Self, SensitivityError> {
        if network.buses.is_empty() {
            return Err(SensitivityError::Topology("network has no buses".into()));
        }

        let bus_labels: Vec<BusId> = network.buses.iter().map(|b| b.id).collect();
        let bus_axis = Axis::new(bus_labels).map_err(|dup| {
            SensitivityError::Topology(format!("duplicate bus number {dup}"))
        })?;

        let mut branch_names = Vec::new();
        let mut endpoints = Vec::new();
        for branch in network.active_branches() {
            let position = |bus: BusId| {
                bus_axis.index_of(&bus).ok_or_else(|| {
                    SensitivityError::Topology(format!(
                        "branch '{}' references unknown bus {bus}",
                        branch.name
                    ))
                })
            };
            let (from, to) = (position(branch.from_bus)?, position(branch.to_bus)?);
            if from == to {
                return Err(SensitivityError::Topology(format!(
                    "branch '{}' connects bus {} to itself",
                    branch.name, branch.from_bus
                )));
            }
            branch_names.push(branch.name.clone());
            endpoints.push((from, to));
        }

        let mut flagged: Vec<usize> = network
            .buses
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_reference())
            .map(|(pos, _)| pos)
            .collect();
        if flagged.is_empty() {
            info!(
                bus = %bus_axis.labels()[0],
                "no reference bus flagged; using the first bus"
            );
            flagged.push(0);
        }

        let islands = Subnetworks::detect(bus_axis.len(), endpoints.iter().copied());
        Ok(Self {
            bus_axis,
            branch_names,
            endpoints,
            flagged,
            islands,
        })
    }

    /// Re-key the islands by reference bus under `policy`.
    pub fn assign_reference_buses(
        &self,
        policy: ReferenceBusPolicy,
    ) -> Result<(Subnetworks, Vec<usize>), SensitivityError> {
        self.islands
            .assign_reference_buses(&self.flagged, policy, self.bus_axis.labels())
    }

    pub fn bus_axis(&self) -> &Axis<BusId> {
        &self.bus_axis
    }

    pub fn endpoints(&self) -> &[(usize, usize)] {
        &self.endpoints
    }

    /// Reference candidates: the flagged buses, or the first bus when none is flagged.
    pub fn flagged(&self) -> &[usize] {
        &self.flagged
    }

    /// Islands keyed by their lowest bus position.
    pub fn islands(&self) -> &Subnetworks {
        &self.islands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnm_core::{Branch, BranchId, Bus, BusKind};

    fn network(edges: &[(usize, usize)], n_bus: usize, refs: &[usize]) -> Network {
        let mut net = Network::new();
        for i in 1..=n_bus {
            let kind = if refs.contains(&i) { BusKind::Ref } else { BusKind::Pq };
            net.add_bus(Bus::new(BusId::new(i), format!("Bus {i}")).with_kind(kind));
        }
        for (k, &(f, t)) in edges.iter().enumerate() {
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
    fn test_signs_and_labels() {
        let inc = IncidenceMatrix::from_network(&network(&[(1, 2), (2, 3)], 3, &[1])).unwrap();
        assert_eq!(inc.get("L1", BusId::new(1)), Some(1.0));
        assert_eq!(inc.get("L1", BusId::new(2)), Some(-1.0));
        assert_eq!(inc.get("L1", BusId::new(3)), Some(0.0));
        assert_eq!(inc.get("L2", BusId::new(3)), Some(-1.0));
        assert_eq!(inc.ref_positions(), &[0]);
        assert_eq!(inc.non_reference_positions(), vec![1, 2]);
    }

    #[test]
    fn test_rows_have_one_plus_one_minus() {
        let inc =
            IncidenceMatrix::from_network(&network(&[(1, 2), (2, 3), (3, 1)], 3, &[2])).unwrap();
        for row in inc.body().outer_iterator() {
            let vals: Vec<f64> = row.iter().map(|(_, &v)| v).collect();
            assert_eq!(vals.len(), 2);
            assert_eq!(vals.iter().sum::<f64>(), 0.0);
        }
    }

    #[test]
    fn test_first_bus_is_default_reference() {
        let inc = IncidenceMatrix::from_network(&network(&[(1, 2)], 2, &[])).unwrap();
        assert_eq!(inc.reference_buses(), vec![BusId::new(1)]);
    }

    #[test]
    fn test_unknown_bus_rejected() {
        let err = IncidenceMatrix::from_network(&network(&[(1, 9)], 2, &[1])).unwrap_err();
        assert!(matches!(err, SensitivityError::Topology(_)));
        assert!(err.to_string().contains("unknown bus 9"));
    }

    #[test]
    fn test_topology_survives_failed_assignment() {
        // buses 1 and 2 both flagged in the same island
        let net = network(&[(1, 2), (3, 4)], 4, &[1, 2]);
        let topology = BusTopology::from_network(&net).unwrap();
        assert_eq!(topology.islands().len(), 2);
        assert_eq!(topology.flagged(), &[0, 1]);
        assert_eq!(topology.endpoints(), &[(0, 1), (2, 3)]);

        let err = topology
            .assign_reference_buses(ReferenceBusPolicy::AutoAssign)
            .unwrap_err();
        assert!(err.to_string().contains("2 reference buses"));
        assert!(IncidenceMatrix::from_network(&net).is_err());
    }

    #[test]
    fn test_self_loop_and_empty_rejected() {
        assert!(IncidenceMatrix::from_network(&network(&[(1, 1)], 2, &[1])).is_err());
        assert!(IncidenceMatrix::from_network(&network(&[], 2, &[1])).is_err());
        assert!(IncidenceMatrix::from_network(&Network::new()).is_err());
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let mut net = network(&[(1, 2), (2, 3)], 3, &[1]);
        net.branches[1].name = "L1".into();
        let err = IncidenceMatrix::from_network(&net).unwrap_err();
        assert!(err.to_string().contains("duplicate branch name"));

        let mut net = network(&[(1, 2)], 2, &[1]);
        net.buses[1].id = BusId::new(1);
        assert!(IncidenceMatrix::from_network(&net).is_err());
    }

    #[test]
    fn test_out_of_service_branch_excluded() {
        let mut net = network(&[(1, 2), (2, 3), (1, 3)], 3, &[1]);
        net.branches[2].status = false;
        let inc = IncidenceMatrix::from_network(&net).unwrap();
        assert_eq!(inc.num_branches(), 2);
        assert!(inc.get("L3", BusId::new(1)).is_none());
    }

    #[test]
    fn test_islands_need_references() {
        let net = network(&[(1, 2), (3, 4)], 4, &[1]);
        assert!(matches!(
            IncidenceMatrix::from_network(&net),
            Err(SensitivityError::Topology(_))
        ));

        let inc =
            IncidenceMatrix::from_network_with_policy(&net, ReferenceBusPolicy::AutoAssign)
                .unwrap();
        assert_eq!(inc.ref_positions(), &[0, 2]);
        assert_eq!(inc.subnetworks().len(), 2);

        let both = IncidenceMatrix::from_network(&network(&[(1, 2), (3, 4)], 4, &[2, 4])).unwrap();
        assert_eq!(both.reference_buses(), vec![BusId::new(2), BusId::new(4)]);
    }
}
