//! # pnm-core: Power Network Topology Core
//!
//! Provides the topology records consumed by the sensitivity-matrix engine in
//! `pnm-algo`, graph utilities, and the pluggable linear-solver backends.
//!
//! ## Design Philosophy
//!
//! A [`Network`] is an **ordered** list of buses and an ordered list of
//! branches. The ordering is significant: it becomes the axis ordering of every
//! matrix built from the network (incidence, BA, ABA, PTDF, LODF), so two runs
//! over the same records always produce identically indexed matrices.
//!
//! Topological queries (connectivity, islands) go through [`Network::graph`],
//! which builds a `petgraph` undirected multigraph on demand.
//!
//! ## Quick Start
//!
//! ```rust
//! use pnm_core::*;
//!
//! let mut network = Network::new();
//! network.add_bus(Bus::new(BusId::new(1), "Bus 1").with_kind(BusKind::Ref));
//! network.add_bus(Bus::new(BusId::new(2), "Bus 2"));
//! network.add_branch(Branch::new(
//!     BranchId::new(1),
//!     "Line 1-2".to_string(),
//!     BusId::new(1),
//!     BusId::new(2),
//!     0.01,
//!     0.1,
//! ));
//!
//! assert_eq!(network.stats().num_buses, 2);
//! ```
//!
//! ## Modules
//!
//! - [`graph_utils`] - Topological statistics (degree, density, components)
//! - [`solver`] - Linear-system backends (sparse LU, dense LU, sparse Cholesky)

use petgraph::{graph::NodeIndex, Graph, Undirected};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod graph_utils;
pub mod solver;

pub use graph_utils::*;
pub use solver::*;

/// Effective reactance below which a branch is treated as a short circuit.
pub const MIN_REACTANCE: f64 = 1e-12;

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl BranchId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BranchId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for BusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bus classification. Only [`BusKind::Ref`] matters to the sensitivity engine:
/// it marks the angle reference of an island.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    Ref,
    Pv,
    #[default]
    Pq,
    Isolated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    /// Bus number (unique within a network)
    pub id: BusId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: BusKind,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            kind: BusKind::Pq,
        }
    }
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: BusKind::Pq,
        }
    }

    pub fn with_kind(mut self, kind: BusKind) -> Self {
        self.kind = kind;
        self
    }

    #[inline]
    pub fn is_reference(&self) -> bool {
        self.kind == BusKind::Ref
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    /// Unique branch name; used as the branch axis label of every matrix
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series resistance (per-unit)
    #[serde(default)]
    pub resistance: f64,
    /// Series reactance (per-unit)
    #[serde(default)]
    pub reactance: f64,
    /// Multiplicative tap magnitude applied from from_bus to to_bus
    #[serde(default = "default_tap_ratio")]
    pub tap_ratio: f64,
    /// Explicit series susceptance; overrides the reactance-derived value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub susceptance: Option<f64>,
    /// Operational status flag
    #[serde(default = "default_status")]
    pub status: bool,
}

fn default_tap_ratio() -> f64 {
    1.0
}

fn default_status() -> bool {
    true
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            id: BranchId(0),
            name: String::new(),
            from_bus: BusId(0),
            to_bus: BusId(0),
            resistance: 0.0,
            reactance: 0.0,
            tap_ratio: 1.0,
            susceptance: None,
            status: true,
        }
    }
}

impl Branch {
    /// Construct a branch from its impedance, filling the remaining parameters with defaults.
    pub fn new(
        id: BranchId,
        name: String,
        from_bus: BusId,
        to_bus: BusId,
        resistance: f64,
        reactance: f64,
    ) -> Self {
        Self {
            id,
            name,
            from_bus,
            to_bus,
            resistance,
            reactance,
            ..Self::default()
        }
    }

    /// Pin the series susceptance instead of deriving it from the reactance.
    pub fn with_susceptance(mut self, b: f64) -> Self {
        self.susceptance = Some(b);
        self
    }

    pub fn out_of_service(mut self) -> Self {
        self.status = false;
        self
    }

    /// DC series susceptance `1 / (x · tap)`.
    ///
    /// Returns `None` when the effective reactance is below [`MIN_REACTANCE`]
    /// and no explicit susceptance was given.
    pub fn series_susceptance(&self) -> Option<f64> {
        if let Some(b) = self.susceptance {
            return Some(b);
        }
        let x_eff = self.reactance * self.tap_ratio;
        if x_eff.abs() < MIN_REACTANCE {
            None
        } else {
            Some(1.0 / x_eff)
        }
    }
}

/// The power network topology: ordered bus and branch records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub branches: Vec<Branch>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bus(&mut self, bus: Bus) -> usize {
        self.buses.push(bus);
        self.buses.len() - 1
    }

    pub fn add_branch(&mut self, branch: Branch) -> usize {
        self.branches.push(branch);
        self.branches.len() - 1
    }

    /// In-service branches in record order.
    pub fn active_branches(&self) -> impl Iterator<Item = &Branch> + '_ {
        self.branches.iter().filter(|b| b.status)
    }

    /// Find a bus by number.
    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.iter().find(|b| b.id == id)
    }

    /// Find a branch by name.
    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    /// Buses flagged as angle reference, in record order.
    pub fn reference_buses(&self) -> Vec<BusId> {
        self.buses
            .iter()
            .filter(|b| b.is_reference())
            .map(|b| b.id)
            .collect()
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            num_buses: self.buses.len(),
            num_branches: self.branches.len(),
            num_active_branches: self.active_branches().count(),
            num_reference_buses: self.buses.iter().filter(|b| b.is_reference()).count(),
        }
    }

    /// Build an undirected multigraph over the buses with one edge per
    /// in-service branch. Branches with an unknown endpoint are skipped;
    /// matrix construction reports them as topology errors.
    pub fn graph(&self) -> Graph<BusId, BranchId, Undirected> {
        let mut graph = Graph::new_undirected();
        let mut nodes: HashMap<BusId, NodeIndex> = HashMap::with_capacity(self.buses.len());
        for bus in &self.buses {
            nodes.insert(bus.id, graph.add_node(bus.id));
        }
        for branch in self.active_branches() {
            if let (Some(&a), Some(&b)) = (nodes.get(&branch.from_bus), nodes.get(&branch.to_bus))
            {
                graph.add_edge(a, b, branch.id);
            }
        }
        graph
    }
}

/// Statistics about a network's size
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_branches: usize,
    pub num_active_branches: usize,
    pub num_reference_buses: usize,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses ({} reference), {} branches ({} in service)",
            self.num_buses,
            self.num_reference_buses,
            self.num_branches,
            self.num_active_branches
        )
    }
}
