//! # pnm-algo: Sensitivity Matrices
//!
//! Builds the DC sensitivity matrices used in steady-state grid studies from a
//! [`pnm_core::Network`]:
//!
//! - **Incidence (A)**: signed branch-to-bus connectivity
//! - **BA**: incidence scaled by branch susceptance, reference columns dropped
//! - **ABA**: reduced susceptance operator `Aᵗ·BA`
//! - **PTDF**: branch flow per unit bus injection
//! - **LODF**: flow redistributed onto each branch when another trips
//!
//! Every matrix is a [`LabeledMatrix`]: a numeric body plus ordered, unique
//! row and column labels (branch names, bus numbers). Construction options
//! travel in an explicit [`SensitivityConfig`].
//!
//! ```rust
//! use pnm_algo::{LodfMatrix, PtdfMatrix, SensitivityConfig};
//! use pnm_core::*;
//!
//! let mut network = Network::new();
//! network.add_bus(Bus::new(BusId::new(1), "Bus 1").with_kind(BusKind::Ref));
//! network.add_bus(Bus::new(BusId::new(2), "Bus 2"));
//! network.add_bus(Bus::new(BusId::new(3), "Bus 3"));
//! for (k, (f, t)) in [(1, 2), (2, 3), (1, 3)].into_iter().enumerate() {
//!     network.add_branch(Branch::new(
//!         BranchId::new(k + 1),
//!         format!("L{}", k + 1),
//!         BusId::new(f),
//!         BusId::new(t),
//!         0.0,
//!         0.1,
//!     ));
//! }
//!
//! let config = SensitivityConfig::default();
//! let ptdf = PtdfMatrix::from_network(&network, &config).unwrap();
//! assert_eq!(ptdf.get("L1", BusId::new(1)), Some(0.0));
//!
//! let lodf = LodfMatrix::from_network(&network, &config).unwrap();
//! assert_eq!(lodf.get("L2", "L2"), Some(-1.0));
//! ```

pub mod config;
pub mod contingency;
pub mod error;
pub mod graph;
pub mod sparse;

pub use config::{ReferenceBusPolicy, SensitivityConfig};
pub use contingency::{lodf_correction_factors, LodfMatrix, LODF_SELF_TERM_THRESHOLD};
pub use error::SensitivityError;
pub use graph::Subnetworks;
pub use sparse::{
    sparsify, sparsify_dense, sparsify_sparse, AbaMatrix, Axis, BaMatrix, BusTopology,
    IncidenceMatrix, LabeledMatrix, MatrixBody, PtdfMatrix, SensitivityBody,
};
