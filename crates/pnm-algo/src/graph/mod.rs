//! Topology analysis on top of the incidence structure.

pub mod subnetworks;

pub use subnetworks::Subnetworks;
