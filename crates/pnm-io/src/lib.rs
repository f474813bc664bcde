//! # pnm-io: Topology & Matrix I/O
//!
//! File formats around the sensitivity engine:
//!
//! | File | Format | Functions |
//! |------|--------|-----------|
//! | Topology | JSON (serde form of [`pnm_core::Network`]) | [`load_network`], [`save_network`] |
//! | Configuration | TOML ([`pnm_algo::SensitivityConfig`]) | [`load_config`], [`parse_config`] |
//! | PTDF / LODF | JSON [`MatrixRecord`] | [`save_ptdf`], [`load_ptdf`], [`save_lodf`], [`load_lodf`] |
//!
//! Saving then loading a matrix restores its body, labels, lookups, tolerance
//! and (for PTDF) reference buses, partition and slack weights exactly.
//!
//! ```rust,no_run
//! use pnm_algo::{PtdfMatrix, SensitivityConfig};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let network = pnm_io::load_network(Path::new("five_bus.json"))?;
//!     let ptdf = PtdfMatrix::from_network(&network, &SensitivityConfig::default())?;
//!     pnm_io::save_ptdf(&ptdf, Path::new("ptdf.json"))?;
//!     Ok(())
//! }
//! ```

pub mod matrix_record;
pub mod topology;

pub use matrix_record::{
    load_lodf, load_ptdf, load_record, save_lodf, save_ptdf, save_record, BodyRecord, MatrixKind,
    MatrixRecord, RecordError, CURRENT_FORMAT_VERSION,
};
pub use topology::{load_config, load_network, parse_config, save_network};
