//! Outage sensitivity on top of the PTDF.
//!
//! - **LODF (Line Outage Distribution Factor):** Redistribution of flow when a branch trips.
//!   `LODF[ℓ,m]` = flow increase on branch ℓ when branch m is outaged, as a fraction
//!   of the pre-outage flow on branch m.
//!
//! ## References
//!
//! - Wood & Wollenberg, "Power Generation, Operation and Control", Ch. 9
//! - Guo et al., "Direct Calculation of Line Outage Distribution Factors",
//!   IEEE Trans. Power Systems, 2009

pub mod lodf;

pub use lodf::{lodf_correction_factors, LodfMatrix, LODF_SELF_TERM_THRESHOLD};
