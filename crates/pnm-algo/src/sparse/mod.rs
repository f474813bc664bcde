//! Sparse topology matrices and the PTDF built from them.
//!
//! Construction order, each step reusable on its own:
//!
//! ```text
//! Network ─► IncidenceMatrix ─► BaMatrix ─► AbaMatrix ─► PtdfMatrix
//! ```
//!
//! | Type | Rows × columns | Storage |
//! |------|----------------|---------|
//! | [`IncidenceMatrix`] | branches × buses | CSR, entries ±1 |
//! | [`BaMatrix`] | branches × non-reference buses | CSR |
//! | [`AbaMatrix`] | non-reference × non-reference buses | CSR |
//! | [`PtdfMatrix`] | buses × branches (transposed) | dense, CSR once sparsified |

pub mod incidence;
pub mod labeled;
pub mod sensitivity;
pub mod sparsify;
pub mod susceptance;

pub use incidence::{BusTopology, IncidenceMatrix};
pub use labeled::{Axis, LabeledMatrix, MatrixBody, SensitivityBody};
pub use sensitivity::PtdfMatrix;
pub use sparsify::{sparsify, sparsify_dense, sparsify_sparse};
pub use susceptance::{AbaMatrix, BaMatrix};
