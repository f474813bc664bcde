//! Tolerance-based zeroing of small-magnitude entries.
//!
//! Sparsification only runs when the tolerance strictly exceeds
//! [`f64::EPSILON`]; at or below that threshold the body is left untouched so
//! a dense result is not rebuilt for nothing.

use super::labeled::SensitivityBody;
use crate::config::validate_tolerance;
use crate::error::SensitivityError;
use faer::Mat;
use sprs::{CsMat, TriMat};

/// True when `tol` triggers sparsification.
#[inline]
pub fn sparsifies(tol: f64) -> bool {
    tol > f64::EPSILON
}

/// Drop every entry with `|v| < tol` from a dense matrix, returning CSR.
pub fn sparsify_dense(matrix: &Mat<f64>, tol: f64) -> CsMat<f64> {
    let mut tri = TriMat::new((matrix.nrows(), matrix.ncols()));
    for j in 0..matrix.ncols() {
        for i in 0..matrix.nrows() {
            let v = matrix.read(i, j);
            if v.abs() >= tol && v != 0.0 {
                tri.add_triplet(i, j, v);
            }
        }
    }
    tri.to_csr()
}

/// Drop every stored entry with `|v| < tol`.
pub fn sparsify_sparse(matrix: &CsMat<f64>, tol: f64) -> CsMat<f64> {
    let mut tri = TriMat::new((matrix.rows(), matrix.cols()));
    for (&v, (i, j)) in matrix.iter() {
        if v.abs() >= tol && v != 0.0 {
            tri.add_triplet(i, j, v);
        }
    }
    tri.to_csr()
}

impl SensitivityBody {
    /// Sparsified copy; a no-op clone when `tol` does not exceed epsilon.
    pub fn sparsified(&self, tol: f64) -> SensitivityBody {
        if !sparsifies(tol) {
            return self.clone();
        }
        match self {
            SensitivityBody::Dense(m) => SensitivityBody::Sparse(sparsify_dense(m, tol)),
            SensitivityBody::Sparse(m) => SensitivityBody::Sparse(sparsify_sparse(m, tol)),
        }
    }
}

/// Sparsify a body in place.
pub fn sparsify(body: &mut SensitivityBody, tol: f64) {
    if sparsifies(tol) {
        *body = body.sparsified(tol);
    }
}

/// Move a built matrix from tolerance `current` to `tol`.
///
/// Entries dropped under `current` cannot be recovered, so once a body has
/// been sparsified the tolerance may only grow.
pub(crate) fn retighten(
    body: &mut SensitivityBody,
    current: f64,
    tol: f64,
) -> Result<(), SensitivityError> {
    validate_tolerance(tol)?;
    if sparsifies(current) && tol < current {
        return Err(SensitivityError::Configuration(format!(
            "cannot loosen tolerance from {current} to {tol}; rebuild the matrix instead"
        )));
    }
    sparsify(body, tol);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::labeled::MatrixBody;

    fn sample() -> Mat<f64> {
        Mat::from_fn(3, 3, |i, j| match (i, j) {
            (0, 0) => 0.5,
            (0, 1) => -1e-5,
            (1, 2) => 2e-3,
            (2, 0) => -0.25,
            _ => 0.0,
        })
    }

    #[test]
    fn test_small_entries_dropped_independent_of_sign() {
        let sparse = sparsify_dense(&sample(), 1e-4);
        assert_eq!(sparse.nnz(), 3);
        assert_eq!(sparse.value(0, 1), 0.0);
        assert_eq!(sparse.value(2, 0), -0.25);

        let tighter = sparsify_sparse(&sparse, 1e-2);
        assert_eq!(tighter.nnz(), 2);
        assert_eq!(tighter.value(1, 2), 0.0);
    }

    #[test]
    fn test_sparsify_is_idempotent() {
        let body = SensitivityBody::Dense(sample());
        let once = body.sparsified(1e-4);
        let twice = once.sparsified(1e-4);
        assert_eq!(once.nnz(), twice.nnz());
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(once.value(i, j), twice.value(i, j));
            }
        }
    }

    #[test]
    fn test_epsilon_tolerance_is_noop() {
        let mut body = SensitivityBody::Dense(sample());
        sparsify(&mut body, f64::EPSILON);
        assert!(!body.is_sparse());
        assert_eq!(body.value(0, 1), -1e-5);
    }

    #[test]
    fn test_retighten_only_tightens() {
        let mut body = SensitivityBody::Dense(sample());
        retighten(&mut body, f64::EPSILON, 0.0).unwrap();
        retighten(&mut body, 0.0, 1e-4).unwrap();
        assert_eq!(body.nnz(), 3);
        assert!(matches!(
            retighten(&mut body, 1e-4, 1e-6),
            Err(SensitivityError::Configuration(_))
        ));
        retighten(&mut body, 1e-4, 1e-2).unwrap();
        assert_eq!(body.nnz(), 2);
        assert!(retighten(&mut body, 1e-2, 2.0).is_err());
    }
}
