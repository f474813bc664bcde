use super::registry::LinearSolverKind;
use faer::prelude::*;
use faer::solvers::PartialPivLu;
use faer::sparse::solvers::{Cholesky, Lu, SymbolicCholesky, SymbolicLu};
use faer::sparse::SparseColMat;
use faer::{Mat, MatRef, Side};
use petgraph::unionfind::UnionFind;
use sprs::CsMat;
use thiserror::Error;
use tracing::debug;

/// Relative size below which a row sum counts as zero in the floating-block check.
const FLOATING_ROW_TOLERANCE: f64 = 1e-10;

/// Errors from linear-system backends
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("unknown linear solver '{0}'; supported values: sparse-direct, dense, alt-direct")]
    UnknownSolver(String),

    #[error("operator must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("dimension mismatch: expected {expected} rows, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("{0}")]
    Singular(String),
}

/// A factorized operator, ready to solve against any number of right-hand sides.
///
/// Native resources held by the factorization are released when it is dropped.
pub trait Factorization {
    /// Dimension of the factorized operator.
    fn dim(&self) -> usize;

    /// Solve `A X = B` for a dense block `B` (one column per right-hand side).
    fn solve(&self, rhs: MatRef<'_, f64>) -> Result<Mat<f64>, SolverError>;
}

/// Trait for factorizing sparse linear operators.
///
/// This is for linear algebra only; the backend is chosen through
/// [`LinearSolverKind::build_solver`].
pub trait LinearSystemBackend: Send + Sync {
    fn kind(&self) -> LinearSolverKind;

    fn factorize(&self, operator: &CsMat<f64>) -> Result<Box<dyn Factorization>, SolverError>;
}

/// Sparse LU with fill-reducing ordering (default backend).
#[derive(Debug, Clone, Default)]
pub struct SparseLuSolver;

/// Dense LU with partial pivoting.
#[derive(Debug, Clone, Default)]
pub struct DenseLuSolver;

/// Sparse Cholesky; requires a symmetric positive definite operator.
#[derive(Debug, Clone, Default)]
pub struct SparseCholeskySolver;

struct SparseLuFactorization {
    dim: usize,
    lu: Lu<usize, f64>,
}

struct DenseLuFactorization {
    dim: usize,
    lu: PartialPivLu<f64>,
}

struct SparseCholeskyFactorization {
    dim: usize,
    cholesky: Cholesky<usize, f64>,
}

/// Operator with no unknowns (every bus is a reference bus).
struct EmptyFactorization;

impl LinearSystemBackend for SparseLuSolver {
    fn kind(&self) -> LinearSolverKind {
        LinearSolverKind::SparseDirect
    }

    fn factorize(&self, operator: &CsMat<f64>) -> Result<Box<dyn Factorization>, SolverError> {
        let dim = check_operator(operator)?;
        if dim == 0 {
            return Ok(Box::new(EmptyFactorization));
        }
        let mat = to_faer_sparse(operator)?;
        let symbolic = SymbolicLu::try_new(mat.as_ref().symbolic())
            .map_err(|e| SolverError::Singular(format!("symbolic LU failed: {e:?}")))?;
        let lu = Lu::try_new_with_symbolic(symbolic, mat.as_ref())
            .map_err(|e| SolverError::Singular(format!("numeric LU failed: {e:?}")))?;
        debug!(dim, nnz = operator.nnz(), "sparse LU factorization complete");
        Ok(Box::new(SparseLuFactorization { dim, lu }))
    }
}

impl LinearSystemBackend for DenseLuSolver {
    fn kind(&self) -> LinearSolverKind {
        LinearSolverKind::Dense
    }

    fn factorize(&self, operator: &CsMat<f64>) -> Result<Box<dyn Factorization>, SolverError> {
        let dim = check_operator(operator)?;
        if dim == 0 {
            return Ok(Box::new(EmptyFactorization));
        }
        let mut dense = Mat::<f64>::zeros(dim, dim);
        for (&val, (i, j)) in operator.iter() {
            dense.write(i, j, dense.read(i, j) + val);
        }
        let lu = PartialPivLu::new(dense.as_ref());
        debug!(dim, "dense LU factorization complete");
        Ok(Box::new(DenseLuFactorization { dim, lu }))
    }
}

impl LinearSystemBackend for SparseCholeskySolver {
    fn kind(&self) -> LinearSolverKind {
        LinearSolverKind::AltDirect
    }

    fn factorize(&self, operator: &CsMat<f64>) -> Result<Box<dyn Factorization>, SolverError> {
        let dim = check_operator(operator)?;
        if dim == 0 {
            return Ok(Box::new(EmptyFactorization));
        }
        let mat = to_faer_sparse(operator)?;
        let symbolic = SymbolicCholesky::try_new(mat.as_ref().symbolic(), Side::Lower)
            .map_err(|e| SolverError::Singular(format!("symbolic Cholesky failed: {e:?}")))?;
        let cholesky = Cholesky::try_new_with_symbolic(symbolic, mat.as_ref(), Side::Lower)
            .map_err(|e| {
                SolverError::Singular(format!(
                    "Cholesky failed (operator not positive definite): {e:?}"
                ))
            })?;
        debug!(dim, nnz = operator.nnz(), "sparse Cholesky factorization complete");
        Ok(Box::new(SparseCholeskyFactorization { dim, cholesky }))
    }
}

impl Factorization for SparseLuFactorization {
    fn dim(&self) -> usize {
        self.dim
    }

    fn solve(&self, rhs: MatRef<'_, f64>) -> Result<Mat<f64>, SolverError> {
        check_rhs(self.dim, rhs)?;
        finite_or_singular(self.lu.solve(rhs))
    }
}

impl Factorization for DenseLuFactorization {
    fn dim(&self) -> usize {
        self.dim
    }

    fn solve(&self, rhs: MatRef<'_, f64>) -> Result<Mat<f64>, SolverError> {
        check_rhs(self.dim, rhs)?;
        finite_or_singular(self.lu.solve(rhs))
    }
}

impl Factorization for SparseCholeskyFactorization {
    fn dim(&self) -> usize {
        self.dim
    }

    fn solve(&self, rhs: MatRef<'_, f64>) -> Result<Mat<f64>, SolverError> {
        check_rhs(self.dim, rhs)?;
        finite_or_singular(self.cholesky.solve(rhs))
    }
}

impl Factorization for EmptyFactorization {
    fn dim(&self) -> usize {
        0
    }

    fn solve(&self, rhs: MatRef<'_, f64>) -> Result<Mat<f64>, SolverError> {
        check_rhs(0, rhs)?;
        Ok(Mat::zeros(0, rhs.ncols()))
    }
}

/// Square check plus a structural check: an empty row means an unknown no
/// equation constrains, which no backend can recover from.
fn check_operator(operator: &CsMat<f64>) -> Result<usize, SolverError> {
    let (rows, cols) = (operator.rows(), operator.cols());
    if rows != cols {
        return Err(SolverError::NotSquare { rows, cols });
    }
    let mut touched = vec![false; rows];
    for (&val, (i, _)) in operator.iter() {
        if val != 0.0 {
            touched[i] = true;
        }
    }
    if let Some(row) = touched.iter().position(|t| !t) {
        return Err(SolverError::Singular(format!(
            "operator row {row} is structurally empty"
        )));
    }
    check_floating_blocks(operator)?;
    Ok(rows)
}

/// Rejects an operator with a block of rows, closed under its nonzero
/// pattern, in which every row sums to zero. The all-ones vector on such a
/// block is a null vector, so the operator is singular. A reduced B' matrix
/// has this shape for every island that no reference bus grounds.
///
/// Sparse LU panics on these operators instead of reporting a
/// zero pivot, so they must never reach it.
fn check_floating_blocks(operator: &CsMat<f64>) -> Result<(), SolverError> {
    let n = operator.rows();
    let mut blocks = UnionFind::<usize>::new(n);
    let mut row_sum = vec![0.0_f64; n];
    let mut row_scale = vec![0.0_f64; n];
    for (&val, (i, j)) in operator.iter() {
        if val == 0.0 {
            continue;
        }
        blocks.union(i, j);
        row_sum[i] += val;
        row_scale[i] = row_scale[i].max(val.abs());
    }

    let mut grounded = vec![false; n];
    for (row, (sum, scale)) in row_sum.iter().zip(&row_scale).enumerate() {
        if sum.abs() > FLOATING_ROW_TOLERANCE * scale {
            grounded[blocks.find(row)] = true;
        }
    }
    if let Some(row) = (0..n).find(|&row| !grounded[blocks.find(row)]) {
        let size = (0..n)
            .filter(|&other| blocks.equiv(row, other))
            .count();
        return Err(SolverError::Singular(format!(
            "operator rows coupled to row {row} ({size} rows) sum to zero; the block is not grounded"
        )));
    }
    Ok(())
}

fn check_rhs(dim: usize, rhs: MatRef<'_, f64>) -> Result<(), SolverError> {
    if rhs.nrows() != dim {
        return Err(SolverError::DimensionMismatch {
            expected: dim,
            got: rhs.nrows(),
        });
    }
    Ok(())
}

fn to_faer_sparse(operator: &CsMat<f64>) -> Result<SparseColMat<usize, f64>, SolverError> {
    let triplets: Vec<(usize, usize, f64)> = operator
        .iter()
        .map(|(&val, (i, j))| (i, j, val))
        .collect();
    SparseColMat::try_new_from_triplets(operator.rows(), operator.cols(), &triplets)
        .map_err(|e| SolverError::Singular(format!("invalid sparse operator: {e:?}")))
}

fn finite_or_singular(solution: Mat<f64>) -> Result<Mat<f64>, SolverError> {
    for j in 0..solution.ncols() {
        for i in 0..solution.nrows() {
            if !solution.read(i, j).is_finite() {
                return Err(SolverError::Singular(format!(
                    "non-finite solution entry at ({i}, {j})"
                )));
            }
        }
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn laplacian_3() -> CsMat<f64> {
        // reduced B' of a triangle with unit susceptances, slack removed
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(0, 0, 2.0);
        tri.add_triplet(0, 1, -1.0);
        tri.add_triplet(1, 0, -1.0);
        tri.add_triplet(1, 1, 2.0);
        tri.to_csr()
    }

    fn all_backends() -> Vec<Box<dyn LinearSystemBackend>> {
        vec![
            Box::new(SparseLuSolver),
            Box::new(DenseLuSolver),
            Box::new(SparseCholeskySolver),
        ]
    }

    #[test]
    fn test_backends_agree_on_spd_system() {
        let a = laplacian_3();
        let rhs = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        for backend in all_backends() {
            let factor = backend.factorize(&a).unwrap();
            assert_eq!(factor.dim(), 2);
            let inv = factor.solve(rhs.as_ref()).unwrap();
            // inverse of [[2,-1],[-1,2]] is [[2,1],[1,2]] / 3
            assert!((inv.read(0, 0) - 2.0 / 3.0).abs() < 1e-12, "{:?}", backend.kind());
            assert!((inv.read(0, 1) - 1.0 / 3.0).abs() < 1e-12, "{:?}", backend.kind());
            assert!((inv.read(1, 1) - 2.0 / 3.0).abs() < 1e-12, "{:?}", backend.kind());
        }
    }

    #[test]
    fn test_rhs_dimension_checked() {
        let factor = SparseLuSolver.factorize(&laplacian_3()).unwrap();
        let rhs = Mat::<f64>::zeros(3, 1);
        assert!(matches!(
            factor.solve(rhs.as_ref()),
            Err(SolverError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_empty_row_is_singular() {
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(0, 0, 1.0);
        let a: CsMat<f64> = tri.to_csr();
        for backend in all_backends() {
            assert!(matches!(backend.factorize(&a), Err(SolverError::Singular(_))));
        }
    }

    #[test]
    fn test_ungrounded_block_is_singular() {
        // [[1,-1],[-1,1]] floats; the trailing [[2]] is grounded
        let mut tri = TriMat::new((3, 3));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 1, -1.0);
        tri.add_triplet(1, 0, -1.0);
        tri.add_triplet(1, 1, 1.0);
        tri.add_triplet(2, 2, 2.0);
        let a: CsMat<f64> = tri.to_csr();
        for backend in all_backends() {
            match backend.factorize(&a) {
                Err(SolverError::Singular(msg)) => {
                    assert!(msg.contains("2 rows"), "{:?}: {msg}", backend.kind())
                }
                Err(other) => panic!("{:?}: unexpected error {other}", backend.kind()),
                Ok(_) => panic!("{:?}: factorized a singular operator", backend.kind()),
            }
        }
    }

    #[test]
    fn test_grounded_chain_factorizes() {
        // path 0-1-2 grounded only through row 0
        let mut tri = TriMat::new((3, 3));
        tri.add_triplet(0, 0, 2.0);
        tri.add_triplet(0, 1, -1.0);
        tri.add_triplet(1, 0, -1.0);
        tri.add_triplet(1, 1, 2.0);
        tri.add_triplet(1, 2, -1.0);
        tri.add_triplet(2, 1, -1.0);
        tri.add_triplet(2, 2, 1.0);
        let a: CsMat<f64> = tri.to_csr();
        for backend in all_backends() {
            assert!(backend.factorize(&a).is_ok(), "{:?}", backend.kind());
        }
    }

    #[test]
    fn test_non_square_rejected() {
        let tri: TriMat<f64> = TriMat::new((2, 3));
        let a: CsMat<f64> = tri.to_csr();
        assert!(matches!(
            DenseLuSolver.factorize(&a),
            Err(SolverError::NotSquare { rows: 2, cols: 3 })
        ));
    }

    #[test]
    fn test_empty_operator() {
        let tri: TriMat<f64> = TriMat::new((0, 0));
        let a: CsMat<f64> = tri.to_csr();
        let factor = SparseLuSolver.factorize(&a).unwrap();
        let out = factor.solve(Mat::<f64>::zeros(0, 4).as_ref()).unwrap();
        assert_eq!((out.nrows(), out.ncols()), (0, 4));
    }

    #[test]
    fn test_indefinite_operator_rejected_by_cholesky() {
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 1, 2.0);
        tri.add_triplet(1, 0, 2.0);
        tri.add_triplet(1, 1, 1.0);
        let a: CsMat<f64> = tri.to_csr();
        assert!(SparseCholeskySolver.factorize(&a).is_err());
        // LU handles the same (non-singular) indefinite operator
        assert!(SparseLuSolver.factorize(&a).is_ok());
    }
}
