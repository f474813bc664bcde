//! Labeled matrix container shared by every matrix kind.
//!
//! A [`LabeledMatrix`] is a numeric body plus one [`Axis`] per dimension. Each
//! axis keeps its labels in order together with a label → index lookup, so
//! entries can be addressed either by position or by name (branch name, bus
//! number). Axes are built once and never change afterwards.

use crate::error::SensitivityError;
use faer::Mat;
use sprs::CsMat;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Read access to a 2-D numeric body.
pub trait MatrixBody {
    fn shape(&self) -> (usize, usize);

    /// Entry at `(i, j)`; structural zeros read as `0.0`.
    fn value(&self, i: usize, j: usize) -> f64;
}

impl MatrixBody for CsMat<f64> {
    fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    fn value(&self, i: usize, j: usize) -> f64 {
        self.get(i, j).copied().unwrap_or(0.0)
    }
}

impl MatrixBody for Mat<f64> {
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn value(&self, i: usize, j: usize) -> f64 {
        self.read(i, j)
    }
}

/// Body of a sensitivity matrix: dense until sparsified.
#[derive(Debug, Clone)]
pub enum SensitivityBody {
    Dense(Mat<f64>),
    Sparse(CsMat<f64>),
}

impl SensitivityBody {
    pub fn is_sparse(&self) -> bool {
        matches!(self, SensitivityBody::Sparse(_))
    }

    /// Stored entries (all entries for a dense body).
    pub fn nnz(&self) -> usize {
        match self {
            SensitivityBody::Dense(m) => m.nrows() * m.ncols(),
            SensitivityBody::Sparse(m) => m.nnz(),
        }
    }

    pub fn to_dense(&self) -> Mat<f64> {
        match self {
            SensitivityBody::Dense(m) => m.clone(),
            SensitivityBody::Sparse(m) => {
                let mut dense = Mat::zeros(m.rows(), m.cols());
                for (&val, (i, j)) in m.iter() {
                    dense.write(i, j, val);
                }
                dense
            }
        }
    }
}

impl MatrixBody for SensitivityBody {
    fn shape(&self) -> (usize, usize) {
        match self {
            SensitivityBody::Dense(m) => m.shape(),
            SensitivityBody::Sparse(m) => m.shape(),
        }
    }

    fn value(&self, i: usize, j: usize) -> f64 {
        match self {
            SensitivityBody::Dense(m) => m.value(i, j),
            SensitivityBody::Sparse(m) => m.value(i, j),
        }
    }
}

/// Ordered, unique labels with an index lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis<K: Eq + Hash> {
    labels: Vec<K>,
    lookup: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone> Axis<K> {
    /// Build an axis; returns the first repeated label on failure.
    pub fn new(labels: Vec<K>) -> Result<Self, K> {
        let mut lookup = HashMap::with_capacity(labels.len());
        for (idx, label) in labels.iter().enumerate() {
            if lookup.insert(label.clone(), idx).is_some() {
                return Err(label.clone());
            }
        }
        Ok(Self { labels, lookup })
    }

    pub fn labels(&self) -> &[K] {
        &self.labels
    }

    pub fn lookup(&self) -> &HashMap<K, usize> {
        &self.lookup
    }

    pub fn index_of<Q>(&self, label: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup.get(label).copied()
    }

    pub fn label(&self, idx: usize) -> Option<&K> {
        self.labels.get(idx)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Sub-axis keeping the given positions, in the given order.
    pub(crate) fn select(&self, positions: &[usize]) -> Self {
        let labels: Vec<K> = positions.iter().map(|&p| self.labels[p].clone()).collect();
        let lookup = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), idx))
            .collect();
        Self { labels, lookup }
    }
}

/// Numeric body with labeled rows and columns.
#[derive(Debug, Clone)]
pub struct LabeledMatrix<B, R: Eq + Hash, C: Eq + Hash> {
    body: B,
    rows: Axis<R>,
    cols: Axis<C>,
}

impl<B, R, C> LabeledMatrix<B, R, C>
where
    B: MatrixBody,
    R: Eq + Hash + Clone + Debug,
    C: Eq + Hash + Clone + Debug,
{
    pub fn new(body: B, rows: Axis<R>, cols: Axis<C>) -> Result<Self, SensitivityError> {
        let shape = body.shape();
        if shape != (rows.len(), cols.len()) {
            return Err(SensitivityError::Shape(format!(
                "body is {}x{} but axes have {} row and {} column labels",
                shape.0,
                shape.1,
                rows.len(),
                cols.len()
            )));
        }
        Ok(Self { body, rows, cols })
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn rows(&self) -> &Axis<R> {
        &self.rows
    }

    pub fn cols(&self) -> &Axis<C> {
        &self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        self.body.shape()
    }

    pub fn into_parts(self) -> (B, Axis<R>, Axis<C>) {
        (self.body, self.rows, self.cols)
    }

    /// Entry by position.
    pub fn value(&self, i: usize, j: usize) -> f64 {
        self.body.value(i, j)
    }

    /// Entry by row and column label.
    pub fn get<QR, QC>(&self, row: &QR, col: &QC) -> Option<f64>
    where
        R: Borrow<QR>,
        C: Borrow<QC>,
        QR: Hash + Eq + ?Sized,
        QC: Hash + Eq + ?Sized,
    {
        let i = self.rows.index_of(row)?;
        let j = self.cols.index_of(col)?;
        Some(self.body.value(i, j))
    }

    /// Full row by label.
    pub fn row<Q>(&self, row: &Q) -> Option<Vec<f64>>
    where
        R: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let i = self.rows.index_of(row)?;
        Some((0..self.cols.len()).map(|j| self.body.value(i, j)).collect())
    }

    /// Full column by label.
    pub fn column<Q>(&self, col: &Q) -> Option<Vec<f64>>
    where
        C: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let j = self.cols.index_of(col)?;
        Some((0..self.rows.len()).map(|i| self.body.value(i, j)).collect())
    }

    pub(crate) fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    #[test]
    fn test_axis_rejects_duplicates() {
        assert_eq!(Axis::new(vec!["a", "b", "a"]).unwrap_err(), "a");
        let axis = Axis::new(vec!["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(axis.index_of("b"), Some(1));
        assert_eq!(axis.index_of("z"), None);
        assert_eq!(axis.select(&[1]).labels(), &["b".to_string()]);
    }

    #[test]
    fn test_labeled_lookup() {
        let mut tri = TriMat::new((2, 3));
        tri.add_triplet(0, 2, 5.0);
        tri.add_triplet(1, 0, -1.0);
        let body: CsMat<f64> = tri.to_csr();
        let m = LabeledMatrix::new(
            body,
            Axis::new(vec!["L1".to_string(), "L2".to_string()]).unwrap(),
            Axis::new(vec![10usize, 20, 30]).unwrap(),
        )
        .unwrap();

        assert_eq!(m.get("L1", &30), Some(5.0));
        assert_eq!(m.get("L1", &20), Some(0.0));
        assert_eq!(m.get("L9", &20), None);
        assert_eq!(m.row("L2").unwrap(), vec![-1.0, 0.0, 0.0]);
        assert_eq!(m.column(&30).unwrap(), vec![5.0, 0.0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let body = Mat::<f64>::zeros(2, 2);
        let err = LabeledMatrix::new(
            body,
            Axis::new(vec![1usize]).unwrap(),
            Axis::new(vec![1usize, 2]).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, SensitivityError::Shape(_)));
    }

    #[test]
    fn test_sensitivity_body_dense_view() {
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(1, 1, 0.5);
        let body = SensitivityBody::Sparse(tri.to_csr());
        assert!(body.is_sparse());
        assert_eq!(body.nnz(), 1);
        let dense = body.to_dense();
        assert_eq!(dense.read(1, 1), 0.5);
        assert_eq!(dense.read(0, 1), 0.0);
    }
}
