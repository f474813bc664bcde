//! Self-describing JSON persistence for PTDF and LODF matrices.
//!
//! A record keeps everything needed to rebuild the in-memory matrix exactly:
//! - Body (dense row-major or CSR) with its shape
//! - Axis labels; lookup tables are rebuilt from them on load
//! - Sparsification tolerance
//! - PTDF only: reference positions, subnetwork partition, slack weights
//!
//! Records carry a semver format version; files from a newer major version
//! are rejected.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use faer::Mat;
use pnm_algo::{
    Axis, LabeledMatrix, LodfMatrix, MatrixBody, PtdfMatrix, SensitivityBody, Subnetworks,
};
use pnm_core::BusId;
use serde::{Deserialize, Serialize};
use sprs::CsMat;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Current record format version (semver)
pub const CURRENT_FORMAT_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("expected a {expected} record, found {found}")]
    WrongKind {
        expected: MatrixKind,
        found: MatrixKind,
    },

    #[error("body has {got} values, shape {rows}x{cols} needs {expected}")]
    BodyLength {
        rows: usize,
        cols: usize,
        expected: usize,
        got: usize,
    },

    #[error("duplicate {axis} label '{label}'")]
    DuplicateLabel { axis: &'static str, label: String },

    #[error("invalid CSR structure: {0}")]
    Csr(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixKind {
    Ptdf,
    Lodf,
}

impl std::fmt::Display for MatrixKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MatrixKind::Ptdf => "ptdf",
            MatrixKind::Lodf => "lodf",
        })
    }
}

/// Matrix body as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum BodyRecord {
    /// Row-major values
    Dense { values: Vec<f64> },
    Csr {
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRecord {
    pub format_version: String,
    pub created_at: DateTime<Utc>,
    /// Crate version that wrote the record
    pub pnm_version: String,
    pub kind: MatrixKind,
    pub rows: usize,
    pub cols: usize,
    /// PTDF: row labels. Empty for LODF.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bus_labels: Vec<BusId>,
    /// PTDF: column labels. LODF: row and column labels.
    pub branch_labels: Vec<String>,
    pub body: BodyRecord,
    pub tolerance: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ref_positions: Vec<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subnetworks: BTreeMap<usize, BTreeSet<usize>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributed_slack: Vec<f64>,
}

impl MatrixRecord {
    fn new(kind: MatrixKind, body: &SensitivityBody, branch_labels: Vec<String>) -> Self {
        let (rows, cols) = body.shape();
        Self {
            format_version: CURRENT_FORMAT_VERSION.to_string(),
            created_at: Utc::now(),
            pnm_version: env!("CARGO_PKG_VERSION").to_string(),
            kind,
            rows,
            cols,
            bus_labels: Vec::new(),
            branch_labels,
            body: BodyRecord::from_body(body),
            tolerance: 0.0,
            ref_positions: Vec::new(),
            subnetworks: BTreeMap::new(),
            distributed_slack: Vec::new(),
        }
    }

    pub fn from_ptdf(ptdf: &PtdfMatrix) -> Self {
        let mut record = Self::new(
            MatrixKind::Ptdf,
            ptdf.body(),
            ptdf.branch_axis().labels().to_vec(),
        );
        record.bus_labels = ptdf.bus_axis().labels().to_vec();
        record.tolerance = ptdf.tolerance();
        record.ref_positions = ptdf.ref_positions().to_vec();
        record.subnetworks = ptdf.subnetworks().as_map().clone();
        record.distributed_slack = ptdf.distributed_slack().to_vec();
        record
    }

    pub fn from_lodf(lodf: &LodfMatrix) -> Self {
        let mut record = Self::new(
            MatrixKind::Lodf,
            lodf.body(),
            lodf.branch_axis().labels().to_vec(),
        );
        record.tolerance = lodf.tolerance();
        record
    }

    /// Check if this record's format version is readable by this build.
    pub fn is_compatible(&self) -> Result<()> {
        use semver::Version;

        let record_version = Version::parse(&self.format_version)
            .map_err(|e| anyhow!("Invalid format version in record: {}", e))?;
        let current_version = Version::parse(CURRENT_FORMAT_VERSION)?;

        if record_version.major > current_version.major {
            bail!(
                "Record format v{} is too new (this version supports up to v{})",
                self.format_version,
                CURRENT_FORMAT_VERSION
            );
        }
        Ok(())
    }

    pub fn into_ptdf(self) -> Result<PtdfMatrix> {
        self.expect_kind(MatrixKind::Ptdf)?;
        let body = self.body.into_body(self.rows, self.cols)?;
        let rows = axis(self.bus_labels, "bus")?;
        let cols = axis(self.branch_labels, "branch")?;
        let matrix = LabeledMatrix::new(body, rows, cols)?;
        Ok(PtdfMatrix::from_parts(
            matrix,
            self.ref_positions,
            Subnetworks::from_map(self.subnetworks),
            self.distributed_slack,
            self.tolerance,
        )?)
    }

    pub fn into_lodf(self) -> Result<LodfMatrix> {
        self.expect_kind(MatrixKind::Lodf)?;
        let body = self.body.into_body(self.rows, self.cols)?;
        let labels = axis(self.branch_labels, "branch")?;
        let matrix = LabeledMatrix::new(body, labels.clone(), labels)?;
        Ok(LodfMatrix::from_parts(matrix, self.tolerance)?)
    }

    fn expect_kind(&self, expected: MatrixKind) -> Result<()> {
        self.is_compatible()?;
        if self.kind != expected {
            return Err(RecordError::WrongKind {
                expected,
                found: self.kind,
            }
            .into());
        }
        Ok(())
    }
}

impl BodyRecord {
    pub fn from_body(body: &SensitivityBody) -> Self {
        match body {
            SensitivityBody::Dense(m) => {
                let mut values = Vec::with_capacity(m.nrows() * m.ncols());
                for i in 0..m.nrows() {
                    for j in 0..m.ncols() {
                        values.push(m.read(i, j));
                    }
                }
                BodyRecord::Dense { values }
            }
            SensitivityBody::Sparse(m) => {
                let csr = if m.is_csr() { m.clone() } else { m.to_csr() };
                BodyRecord::Csr {
                    indptr: csr.indptr().raw_storage().to_vec(),
                    indices: csr.indices().to_vec(),
                    data: csr.data().to_vec(),
                }
            }
        }
    }

    pub fn into_body(self, rows: usize, cols: usize) -> Result<SensitivityBody> {
        match self {
            BodyRecord::Dense { values } => {
                if values.len() != rows * cols {
                    return Err(RecordError::BodyLength {
                        rows,
                        cols,
                        expected: rows * cols,
                        got: values.len(),
                    }
                    .into());
                }
                Ok(SensitivityBody::Dense(Mat::from_fn(rows, cols, |i, j| {
                    values[i * cols + j]
                })))
            }
            BodyRecord::Csr {
                indptr,
                indices,
                data,
            } => {
                let m = CsMat::try_new((rows, cols), indptr, indices, data)
                    .map_err(|(_, _, _, e)| RecordError::Csr(format!("{e:?}")))?;
                Ok(SensitivityBody::Sparse(m))
            }
        }
    }
}

fn axis<K>(labels: Vec<K>, name: &'static str) -> Result<Axis<K>>
where
    K: Eq + std::hash::Hash + Clone + std::fmt::Display,
{
    Axis::new(labels).map_err(|dup| {
        RecordError::DuplicateLabel {
            axis: name,
            label: dup.to_string(),
        }
        .into()
    })
}

pub fn save_record(record: &MatrixRecord, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(record).context("serializing matrix record")?;
    fs::write(path, text).with_context(|| format!("writing matrix '{}'", path.display()))?;
    debug!(
        path = %path.display(),
        kind = %record.kind,
        rows = record.rows,
        cols = record.cols,
        "matrix record saved"
    );
    Ok(())
}

pub fn load_record(path: &Path) -> Result<MatrixRecord> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading matrix '{}'", path.display()))?;
    let record: MatrixRecord = serde_json::from_str(&text)
        .with_context(|| format!("parsing matrix '{}'", path.display()))?;
    record.is_compatible()?;
    Ok(record)
}

pub fn save_ptdf(ptdf: &PtdfMatrix, path: &Path) -> Result<()> {
    save_record(&MatrixRecord::from_ptdf(ptdf), path)
}

pub fn load_ptdf(path: &Path) -> Result<PtdfMatrix> {
    load_record(path)?
        .into_ptdf()
        .with_context(|| format!("rebuilding PTDF from '{}'", path.display()))
}

pub fn save_lodf(lodf: &LodfMatrix, path: &Path) -> Result<()> {
    save_record(&MatrixRecord::from_lodf(lodf), path)
}

pub fn load_lodf(path: &Path) -> Result<LodfMatrix> {
    load_record(path)?
        .into_lodf()
        .with_context(|| format!("rebuilding LODF from '{}'", path.display()))
}
