//! Similarity matrix representations.
//!
//! Rows are candidates, columns are reference dimensions. Two host layouts
//! carry identical semantics:
//!
//! | Type | Layout | Kernel |
//! |------|--------|--------|
//! | [`DenseMatrix`] | row-major `f64` | [`crate::dense`] |
//! | [`CsrMatrix`] | compressed rows (`data`, `indices`, `indptr`) | [`crate::sparse`] |
//!
//! Every entry must be finite and nonnegative. Validation runs when a matrix
//! is handed to an objective, before any coverage state exists. Structure
//! (buffer lengths, `indptr`, column ids) is checked on construction, and
//! with the `serde` feature deserialization goes through the same
//! constructors.
//!
//! ```rust
//! use facloc::{CsrMatrix, DenseMatrix};
//!
//! let dense = DenseMatrix::new(2, 3, vec![1.0, 0.0, 2.0, 0.0, 3.0, 0.0]).unwrap();
//! let csr = CsrMatrix::from_dense(&dense).unwrap();
//! assert_eq!(csr.nnz(), 3);
//! assert_eq!(csr.row_dense(0), vec![1.0, 0.0, 2.0]);
//! ```

use crate::{FaclocError, Result};

/// Widest CSR matrix whose column ids all fit in `u32`.
const MAX_CSR_COLS: u64 = u32::MAX as u64 + 1;

fn check_csr_width(ncols: usize) -> Result<()> {
    if ncols as u64 > MAX_CSR_COLS {
        return Err(FaclocError::MalformedMatrix(format!(
            "{ncols} columns cannot be addressed by u32 column ids"
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Dense
// ─────────────────────────────────────────────────────────────────────────────

/// Row-major dense similarity matrix.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "raw::DenseMatrixRaw"))]
pub struct DenseMatrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    /// Wrap a row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::MalformedMatrix`] if `data.len() != nrows * ncols`.
    pub fn new(nrows: usize, ncols: usize, data: Vec<f64>) -> Result<Self> {
        let expected = nrows.checked_mul(ncols).ok_or_else(|| {
            FaclocError::MalformedMatrix(format!("{nrows} x {ncols} overflows usize"))
        })?;
        if data.len() != expected {
            return Err(FaclocError::MalformedMatrix(format!(
                "dense buffer has {} values, expected {nrows} x {ncols} = {expected}",
                data.len()
            )));
        }
        Ok(Self { nrows, ncols, data })
    }

    /// Build from nested rows. All rows must have the same length.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::MalformedMatrix`] on ragged rows.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let ncols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * ncols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != ncols {
                return Err(FaclocError::MalformedMatrix(format!(
                    "row {i} has {} columns, row 0 has {ncols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Self::new(rows.len(), ncols, data)
    }

    /// Number of rows (candidates).
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns (reference dimensions).
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= nrows`.
    #[inline]
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    /// The row-major buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Check that every entry is finite and nonnegative.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::InvalidInput`] naming the first offending entry.
    pub fn validate(&self) -> Result<()> {
        match self.data.iter().position(|v| !is_valid_entry(*v)) {
            None => Ok(()),
            Some(pos) => Err(FaclocError::InvalidInput {
                row: pos / self.ncols,
                col: pos % self.ncols,
                value: self.data[pos],
            }),
        }
    }

    /// Per-column sums.
    #[must_use]
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.ncols];
        for i in 0..self.nrows {
            for (s, v) in sums.iter_mut().zip(self.row(i)) {
                *s += v;
            }
        }
        sums
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compressed sparse row
// ─────────────────────────────────────────────────────────────────────────────

/// Compressed sparse row similarity matrix.
///
/// Row `i` stores its explicit entries in `data[indptr[i]..indptr[i + 1]]`
/// with column ids in the matching slice of `indices`. Absent entries are
/// zero.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "raw::CsrMatrixRaw"))]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
    indices: Vec<u32>,
    indptr: Vec<usize>,
}

impl CsrMatrix {
    /// Assemble from raw CSR buffers.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::MalformedMatrix`] if `ncols` exceeds what `u32`
    /// column ids can address, if `indptr` does not have `nrows + 1`
    /// non-decreasing entries ending at `data.len()`, if `data` and `indices`
    /// differ in length, if a column id is `>= ncols`, or if the column ids
    /// of a row are not strictly increasing.
    pub fn new(
        nrows: usize,
        ncols: usize,
        data: Vec<f64>,
        indices: Vec<u32>,
        indptr: Vec<usize>,
    ) -> Result<Self> {
        check_csr_width(ncols)?;
        if nrows.checked_add(1) != Some(indptr.len()) {
            return Err(FaclocError::MalformedMatrix(format!(
                "indptr has {} entries for {nrows} rows",
                indptr.len()
            )));
        }
        if data.len() != indices.len() {
            return Err(FaclocError::MalformedMatrix(format!(
                "data has {} values but indices has {}",
                data.len(),
                indices.len()
            )));
        }
        if indptr[0] != 0 || indptr[nrows] != data.len() {
            return Err(FaclocError::MalformedMatrix(format!(
                "indptr must span 0..{}, got {}..{}",
                data.len(),
                indptr[0],
                indptr[nrows]
            )));
        }
        if let Some(w) = indptr.windows(2).position(|w| w[0] > w[1]) {
            return Err(FaclocError::MalformedMatrix(format!(
                "indptr decreases at row {w}"
            )));
        }
        if let Some(&k) = indices.iter().find(|&&k| k as usize >= ncols) {
            return Err(FaclocError::MalformedMatrix(format!(
                "column index {k} >= ncols {ncols}"
            )));
        }
        for i in 0..nrows {
            let cols = &indices[indptr[i]..indptr[i + 1]];
            if cols.windows(2).any(|w| w[0] >= w[1]) {
                return Err(FaclocError::MalformedMatrix(format!(
                    "column ids of row {i} are not strictly increasing"
                )));
            }
        }
        Ok(Self {
            nrows,
            ncols,
            data,
            indices,
            indptr,
        })
    }

    /// Encode a dense matrix, dropping exact zeros.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::MalformedMatrix`] if the matrix is wider than
    /// `u32` column ids can address.
    pub fn from_dense(dense: &DenseMatrix) -> Result<Self> {
        check_csr_width(dense.ncols())?;
        let mut data = Vec::new();
        let mut indices = Vec::new();
        let mut indptr = Vec::with_capacity(dense.nrows() + 1);
        indptr.push(0);
        for i in 0..dense.nrows() {
            for (k, &v) in dense.row(i).iter().enumerate() {
                if v != 0.0 {
                    data.push(v);
                    indices.push(k as u32);
                }
            }
            indptr.push(data.len());
        }
        Ok(Self {
            nrows: dense.nrows(),
            ncols: dense.ncols(),
            data,
            indices,
            indptr,
        })
    }

    /// Number of rows (candidates).
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns (reference dimensions).
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of explicitly stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Explicit entries of row `i` as `(column ids, values)`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= nrows`.
    #[inline]
    #[must_use]
    pub fn row(&self, i: usize) -> (&[u32], &[f64]) {
        let range = self.indptr[i]..self.indptr[i + 1];
        (&self.indices[range.clone()], &self.data[range])
    }

    /// Materialize row `i` densely.
    #[must_use]
    pub fn row_dense(&self, i: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.ncols];
        let (cols, vals) = self.row(i);
        for (&k, &v) in cols.iter().zip(vals) {
            out[k as usize] = v;
        }
        out
    }

    /// Check that every stored entry is finite and nonnegative.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::InvalidInput`] naming the first offending entry.
    pub fn validate(&self) -> Result<()> {
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            if let Some(j) = vals.iter().position(|v| !is_valid_entry(*v)) {
                return Err(FaclocError::InvalidInput {
                    row: i,
                    col: cols[j] as usize,
                    value: vals[j],
                });
            }
        }
        Ok(())
    }

    /// Per-column sums over stored entries.
    #[must_use]
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.ncols];
        for (&k, &v) in self.indices.iter().zip(&self.data) {
            sums[k as usize] += v;
        }
        sums
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Either layout
// ─────────────────────────────────────────────────────────────────────────────

/// A similarity matrix in either host layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SimilarityMatrix {
    /// Row-major dense.
    Dense(DenseMatrix),
    /// Compressed sparse row.
    Sparse(CsrMatrix),
}

impl SimilarityMatrix {
    /// Number of rows (candidates).
    #[must_use]
    pub fn n_rows(&self) -> usize {
        match self {
            Self::Dense(m) => m.nrows(),
            Self::Sparse(m) => m.nrows(),
        }
    }

    /// Number of columns (reference dimensions).
    #[must_use]
    pub fn n_cols(&self) -> usize {
        match self {
            Self::Dense(m) => m.ncols(),
            Self::Sparse(m) => m.ncols(),
        }
    }

    /// Fail with [`FaclocError::IndexOutOfBounds`] unless every index
    /// addresses a row.
    pub fn check_indices(&self, idxs: &[usize]) -> Result<()> {
        let len = self.n_rows();
        match idxs.iter().find(|&&i| i >= len) {
            Some(&index) => Err(FaclocError::IndexOutOfBounds { index, len }),
            None => Ok(()),
        }
    }

    /// Check that every entry is finite and nonnegative.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::InvalidInput`] naming the first offending entry.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Dense(m) => m.validate(),
            Self::Sparse(m) => m.validate(),
        }
    }

    /// Per-column sums.
    #[must_use]
    pub fn column_sums(&self) -> Vec<f64> {
        match self {
            Self::Dense(m) => m.column_sums(),
            Self::Sparse(m) => m.column_sums(),
        }
    }
}

impl From<DenseMatrix> for SimilarityMatrix {
    fn from(m: DenseMatrix) -> Self {
        Self::Dense(m)
    }
}

impl From<CsrMatrix> for SimilarityMatrix {
    fn from(m: CsrMatrix) -> Self {
        Self::Sparse(m)
    }
}

#[inline]
fn is_valid_entry(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Wire shapes that deserialize unchecked and convert through the
/// validating constructors.
#[cfg(feature = "serde")]
mod raw {
    use super::{CsrMatrix, DenseMatrix};
    use crate::FaclocError;

    #[derive(serde::Deserialize)]
    pub(super) struct DenseMatrixRaw {
        nrows: usize,
        ncols: usize,
        data: Vec<f64>,
    }

    impl TryFrom<DenseMatrixRaw> for DenseMatrix {
        type Error = FaclocError;

        fn try_from(raw: DenseMatrixRaw) -> Result<Self, Self::Error> {
            Self::new(raw.nrows, raw.ncols, raw.data)
        }
    }

    #[derive(serde::Deserialize)]
    pub(super) struct CsrMatrixRaw {
        nrows: usize,
        ncols: usize,
        data: Vec<f64>,
        indices: Vec<u32>,
        indptr: Vec<usize>,
    }

    impl TryFrom<CsrMatrixRaw> for CsrMatrix {
        type Error = FaclocError;

        fn try_from(raw: CsrMatrixRaw) -> Result<Self, Self::Error> {
            Self::new(raw.nrows, raw.ncols, raw.data, raw.indices, raw.indptr)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DenseMatrix {
        DenseMatrix::from_rows(&[
            [5.0, 1.0, 0.0, 2.0],
            [1.0, 4.0, 1.0, 0.0],
            [0.0, 1.0, 3.0, 1.0],
            [2.0, 0.0, 1.0, 6.0],
        ])
        .unwrap()
    }

    #[test]
    fn dense_wrong_length() {
        let err = DenseMatrix::new(2, 2, vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, FaclocError::MalformedMatrix(_)));
    }

    #[test]
    fn dense_ragged_rows() {
        let rows: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(DenseMatrix::from_rows(&rows).is_err());
    }

    #[test]
    fn dense_rectangular() {
        let m = DenseMatrix::new(2, 3, vec![0.0; 6]).unwrap();
        assert_eq!((m.nrows(), m.ncols()), (2, 3));
        assert_eq!(m.row(1).len(), 3);
    }

    #[test]
    fn negative_entry_located() {
        let m = DenseMatrix::new(2, 2, vec![1.0, 2.0, -3.0, 4.0]).unwrap();
        assert_eq!(
            m.validate(),
            Err(FaclocError::InvalidInput {
                row: 1,
                col: 0,
                value: -3.0
            })
        );
    }

    #[test]
    fn nan_entry_rejected() {
        let m = DenseMatrix::new(1, 2, vec![1.0, f64::NAN]).unwrap();
        assert!(matches!(
            m.validate(),
            Err(FaclocError::InvalidInput { row: 0, col: 1, .. })
        ));
    }

    #[test]
    fn csr_roundtrip_rows() {
        let dense = sample();
        let csr = CsrMatrix::from_dense(&dense).unwrap();
        assert_eq!(csr.nnz(), 12);
        for i in 0..4 {
            assert_eq!(csr.row_dense(i), dense.row(i));
        }
        let (cols, vals) = csr.row(0);
        assert_eq!(cols, &[0, 1, 3]);
        assert_eq!(vals, &[5.0, 1.0, 2.0]);
    }

    #[test]
    fn csr_bad_indptr_length() {
        let err = CsrMatrix::new(2, 2, vec![1.0], vec![0], vec![0, 1]).unwrap_err();
        assert!(matches!(err, FaclocError::MalformedMatrix(_)));
    }

    #[test]
    fn csr_decreasing_indptr() {
        let err = CsrMatrix::new(2, 2, vec![1.0, 1.0], vec![0, 1], vec![0, 2, 1]);
        assert!(err.is_err());
    }

    #[test]
    fn csr_column_out_of_range() {
        let err = CsrMatrix::new(1, 2, vec![1.0], vec![2], vec![0, 1]).unwrap_err();
        assert!(err.to_string().contains("column index 2"));
    }

    #[test]
    fn csr_duplicate_columns_rejected() {
        let err = CsrMatrix::new(1, 3, vec![1.0, 2.0], vec![1, 1], vec![0, 2]).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn csr_negative_entry_located() {
        let csr = CsrMatrix::new(2, 3, vec![1.0, -1.0], vec![2, 1], vec![0, 1, 2]).unwrap();
        assert_eq!(
            csr.validate(),
            Err(FaclocError::InvalidInput {
                row: 1,
                col: 1,
                value: -1.0
            })
        );
    }

    #[test]
    fn csr_empty_rows() {
        let csr = CsrMatrix::new(3, 2, vec![], vec![], vec![0, 0, 0, 0]).unwrap();
        assert_eq!(csr.row_dense(1), vec![0.0, 0.0]);
        assert!(csr.validate().is_ok());
    }

    #[test]
    fn column_sums_agree() {
        let dense = sample();
        let csr = CsrMatrix::from_dense(&dense).unwrap();
        assert_eq!(dense.column_sums(), vec![8.0, 6.0, 5.0, 9.0]);
        assert_eq!(csr.column_sums(), dense.column_sums());
    }

    #[test]
    fn csr_indptr_for_max_rows() {
        let err = CsrMatrix::new(usize::MAX, 1, vec![], vec![], vec![0]).unwrap_err();
        assert!(matches!(err, FaclocError::MalformedMatrix(_)));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn csr_width_limited_to_u32_ids() {
        let widest = u32::MAX as usize + 1;
        assert!(CsrMatrix::new(0, widest, vec![], vec![], vec![0]).is_ok());
        let err = CsrMatrix::new(0, widest + 1, vec![], vec![], vec![0]).unwrap_err();
        assert!(err.to_string().contains("u32 column ids"), "{err}");

        let dense = DenseMatrix::new(0, widest + 1, vec![]).unwrap();
        let err = CsrMatrix::from_dense(&dense).unwrap_err();
        assert!(matches!(err, FaclocError::MalformedMatrix(_)));
        let dense = DenseMatrix::new(0, widest, vec![]).unwrap();
        assert_eq!(CsrMatrix::from_dense(&dense).unwrap().ncols(), widest);
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn dense_short_buffer_rejected() {
        let err = serde_json::from_str::<DenseMatrix>(r#"{"nrows":2,"ncols":3,"data":[1.0,2.0]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("malformed"), "{err}");
    }

    #[test]
    fn dense_round_trips() {
        let m = DenseMatrix::new(2, 2, vec![1.0, 0.5, 0.0, 2.0]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(serde_json::from_str::<DenseMatrix>(&json).unwrap(), m);
    }

    #[test]
    fn csr_bad_indptr_rejected() {
        let json = r#"{"nrows":2,"ncols":3,"data":[1.0],"indices":[0],"indptr":[0,5,1]}"#;
        assert!(serde_json::from_str::<CsrMatrix>(json).is_err());
    }

    #[test]
    fn csr_column_out_of_range_rejected() {
        let json = r#"{"nrows":1,"ncols":2,"data":[1.0],"indices":[7],"indptr":[0,1]}"#;
        let err = serde_json::from_str::<CsrMatrix>(json).unwrap_err();
        assert!(err.to_string().contains("column index 7"), "{err}");
    }

    #[test]
    fn similarity_matrix_goes_through_constructors() {
        let json = r#"{"Dense":{"nrows":1,"ncols":2,"data":[1.0]}}"#;
        assert!(serde_json::from_str::<SimilarityMatrix>(json).is_err());
    }
}
