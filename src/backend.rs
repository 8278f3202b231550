//! Execution backend, chosen once per run.
//!
//! | Input | Preference | Backend |
//! |-------|------------|---------|
//! | [`CsrMatrix`] | any | [`Backend::Sparse`] |
//! | [`DenseMatrix`] | `Cpu` | [`Backend::Dense`] |
//! | [`DenseMatrix`] | `Auto` | CUDA [`Backend::Device`] if present, else [`Backend::Dense`] |
//! | [`DenseMatrix`] | `Device` | CUDA [`Backend::Device`] if present, else a host [`DeviceBlock`] |
//!
//! Feature detection happens here, at setup, and never inside the gain
//! loop. Every variant answers the same questions (gains for a candidate
//! list, fold a row into coverage) so objectives do not care which one runs.

use tracing::{debug, info};

use crate::config::BackendPreference;
use crate::coverage::Coverage;
use crate::device::DeviceBlock;
use crate::matrix::{CsrMatrix, DenseMatrix, SimilarityMatrix};
use crate::{dense, sparse, FaclocError, Result};

/// Which kernel family a [`Backend`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Dense CPU kernel.
    Dense,
    /// CSR CPU kernel.
    Sparse,
    /// Fused device kernel.
    Device,
}

/// A validated similarity matrix bound to its kernel.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Dense CPU kernel.
    Dense(DenseMatrix),
    /// CSR CPU kernel.
    Sparse(CsrMatrix),
    /// Fused device kernel.
    Device(DeviceBlock),
}

impl Backend {
    /// Validate `matrix` and bind it to a backend.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::InvalidInput`] if any entry is negative or not
    /// finite. A missing or failing device is not an error: the run falls
    /// back to a CPU path.
    pub fn resolve(matrix: SimilarityMatrix, preference: BackendPreference) -> Result<Self> {
        Self::resolve_with(matrix, preference, DeviceBlock::upload)
    }

    /// Like [`resolve`](Self::resolve) with the device upload supplied.
    pub(crate) fn resolve_with(
        matrix: SimilarityMatrix,
        preference: BackendPreference,
        upload: impl FnOnce(&DenseMatrix) -> Result<DeviceBlock>,
    ) -> Result<Self> {
        matrix.validate()?;
        let backend = match matrix {
            SimilarityMatrix::Sparse(x) => Self::Sparse(x),
            SimilarityMatrix::Dense(x) => match preference {
                BackendPreference::Cpu => Self::Dense(x),
                BackendPreference::Auto | BackendPreference::Device => match upload(&x) {
                    Ok(block) => Self::Device(block),
                    Err(err) => {
                        info!(?preference, %err, "no CUDA device, falling back to host kernel");
                        if preference == BackendPreference::Device {
                            Self::Device(DeviceBlock::host(&x))
                        } else {
                            Self::Dense(x)
                        }
                    }
                },
            },
        };
        debug!(
            kind = ?backend.kind(),
            rows = backend.nrows(),
            cols = backend.ncols(),
            "backend resolved"
        );
        Ok(backend)
    }

    /// Kernel family.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Dense(_) => BackendKind::Dense,
            Self::Sparse(_) => BackendKind::Sparse,
            Self::Device(_) => BackendKind::Device,
        }
    }

    /// Number of candidate rows.
    #[must_use]
    pub fn nrows(&self) -> usize {
        match self {
            Self::Dense(x) => x.nrows(),
            Self::Sparse(x) => x.nrows(),
            Self::Device(b) => b.nrows(),
        }
    }

    /// Number of reference dimensions.
    #[must_use]
    pub fn ncols(&self) -> usize {
        match self {
            Self::Dense(x) => x.ncols(),
            Self::Sparse(x) => x.ncols(),
            Self::Device(b) => b.ncols(),
        }
    }

    /// Fail with [`FaclocError::IndexOutOfBounds`] unless every index
    /// addresses a row.
    pub fn check_indices(&self, idxs: &[usize]) -> Result<()> {
        let len = self.nrows();
        match idxs.iter().find(|&&i| i >= len) {
            Some(&index) => Err(FaclocError::IndexOutOfBounds { index, len }),
            None => Ok(()),
        }
    }

    /// Row `i` materialized densely.
    #[must_use]
    pub fn row_dense(&self, i: usize) -> Vec<f64> {
        match self {
            Self::Dense(x) => x.row(i).to_vec(),
            Self::Sparse(x) => x.row_dense(i),
            Self::Device(b) => b.row(i).to_vec(),
        }
    }

    /// Marginal gain of every candidate against one coverage snapshot.
    ///
    /// The kernel produces absolute coverage values; `sum(coverage)` is then
    /// subtracted exactly once, after the parallel loop.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::IndexOutOfBounds`] before any work if an index
    /// is out of range.
    pub fn compute_gains(
        &self,
        coverage: &Coverage,
        idxs: &[usize],
        min_parallel_len: usize,
    ) -> Result<Vec<f64>> {
        self.check_indices(idxs)?;
        let mut gains = vec![0.0; idxs.len()];
        match self {
            Self::Dense(x) => {
                dense::coverage_if_added(x, coverage.values(), idxs, &mut gains, min_parallel_len);
            }
            Self::Sparse(x) => sparse::coverage_if_added(
                x,
                coverage.values(),
                coverage.total(),
                idxs,
                &mut gains,
                min_parallel_len,
            ),
            Self::Device(b) => b.coverage_if_added(idxs, &mut gains, min_parallel_len),
        }
        to_marginal(&mut gains, coverage.total());
        Ok(gains)
    }

    /// Fold row `i` into `coverage` without touching device state.
    pub fn absorb_row(&self, i: usize, coverage: &mut Coverage) {
        match self {
            Self::Dense(x) => coverage.absorb(x.row(i)),
            Self::Sparse(x) => {
                let (cols, vals) = x.row(i);
                coverage.absorb_sparse(cols, vals);
            }
            Self::Device(b) => coverage.absorb(b.row(i)),
        }
    }

    /// Fold row `i` into `coverage` and keep the device mirror in sync.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::Device`] if the device copy fails; `coverage`
    /// has then already absorbed the row.
    pub fn fold_row(&mut self, i: usize, coverage: &mut Coverage) -> Result<()> {
        self.absorb_row(i, coverage);
        match self {
            Self::Device(b) => b.load_coverage(coverage.values()),
            Self::Dense(_) | Self::Sparse(_) => Ok(()),
        }
    }

    /// Record row `i` as selected where the backend tracks it.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::Device`] if the device copy fails.
    pub fn mark_selected(&mut self, i: usize) -> Result<()> {
        match self {
            Self::Device(b) => b.mark_selected(i),
            Self::Dense(_) | Self::Sparse(_) => Ok(()),
        }
    }

    /// Reset backend-side run state and load `coverage`.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::Device`] if the device copy fails.
    pub fn reset(&mut self, coverage: &Coverage) -> Result<()> {
        match self {
            Self::Device(b) => {
                b.reset()?;
                b.load_coverage(coverage.values())
            }
            Self::Dense(_) | Self::Sparse(_) => Ok(()),
        }
    }

    /// Best unselected row and its marginal gain, first maximum on ties.
    ///
    /// The device backend runs its fused kernel; CPU backends score every
    /// unselected row. `selected[i]` must be true exactly for committed rows.
    /// The returned gain is always reduced on the host, in the same order as
    /// `coverage.total()`, so a fully covered winner reports exactly zero.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures: [`FaclocError::Device`] from the fused
    /// kernel, [`FaclocError::IndexOutOfBounds`] if `selected` is longer than
    /// the matrix.
    pub fn select_fused(
        &self,
        coverage: &Coverage,
        selected: &[bool],
        min_parallel_len: usize,
    ) -> Result<Option<(usize, f64)>> {
        let total = coverage.total();
        match self {
            Self::Device(b) => {
                let best = b.fused_argmax(min_parallel_len)?;
                Ok(best.map(|i| (i, b.value_of(i) - total)))
            }
            Self::Dense(_) | Self::Sparse(_) => {
                let remaining: Vec<usize> = selected
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &s)| (!s).then_some(i))
                    .collect();
                let gains = self.compute_gains(coverage, &remaining, min_parallel_len)?;
                let mut best: Option<(usize, f64)> = None;
                for (&idx, &g) in remaining.iter().zip(&gains) {
                    if best.map_or(true, |(_, b)| g > b) {
                        best = Some((idx, g));
                    }
                }
                Ok(best)
            }
        }
    }
}

/// Turn absolute coverage values into marginal gains.
#[inline]
pub fn to_marginal(values: &mut [f64], total: f64) {
    values.iter_mut().for_each(|v| *v -= total);
}
