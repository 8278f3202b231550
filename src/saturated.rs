//! Saturated coverage.
//!
//! Each reference dimension `k` can absorb at most `cap[k] = alpha * sum_i X[i, k]`
//! of similarity. Selected rows add their similarity until the cap is reached:
//!
//! ```text
//! f(S)    = sum_k min(cap[k], sum_{i in S} X[i, k])
//! gain(j) = sum_k min(c[k] + X[j, k], cap[k]) - sum(c)
//! ```
//!
//! Small `alpha` rewards spreading the selection over many dimensions;
//! large `alpha` degrades towards a plain sum of similarities.
//!
//! Runs on the dense and sparse CPU layouts directly. A device preference is
//! ignored.

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::backend::{to_marginal, BackendKind};
use crate::config::{BackendPreference, SelectionConfig};
use crate::history::SelectionHistory;
use crate::matrix::SimilarityMatrix;
use crate::objective::{InitialSubset, SubmodularObjective};
use crate::{simd, FaclocError, Result};

/// Saturated-coverage objective over a fixed similarity matrix.
#[derive(Debug, Clone)]
pub struct SaturatedCoverage {
    matrix: SimilarityMatrix,
    caps: Vec<f64>,
    values: Vec<f64>,
    total: f64,
    history: SelectionHistory,
    config: SelectionConfig,
    initialized: bool,
}

impl SaturatedCoverage {
    /// Validate `matrix` and derive per-dimension caps from `alpha`.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::InvalidParameter`] if `alpha` is not a positive
    /// finite number, or [`FaclocError::InvalidInput`] for a negative or
    /// non-finite similarity.
    pub fn new(
        matrix: impl Into<SimilarityMatrix>,
        alpha: f64,
        config: SelectionConfig,
    ) -> Result<Self> {
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(FaclocError::InvalidParameter(format!(
                "alpha must be positive and finite, got {alpha}"
            )));
        }
        if config.backend != BackendPreference::Cpu {
            debug!(preference = ?config.backend, "saturated coverage runs on CPU kernels");
        }
        let matrix = matrix.into();
        matrix.validate()?;
        let caps: Vec<f64> = matrix.column_sums().into_iter().map(|s| alpha * s).collect();
        debug!(rows = matrix.n_rows(), cols = matrix.n_cols(), alpha, "saturated coverage bound");
        Ok(Self {
            values: vec![0.0; matrix.n_cols()],
            total: 0.0,
            history: SelectionHistory::new(matrix.n_rows()),
            matrix,
            caps,
            config,
            initialized: false,
        })
    }

    /// Per-dimension saturation caps.
    #[must_use]
    pub fn caps(&self) -> &[f64] {
        &self.caps
    }

    /// Current accumulated (capped) similarity per dimension.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Current objective value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.total
    }

    /// Kernel family in use: [`BackendKind::Dense`] or
    /// [`BackendKind::Sparse`], following the matrix layout.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        match self.matrix {
            SimilarityMatrix::Dense(_) => BackendKind::Dense,
            SimilarityMatrix::Sparse(_) => BackendKind::Sparse,
        }
    }

    fn fold_row(&self, i: usize, values: &mut [f64]) {
        let caps = &self.caps;
        match &self.matrix {
            SimilarityMatrix::Sparse(x) => {
                let (cols, vals) = x.row(i);
                for (&k, &v) in cols.iter().zip(vals) {
                    let k = k as usize;
                    values[k] = caps[k].min(values[k] + v);
                }
            }
            SimilarityMatrix::Dense(x) => {
                for ((c, &v), &m) in values.iter_mut().zip(x.row(i)).zip(caps) {
                    *c = m.min(*c + v);
                }
            }
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(FaclocError::NotInitialized)
        }
    }
}

impl SubmodularObjective for SaturatedCoverage {
    fn initialize(&mut self, initial: Option<&InitialSubset>) -> Result<()> {
        let mut values = vec![0.0; self.matrix.n_cols()];
        match initial {
            None => {}
            Some(InitialSubset::Examples(rows)) => {
                return Err(FaclocError::ShapeMismatch(format!(
                    "saturated coverage needs a one-dimensional array of row indices as the \
                     initial subset, got {} example vectors",
                    rows.len()
                )));
            }
            Some(InitialSubset::Indices(idxs)) => {
                self.matrix.check_indices(idxs)?;
                for &i in idxs {
                    self.fold_row(i, &mut values);
                }
            }
        }
        self.total = simd::sum(&values);
        self.values = values;
        self.history.clear();
        self.initialized = true;
        debug!(value = self.total, "saturated coverage initialized");
        Ok(())
    }

    fn compute_gains(&self, candidates: &[usize]) -> Result<Vec<f64>> {
        self.ensure_initialized()?;
        self.matrix.check_indices(candidates)?;
        let mut gains = vec![0.0; candidates.len()];
        let (values, caps, total) = (&self.values, &self.caps, self.total);
        let grain = self.config.min_parallel_len.max(1);
        match &self.matrix {
            SimilarityMatrix::Sparse(x) => {
                gains
                    .par_iter_mut()
                    .zip(candidates.par_iter())
                    .with_min_len(grain)
                    .for_each(|(slot, &idx)| {
                        let (cols, vals) = x.row(idx);
                        // Implicit zeros leave their dimension at c[k], which
                        // never exceeds cap[k], so only explicit columns move.
                        let delta: f64 = cols
                            .iter()
                            .zip(vals)
                            .map(|(&k, &v)| {
                                let k = k as usize;
                                caps[k].min(values[k] + v) - values[k]
                            })
                            .sum();
                        *slot = total + delta;
                    });
            }
            SimilarityMatrix::Dense(x) => {
                gains
                    .par_iter_mut()
                    .zip(candidates.par_iter())
                    .with_min_len(grain)
                    .for_each(|(slot, &idx)| {
                        *slot = x
                            .row(idx)
                            .iter()
                            .zip(values)
                            .zip(caps)
                            .map(|((&x, &c), &m)| m.min(c + x))
                            .sum();
                    });
            }
        }
        to_marginal(&mut gains, total);
        Ok(gains)
    }

    fn commit(&mut self, index: usize, gain: f64) -> Result<()> {
        self.ensure_initialized()?;
        self.matrix.check_indices(&[index])?;
        if self.history.contains(index) {
            warn!(index, "row committed twice");
        }
        let mut values = std::mem::take(&mut self.values);
        self.fold_row(index, &mut values);
        self.total = simd::sum(&values);
        self.values = values;
        self.history.record(index, gain);
        trace!(index, gain, value = self.total, "committed");
        Ok(())
    }

    fn history(&self) -> &SelectionHistory {
        &self.history
    }

    fn n_candidates(&self) -> usize {
        self.matrix.n_rows()
    }
}
