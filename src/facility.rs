//! Facility location.
//!
//! The value of a subset `S` is `f(S) = sum_k max_{i in S} X[i, k]`: every
//! reference dimension is credited with the best similarity any selected row
//! offers it. With nonnegative similarities `f` is monotone submodular, so
//! greedy selection keeps its `(1 - 1/e)` guarantee.
//!
//! State is a single [`Coverage`] vector holding `max_{i in S} X[i, k]`.
//! The marginal gain of candidate `j` is
//!
//! ```text
//! gain(j) = sum_k max(X[j, k], coverage[k]) - sum(coverage)
//! ```
//!
//! # Example
//!
//! ```rust
//! use facloc::{
//!     DenseMatrix, FacilityLocation, InitialSubset, SelectionConfig, SubmodularObjective,
//! };
//!
//! let x = DenseMatrix::from_rows(&[
//!     [5.0, 1.0, 0.0, 2.0],
//!     [1.0, 4.0, 1.0, 0.0],
//!     [0.0, 1.0, 3.0, 1.0],
//!     [2.0, 0.0, 1.0, 6.0],
//! ])
//! .unwrap();
//!
//! let mut f = FacilityLocation::new(x, SelectionConfig::default()).unwrap();
//! f.initialize(Some(&InitialSubset::Indices(vec![3]))).unwrap();
//!
//! assert_eq!(f.coverage().values(), &[2.0, 0.0, 1.0, 6.0]);
//! assert_eq!(f.compute_gains(&[0, 1, 2]).unwrap(), vec![4.0, 4.0, 3.0]);
//! ```

use tracing::{debug, trace, warn};

use crate::backend::{Backend, BackendKind};
use crate::config::SelectionConfig;
use crate::coverage::Coverage;
use crate::history::SelectionHistory;
use crate::matrix::SimilarityMatrix;
use crate::objective::{InitialSubset, SubmodularObjective};
use crate::{FaclocError, Result};

/// Facility-location objective over a fixed similarity matrix.
#[derive(Debug, Clone)]
pub struct FacilityLocation {
    backend: Backend,
    coverage: Coverage,
    history: SelectionHistory,
    config: SelectionConfig,
    initialized: bool,
}

impl FacilityLocation {
    /// Validate `matrix` and bind it to a backend.
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::InvalidInput`] if any similarity is negative or
    /// not finite.
    pub fn new(matrix: impl Into<SimilarityMatrix>, config: SelectionConfig) -> Result<Self> {
        let backend = Backend::resolve(matrix.into(), config.backend)?;
        Ok(Self::with_backend(backend, config))
    }

    pub(crate) fn with_backend(backend: Backend, config: SelectionConfig) -> Self {
        Self {
            coverage: Coverage::zeros(backend.ncols()),
            history: SelectionHistory::new(backend.nrows()),
            backend,
            config,
            initialized: false,
        }
    }

    /// Current coverage vector.
    #[must_use]
    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    /// Kernel family in use.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Configuration the objective was built with.
    #[must_use]
    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Current objective value, `sum(coverage)`.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.coverage.total()
    }

    /// Score every unselected row and return the best one with its marginal
    /// gain (first maximum on ties). On the device backend this is the fused
    /// kernel. Returns `Ok(None)` once every row is selected.
    ///
    /// Does not commit; pass the result to [`commit`](SubmodularObjective::commit).
    ///
    /// # Errors
    ///
    /// Returns [`FaclocError::NotInitialized`] before `initialize`, and
    /// [`FaclocError::Device`] if the fused device kernel fails.
    pub fn select_fused(&self) -> Result<Option<(usize, f64)>> {
        self.ensure_initialized()?;
        self.backend.select_fused(
            &self.coverage,
            self.history.selected(),
            self.config.min_parallel_len,
        )
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(FaclocError::NotInitialized)
        }
    }
}

impl SubmodularObjective for FacilityLocation {
    fn initialize(&mut self, initial: Option<&InitialSubset>) -> Result<()> {
        let mut coverage = Coverage::zeros(self.backend.ncols());
        match initial {
            None => {}
            Some(InitialSubset::Examples(rows)) => {
                return Err(FaclocError::ShapeMismatch(format!(
                    "facility location needs a one-dimensional array of row indices as the \
                     initial subset, got {} example vectors",
                    rows.len()
                )));
            }
            Some(InitialSubset::Indices(idxs)) => {
                self.backend.check_indices(idxs)?;
                for &i in idxs {
                    self.backend.absorb_row(i, &mut coverage);
                }
            }
        }

        self.coverage = coverage;
        self.history.clear();
        self.backend.reset(&self.coverage)?;
        self.initialized = true;
        debug!(
            seed = initial.map_or(0, |s| match s {
                InitialSubset::Indices(v) => v.len(),
                InitialSubset::Examples(_) => 0,
            }),
            value = self.coverage.total(),
            "facility location initialized"
        );
        Ok(())
    }

    fn compute_gains(&self, candidates: &[usize]) -> Result<Vec<f64>> {
        self.ensure_initialized()?;
        self.backend
            .compute_gains(&self.coverage, candidates, self.config.min_parallel_len)
    }

    fn commit(&mut self, index: usize, gain: f64) -> Result<()> {
        self.ensure_initialized()?;
        self.backend.check_indices(&[index])?;
        if self.history.contains(index) {
            warn!(index, "row committed twice");
        }
        self.backend.fold_row(index, &mut self.coverage)?;
        self.backend.mark_selected(index)?;
        self.history.record(index, gain);
        trace!(index, gain, value = self.coverage.total(), "committed");
        Ok(())
    }

    fn history(&self) -> &SelectionHistory {
        &self.history
    }

    fn n_candidates(&self) -> usize {
        self.backend.nrows()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────


// ─────────────────────────────────────────────────────────────────────────────
// Property Tests
// ─────────────────────────────────────────────────────────────────────────────
