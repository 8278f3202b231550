//! The interface a greedy optimizer drives.
//!
//! An optimizer holds any [`SubmodularObjective`] and runs rounds of
//!
//! 1. `compute_gains(candidates)` against the current state,
//! 2. pick an index (its own policy),
//! 3. `commit(index, gain)`.
//!
//! Rounds never overlap: round `r + 1` reads the state round `r` committed.
//! Which candidates are scored, and which one wins, is entirely up to the
//! optimizer.
//!
//! ```rust
//! use facloc::{DenseMatrix, FacilityLocation, SelectionConfig, SubmodularObjective};
//!
//! let x = DenseMatrix::from_rows(&[[1.0, 0.0], [0.0, 2.0]]).unwrap();
//! let mut f = FacilityLocation::new(x, SelectionConfig::default()).unwrap();
//! f.initialize(None).unwrap();
//!
//! while f.history().len() < f.n_candidates() {
//!     let remaining = f.history().remaining();
//!     let gains = f.compute_gains(&remaining).unwrap();
//!     let (pos, gain) = gains
//!         .iter()
//!         .copied()
//!         .enumerate()
//!         .fold((0, f64::NEG_INFINITY), |best, (i, g)| if g > best.1 { (i, g) } else { best });
//!     f.commit(remaining[pos], gain).unwrap();
//! }
//! assert_eq!(f.history().ranking(), &[1, 0]);
//! assert_eq!(f.history().gains(), &[2.0, 1.0]);
//! ```

use crate::history::SelectionHistory;
use crate::Result;

/// Seed for the selected set, folded in before the first round.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitialSubset {
    /// Row indices into the similarity matrix (one-dimensional).
    Indices(Vec<usize>),
    /// Raw example vectors (two-dimensional). Pairwise objectives reject
    /// these: an example that is not a row of the matrix has no known
    /// similarity to the reference dimensions.
    Examples(Vec<Vec<f64>>),
}

impl InitialSubset {
    /// Dimensionality of the seed: 1 for indices, 2 for examples.
    #[must_use]
    pub fn ndim(&self) -> usize {
        match self {
            Self::Indices(_) => 1,
            Self::Examples(_) => 2,
        }
    }
}

impl From<Vec<usize>> for InitialSubset {
    fn from(idxs: Vec<usize>) -> Self {
        Self::Indices(idxs)
    }
}

impl From<&[usize]> for InitialSubset {
    fn from(idxs: &[usize]) -> Self {
        Self::Indices(idxs.to_vec())
    }
}

/// A submodular objective with incremental marginal gains.
pub trait SubmodularObjective {
    /// Reset state and fold in an optional seed. Must run before the first
    /// `compute_gains`. On error, state is left as it was.
    fn initialize(&mut self, initial: Option<&InitialSubset>) -> Result<()>;

    /// Marginal gain of each candidate against the current state, in input
    /// order. Does not mutate state. An empty list yields an empty vector.
    fn compute_gains(&self, candidates: &[usize]) -> Result<Vec<f64>>;

    /// Accept `index` with the gain computed for it this round, update state,
    /// and record the round. Call at most once per round.
    fn commit(&mut self, index: usize, gain: f64) -> Result<()>;

    /// Rounds committed so far.
    fn history(&self) -> &SelectionHistory;

    /// Number of candidate rows.
    fn n_candidates(&self) -> usize;
}
