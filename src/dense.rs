//! Dense gain kernel.
//!
//! For every candidate `idxs[i]`:
//!
//! ```text
//! out[i] = sum_k max(X[idxs[i], k], coverage[k])
//! ```
//!
//! This is the coverage value the subset would reach if the candidate were
//! added. Candidates are independent: all of them read the same coverage
//! snapshot and each writes its own slot, so the loop is a plain rayon
//! fork-join with no synchronization. Turning values into marginal gains
//! (subtracting `sum(coverage)`) is the caller's job and happens once per
//! round, see [`crate::backend::Backend::compute_gains`].

use rayon::prelude::*;

use crate::matrix::DenseMatrix;
use crate::simd;

/// Fill `out` with the coverage value of each candidate row.
///
/// # Panics
///
/// Panics if `out.len() != idxs.len()` or an index is out of bounds.
/// Callers validate indices first.
pub fn coverage_if_added(
    x: &DenseMatrix,
    coverage: &[f64],
    idxs: &[usize],
    out: &mut [f64],
    min_parallel_len: usize,
) {
    assert_eq!(out.len(), idxs.len(), "one output slot per candidate");
    out.par_iter_mut()
        .zip(idxs.par_iter())
        .with_min_len(min_parallel_len.max(1))
        .for_each(|(slot, &idx)| {
            *slot = simd::max_sum(x.row(idx), coverage);
        });
}
