//! Sparse (CSR) gain kernel.
//!
//! Only the explicit entries of a candidate row are visited. For a row with
//! explicit columns `E`:
//!
//! ```text
//! sum_k max(X[idx, k], c[k])
//!   = sum_{k in E} max(X[idx, k], c[k]) + sum_{k not in E} max(0, c[k])
//!   = sum_{k in E} max(X[idx, k], c[k]) + (sum(c) - sum_{k in E} c[k])
//! ```
//!
//! The second step holds only because coverage is nonnegative
//! (`max(0, c[k]) = c[k]`). The kernel therefore accumulates the explicit
//! contributions and the explicit coverage separately, then adds their
//! difference to `sum(c)` through [`with_implicit_zeros`]. The result is the
//! same absolute coverage value the dense kernel produces, so the caller's
//! single `- sum(c)` step yields matching marginal gains on both layouts. If
//! coverage could ever go negative, this identity and the dense/sparse
//! equivalence would break together.
//!
//! The difference is taken first: a covered row has `explicit == covered`
//! bit for bit, so its value is exactly `sum(c)` and its gain exactly zero.

use rayon::prelude::*;

use crate::matrix::CsrMatrix;

/// Absolute coverage value of a row from its explicit-column sums.
///
/// `explicit` is `sum_{k in E} max(X[idx, k], c[k])`, `covered_explicit` is
/// `sum_{k in E} c[k]` and `total` is `sum(c)`. The implicit columns keep
/// their coverage, which requires nonnegative coverage.
#[inline]
#[must_use]
pub fn with_implicit_zeros(explicit: f64, covered_explicit: f64, total: f64) -> f64 {
    (explicit - covered_explicit) + total
}

/// Fill `out` with the coverage value of each candidate row.
///
/// `total` must equal `sum(coverage)` for the same snapshot.
///
/// # Panics
///
/// Panics if `out.len() != idxs.len()` or an index is out of bounds.
/// Callers validate indices first.
pub fn coverage_if_added(
    x: &CsrMatrix,
    coverage: &[f64],
    total: f64,
    idxs: &[usize],
    out: &mut [f64],
    min_parallel_len: usize,
) {
    assert_eq!(out.len(), idxs.len(), "one output slot per candidate");
    debug_assert!(
        coverage.iter().all(|c| *c >= 0.0),
        "sparse kernel requires nonnegative coverage"
    );
    out.par_iter_mut()
        .zip(idxs.par_iter())
        .with_min_len(min_parallel_len.max(1))
        .for_each(|(slot, &idx)| {
            let (cols, vals) = x.row(idx);
            let mut explicit = 0.0;
            let mut covered = 0.0;
            for (&k, &v) in cols.iter().zip(vals) {
                let c = coverage[k as usize];
                explicit += v.max(c);
                covered += c;
            }
            *slot = with_implicit_zeros(explicit, covered, total);
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::DenseMatrix;
    use approx::assert_abs_diff_eq;

    fn scenario() -> CsrMatrix {
        CsrMatrix::from_dense(
            &DenseMatrix::from_rows(&[
                [5.0, 1.0, 0.0, 2.0],
                [1.0, 4.0, 1.0, 0.0],
                [0.0, 1.0, 3.0, 1.0],
                [2.0, 0.0, 1.0, 6.0],
            ])
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn zero_coverage_gives_row_sums() {
        let x = scenario();
        let mut out = vec![0.0; 4];
        coverage_if_added(&x, &[0.0; 4], 0.0, &[0, 1, 2, 3], &mut out, 1);
        assert_eq!(out, vec![8.0, 6.0, 5.0, 9.0]);
    }

    #[test]
    fn implicit_zeros_carry_existing_coverage() {
        // Row 0 has no entry in column 2, where coverage is 1.0.
        let x = scenario();
        let coverage = [2.0, 0.0, 1.0, 6.0];
        let mut out = vec![0.0; 3];
        coverage_if_added(&x, &coverage, 9.0, &[0, 1, 2], &mut out, 1);
        assert_eq!(out, vec![13.0, 13.0, 12.0]);
    }

    #[test]
    fn empty_row_value_is_total() {
        let x = CsrMatrix::new(2, 3, vec![1.0], vec![0], vec![0, 0, 1]).unwrap();
        let mut out = vec![0.0; 1];
        coverage_if_added(&x, &[0.5, 2.0, 0.25], 2.75, &[0], &mut out, 1);
        assert_abs_diff_eq!(out[0], 2.75, epsilon = 1e-12);
    }

    #[test]
    fn implicit_zero_identity() {
        assert_eq!(with_implicit_zeros(13.0, 8.0, 9.0), 14.0);
        assert_eq!(with_implicit_zeros(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn covered_row_value_is_exactly_total() {
        // Whatever the rounding of the sums, a covered row returns `total`.
        let coverage = [0.1, 0.7, 0.3, 0.9, 0.2];
        let total: f64 = coverage.iter().sum();
        let x = CsrMatrix::new(1, 5, vec![0.1, 0.3, 0.2], vec![0, 2, 4], vec![0, 3]).unwrap();
        let mut out = vec![0.0; 1];
        coverage_if_added(&x, &coverage, total, &[0], &mut out, 1);
        assert_eq!(out[0], total);
    }
}
