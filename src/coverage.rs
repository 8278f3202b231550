//! Coverage vector: per reference dimension, the best similarity any selected
//! item provides.
//!
//! Coverage starts at zero and only ever grows elementwise (running maximum),
//! so every entry stays nonnegative for the lifetime of a run. The sparse gain
//! kernel depends on that; see [`crate::sparse`].
//!
//! The cached total is reduced with [`simd::max_sum`] over `(values, values)`,
//! the same lane order the dense kernel uses for `sum_k max(row[k], c[k])`.
//! A row that is already covered therefore scores exactly `total`, and its
//! marginal gain is exactly zero rather than a rounding residue.

use crate::simd;

/// Running elementwise maximum over the rows of the selected subset.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    values: Vec<f64>,
    total: f64,
}

impl Coverage {
    /// Zero coverage over `n_dims` reference dimensions.
    #[must_use]
    pub fn zeros(n_dims: usize) -> Self {
        Self {
            values: vec![0.0; n_dims],
            total: 0.0,
        }
    }

    /// Per-dimension coverage.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of reference dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when there are no reference dimensions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `sum(values)`, the facility-location value of the selected subset,
    /// in kernel reduction order.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Fold a dense row in: `values := max(values, row)`.
    pub fn absorb(&mut self, row: &[f64]) {
        debug_assert_eq!(row.len(), self.values.len());
        simd::max_assign(&mut self.values, row);
        self.total = Self::reduce(&self.values);
    }

    /// Fold an explicit-entry row in. Absent columns are zero and cannot
    /// raise coverage.
    pub fn absorb_sparse(&mut self, cols: &[u32], vals: &[f64]) {
        for (&k, &v) in cols.iter().zip(vals) {
            let slot = &mut self.values[k as usize];
            *slot = slot.max(v);
        }
        self.total = Self::reduce(&self.values);
    }

    #[inline]
    fn reduce(values: &[f64]) -> f64 {
        simd::max_sum(values, values)
    }

    /// Snapshot of the values.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.clone()
    }

    /// True if every entry is `>=` the matching entry of `other`.
    #[must_use]
    pub fn dominates(&self, other: &Coverage) -> bool {
        self.values.len() == other.values.len()
            && self.values.iter().zip(&other.values).all(|(a, b)| a >= b)
    }
}
