//! Run configuration.
//!
//! ```rust
//! use facloc::{BackendPreference, SelectionConfig};
//!
//! let config = SelectionConfig::new()
//!     .with_backend(BackendPreference::Auto)
//!     .with_min_parallel_len(128);
//! assert_eq!(config.min_parallel_len, 128);
//! ```

/// Which execution backend a dense similarity matrix should run on.
///
/// Sparse matrices always run on the sparse kernel; the preference only
/// matters for dense input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BackendPreference {
    /// CUDA device block when one is present, dense CPU kernel otherwise.
    Auto,
    /// Dense CPU kernel.
    #[default]
    Cpu,
    /// Fused device kernel; runs on a host block when no CUDA device is
    /// present.
    Device,
}

/// Configuration shared by every objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectionConfig {
    /// Backend for dense input.
    pub backend: BackendPreference,
    /// Minimum number of candidates handled by one parallel task.
    ///
    /// Affects scheduling only, never results.
    pub min_parallel_len: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Cpu,
            min_parallel_len: 64,
        }
    }
}

impl SelectionConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend preference.
    #[must_use]
    pub const fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    /// Set the parallel grain. Zero is treated as one.
    #[must_use]
    pub const fn with_min_parallel_len(mut self, len: usize) -> Self {
        self.min_parallel_len = if len == 0 { 1 } else { len };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SelectionConfig::default();
        assert_eq!(c.backend, BackendPreference::Cpu);
        assert_eq!(c.min_parallel_len, 64);
    }

    #[test]
    fn zero_grain_clamped() {
        let c = SelectionConfig::new().with_min_parallel_len(0);
        assert_eq!(c.min_parallel_len, 1);
    }
}
