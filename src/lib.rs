//! # facloc
//!
//! Facility-location marginal gains for greedy subset selection.
//!
//! Given a nonnegative similarity matrix `X` (candidates by reference
//! dimensions) and the running coverage vector `c`, the gain of adding
//! candidate `j` is
//!
//! ```text
//! gain(j) = sum_k max(X[j, k], c[k]) - sum_k c[k]
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose | Notes |
//! |--------|---------|-------|
//! | [`facility`] | Facility-location objective | Initialize, gains, commit |
//! | [`saturated`] | Saturated-coverage objective | CPU kernels only |
//! | [`objective`] | Optimizer-facing trait | One round at a time |
//! | [`dense`] | Dense gain kernel | Rayon, SIMD row reduce |
//! | [`sparse`] | CSR gain kernel | Matches the dense kernel exactly |
//! | [`device`] | Fused gain + argmax kernel | CUDA via `cuda` feature, host fallback |
//! | [`backend`] | Kernel selection | Chosen once, falls back on the CPU |
//! | [`simd`] | Vector ops (AVX/NEON) | Auto-dispatch |
//!
//! ## Pipeline
//!
//! ```text
//! initialize(seed) → [compute_gains → pick → commit]* → ranking, gains
//! ```
//!
//! ## Quick Example
//!
//! ```rust
//! use facloc::{DenseMatrix, FacilityLocation, SelectionConfig, SubmodularObjective};
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
//! f.initialize(None).unwrap();
//! assert_eq!(f.compute_gains(&[0, 1, 2, 3]).unwrap(), vec![8.0, 6.0, 5.0, 9.0]);
//!
//! f.commit(3, 9.0).unwrap();
//! assert_eq!(f.compute_gains(&[0, 1, 2]).unwrap(), vec![4.0, 4.0, 3.0]);
//! ```

pub mod backend;
pub mod config;
pub mod coverage;
pub mod dense;
pub mod device;
pub mod error;
pub mod facility;
pub mod history;
pub mod matrix;
pub mod objective;
pub mod saturated;
pub mod simd;
pub mod sparse;

pub use backend::{Backend, BackendKind};
pub use config::{BackendPreference, SelectionConfig};
pub use coverage::Coverage;
pub use device::{DeviceBlock, DeviceCapability};
pub use error::{FaclocError, Result};
pub use facility::FacilityLocation;
pub use history::SelectionHistory;
pub use matrix::{CsrMatrix, DenseMatrix, SimilarityMatrix};
pub use objective::{InitialSubset, SubmodularObjective};
pub use saturated::SaturatedCoverage;
