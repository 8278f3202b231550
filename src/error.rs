//! Error types for facloc.

use thiserror::Error;

/// Errors raised while setting up or driving a selection run.
///
/// All precondition violations are detected before any state is mutated, so
/// a call that returns `Err` leaves coverage and history unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum FaclocError {
    /// A similarity entry is negative or not finite.
    #[error("similarity entry ({row}, {col}) is {value}; entries must be finite and nonnegative")]
    InvalidInput {
        /// Row of the offending entry.
        row: usize,
        /// Column of the offending entry.
        col: usize,
        /// The offending value.
        value: f64,
    },
    /// Matrix buffers do not describe a well-formed matrix.
    #[error("malformed similarity matrix: {0}")]
    MalformedMatrix(String),
    /// Input has the wrong dimensionality for this operation.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// An index does not address a row of the similarity matrix.
    #[error("index {index} out of bounds for {len} rows")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// Number of rows available.
        len: usize,
    },
    /// The requested execution backend is not available on this host.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(&'static str),
    /// A device allocation, copy, compile or kernel launch failed.
    ///
    /// Raised mid-run only by the CUDA block; the host coverage may then be
    /// ahead of the device mirror until the next `initialize`.
    #[error("device error: {0}")]
    Device(String),
    /// An objective parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Gains were requested before `initialize` ran.
    #[error("objective used before initialize")]
    NotInitialized,
}

/// Result alias for facloc operations.
pub type Result<T> = std::result::Result<T, FaclocError>;
