//! Error types for quiescent-solver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The elimination hit a zero pivot. The row index tells the engine
    /// which equation went rank-deficient, so it can boost the diagonal and
    /// retry before giving up.
    #[error("singular matrix: no usable pivot at row {row}")]
    SingularPivot { row: usize },

    #[error("dimension mismatch: matrix is {rows}x{cols}, rhs has {rhs_len} entries")]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        rhs_len: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
