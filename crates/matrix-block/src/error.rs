//! Error types for matrix block operations.

use thiserror::Error;

/// Error type for block construction, mutation and (de)serialization.
#[derive(Debug, Error)]
pub enum BlockError {
    /// The stream ended before the declared number of bytes could be read.
    #[error("truncated stream: needed {needed} bytes, read {read}")]
    TruncatedStream { needed: usize, read: usize },

    /// Declared counts or values are inconsistent with the binary format.
    #[error("corrupt block format: {0}")]
    CorruptFormat(String),

    /// Codec buffers must hold at least one byte.
    #[error("buffer size must be positive, got {0}")]
    InvalidBufferSize(usize),

    /// Block edge lengths must be positive.
    #[error("{axis} block length must be positive")]
    InvalidBlockLength { axis: &'static str },

    /// Block dimensions exceed what the binary header can represent.
    #[error("dimensions overflow i32: {rows} rows × {cols} cols")]
    DimensionOverflow { rows: usize, cols: usize },

    /// Shape mismatch between two blocks.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: [usize; 2],
        actual: [usize; 2],
    },

    /// Underlying IO failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BlockError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptFormat(msg.into())
    }
}

/// Result type for matrix block operations.
pub type Result<T> = std::result::Result<T, BlockError>;
