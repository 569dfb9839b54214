//! Error types for block operators.

use matrix_block::BlockError;
use thiserror::Error;

/// Error type for replicate and permutation-multiply operators.
#[derive(Debug, Error)]
pub enum OpsError {
    /// Error from the underlying block layer.
    #[error(transparent)]
    Block(#[from] BlockError),

    /// The permutation operand must be a single-column vector.
    #[error("permutation operand must have one column, got {cols}")]
    NotAVector { cols: usize },

    /// An input block refers to a row block the permutation does not cover.
    #[error("no permutation segment for row block {row_block} ({segments} segments)")]
    MissingSegment { row_block: u64, segments: usize },

    /// Permutation segment and input block disagree on the row count.
    #[error("segment for row block {row_block} has {segment_rows} rows, input block has {block_rows}")]
    ShapeMismatch {
        row_block: u64,
        segment_rows: usize,
        block_rows: usize,
    },

    /// A destination row lies beyond the output matrix.
    #[error("destination row {dest} exceeds output rows {output_rows}")]
    DestinationOutOfRange { dest: u64, output_rows: u64 },

    /// Destinations of one segment span more than two adjacent row blocks.
    #[error("segment destinations span row blocks {first}..={last}, at most two adjacent blocks allowed")]
    PermutationSpan { first: u64, last: u64 },
}

/// Result type for block operators.
pub type Result<T> = std::result::Result<T, OpsError>;
