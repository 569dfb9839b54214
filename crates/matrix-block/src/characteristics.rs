//! Logical matrix dimensions and fixed-size block grids.
//!
//! A logical matrix of `rows × cols` cells is tiled into blocks of
//! `rows_per_block × cols_per_block`. Block indices and linear cell positions
//! are 1-based; the last block along each axis may be shorter than the block
//! length.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BlockError, Result};

/// Position of a block in the logical block grid (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBlockIndex")]
pub struct BlockIndex {
    row: u64,
    col: u64,
}

impl BlockIndex {
    /// Create a block index.
    ///
    /// # Panics
    /// Panics if either component is 0.
    pub fn new(row: u64, col: u64) -> Self {
        assert!(
            row >= 1 && col >= 1,
            "Block indices are 1-based, got ({row}, {col})"
        );
        Self { row, col }
    }

    /// Row-block component.
    #[inline]
    pub fn row(&self) -> u64 {
        self.row
    }

    /// Column-block component.
    #[inline]
    pub fn col(&self) -> u64 {
        self.col
    }

    /// Same row block, different column block.
    pub fn with_col(&self, col: u64) -> Self {
        Self::new(self.row, col)
    }

    /// Same column block, different row block.
    pub fn with_row(&self, row: u64) -> Self {
        Self::new(row, self.col)
    }
}

#[derive(Deserialize)]
struct RawBlockIndex {
    row: u64,
    col: u64,
}

impl TryFrom<RawBlockIndex> for BlockIndex {
    type Error = String;

    fn try_from(raw: RawBlockIndex) -> std::result::Result<Self, Self::Error> {
        if raw.row == 0 || raw.col == 0 {
            return Err(format!(
                "block indices are 1-based, got ({}, {})",
                raw.row, raw.col
            ));
        }
        Ok(Self {
            row: raw.row,
            col: raw.col,
        })
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Edge length of block `block_index` (1-based) along an axis of length `total`.
///
/// Every block is `block_len` long except the last one, which holds the
/// remainder. Blocks past the end of the axis have length 0.
#[inline]
pub fn compute_block_size(total: u64, block_index: u64, block_len: usize) -> usize {
    debug_assert!(block_index >= 1, "block indices are 1-based");
    let offset = (block_index - 1).saturating_mul(block_len as u64);
    let remaining = total.saturating_sub(offset);
    remaining.min(block_len as u64) as usize
}

/// Immutable description of a blocked logical matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCharacteristics")]
pub struct BlockCharacteristics {
    rows: u64,
    cols: u64,
    rows_per_block: usize,
    cols_per_block: usize,
}

#[derive(Deserialize)]
struct RawCharacteristics {
    rows: u64,
    cols: u64,
    rows_per_block: usize,
    cols_per_block: usize,
}

impl TryFrom<RawCharacteristics> for BlockCharacteristics {
    type Error = BlockError;

    fn try_from(raw: RawCharacteristics) -> Result<Self> {
        Self::new(raw.rows, raw.cols, raw.rows_per_block, raw.cols_per_block)
    }
}

impl BlockCharacteristics {
    /// Create characteristics for a `rows × cols` matrix.
    ///
    /// # Errors
    /// Returns [`BlockError::InvalidBlockLength`] if a block length is 0.
    pub fn new(rows: u64, cols: u64, rows_per_block: usize, cols_per_block: usize) -> Result<Self> {
        if rows_per_block == 0 {
            return Err(BlockError::InvalidBlockLength { axis: "row" });
        }
        if cols_per_block == 0 {
            return Err(BlockError::InvalidBlockLength { axis: "column" });
        }
        Ok(Self {
            rows,
            cols,
            rows_per_block,
            cols_per_block,
        })
    }

    /// Square blocks of edge `block_len`.
    pub fn square(rows: u64, cols: u64, block_len: usize) -> Result<Self> {
        Self::new(rows, cols, block_len, block_len)
    }

    #[inline]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> u64 {
        self.cols
    }

    #[inline]
    pub fn rows_per_block(&self) -> usize {
        self.rows_per_block
    }

    #[inline]
    pub fn cols_per_block(&self) -> usize {
        self.cols_per_block
    }

    /// Number of row blocks.
    pub fn num_row_blocks(&self) -> u64 {
        self.rows.div_ceil(self.rows_per_block as u64)
    }

    /// Number of column blocks.
    pub fn num_col_blocks(&self) -> u64 {
        self.cols.div_ceil(self.cols_per_block as u64)
    }

    /// Row count of the blocks in row block `row_block`.
    pub fn row_block_size(&self, row_block: u64) -> usize {
        compute_block_size(self.rows, row_block, self.rows_per_block)
    }

    /// Column count of the blocks in column block `col_block`.
    pub fn col_block_size(&self, col_block: u64) -> usize {
        compute_block_size(self.cols, col_block, self.cols_per_block)
    }

    /// `[rows, cols]` of the block at `index`.
    pub fn block_shape(&self, index: BlockIndex) -> [usize; 2] {
        [
            self.row_block_size(index.row()),
            self.col_block_size(index.col()),
        ]
    }

    /// Row block owning the 1-based logical row `row`.
    #[inline]
    pub fn row_block_of(&self, row: u64) -> u64 {
        debug_assert!(row >= 1, "rows are 1-based");
        (row - 1) / self.rows_per_block as u64 + 1
    }

    /// Column block owning the 1-based logical column `col`.
    #[inline]
    pub fn col_block_of(&self, col: u64) -> u64 {
        debug_assert!(col >= 1, "columns are 1-based");
        (col - 1) / self.cols_per_block as u64 + 1
    }

    /// 0-based row within its block for the 1-based logical row `row`.
    #[inline]
    pub fn row_in_block(&self, row: u64) -> usize {
        ((row - 1) % self.rows_per_block as u64) as usize
    }

    /// Block owning the 1-based cell `(row, col)`.
    pub fn block_index_of(&self, row: u64, col: u64) -> BlockIndex {
        BlockIndex::new(self.row_block_of(row), self.col_block_of(col))
    }
}
