//! Column-vector replication.
//!
//! A column vector stored as blocks in column block 1 is fanned out across
//! every column block of the operand it will be combined with, so that a
//! later cell-wise operation finds a matching block at each position.

use std::sync::Arc;

use matrix_block::{BlockError, BlockIndex, MatrixBlock};

use crate::error::Result;

/// Replicates single-column blocks across the column blocks of another operand.
#[derive(Debug, Clone, Copy)]
pub struct ReplicateOperator {
    other_cols: u64,
    col_block_len: usize,
}

impl ReplicateOperator {
    /// Operator for an other operand with `other_cols` logical columns tiled in
    /// blocks of `col_block_len` columns.
    ///
    /// A column block length of 1 is accepted but logged as a warning, once
    /// here rather than on every [`apply`](Self::apply).
    ///
    /// # Errors
    /// Returns [`BlockError::InvalidBlockLength`] if `col_block_len` is 0.
    pub fn new(other_cols: u64, col_block_len: usize) -> Result<Self> {
        if col_block_len == 0 {
            return Err(BlockError::InvalidBlockLength { axis: "column" }.into());
        }
        if col_block_len <= 1 {
            tracing::warn!(
                col_block_len,
                other_cols,
                "replicate with column block length 1 emits one block per column"
            );
        }
        Ok(Self {
            other_cols,
            col_block_len,
        })
    }

    #[inline]
    pub fn other_cols(&self) -> u64 {
        self.other_cols
    }

    #[inline]
    pub fn col_block_len(&self) -> usize {
        self.col_block_len
    }

    /// Number of extra copies emitted for a replicable block.
    pub fn num_replicates(&self) -> u64 {
        self.other_cols
            .div_ceil(self.col_block_len as u64)
            .saturating_sub(1)
    }

    /// Replicate one block.
    ///
    /// Blocks outside column block 1, or with more than one column, pass
    /// through unchanged. Every output shares `block`.
    pub fn apply(
        &self,
        index: BlockIndex,
        block: Arc<MatrixBlock>,
    ) -> Vec<(BlockIndex, Arc<MatrixBlock>)> {
        if index.col() > 1 || block.cols() > 1 {
            return vec![(index, block)];
        }
        let replicates = self.num_replicates();
        let mut out = Vec::with_capacity(replicates as usize + 1);
        out.push((index, Arc::clone(&block)));
        out.extend((2..=replicates + 1).map(|col| (index.with_col(col), Arc::clone(&block))));
        out
    }

    /// Replicate every block of a partition.
    pub fn apply_all<I>(&self, blocks: I) -> Vec<(BlockIndex, Arc<MatrixBlock>)>
    where
        I: IntoIterator<Item = (BlockIndex, Arc<MatrixBlock>)>,
    {
        blocks
            .into_iter()
            .flat_map(|(index, block)| self.apply(index, block))
            .collect()
    }
}
