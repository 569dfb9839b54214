//! Permutation-matrix multiply.
//!
//! The permutation is a broadcast column vector `p` where `p[i]` is the
//! 1-based output row that input row `i` moves to, or 0 or negative to drop
//! the row. It is
//! cut into segments aligned with the input's row blocks. Each input block is
//! then permuted locally into one output block, or two when its destinations
//! straddle a row-block boundary. Partial outputs for the same destination
//! must be summed by a grouped aggregation.

use matrix_block::{compute_block_size, BlockError, BlockIndex, MatrixBlock};

use crate::dataflow::{Broadcast, Broadcaster, GroupedAggregator, PartitionMapper};
use crate::error::{OpsError, Result};

/// Tolerance when reading integral row positions out of `f64` cells.
const INDEX_EPSILON: f64 = 1e-7;

fn to_row_position(value: f64) -> i64 {
    (value + INDEX_EPSILON).floor() as i64
}

/// Applies a broadcast permutation vector to blocks of another matrix.
#[derive(Debug, Clone)]
pub struct PmmOperator {
    segments: Vec<MatrixBlock>,
    output_rows: u64,
    row_block_len: usize,
}

impl PmmOperator {
    /// Partition `permutation` into row-block segments.
    ///
    /// # Errors
    /// - [`OpsError::NotAVector`] if `permutation` has more than one column.
    /// - [`BlockError::InvalidBlockLength`] if `row_block_len` is 0.
    pub fn new(permutation: &MatrixBlock, output_rows: u64, row_block_len: usize) -> Result<Self> {
        if permutation.cols() != 1 {
            return Err(OpsError::NotAVector {
                cols: permutation.cols(),
            });
        }
        if row_block_len == 0 {
            return Err(BlockError::InvalidBlockLength { axis: "row" }.into());
        }
        let rows = permutation.rows();
        let segments = (0..rows.div_ceil(row_block_len))
            .map(|i| {
                let start = i * row_block_len;
                permutation.slice_rows(start..rows.min(start + row_block_len))
            })
            .collect::<Vec<_>>();
        tracing::debug!(
            rows,
            segments = segments.len(),
            row_block_len,
            "partitioned permutation vector"
        );
        Ok(Self {
            segments,
            output_rows,
            row_block_len,
        })
    }

    /// Build from a broadcast handle.
    pub fn from_broadcast(
        permutation: &Broadcast<MatrixBlock>,
        output_rows: u64,
        row_block_len: usize,
    ) -> Result<Self> {
        Self::new(permutation.value(), output_rows, row_block_len)
    }

    #[inline]
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn output_rows(&self) -> u64 {
        self.output_rows
    }

    #[inline]
    pub fn row_block_len(&self) -> usize {
        self.row_block_len
    }

    /// Permute one input block.
    ///
    /// Returns zero outputs if every row is dropped, otherwise one output per
    /// destination row block (at most two).
    pub fn apply(
        &self,
        index: BlockIndex,
        block: &MatrixBlock,
    ) -> Result<Vec<(BlockIndex, MatrixBlock)>> {
        let segment = usize::try_from(index.row() - 1)
            .ok()
            .and_then(|i| self.segments.get(i))
            .ok_or(OpsError::MissingSegment {
                row_block: index.row(),
                segments: self.segments.len(),
            })?;
        if segment.rows() != block.rows() {
            return Err(OpsError::ShapeMismatch {
                row_block: index.row(),
                segment_rows: segment.rows(),
                block_rows: block.rows(),
            });
        }

        let dests: Vec<i64> = (0..segment.rows())
            .map(|r| to_row_position(segment.get(r, 0)))
            .collect();
        let mut positive = dests.iter().copied().filter(|&d| d > 0);
        let Some(first) = positive.next() else {
            return Ok(Vec::new());
        };
        let (min_dest, max_dest) =
            positive.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        let (min_dest, max_dest) = (min_dest as u64, max_dest as u64);
        if max_dest > self.output_rows {
            return Err(OpsError::DestinationOutOfRange {
                dest: max_dest,
                output_rows: self.output_rows,
            });
        }

        let len = self.row_block_len as u64;
        let block1 = (min_dest - 1) / len + 1;
        let block2 = (max_dest - 1) / len + 1;
        if block2 - block1 > 1 {
            return Err(OpsError::PermutationSpan {
                first: block1,
                last: block2,
            });
        }

        let cols = block.cols();
        let est_non_zeros =
            (segment.non_zeros() as f64 / segment.rows() as f64 * block.non_zeros() as f64) as u64;
        let sparse = MatrixBlock::eval_sparse_format(self.row_block_len, cols, est_non_zeros);

        let block_rows = |b| compute_block_size(self.output_rows, b, self.row_block_len);
        let mut out1 = MatrixBlock::allocate(block_rows(block1), cols, sparse);
        let mut out2 =
            (block2 != block1).then(|| MatrixBlock::allocate(block_rows(block2), cols, sparse));

        for (src_row, &dest) in dests.iter().enumerate() {
            if dest <= 0 {
                continue;
            }
            let dest = dest as u64;
            let dest_row = ((dest - 1) % len) as usize;
            match out2.as_mut() {
                Some(out2) if (dest - 1) / len + 1 == block2 => {
                    out2.copy_row_from(dest_row, block, src_row)?
                }
                _ => out1.copy_row_from(dest_row, block, src_row)?,
            }
        }

        let mut out = vec![(BlockIndex::new(block1, index.col()), out1)];
        if let Some(out2) = out2 {
            tracing::debug!(
                input = %index,
                first = block1,
                second = block2,
                "permuted block straddles row-block boundary"
            );
            out.push((BlockIndex::new(block2, index.col()), out2));
        }
        Ok(out)
    }
}

/// Permute a whole blocked matrix: broadcast the permutation, permute every
/// block, then sum partial outputs per destination block.
///
/// Output is whatever order the engine's grouped sum produces.
pub fn pmm<E>(
    engine: &E,
    permutation: MatrixBlock,
    blocks: &[(BlockIndex, MatrixBlock)],
    output_rows: u64,
    row_block_len: usize,
) -> Result<Vec<(BlockIndex, MatrixBlock)>>
where
    E: Broadcaster + PartitionMapper + GroupedAggregator,
{
    let permutation = engine.broadcast(permutation);
    let op = PmmOperator::from_broadcast(&permutation, output_rows, row_block_len)?;
    let partials = engine.flat_map(blocks, |(index, block)| op.apply(*index, block))?;
    engine.group_and_sum(partials)
}
