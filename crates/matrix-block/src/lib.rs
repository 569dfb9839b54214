//! Matrix blocks for blocked distributed matrices.
//!
//! A large matrix is partitioned into a grid of fixed-size tiles. Each tile is
//! a [`MatrixBlock`], stored either densely (row-major `f64`) or sparsely
//! (per-row sorted `(column, value)` lists), and addressed by a 1-based
//! [`BlockIndex`].
//!
//! # Core Types
//!
//! - [`BlockCharacteristics`]: Matrix dimensions and block edge lengths
//! - [`BlockIndex`]: 1-based `(row block, col block)` coordinates
//! - [`MatrixBlock`]: One tile with an exact non-zero count
//! - [`codec`]: Buffered big-endian binary encoding of blocks
//!
//! # Example
//!
//! ```
//! use matrix_block::{compute_block_size, BlockCharacteristics, MatrixBlock};
//!
//! // 2500 rows in blocks of 1000: the last row block holds 500 rows
//! assert_eq!(compute_block_size(2500, 3, 1000), 500);
//!
//! let chars = BlockCharacteristics::square(2500, 10, 1000).unwrap();
//! assert_eq!(chars.num_row_blocks(), 3);
//!
//! let mut block = MatrixBlock::new_sparse(4, 4);
//! block.set(1, 2, 3.5);
//! let bytes = block.to_bytes().unwrap();
//! let decoded = MatrixBlock::from_bytes(&bytes).unwrap();
//! assert_eq!(decoded.get(1, 2), 3.5);
//! assert_eq!(decoded.non_zeros(), 1);
//! ```

mod block;
mod characteristics;
pub mod codec;
mod error;
mod sparse;

pub use block::{MatrixBlock, Representation, SPARSITY_TURN_POINT};
pub use characteristics::{compute_block_size, BlockCharacteristics, BlockIndex};
pub use codec::{decode_block, encode_block, encoded_len, BlockReader, BlockWriter, CodecOptions};
pub use error::{BlockError, Result};
pub use sparse::SparseRow;
