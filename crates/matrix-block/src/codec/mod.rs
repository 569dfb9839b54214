//! Binary block format.
//!
//! Every block is written as:
//!
//! ```text
//! u8   representation   0 = dense, 1 = sparse
//! i32  rows
//! i32  cols
//! i64  non_zeros
//! payload
//! ```
//!
//! The dense payload is `rows * cols` IEEE-754 doubles in row-major order.
//! The sparse payload is, for every row, an `i32` non-zero count followed by
//! that many `(i32 column, f64 value)` pairs in ascending column order.
//! All integers and doubles are big-endian.
//!
//! Block files written by [`BlockWriter::write_indexed_block`] prefix each
//! block with its `(i64 row block, i64 col block)` index.

mod reader;
mod writer;

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::block::{MatrixBlock, Representation};
use crate::error::{BlockError, Result};

pub use reader::BlockReader;
pub use writer::BlockWriter;

/// Default size of the codec read/write buffers in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Size of the fixed block header in bytes.
pub const HEADER_LEN: usize = 1 + 4 + 4 + 8;

/// Size of one encoded sparse `(column, value)` pair in bytes.
pub const SPARSE_PAIR_LEN: usize = 4 + 8;

/// Codec configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Size of the buffered reader/writer and of the decode scratch buffer.
    pub buffer_size: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// # Errors
    /// Returns [`BlockError::InvalidBufferSize`] for a zero-sized buffer.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(BlockError::InvalidBufferSize(self.buffer_size));
        }
        Ok(())
    }
}

/// Exact number of bytes [`encode_block`] writes for `block`.
pub fn encoded_len(block: &MatrixBlock) -> usize {
    let payload = match block.representation() {
        Representation::Dense => block.rows() * block.cols() * 8,
        Representation::Sparse => block.rows() * 4 + block.non_zeros() as usize * SPARSE_PAIR_LEN,
    };
    HEADER_LEN + payload
}

/// Encode one block into `writer`, returning the number of bytes written.
pub fn encode_block<W: Write>(block: &MatrixBlock, writer: W) -> Result<usize> {
    let mut writer = BlockWriter::new(writer);
    let written = writer.write_block(block)?;
    writer.flush()?;
    Ok(written)
}

/// Decode one block from `reader`.
///
/// The reader is wrapped in a fresh buffer which may read past the end of the
/// block. To decode several consecutive blocks from one stream, keep a
/// [`BlockReader`] instead.
pub fn decode_block<R: Read>(
    reader: R,
    expected_dims: Option<[usize; 2]>,
    hint: Option<Representation>,
) -> Result<MatrixBlock> {
    BlockReader::new(reader).read_block(expected_dims, hint)
}

impl MatrixBlock {
    /// Encode into a new byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(encoded_len(self));
        encode_block(self, &mut bytes)?;
        Ok(bytes)
    }

    /// Decode from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_block(bytes, None, None)
    }
}
