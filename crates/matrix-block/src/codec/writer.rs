//! Buffered block encoder.

use std::io::{BufWriter, Write};

use byteorder::{BigEndian, WriteBytesExt};

use super::{encoded_len, CodecOptions, DEFAULT_BUFFER_SIZE};
use crate::block::MatrixBlock;
use crate::characteristics::BlockIndex;
use crate::error::{BlockError, Result};

/// Writes blocks in the binary block format through a [`BufWriter`].
pub struct BlockWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> BlockWriter<W> {
    /// Writer with the default buffer size.
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, inner),
        }
    }

    /// Writer with a configured buffer size.
    pub fn with_options(inner: W, options: &CodecOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            inner: BufWriter::with_capacity(options.buffer_size, inner),
        })
    }

    /// Encode one block. Returns the number of bytes written.
    ///
    /// # Errors
    /// Returns [`BlockError::DimensionOverflow`] if the block dimensions do not
    /// fit the `i32` header fields.
    pub fn write_block(&mut self, block: &MatrixBlock) -> Result<usize> {
        let overflow = || BlockError::DimensionOverflow {
            rows: block.rows(),
            cols: block.cols(),
        };
        let rows = i32::try_from(block.rows()).map_err(|_| overflow())?;
        let cols = i32::try_from(block.cols()).map_err(|_| overflow())?;

        let w = &mut self.inner;
        w.write_u8(block.representation().discriminant())?;
        w.write_i32::<BigEndian>(rows)?;
        w.write_i32::<BigEndian>(cols)?;
        w.write_i64::<BigEndian>(block.non_zeros() as i64)?;

        if let Some(values) = block.dense_values() {
            for &v in values {
                w.write_f64::<BigEndian>(v)?;
            }
        } else if let Some(sparse_rows) = block.sparse_rows() {
            for row in sparse_rows {
                // row length and column indices are bounded by `cols`, which fits i32
                w.write_i32::<BigEndian>(row.len() as i32)?;
                for (c, v) in row.iter() {
                    w.write_i32::<BigEndian>(c as i32)?;
                    w.write_f64::<BigEndian>(v)?;
                }
            }
        }
        Ok(encoded_len(block))
    }

    /// Encode a block preceded by its `(row block, col block)` index.
    pub fn write_indexed_block(&mut self, index: BlockIndex, block: &MatrixBlock) -> Result<usize> {
        self.inner.write_i64::<BigEndian>(index.row() as i64)?;
        self.inner.write_i64::<BigEndian>(index.col() as i64)?;
        Ok(16 + self.write_block(block)?)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|err| BlockError::Io(err.into_error()))
    }
}
