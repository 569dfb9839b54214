//! Buffered block decoder.
//!
//! All reads go through a [`BufReader`] and land in a reusable scratch buffer
//! from which fields are decoded in memory. Dense payloads are read in
//! buffer-sized chunks of whole doubles; sparse rows are read in one go when
//! they fit the buffer and pair by pair otherwise.

use std::io::{BufReader, ErrorKind, Read};

use byteorder::{BigEndian, ByteOrder};

use super::{CodecOptions, DEFAULT_BUFFER_SIZE, SPARSE_PAIR_LEN};
use crate::block::{MatrixBlock, Representation};
use crate::characteristics::BlockIndex;
use crate::error::{BlockError, Result};
use crate::sparse::SparseRow;

/// Decoded block header.
#[derive(Debug, Clone, Copy)]
struct Header {
    representation: Representation,
    rows: usize,
    cols: usize,
    non_zeros: u64,
}

/// Reads blocks in the binary block format.
///
/// The reader owns its buffers, so a single instance can decode a sequence of
/// blocks from one stream.
pub struct BlockReader<R: Read> {
    inner: BufReader<R>,
    buffer_size: usize,
    scratch: Vec<u8>,
}

impl<R: Read> BlockReader<R> {
    /// Reader with the default 8 KiB buffer.
    pub fn new(inner: R) -> Self {
        Self::with_buffer_size(inner, DEFAULT_BUFFER_SIZE)
    }

    /// Reader with a configured buffer size.
    ///
    /// # Errors
    /// Returns [`BlockError::InvalidBufferSize`] for a zero-sized buffer.
    pub fn with_options(inner: R, options: &CodecOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::with_buffer_size(inner, options.buffer_size))
    }

    fn with_buffer_size(inner: R, buffer_size: usize) -> Self {
        Self {
            inner: BufReader::with_capacity(buffer_size, inner),
            buffer_size,
            // large enough for the widest single field group (a sparse pair)
            scratch: vec![0u8; buffer_size.max(SPARSE_PAIR_LEN)],
        }
    }

    /// Configured buffer size in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Return the underlying reader. Buffered but unread bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// Fill `scratch[..len]` from the stream.
    fn read_fully(&mut self, len: usize) -> Result<()> {
        let mut read = 0;
        while read < len {
            match self.inner.read(&mut self.scratch[read..len]) {
                Ok(0) => return Err(BlockError::TruncatedStream { needed: len, read }),
                Ok(n) => read += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_fully(1)?;
        Ok(self.scratch[0])
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_fully(4)?;
        Ok(BigEndian::read_i32(&self.scratch))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_fully(8)?;
        Ok(BigEndian::read_i64(&self.scratch))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_fully(8)?;
        Ok(BigEndian::read_f64(&self.scratch))
    }

    /// Decode `len` doubles, returning them with the count of non-zeros.
    ///
    /// The output grows one buffer load at a time, so a header declaring more
    /// cells than the stream holds fails with a truncation instead of a large
    /// up-front allocation.
    pub fn read_dense_values(&mut self, len: usize) -> Result<(Vec<f64>, u64)> {
        let per_chunk = (self.buffer_size / 8).max(1);
        let mut values = Vec::with_capacity(len.min(per_chunk));
        let mut non_zeros = 0u64;
        while values.len() < len {
            let n = per_chunk.min(len - values.len());
            self.read_fully(n * 8)?;
            for bytes in self.scratch[..n * 8].chunks_exact(8) {
                let v = BigEndian::read_f64(bytes);
                non_zeros += (v != 0.0) as u64;
                values.push(v);
            }
        }
        Ok((values, non_zeros))
    }

    /// Decode a sparse payload of `rows` rows, returning the rows with the
    /// count of non-zeros stored.
    pub fn read_sparse_rows(&mut self, rows: usize, cols: usize) -> Result<(Vec<SparseRow>, u64)> {
        // every row costs at least its 4-byte count
        let mut sparse_rows = Vec::with_capacity(rows.min(self.buffer_size / 4 + 1));
        let mut non_zeros = 0u64;
        for r in 0..rows {
            let count = self.read_i32()?;
            if count < 0 {
                return Err(BlockError::corrupt(format!(
                    "negative non-zero count {count} in row {r}"
                )));
            }
            let count = count as usize;
            if count > cols {
                return Err(BlockError::corrupt(format!(
                    "row {r} declares {count} non-zeros but the block has {cols} columns"
                )));
            }

            let mut row = SparseRow::with_capacity(count);
            let len = count * SPARSE_PAIR_LEN;
            if len < self.buffer_size {
                self.read_fully(len)?;
                for pair in self.scratch[..len].chunks_exact(SPARSE_PAIR_LEN) {
                    append_pair(&mut row, pair, r, cols)?;
                }
            } else {
                tracing::trace!(row = r, count, "sparse row exceeds read buffer, decoding pairwise");
                for _ in 0..count {
                    self.read_fully(SPARSE_PAIR_LEN)?;
                    append_pair(&mut row, &self.scratch[..SPARSE_PAIR_LEN], r, cols)?;
                }
            }
            non_zeros += row.len() as u64;
            sparse_rows.push(row);
        }
        Ok((sparse_rows, non_zeros))
    }

    /// Read a header, or `None` on a clean end of stream before it.
    fn next_header(&mut self) -> Result<Option<Header>> {
        let discriminant = match self.read_u8() {
            Ok(byte) => byte,
            Err(BlockError::TruncatedStream { read: 0, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        let representation = Representation::from_discriminant(discriminant).ok_or_else(|| {
            BlockError::corrupt(format!("unknown representation discriminant {discriminant}"))
        })?;
        let rows = self.read_i32()?;
        let cols = self.read_i32()?;
        let non_zeros = self.read_i64()?;
        if rows < 0 || cols < 0 {
            return Err(BlockError::corrupt(format!(
                "negative block dimensions {rows} × {cols}"
            )));
        }
        let cells = (rows as u64) * (cols as u64);
        if non_zeros < 0 || non_zeros as u64 > cells {
            return Err(BlockError::corrupt(format!(
                "non-zero count {non_zeros} invalid for a {rows} × {cols} block"
            )));
        }
        Ok(Some(Header {
            representation,
            rows: rows as usize,
            cols: cols as usize,
            non_zeros: non_zeros as u64,
        }))
    }

    fn read_payload(&mut self, header: Header) -> Result<MatrixBlock> {
        let Header { rows, cols, .. } = header;
        let cells = rows.checked_mul(cols).ok_or_else(|| {
            BlockError::corrupt(format!("{rows} × {cols} block exceeds addressable cells"))
        })?;
        let block = match header.representation {
            Representation::Dense => {
                let (values, non_zeros) = self.read_dense_values(cells)?;
                MatrixBlock::from_dense_parts(rows, cols, values, non_zeros)
            }
            Representation::Sparse => {
                let (sparse_rows, non_zeros) = self.read_sparse_rows(rows, cols)?;
                MatrixBlock::from_sparse_parts(rows, cols, sparse_rows, non_zeros)
            }
        };
        if block.non_zeros() != header.non_zeros {
            tracing::debug!(
                declared = header.non_zeros,
                decoded = block.non_zeros(),
                "block header non-zero count differs from decoded payload"
            );
        }
        Ok(block)
    }

    /// Decode the next block, or `None` at a clean end of stream.
    pub fn next_block(&mut self) -> Result<Option<MatrixBlock>> {
        match self.next_header()? {
            Some(header) => self.read_payload(header).map(Some),
            None => Ok(None),
        }
    }

    /// Decode exactly one block.
    ///
    /// `expected_dims`, if given, must match the header. `hint` is the
    /// representation the caller expects; the stream discriminant always wins.
    ///
    /// # Errors
    /// - [`BlockError::TruncatedStream`] if the stream ends early (including
    ///   before the header).
    /// - [`BlockError::CorruptFormat`] for inconsistent header or payload values.
    pub fn read_block(
        &mut self,
        expected_dims: Option<[usize; 2]>,
        hint: Option<Representation>,
    ) -> Result<MatrixBlock> {
        let header = self
            .next_header()?
            .ok_or(BlockError::TruncatedStream { needed: 1, read: 0 })?;
        if let Some([rows, cols]) = expected_dims {
            if [rows, cols] != [header.rows, header.cols] {
                return Err(BlockError::corrupt(format!(
                    "expected a {rows} × {cols} block, stream holds {} × {}",
                    header.rows, header.cols
                )));
            }
        }
        if hint.is_some_and(|h| h != header.representation) {
            tracing::trace!(
                ?hint,
                actual = ?header.representation,
                "representation hint overridden by stream"
            );
        }
        self.read_payload(header)
    }

    /// Decode the next `(index, block)` record, or `None` at a clean end of stream.
    pub fn next_indexed_block(&mut self) -> Result<Option<(BlockIndex, MatrixBlock)>> {
        let row = match self.read_i64() {
            Ok(row) => row,
            Err(BlockError::TruncatedStream { read: 0, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        let col = self.read_i64()?;
        if row < 1 || col < 1 {
            return Err(BlockError::corrupt(format!(
                "block index ({row}, {col}) is not 1-based"
            )));
        }
        let index = BlockIndex::new(row as u64, col as u64);
        let block = self.read_block(None, None)?;
        Ok(Some((index, block)))
    }
}

/// Decode one `(i32 column, f64 value)` pair and append it to `row`.
fn append_pair(row: &mut SparseRow, pair: &[u8], r: usize, cols: usize) -> Result<()> {
    let col = BigEndian::read_i32(&pair[..4]);
    let value = BigEndian::read_f64(&pair[4..SPARSE_PAIR_LEN]);
    if col < 0 || col as usize >= cols {
        return Err(BlockError::corrupt(format!(
            "column index {col} out of range in row {r} ({cols} columns)"
        )));
    }
    let col = col as usize;
    if row.indices().last().is_some_and(|&last| last >= col) {
        return Err(BlockError::corrupt(format!(
            "column indices not ascending in row {r} at column {col}"
        )));
    }
    row.append(col, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_row_bytes(cols: &[i32], value: f64) -> Vec<u8> {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&1i32.to_be_bytes());
        bytes.extend_from_slice(&(cols.len() as i32 + 10).to_be_bytes());
        bytes.extend_from_slice(&(cols.len() as i64).to_be_bytes());
        bytes.extend_from_slice(&(cols.len() as i32).to_be_bytes());
        for &c in cols {
            bytes.extend_from_slice(&c.to_be_bytes());
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn test_truncated_header() {
        let bytes = [0u8, 0, 0];
        let err = BlockReader::new(&bytes[..]).read_block(None, None).unwrap_err();
        assert!(matches!(
            err,
            BlockError::TruncatedStream { needed: 4, read: 2 }
        ));
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = BlockReader::new(&[][..]);
        assert!(reader.next_block().unwrap().is_none());
        assert!(matches!(
            reader.read_block(None, None),
            Err(BlockError::TruncatedStream { needed: 1, read: 0 })
        ));
    }

    #[test]
    fn test_truncated_dense_payload() {
        let block = MatrixBlock::from_dense(4, 4, (0..16).map(f64::from).collect());
        let bytes = block.to_bytes().unwrap();
        let cut = &bytes[..bytes.len() - 3];
        let err = BlockReader::new(cut).read_block(None, None).unwrap_err();
        assert!(matches!(err, BlockError::TruncatedStream { .. }));
    }

    #[test]
    fn test_negative_row_count() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&2i32.to_be_bytes());
        bytes.extend_from_slice(&2i32.to_be_bytes());
        bytes.extend_from_slice(&0i64.to_be_bytes());
        bytes.extend_from_slice(&(-1i32).to_be_bytes());
        let err = BlockReader::new(&bytes[..]).read_block(None, None).unwrap_err();
        assert!(matches!(err, BlockError::CorruptFormat(msg) if msg.contains("negative")));
    }

    #[test]
    fn test_unknown_discriminant() {
        let mut bytes = vec![7u8];
        bytes.extend_from_slice(&[0u8; 16]);
        let err = BlockReader::new(&bytes[..]).read_block(None, None).unwrap_err();
        assert!(matches!(err, BlockError::CorruptFormat(_)));
    }

    #[test]
    fn test_unsorted_columns_rejected() {
        let bytes = sparse_row_bytes(&[3, 1], 1.0);
        let err = BlockReader::new(&bytes[..]).read_block(None, None).unwrap_err();
        assert!(matches!(err, BlockError::CorruptFormat(msg) if msg.contains("ascending")));
    }

    #[test]
    fn test_expected_dims_mismatch() {
        let bytes = MatrixBlock::new_dense(2, 3).to_bytes().unwrap();
        assert!(BlockReader::new(&bytes[..])
            .read_block(Some([2, 3]), Some(Representation::Sparse))
            .is_ok());
        let err = BlockReader::new(&bytes[..])
            .read_block(Some([3, 2]), None)
            .unwrap_err();
        assert!(matches!(err, BlockError::CorruptFormat(_)));
    }

    #[test]
    fn test_non_zeros_counted_not_trusted() {
        let mut bytes = MatrixBlock::from_dense(1, 3, vec![1.0, 0.0, 2.0])
            .to_bytes()
            .unwrap();
        // overwrite the declared non-zero count (bytes 9..17) with 3
        bytes[9..17].copy_from_slice(&3i64.to_be_bytes());
        let block = MatrixBlock::from_bytes(&bytes).unwrap();
        assert_eq!(block.non_zeros(), 2);
    }

    #[test]
    fn test_small_buffer_chunks_dense() {
        let values: Vec<f64> = (0..37).map(|i| if i % 3 == 0 { 0.0 } else { i as f64 }).collect();
        let block = MatrixBlock::from_dense(37, 1, values);
        let bytes = block.to_bytes().unwrap();
        // 20 bytes: two whole doubles per chunk
        let opts = CodecOptions::new().with_buffer_size(20);
        let decoded = BlockReader::with_options(&bytes[..], &opts)
            .unwrap()
            .read_block(None, None)
            .unwrap();
        assert_eq!(decoded, block);
    }

    fn bare_header(discriminant: u8, rows: i32, cols: i32) -> Vec<u8> {
        let mut bytes = vec![discriminant];
        bytes.extend_from_slice(&rows.to_be_bytes());
        bytes.extend_from_slice(&cols.to_be_bytes());
        bytes.extend_from_slice(&0i64.to_be_bytes());
        bytes
    }

    #[test]
    fn test_huge_header_without_payload_is_truncated() {
        for discriminant in [0u8, 1] {
            let bytes = bare_header(discriminant, i32::MAX, i32::MAX);
            assert_eq!(bytes.len(), 17);
            let err = MatrixBlock::from_bytes(&bytes).unwrap_err();
            assert!(
                matches!(err, BlockError::TruncatedStream { read: 0, .. }),
                "discriminant {discriminant}: {err:?}"
            );
        }
    }

    #[test]
    fn test_tall_empty_sparse_header_is_truncated() {
        // one valid empty row, then the stream ends
        let mut bytes = bare_header(1, i32::MAX, 0);
        bytes.extend_from_slice(&0i32.to_be_bytes());
        let err = MatrixBlock::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, BlockError::TruncatedStream { needed: 4, read: 0 }));
    }
}
