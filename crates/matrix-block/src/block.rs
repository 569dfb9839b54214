//! Matrix block with dense or sparse storage.
//!
//! A [`MatrixBlock`] is one tile of a blocked logical matrix. It stores its
//! cells either as a flat row-major `Vec<f64>` (dense) or as one
//! [`SparseRow`] per row (sparse). The number of non-zero cells is tracked
//! alongside the storage and kept exact by every mutating method, so callers
//! never need a rescan to know it.
//!
//! The representation only changes through the explicit conversions
//! [`into_dense`](MatrixBlock::into_dense), [`into_sparse`](MatrixBlock::into_sparse)
//! and [`examine_sparsity`](MatrixBlock::examine_sparsity).

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{BlockError, Result};
use crate::sparse::SparseRow;

/// Blocks with a fill ratio below this value are kept sparse.
pub const SPARSITY_TURN_POINT: f64 = 0.4;

/// Storage layout of a block, as written in the binary discriminant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Representation {
    Dense,
    Sparse,
}

impl Representation {
    /// Binary discriminant: 0 for dense, 1 for sparse.
    #[inline]
    pub fn discriminant(self) -> u8 {
        match self {
            Representation::Dense => 0,
            Representation::Sparse => 1,
        }
    }

    /// Parse a binary discriminant.
    pub fn from_discriminant(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Representation::Dense),
            1 => Some(Representation::Sparse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Storage {
    Dense(Vec<f64>),
    Sparse(Vec<SparseRow>),
}

/// One block of a blocked matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBlock {
    rows: usize,
    cols: usize,
    non_zeros: u64,
    storage: Storage,
}

impl MatrixBlock {
    /// All-zero dense block.
    pub fn new_dense(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            non_zeros: 0,
            storage: Storage::Dense(vec![0.0; rows * cols]),
        }
    }

    /// All-zero sparse block.
    pub fn new_sparse(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            non_zeros: 0,
            storage: Storage::Sparse(vec![SparseRow::new(); rows]),
        }
    }

    /// All-zero block in the requested representation.
    pub fn allocate(rows: usize, cols: usize, sparse: bool) -> Self {
        if sparse {
            Self::new_sparse(rows, cols)
        } else {
            Self::new_dense(rows, cols)
        }
    }

    /// Dense block from row-major values.
    ///
    /// # Panics
    /// Panics if `values.len() != rows * cols`.
    pub fn from_dense(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        assert_eq!(
            values.len(),
            rows * cols,
            "Data length {} does not match shape [{rows}, {cols}]",
            values.len()
        );
        let non_zeros = values.iter().filter(|&&v| v != 0.0).count() as u64;
        Self {
            rows,
            cols,
            non_zeros,
            storage: Storage::Dense(values),
        }
    }

    /// Block from `(row, col, value)` entries; later entries overwrite earlier ones.
    pub fn from_triplets<I>(rows: usize, cols: usize, sparse: bool, entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut block = Self::allocate(rows, cols, sparse);
        for (r, c, v) in entries {
            block.set(r, c, v);
        }
        block
    }

    /// Assemble a dense block whose non-zero count was tracked by the caller.
    pub(crate) fn from_dense_parts(rows: usize, cols: usize, values: Vec<f64>, non_zeros: u64) -> Self {
        debug_assert_eq!(values.len(), rows * cols);
        Self {
            rows,
            cols,
            non_zeros,
            storage: Storage::Dense(values),
        }
    }

    /// Assemble a sparse block whose non-zero count was tracked by the caller.
    pub(crate) fn from_sparse_parts(
        rows: usize,
        cols: usize,
        sparse_rows: Vec<SparseRow>,
        non_zeros: u64,
    ) -> Self {
        debug_assert_eq!(sparse_rows.len(), rows);
        Self {
            rows,
            cols,
            non_zeros,
            storage: Storage::Sparse(sparse_rows),
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `[rows, cols]`.
    #[inline]
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    /// Number of non-zero cells.
    #[inline]
    pub fn non_zeros(&self) -> u64 {
        self.non_zeros
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.non_zeros == 0
    }

    #[inline]
    pub fn is_sparse(&self) -> bool {
        matches!(self.storage, Storage::Sparse(_))
    }

    #[inline]
    pub fn representation(&self) -> Representation {
        match self.storage {
            Storage::Dense(_) => Representation::Dense,
            Storage::Sparse(_) => Representation::Sparse,
        }
    }

    /// Fraction of non-zero cells.
    pub fn sparsity(&self) -> f64 {
        let cells = self.rows * self.cols;
        if cells == 0 {
            return 0.0;
        }
        self.non_zeros as f64 / cells as f64
    }

    /// Row-major values if the block is dense.
    pub fn dense_values(&self) -> Option<&[f64]> {
        match &self.storage {
            Storage::Dense(values) => Some(values),
            Storage::Sparse(_) => None,
        }
    }

    /// Sparse rows if the block is sparse.
    pub fn sparse_rows(&self) -> Option<&[SparseRow]> {
        match &self.storage {
            Storage::Dense(_) => None,
            Storage::Sparse(rows) => Some(rows),
        }
    }

    /// One sparse row if the block is sparse.
    pub fn sparse_row(&self, row: usize) -> Option<&SparseRow> {
        self.sparse_rows().map(|rows| &rows[row])
    }

    /// Value of cell `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.check_cell(row, col);
        match &self.storage {
            Storage::Dense(values) => values[row * self.cols + col],
            Storage::Sparse(rows) => rows[row].get(col),
        }
    }

    /// Set cell `(row, col)`, keeping the non-zero count exact.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.check_cell(row, col);
        let delta = match &mut self.storage {
            Storage::Dense(values) => {
                let cell = &mut values[row * self.cols + col];
                let delta = (value != 0.0) as i64 - (*cell != 0.0) as i64;
                *cell = value;
                delta
            }
            Storage::Sparse(rows) => rows[row].set(col, value),
        };
        self.apply_delta(delta);
    }

    /// Iterate non-zero cells as `(row, col, value)` in row-major order.
    pub fn iter_non_zeros(&self) -> Box<dyn Iterator<Item = (usize, usize, f64)> + '_> {
        match &self.storage {
            Storage::Dense(values) => {
                let cols = self.cols;
                Box::new(
                    values
                        .iter()
                        .enumerate()
                        .filter(|(_, &v)| v != 0.0)
                        .map(move |(i, &v)| (i / cols, i % cols, v)),
                )
            }
            Storage::Sparse(rows) => Box::new(
                rows.iter()
                    .enumerate()
                    .flat_map(|(r, row)| row.iter().map(move |(c, v)| (r, c, v))),
            ),
        }
    }

    /// Non-zero count of a single row.
    pub fn row_non_zeros(&self, row: usize) -> usize {
        match &self.storage {
            Storage::Dense(values) => values[row * self.cols..(row + 1) * self.cols]
                .iter()
                .filter(|&&v| v != 0.0)
                .count(),
            Storage::Sparse(rows) => rows[row].len(),
        }
    }

    /// Recount non-zeros by scanning every cell.
    pub fn count_non_zeros(&self) -> u64 {
        match &self.storage {
            Storage::Dense(values) => values.iter().filter(|&&v| v != 0.0).count() as u64,
            Storage::Sparse(rows) => rows.iter().map(|r| r.len() as u64).sum(),
        }
    }

    /// Row-major copy of all cells.
    pub fn to_dense_vec(&self) -> Vec<f64> {
        match &self.storage {
            Storage::Dense(values) => values.clone(),
            Storage::Sparse(rows) => {
                let mut values = vec![0.0; self.rows * self.cols];
                for (r, row) in rows.iter().enumerate() {
                    for (c, v) in row.iter() {
                        values[r * self.cols + c] = v;
                    }
                }
                values
            }
        }
    }

    /// Convert to dense storage.
    pub fn into_dense(self) -> Self {
        if !self.is_sparse() {
            return self;
        }
        let values = self.to_dense_vec();
        Self::from_dense_parts(self.rows, self.cols, values, self.non_zeros)
    }

    /// Convert to sparse storage.
    pub fn into_sparse(self) -> Self {
        let Storage::Dense(values) = &self.storage else {
            return self;
        };
        let sparse_rows = (0..self.rows)
            .map(|r| {
                let mut row = SparseRow::new();
                for (c, &v) in values[r * self.cols..(r + 1) * self.cols].iter().enumerate() {
                    row.append(c, v);
                }
                row
            })
            .collect();
        Self::from_sparse_parts(self.rows, self.cols, sparse_rows, self.non_zeros)
    }

    /// Whether a `rows × cols` block holding `non_zeros` cells should be sparse.
    ///
    /// Single-column blocks are always dense.
    pub fn eval_sparse_format(rows: usize, cols: usize, non_zeros: u64) -> bool {
        let cells = rows as f64 * cols as f64;
        if cols <= 1 || cells == 0.0 {
            return false;
        }
        (non_zeros as f64 / cells) < SPARSITY_TURN_POINT
    }

    /// Convert to whichever representation suits the current fill ratio.
    pub fn examine_sparsity(self) -> Self {
        let want_sparse = Self::eval_sparse_format(self.rows, self.cols, self.non_zeros);
        match (self.is_sparse(), want_sparse) {
            (false, true) => self.into_sparse(),
            (true, false) => self.into_dense(),
            _ => self,
        }
    }

    /// Copy of rows `range`, in the same representation.
    ///
    /// # Panics
    /// Panics if `range` is not within `0..rows`.
    pub fn slice_rows(&self, range: Range<usize>) -> Self {
        assert!(
            range.start <= range.end && range.end <= self.rows,
            "Row range {range:?} out of bounds for {} rows",
            self.rows
        );
        let rows = range.len();
        match &self.storage {
            Storage::Dense(values) => {
                let slice = values[range.start * self.cols..range.end * self.cols].to_vec();
                Self::from_dense(rows, self.cols, slice)
            }
            Storage::Sparse(sparse_rows) => {
                let slice = sparse_rows[range].to_vec();
                let non_zeros = slice.iter().map(|r| r.len() as u64).sum();
                Self::from_sparse_parts(rows, self.cols, slice, non_zeros)
            }
        }
    }

    /// Replace row `dest_row` with row `src_row` of `src`.
    ///
    /// # Errors
    /// Returns [`BlockError::ShapeMismatch`] if the column counts differ.
    pub fn copy_row_from(&mut self, dest_row: usize, src: &MatrixBlock, src_row: usize) -> Result<()> {
        if src.cols != self.cols {
            return Err(BlockError::ShapeMismatch {
                expected: [src.rows, self.cols],
                actual: src.shape(),
            });
        }
        assert!(dest_row < self.rows, "Row {dest_row} out of bounds");
        assert!(src_row < src.rows, "Source row {src_row} out of bounds");

        let removed = self.row_non_zeros(dest_row) as u64;
        let cols = self.cols;
        let added = match &mut self.storage {
            Storage::Dense(values) => {
                let dest = &mut values[dest_row * cols..(dest_row + 1) * cols];
                dest.fill(0.0);
                match &src.storage {
                    Storage::Dense(src_values) => {
                        dest.copy_from_slice(&src_values[src_row * cols..(src_row + 1) * cols]);
                        dest.iter().filter(|&&v| v != 0.0).count()
                    }
                    Storage::Sparse(src_rows) => {
                        let row = &src_rows[src_row];
                        for (c, v) in row.iter() {
                            dest[c] = v;
                        }
                        row.len()
                    }
                }
            }
            Storage::Sparse(rows) => {
                let row = match &src.storage {
                    Storage::Dense(src_values) => {
                        let mut row = SparseRow::new();
                        for (c, &v) in src_values[src_row * cols..(src_row + 1) * cols]
                            .iter()
                            .enumerate()
                        {
                            row.append(c, v);
                        }
                        row
                    }
                    Storage::Sparse(src_rows) => src_rows[src_row].clone(),
                };
                let added = row.len();
                rows[dest_row] = row;
                added
            }
        };
        self.non_zeros = self.non_zeros - removed + added as u64;
        Ok(())
    }

    /// Element-wise `self += other`.
    ///
    /// Sparse + dense promotes `self` to dense; every other combination keeps
    /// the representation of `self`.
    ///
    /// # Errors
    /// Returns [`BlockError::ShapeMismatch`] if the shapes differ.
    pub fn add_assign(&mut self, other: &MatrixBlock) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(BlockError::ShapeMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        if other.is_empty() {
            return Ok(());
        }
        if self.is_sparse() && !other.is_sparse() {
            let taken = std::mem::replace(self, Self::new_dense(0, 0));
            *self = taken.into_dense();
        }

        let cols = self.cols;
        let delta: i64 = match &mut self.storage {
            Storage::Dense(values) => other
                .iter_non_zeros()
                .map(|(r, c, v)| {
                    let cell = &mut values[r * cols + c];
                    let was_non_zero = *cell != 0.0;
                    *cell += v;
                    (*cell != 0.0) as i64 - was_non_zero as i64
                })
                .sum(),
            Storage::Sparse(rows) => {
                let Some(other_rows) = other.sparse_rows() else {
                    unreachable!("dense operand promoted self to dense");
                };
                rows.iter_mut()
                    .zip(other_rows)
                    .map(|(row, other_row)| row.merge_add(other_row))
                    .sum()
            }
        };
        self.apply_delta(delta);
        Ok(())
    }

    /// Change the reported row count.
    ///
    /// Shrinking drops trailing rows (and their non-zeros); growing appends
    /// zero rows.
    pub fn set_rows(&mut self, rows: usize) {
        if rows < self.rows {
            let dropped: u64 = (rows..self.rows).map(|r| self.row_non_zeros(r) as u64).sum();
            self.non_zeros -= dropped;
        }
        match &mut self.storage {
            Storage::Dense(values) => values.resize(rows * self.cols, 0.0),
            Storage::Sparse(sparse_rows) => sparse_rows.resize_with(rows, SparseRow::new),
        }
        self.rows = rows;
    }

    #[inline]
    fn apply_delta(&mut self, delta: i64) {
        self.non_zeros = (self.non_zeros as i64 + delta) as u64;
    }

    #[inline]
    fn check_cell(&self, row: usize, col: usize) {
        assert!(
            row < self.rows && col < self.cols,
            "Cell ({row}, {col}) out of bounds for shape [{}, {}]",
            self.rows,
            self.cols
        );
    }
}
