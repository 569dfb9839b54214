//! Sparse row storage.
//!
//! A sparse block keeps one [`SparseRow`] per row. Each row holds its non-zero
//! cells as parallel `indices`/`values` vectors sorted by ascending column.
//! Zeros are never stored.

/// Non-zero cells of a single block row, in ascending column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseRow {
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseRow {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty row with room for `capacity` non-zeros.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            indices: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Number of stored non-zeros.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column indices, ascending.
    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Values aligned with [`indices`](Self::indices).
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Append a cell past the last stored column.
    ///
    /// Zero values are skipped. Returns `true` if a non-zero was stored.
    ///
    /// # Panics
    /// Panics (debug builds) if `col` does not exceed the last stored column.
    #[inline]
    pub fn append(&mut self, col: usize, value: f64) -> bool {
        if value == 0.0 {
            return false;
        }
        debug_assert!(
            self.indices.last().map_or(true, |&last| last < col),
            "append requires ascending columns: {col} after {:?}",
            self.indices.last()
        );
        self.indices.push(col);
        self.values.push(value);
        true
    }

    /// Value at column `col` (0.0 if not stored).
    pub fn get(&self, col: usize) -> f64 {
        match self.indices.binary_search(&col) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Set the value at column `col`, inserting or removing as needed.
    ///
    /// Returns the change in the number of stored non-zeros (-1, 0 or +1).
    pub fn set(&mut self, col: usize, value: f64) -> i64 {
        match self.indices.binary_search(&col) {
            Ok(pos) if value == 0.0 => {
                self.indices.remove(pos);
                self.values.remove(pos);
                -1
            }
            Ok(pos) => {
                self.values[pos] = value;
                0
            }
            Err(_) if value == 0.0 => 0,
            Err(pos) => {
                self.indices.insert(pos, col);
                self.values.insert(pos, value);
                1
            }
        }
    }

    /// Add `value` to the cell at column `col`.
    ///
    /// Returns the change in the number of stored non-zeros.
    pub fn add(&mut self, col: usize, value: f64) -> i64 {
        if value == 0.0 {
            return 0;
        }
        let current = self.get(col);
        self.set(col, current + value)
    }

    /// Merge-add another row into this one.
    ///
    /// Returns the change in the number of stored non-zeros.
    pub fn merge_add(&mut self, other: &SparseRow) -> i64 {
        if other.is_empty() {
            return 0;
        }
        let before = self.len() as i64;
        let mut merged = SparseRow::with_capacity(self.len() + other.len());
        let (mut i, mut j) = (0, 0);
        while i < self.len() || j < other.len() {
            let take_self = j >= other.len()
                || (i < self.len() && self.indices[i] < other.indices[j]);
            let take_other =
                i >= self.len() || (j < other.len() && other.indices[j] < self.indices[i]);
            if take_self {
                merged.append(self.indices[i], self.values[i]);
                i += 1;
            } else if take_other {
                merged.append(other.indices[j], other.values[j]);
                j += 1;
            } else {
                // same column; cancellation to zero is dropped by append
                merged.append(self.indices[i], self.values[i] + other.values[j]);
                i += 1;
                j += 1;
            }
        }
        *self = merged;
        self.len() as i64 - before
    }

    /// Remove all cells, keeping the allocation.
    pub fn clear(&mut self) {
        self.indices.clear();
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_skips_zeros() {
        let mut row = SparseRow::new();
        assert!(row.append(0, 1.0));
        assert!(!row.append(2, 0.0));
        assert!(row.append(5, -3.0));
        assert_eq!(row.indices(), &[0, 5]);
        assert_eq!(row.values(), &[1.0, -3.0]);
    }

    #[test]
    fn test_set_insert_update_remove() {
        let mut row = SparseRow::new();
        assert_eq!(row.set(4, 2.0), 1);
        assert_eq!(row.set(1, 1.0), 1);
        assert_eq!(row.set(4, 5.0), 0);
        assert_eq!(row.indices(), &[1, 4]);
        assert_eq!(row.get(4), 5.0);
        assert_eq!(row.set(1, 0.0), -1);
        assert_eq!(row.set(7, 0.0), 0);
        assert_eq!(row.indices(), &[4]);
    }

    #[test]
    fn test_merge_add() {
        let mut a = SparseRow::new();
        a.append(0, 1.0);
        a.append(3, 2.0);
        let mut b = SparseRow::new();
        b.append(1, 4.0);
        b.append(3, -2.0);
        b.append(6, 1.5);

        let delta = a.merge_add(&b);
        assert_eq!(delta, 1);
        assert_eq!(a.indices(), &[0, 1, 6]);
        assert_eq!(a.values(), &[1.0, 4.0, 1.5]);
    }

    #[test]
    fn test_add_accumulates_and_cancels() {
        let mut row = SparseRow::new();
        assert_eq!(row.add(2, 1.5), 1);
        assert_eq!(row.add(2, 2.0), 0);
        assert_eq!(row.get(2), 3.5);
        assert_eq!(row.add(0, 0.0), 0);
        assert_eq!(row.add(2, -3.5), -1);
        assert!(row.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut row = SparseRow::with_capacity(4);
        row.append(1, 2.0);
        row.append(3, 4.0);
        row.clear();
        assert!(row.is_empty());
        assert_eq!(row.get(3), 0.0);
        assert!(row.append(0, 1.0));
        assert_eq!(row.indices(), &[0]);
    }
}
