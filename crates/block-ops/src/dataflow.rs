//! Contracts the operators need from a dataflow engine, plus a local engine.
//!
//! A distributed engine supplies a few primitives: broadcasting a read-only
//! value to every worker, mapping over a partition, and grouping keyed blocks
//! to sum them element-wise. [`LocalEngine`] implements them in-process.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use matrix_block::{BlockIndex, MatrixBlock};
use rayon::prelude::*;

use crate::error::Result;

/// Read-only handle to a broadcast value.
#[derive(Debug)]
pub struct Broadcast<T>(Arc<T>);

impl<T> Broadcast<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// The shared value.
    pub fn value(&self) -> &T {
        &self.0
    }
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Broadcast<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Ships a read-only value to every worker.
pub trait Broadcaster {
    fn broadcast<T: Send + Sync>(&self, value: T) -> Broadcast<T>;
}

/// Applies a function to every element of a partition.
pub trait PartitionMapper {
    /// Concatenate the outputs of `f` in input order. The first error aborts
    /// the map.
    fn flat_map<T, U, F>(&self, input: &[T], f: F) -> Result<Vec<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> Result<Vec<U>> + Sync + Send;
}

/// Groups keyed blocks and sums each group element-wise.
pub trait GroupedAggregator {
    /// # Errors
    /// Fails if two blocks under the same key have different shapes.
    fn group_and_sum<I>(&self, pairs: I) -> Result<Vec<(BlockIndex, MatrixBlock)>>
    where
        I: IntoIterator<Item = (BlockIndex, MatrixBlock)>;
}

/// In-process engine.
#[derive(Debug, Clone, Copy)]
pub struct LocalEngine {
    /// Run flat-maps on the rayon thread pool.
    pub parallel: bool,
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl PartitionMapper for LocalEngine {
    fn flat_map<T, U, F>(&self, input: &[T], f: F) -> Result<Vec<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> Result<Vec<U>> + Sync + Send,
    {
        let chunks: Vec<Vec<U>> = if self.parallel {
            input.par_iter().map(&f).collect::<Result<_>>()?
        } else {
            input.iter().map(&f).collect::<Result<_>>()?
        };
        Ok(chunks.into_iter().flatten().collect())
    }
}

impl Broadcaster for LocalEngine {
    fn broadcast<T: Send + Sync>(&self, value: T) -> Broadcast<T> {
        Broadcast::new(value)
    }
}

impl GroupedAggregator for LocalEngine {
    /// Output is sorted by block index.
    fn group_and_sum<I>(&self, pairs: I) -> Result<Vec<(BlockIndex, MatrixBlock)>>
    where
        I: IntoIterator<Item = (BlockIndex, MatrixBlock)>,
    {
        let mut groups: HashMap<BlockIndex, MatrixBlock> = HashMap::new();
        for (index, block) in pairs {
            match groups.get_mut(&index) {
                Some(acc) => acc.add_assign(&block)?,
                None => {
                    groups.insert(index, block);
                }
            }
        }
        let mut out: Vec<_> = groups.into_iter().collect();
        out.sort_unstable_by_key(|(index, _)| *index);
        tracing::debug!(groups = out.len(), "grouped blocks summed");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_shares_value() {
        let engine = LocalEngine::new();
        let b = engine.broadcast(vec![1, 2, 3]);
        let c = b.clone();
        assert!(std::ptr::eq(b.value(), c.value()));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_flat_map_keeps_order() {
        for parallel in [true, false] {
            let engine = LocalEngine::new().with_parallel(parallel);
            let input: Vec<u32> = (0..100).collect();
            let out = engine.flat_map(&input, |&x| Ok(vec![x, x])).unwrap();
            assert_eq!(out.len(), 200);
            assert_eq!(&out[..4], &[0, 0, 1, 1]);
            assert_eq!(out[199], 99);
        }
    }

    #[test]
    fn test_group_and_sum() {
        let engine = LocalEngine::new();
        let a = MatrixBlock::from_triplets(2, 2, true, [(0, 0, 1.0)]);
        let b = MatrixBlock::from_dense(2, 2, vec![0.0, 0.0, 0.0, 2.0]);
        let c = MatrixBlock::from_triplets(2, 2, false, [(0, 1, 5.0)]);
        let out = engine
            .group_and_sum([
                (BlockIndex::new(2, 1), c.clone()),
                (BlockIndex::new(1, 1), a),
                (BlockIndex::new(1, 1), b),
            ])
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, BlockIndex::new(1, 1));
        assert_eq!(out[0].1.to_dense_vec(), vec![1.0, 0.0, 0.0, 2.0]);
        assert_eq!(out[0].1.non_zeros(), 2);
        assert_eq!(out[1], (BlockIndex::new(2, 1), c));
    }

    #[test]
    fn test_group_and_sum_shape_mismatch() {
        let engine = LocalEngine::new();
        let result = engine.group_and_sum([
            (BlockIndex::new(1, 1), MatrixBlock::new_dense(2, 2)),
            (BlockIndex::new(1, 1), MatrixBlock::from_dense(3, 2, vec![1.0; 6])),
        ]);
        assert!(result.is_err());
    }
}
