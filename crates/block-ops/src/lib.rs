//! Block-level operators over blocked matrices.
//!
//! Operators work one [`MatrixBlock`](matrix_block::MatrixBlock) at a time and
//! hold no mutable state, so a dataflow engine can run them on any number of
//! workers. Cross-block coordination is left to the engine through the
//! contracts in [`dataflow`].
//!
//! - [`ReplicateOperator`]: fan a column vector out across column blocks
//! - [`PmmOperator`]: permutation-matrix multiply with a broadcast vector
//!
//! # Example
//!
//! ```
//! use block_ops::{pmm, LocalEngine};
//! use matrix_block::{BlockIndex, MatrixBlock};
//!
//! // Reverse a 4-row matrix held in row blocks of 2
//! let permutation = MatrixBlock::from_dense(4, 1, vec![4.0, 3.0, 2.0, 1.0]);
//! let blocks = vec![
//!     (BlockIndex::new(1, 1), MatrixBlock::from_dense(2, 1, vec![10.0, 20.0])),
//!     (BlockIndex::new(2, 1), MatrixBlock::from_dense(2, 1, vec![30.0, 40.0])),
//! ];
//!
//! let out = pmm(&LocalEngine::new(), permutation, &blocks, 4, 2).unwrap();
//! assert_eq!(out[0].0, BlockIndex::new(1, 1));
//! assert_eq!(out[0].1.to_dense_vec(), vec![40.0, 30.0]);
//! assert_eq!(out[1].1.to_dense_vec(), vec![20.0, 10.0]);
//! ```

pub mod dataflow;
pub mod error;
pub mod pmm;
pub mod replicate;

pub use dataflow::{
    Broadcast, Broadcaster, GroupedAggregator, LocalEngine, PartitionMapper,
};
pub use error::{OpsError, Result};
pub use pmm::{pmm, PmmOperator};
pub use replicate::ReplicateOperator;
