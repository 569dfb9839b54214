mod common;

use std::sync::Arc;

use block_ops::ReplicateOperator;
use matrix_block::{BlockCharacteristics, BlockIndex, MatrixBlock};

fn column_vector(rows: usize) -> Arc<MatrixBlock> {
    Arc::new(MatrixBlock::from_dense(
        rows,
        1,
        (1..=rows).map(|i| i as f64).collect(),
    ))
}

#[test]
fn test_fan_out_shares_payload() {
    let _guard = common::init_test_subscriber();
    let op = ReplicateOperator::new(2700, 1000).unwrap();
    let block = column_vector(1000);

    let out = op.apply(BlockIndex::new(2, 1), Arc::clone(&block));

    let indices: Vec<_> = out.iter().map(|(ix, _)| *ix).collect();
    assert_eq!(
        indices,
        vec![
            BlockIndex::new(2, 1),
            BlockIndex::new(2, 2),
            BlockIndex::new(2, 3)
        ]
    );
    for (_, payload) in &out {
        assert!(Arc::ptr_eq(payload, &block));
    }
}

#[test]
fn test_pass_through_outside_first_column_block() {
    let op = ReplicateOperator::new(2700, 1000).unwrap();
    let block = column_vector(10);
    let out = op.apply(BlockIndex::new(1, 2), Arc::clone(&block));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, BlockIndex::new(1, 2));
    assert!(Arc::ptr_eq(&out[0].1, &block));
}

#[test]
fn test_single_column_block_other_operand() {
    let op = ReplicateOperator::new(800, 1000).unwrap();
    let out = op.apply(BlockIndex::new(1, 1), column_vector(5));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, BlockIndex::new(1, 1));
}

#[test]
fn test_unit_block_length_warns_once_at_construction() {
    let (op, logs) = common::with_captured_warnings(|| ReplicateOperator::new(4, 1).unwrap());
    assert!(logs.contains("WARN"), "missing warning in {logs:?}");
    assert!(logs.contains("column block length 1"));

    let ((), logs) = common::with_captured_warnings(|| {
        op.apply(BlockIndex::new(1, 1), column_vector(3));
    });
    assert!(logs.is_empty(), "apply should not warn: {logs:?}");

    let (_, logs) = common::with_captured_warnings(|| ReplicateOperator::new(4, 1000).unwrap());
    assert!(logs.is_empty());
}

#[test]
fn test_unit_block_length_still_replicates() {
    let _guard = common::init_test_subscriber();
    let op = ReplicateOperator::new(4, 1).unwrap();
    let out = op.apply(BlockIndex::new(1, 1), column_vector(3));
    let cols: Vec<u64> = out.iter().map(|(ix, _)| ix.col()).collect();
    assert_eq!(cols, vec![1, 2, 3, 4]);
}

#[test]
fn test_apply_all_covers_grid() {
    let other = BlockCharacteristics::square(2500, 2700, 1000).unwrap();
    let op = ReplicateOperator::new(other.cols(), other.cols_per_block()).unwrap();

    let vector: Vec<_> = (1..=other.num_row_blocks())
        .map(|rb| {
            let rows = other.row_block_size(rb);
            (BlockIndex::new(rb, 1), column_vector(rows))
        })
        .collect();
    let out = op.apply_all(vector);

    assert_eq!(out.len() as u64, other.num_row_blocks() * other.num_col_blocks());
    let mut indices: Vec<_> = out.iter().map(|(ix, _)| *ix).collect();
    indices.sort();
    indices.dedup();
    assert_eq!(indices.len(), out.len());
    for (ix, block) in &out {
        assert_eq!(block.rows(), other.row_block_size(ix.row()));
    }
}
