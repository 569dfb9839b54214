//! Encode/decode throughput for dense and sparse blocks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use matrix_block::MatrixBlock;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn random_block(rows: usize, cols: usize, density: f64, seed: u64) -> MatrixBlock {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let values = (0..rows * cols)
        .map(|_| {
            if rng.random_bool(density) {
                rng.random::<f64>()
            } else {
                0.0
            }
        })
        .collect();
    MatrixBlock::from_dense(rows, cols, values).examine_sparsity()
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    for density in [0.01, 0.1, 0.9] {
        let block = random_block(1000, 1000, density, 42);
        let bytes = block.to_bytes().unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", density), &block, |b, block| {
            b.iter(|| black_box(block.to_bytes().unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", density), &bytes, |b, bytes| {
            b.iter(|| black_box(MatrixBlock::from_bytes(bytes).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
