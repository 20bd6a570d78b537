use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polytess::{BoundingBox, Hasher};
use rand::prelude::*;
use rand::rngs::StdRng;

const NUM_POINTS: usize = 100_000;

fn benchmark_hash_positions(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(5);
    let hasher = Hasher::<2>::new(BoundingBox::unit(), BoundingBox::new([-3.0, -3.0], [4.0, 4.0]), 1e-14);
    // Mostly inner points with a share of outer ones.
    let points: Vec<[f64; 2]> = (0..NUM_POINTS).map(|_| [rng.gen_range(-0.5..1.5), rng.gen_range(-0.5..1.5)]).collect();

    c.bench_function(&format!("hash_{}_points_2d", NUM_POINTS), |b| {
        b.iter(|| points.iter().map(|p| hasher.hash_position(black_box(p))).fold(0u64, |acc, h| acc ^ h))
    });

    let hashes: Vec<u64> = points.iter().map(|p| hasher.hash_position(p)).collect();
    c.bench_function(&format!("unhash_{}_points_2d", NUM_POINTS), |b| {
        b.iter(|| hashes.iter().map(|&h| hasher.unhash_position(black_box(h))[0]).sum::<f64>())
    });
}

fn benchmark_check_duplicates(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(6);
    let hasher = Hasher::<3>::bounded(BoundingBox::unit(), 1e-14);
    let points: Vec<[f64; 3]> = (0..NUM_POINTS).map(|_| std::array::from_fn(|_| rng.gen_range(0.0..1.0))).collect();
    c.bench_function(&format!("check_duplicates_{}_points_3d", NUM_POINTS), |b| {
        b.iter(|| hasher.check_duplicates(black_box(&points)).is_ok())
    });
}

criterion_group!(benches, benchmark_hash_positions, benchmark_check_duplicates);
criterion_main!(benches);
