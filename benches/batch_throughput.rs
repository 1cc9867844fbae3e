//! Batch engine throughput: sequential reference vs dimension-major kernel,
//! plus one full column step for scale.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use laminar::{
    BatchProcessor, CircuitConfig, CircuitOrchestrator, DispatchMode, Layer4Parameters,
    Layer6Parameters, Pattern,
};

const SIZE: usize = 64;

fn generate_batch(n: usize) -> Vec<Pattern> {
    (0..n)
        .map(|k| Pattern::from_fn(SIZE, |d| ((d as f64 + k as f64) * 0.3).sin().abs()))
        .collect()
}

fn processor(parallel: bool) -> BatchProcessor {
    BatchProcessor::new(
        Layer4Parameters::builder(SIZE).build().unwrap(),
        Layer6Parameters::builder(SIZE).build().unwrap(),
    )
    .unwrap()
    .with_parallel(parallel)
}

fn bench_batch_paths(c: &mut Criterion) {
    let expectation = Pattern::from_fn(SIZE, |d| if d % 4 == 0 { 1.0 } else { 0.2 });
    let mut group = c.benchmark_group("batch_64dim");

    for &n in &[8usize, 64, 512] {
        let patterns = generate_batch(n);
        group.throughput(Throughput::Elements(n as u64));

        let seq = processor(false);
        group.bench_with_input(BenchmarkId::new("sequential", n), &patterns, |b, p| {
            b.iter(|| seq.process_sequential(black_box(p), &expectation).unwrap())
        });

        let serial = processor(false);
        group.bench_with_input(BenchmarkId::new("vectorized", n), &patterns, |b, p| {
            b.iter(|| serial.process_vectorized(black_box(p), &expectation).unwrap())
        });

        let parallel = processor(true);
        group.bench_with_input(BenchmarkId::new("vectorized_rayon", n), &patterns, |b, p| {
            b.iter(|| parallel.process_vectorized(black_box(p), &expectation).unwrap())
        });
    }
    group.finish();
}

fn bench_column_step(c: &mut Criterion) {
    let input = generate_batch(1).remove(0);
    let mut group = c.benchmark_group("column_step_64dim");
    for (name, dispatch) in [
        ("parallel", DispatchMode::Parallel),
        ("sequential", DispatchMode::Sequential),
    ] {
        let config = CircuitConfig::with_size(SIZE)
            .unwrap()
            .with_dispatch(dispatch);
        let mut column = CircuitOrchestrator::new(config).unwrap();
        group.bench_function(name, |b| b.iter(|| column.process(black_box(&input)).unwrap()));
    }
    group.finish();
}

criterion_group!(benches, bench_batch_paths, bench_column_step);
criterion_main!(benches);
