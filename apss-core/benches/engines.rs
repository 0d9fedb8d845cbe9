//! All-pairs engine benchmarks

use std::sync::Arc;

use apss_core::{
    ApssContext, ApssTask, CountingSink, Indexed, IndexedVector, InnerEngine, InvertedApss,
    MemorySource, NaiveApss, SparseVector, ThreadedApss, measure,
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

/// Sparse corpus with a skewed feature distribution: low ids are common
fn generate_vectors(count: u32, cardinality: u32, seed: u64) -> Vec<IndexedVector> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as u32
    };
    (0..count)
        .map(|id| {
            let mut v = SparseVector::new(cardinality as usize);
            for _ in 0..(4 + next() % 16) {
                let r = next() % cardinality;
                let key = (r * r) / cardinality;
                v.set(key, 1.0 + (next() % 10) as f64);
            }
            Indexed::new(id, v)
        })
        .collect()
}

fn context() -> ApssContext {
    ApssContext::new(Arc::new(CountingSink::new()))
}

fn bench_single_threaded(c: &mut Criterion) {
    let mut group = c.benchmark_group("apss/single");
    group.sample_size(10);

    for count in [500u32, 2000] {
        let vectors = generate_vectors(count, 5000, 7);
        group.throughput(Throughput::Elements(count as u64 * count as u64));

        group.bench_with_input(BenchmarkId::new("naive", count), &vectors, |b, vectors| {
            b.iter(|| {
                let a = MemorySource::from(vectors.clone());
                let mut engine = NaiveApss::new(a.clone(), a, context()).unwrap();
                engine.execute().unwrap();
                black_box(engine.stats().productions())
            })
        });

        group.bench_with_input(BenchmarkId::new("inverted", count), &vectors, |b, vectors| {
            b.iter(|| {
                let a = MemorySource::from(vectors.clone());
                let mut engine = InvertedApss::new(a.clone(), a, context()).unwrap();
                engine.execute().unwrap();
                black_box(engine.stats().productions())
            })
        });
    }

    group.finish();
}

fn bench_threaded(c: &mut Criterion) {
    let vectors = generate_vectors(4000, 5000, 11);
    let mut group = c.benchmark_group("apss/threaded");
    group.sample_size(10);
    group.throughput(Throughput::Elements(4000 * 4000));

    for threads in [1, 2, 4, num_cpus::get() + 1] {
        group.bench_with_input(BenchmarkId::new("inverted", threads), &threads, |b, &threads| {
            b.iter(|| {
                let a = MemorySource::from(vectors.clone());
                let mut engine = ThreadedApss::new(a.clone(), a, context())
                    .unwrap()
                    .with_inner(InnerEngine::Inverted)
                    .with_num_threads(threads)
                    .with_max_chunk_size(500);
                engine.execute().unwrap();
                black_box(engine.stats().productions())
            })
        });
    }

    group.finish();
}

fn bench_measures(c: &mut Criterion) {
    let vectors = generate_vectors(1000, 2000, 3);
    let mut group = c.benchmark_group("apss/measures");
    group.sample_size(10);

    for name in ["jaccard", "cosine", "lin", "weeds", "lp", "jensen-shannon", "kl", "lambda"] {
        let proximity = measure::by_name(name).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| {
                let a = MemorySource::from(vectors.clone());
                let ctx = context().with_measure(proximity.clone());
                let mut engine = InvertedApss::new(a.clone(), a, ctx).unwrap();
                engine.execute().unwrap();
                black_box(engine.stats().comparisons())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_threaded, bench_threaded, bench_measures);
criterion_main!(benches);
