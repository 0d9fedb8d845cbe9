//! Property-based tests comparing the parallel engine against the naive one.

use std::sync::Arc;

use apss_core::filter;
use apss_core::{
    ApssContext, ApssTask, Indexed, IndexedVector, InnerEngine, MemorySink, MemorySource,
    NaiveApss, SparseVector, ThreadedApss, Weighted, WeightedPair,
};
use proptest::prelude::*;

fn arb_corpus() -> impl Strategy<Value = Vec<IndexedVector>> {
    proptest::collection::vec(
        proptest::collection::btree_map(0u32..16, 1u32..5, 1..6),
        1..14,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, row)| {
                let mut v = SparseVector::new(16);
                for (k, x) in row {
                    v.set(k, f64::from(x));
                }
                Indexed::new(i as u32, v)
            })
            .collect()
    })
}

fn run(task: &mut dyn ApssTask, sink: &MemorySink<WeightedPair>) -> Vec<WeightedPair> {
    task.execute().unwrap();
    let mut pairs = sink.take();
    pairs.sort_by(Weighted::record_order);
    pairs
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        ..ProptestConfig::default()
    })]

    /// Chunked parallel search finds the same positive pairs as the naive scan.
    #[test]
    fn threaded_inverted_matches_naive(
        records in arb_corpus(),
        threads in 1usize..4,
        chunk in 1usize..6,
    ) {
        let positive = filter::min_similarity(f64::MIN_POSITIVE);

        let source = MemorySource::from(records.clone());
        let sink: Arc<MemorySink<WeightedPair>> = Arc::new(MemorySink::new());
        let ctx = ApssContext::new(sink.clone()).with_pair_filter(positive.clone());
        let mut naive = NaiveApss::new(source.clone(), source, ctx).unwrap();
        let expected = run(&mut naive, &sink);

        let source = MemorySource::from(records);
        let sink: Arc<MemorySink<WeightedPair>> = Arc::new(MemorySink::new());
        let ctx = ApssContext::new(sink.clone()).with_pair_filter(positive);
        let mut threaded = ThreadedApss::new(source.clone(), source, ctx)
            .unwrap()
            .with_inner(InnerEngine::Inverted)
            .with_num_threads(threads)
            .with_max_chunk_size(chunk);
        let actual = run(&mut threaded, &sink);

        prop_assert_eq!(actual, expected);
    }

    /// Every record shares all its features with itself.
    #[test]
    fn self_pairs_always_found(records in arb_corpus()) {
        let n = records.len();
        let source = MemorySource::from(records);
        let sink: Arc<MemorySink<WeightedPair>> = Arc::new(MemorySink::new());
        let ctx = ApssContext::new(sink.clone())
            .with_pair_filter(filter::min_similarity(f64::MIN_POSITIVE));
        let mut threaded = ThreadedApss::new(source.clone(), source, ctx)
            .unwrap()
            .with_num_threads(2)
            .with_max_chunk_size(3);
        let pairs = run(&mut threaded, &sink);

        let identities: Vec<_> = pairs.iter().filter(|p| p.record.is_identity()).collect();
        prop_assert_eq!(identities.len(), n);
        prop_assert!(identities.iter().all(|p| (p.weight - 1.0).abs() < 1e-12));
    }
}
