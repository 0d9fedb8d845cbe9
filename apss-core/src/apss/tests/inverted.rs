use std::sync::Arc;

use super::*;
use crate::apss::{ApssContext, ApssTask, FeatureIndex, InvertedApss, NaiveApss};
use crate::filter;
use crate::measure::{self, Proximity};
use crate::sink::CountingSink;
use crate::structures::TokenPair;

/// Run naive and inverted with the same settings, returning both outputs.
///
/// Only pairs with positive similarity are kept: the naive engine also emits
/// pairs without shared features, which the inverted engine never visits.
fn naive_and_inverted(
    records: &[IndexedVector],
    proximity: Proximity,
) -> (Vec<WeightedPair>, Vec<WeightedPair>) {
    let positive = filter::min_similarity(f64::MIN_POSITIVE);

    let (a, b) = sources(records);
    let naive_sink = memory_sink();
    let ctx = ApssContext::new(naive_sink.clone())
        .with_measure(proximity.clone())
        .with_pair_filter(positive.clone());
    NaiveApss::new(a, b, ctx).unwrap().execute().unwrap();

    let (a, b) = sources(records);
    let inverted_sink = memory_sink();
    let ctx = ApssContext::new(inverted_sink.clone())
        .with_measure(proximity)
        .with_pair_filter(positive);
    InvertedApss::new(a, b, ctx).unwrap().execute().unwrap();

    (sorted_pairs(&naive_sink), sorted_pairs(&inverted_sink))
}

#[test]
fn test_jaccard_single_pair() {
    let sink = memory_sink();
    let mut engine = InvertedApss::new(
        MemorySource::from(vec![a1()]),
        MemorySource::from(vec![b1()]),
        ApssContext::new(sink.clone()),
    )
    .unwrap();
    engine.execute().unwrap();

    let pairs = sink.snapshot();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].record, TokenPair::new(1, 0));
    assert!((pairs[0].weight - 0.25).abs() < 1e-12);
}

#[test]
fn test_matches_naive() {
    let records = corpus(40, 25, 42);
    for name in ["jaccard", "cosine", "lin", "recall", "weeds", "dice"] {
        let proximity = measure::by_name(name).unwrap();
        let (naive, inverted) = naive_and_inverted(&records, proximity);
        assert!(!naive.is_empty());
        assert_eq!(naive, inverted, "measure {}", name);
    }
}

#[test]
fn test_candidates_limited_to_shared_features() {
    let records = corpus(30, 40, 5);
    let (a, b) = sources(&records);
    let mut engine = InvertedApss::new(a, b, ApssContext::new(memory_sink())).unwrap();
    engine.execute().unwrap();

    let sharing = records
        .iter()
        .flat_map(|x| records.iter().map(move |y| (x, y)))
        .filter(|(x, y)| x.value().shared_entries(y.value()).next().is_some())
        .count() as u64;
    let stats = engine.stats().snapshot();
    assert_eq!(stats.candidates, sharing);
    assert_eq!(stats.comparisons, sharing);
    assert!(stats.candidates < 30 * 30);
    // Index build reads A once, the run reads B once
    assert_eq!(stats.source_reads, 60);
}

#[test]
fn test_supplied_index_skips_source_a() {
    let records = vec![a1(), b1()];
    let index = Arc::new(FeatureIndex::from_vectors(records.clone()).unwrap());
    let (a, b) = sources(&records);

    let sink = memory_sink();
    let mut engine = InvertedApss::new(a, b, ApssContext::new(sink.clone()))
        .unwrap()
        .with_index(Arc::clone(&index));
    engine.execute().unwrap();

    assert_eq!(engine.stats().source_reads(), 2);
    assert_eq!(sink.len(), 4);
    // A supplied index outlives the run
    assert!(engine.index().is_some());
}

#[test]
fn test_built_index_dropped_on_finalise() {
    let (a, b) = sources(&[a1(), b1()]);
    let mut engine = InvertedApss::new(a, b, ApssContext::new(memory_sink())).unwrap();
    engine.initialise().unwrap();
    assert_eq!(engine.index().map(|i| i.len()), Some(2));
    engine.run().unwrap();
    engine.finalise().unwrap();
    assert!(engine.index().is_none());
}

#[test]
fn test_empty_sources() {
    let mut engine = InvertedApss::new(
        MemorySource::from(Vec::<IndexedVector>::new()),
        MemorySource::from(vec![b1()]),
        ApssContext::new(memory_sink()),
    )
    .unwrap();
    assert!(matches!(engine.execute(), Err(Error::SourceExhausted(_))));

    let mut engine = InvertedApss::new(
        MemorySource::from(vec![a1()]),
        MemorySource::from(Vec::<IndexedVector>::new()),
        ApssContext::new(memory_sink()),
    )
    .unwrap();
    assert!(matches!(engine.execute(), Err(Error::SourceExhausted(_))));
}

#[test]
fn test_record_filter_applies_to_candidates() {
    let mut single = SparseVector::new(5);
    single.set(1, 1.0);
    let records = vec![a1(), b1(), Indexed::new(2, single)];
    let (a, b) = sources(&records);

    let sink = memory_sink();
    let ctx = ApssContext::new(sink.clone()).with_record_filter(filter::min_entries(2));
    let mut engine = InvertedApss::new(a, b, ctx).unwrap();
    engine.execute().unwrap();

    // Record 2 shares feature 1 with everything but never passes the filter
    assert_eq!(engine.stats().candidates(), 4);
    assert_eq!(sink.len(), 4);
}

#[test]
fn test_run_flushes_sink() {
    let sink = Arc::new(CountingSink::new());
    let (a, b) = sources(&[a1(), b1()]);
    let mut engine = InvertedApss::new(a, b, ApssContext::new(sink.clone())).unwrap();
    engine.execute().unwrap();

    assert_eq!(sink.records(), 4);
    assert!(sink.flushes() > 0);
}

#[test]
fn test_flush_failure_fails_run() {
    let (a, b) = sources(&[a1(), b1()]);
    let mut engine =
        InvertedApss::new(a, b, ApssContext::new(Arc::new(UnflushableSink))).unwrap();
    assert!(matches!(engine.execute(), Err(Error::Io(_))));
}
