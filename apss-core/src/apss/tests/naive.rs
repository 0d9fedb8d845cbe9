use std::sync::Arc;

use super::*;
use crate::apss::{ApssContext, ApssTask, NaiveApss};
use crate::filter;
use crate::measure::{Jaccard, Proximity};
use crate::progress::TaskState;
use crate::sink::CountingSink;
use crate::source::SharedSource;
use crate::structures::TokenPair;

#[test]
fn test_jaccard_single_pair() {
    let sink = memory_sink();
    let mut engine = NaiveApss::new(
        MemorySource::from(vec![a1()]),
        MemorySource::from(vec![b1()]),
        ApssContext::new(sink.clone()),
    )
    .unwrap();
    engine.execute().unwrap();

    let pairs = sink.snapshot();
    assert_eq!(pairs.len(), 1);
    // Emitted as (b.key, a.key)
    assert_eq!(pairs[0].record, TokenPair::new(1, 0));
    assert!((pairs[0].weight - 0.25).abs() < 1e-12);
}

#[test]
fn test_same_corpus_twice() {
    let sink = memory_sink();
    let (a, b) = sources(&[a1(), b1()]);
    let mut engine = NaiveApss::new(a, b, ApssContext::new(sink.clone())).unwrap();
    engine.execute().unwrap();

    let pairs = sorted_pairs(&sink);
    let records: Vec<TokenPair> = pairs.iter().map(|p| p.record).collect();
    assert_eq!(
        records,
        vec![
            TokenPair::new(0, 0),
            TokenPair::new(0, 1),
            TokenPair::new(1, 0),
            TokenPair::new(1, 1),
        ]
    );
    assert_eq!(pairs[0].weight, 1.0);
    assert!((pairs[1].weight - 0.25).abs() < 1e-12);
    assert!((pairs[2].weight - 0.25).abs() < 1e-12);
    assert_eq!(pairs[3].weight, 1.0);

    let stats = engine.stats().snapshot();
    assert_eq!(stats.candidates, 4);
    assert_eq!(stats.comparisons, 4);
    assert_eq!(stats.productions, 4);
    // 2 reads of A plus B replayed once per record of A
    assert_eq!(stats.source_reads, 2 + 2 * 2);
}

#[test]
fn test_empty_source_a_fails_initialise() {
    let sink = memory_sink();
    let mut engine = NaiveApss::new(
        MemorySource::from(Vec::<IndexedVector>::new()),
        MemorySource::from(vec![b1()]),
        ApssContext::new(sink.clone()),
    )
    .unwrap();

    let err = engine.execute().unwrap_err();
    assert!(matches!(err, Error::SourceExhausted(_)));
    assert_eq!(engine.progress().state(), TaskState::Failed);
    assert_eq!(engine.stats().candidates(), 0);
    assert!(sink.is_empty());
}

#[test]
fn test_empty_source_b_fails_initialise() {
    let mut engine = NaiveApss::new(
        MemorySource::from(vec![a1()]),
        MemorySource::from(Vec::<IndexedVector>::new()),
        ApssContext::new(memory_sink()),
    )
    .unwrap();
    assert!(matches!(engine.initialise(), Err(Error::SourceExhausted(_))));
}

#[test]
fn test_reject_all_pairs() {
    let records = corpus(12, 20, 7);
    let (a, b) = sources(&records);
    let sink = Arc::new(CountingSink::new());
    let ctx = ApssContext::new(sink.clone()).with_pair_filter(filter::reject_all());
    let mut engine = NaiveApss::new(a, b, ctx).unwrap();
    engine.execute().unwrap();

    assert_eq!(sink.records(), 0);
    assert_eq!(sink.batches(), 0);
    let stats = engine.stats().snapshot();
    assert_eq!(stats.candidates, 144);
    assert_eq!(stats.comparisons, 144);
    assert_eq!(stats.productions, 0);
}

#[test]
fn test_shared_cursor_rejected() {
    let a = SharedSource::new(MemorySource::from(vec![a1(), b1()]));
    let b = a.clone();
    let result = NaiveApss::new(a, b, ApssContext::new(memory_sink()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_record_filter() {
    // Vectors with fewer than two features are skipped on both sides
    let mut single = SparseVector::new(5);
    single.set(4, 1.0);
    let records = vec![a1(), b1(), Indexed::new(2, single)];
    let (a, b) = sources(&records);

    let sink = memory_sink();
    let ctx = ApssContext::new(sink.clone()).with_record_filter(filter::min_entries(2));
    let mut engine = NaiveApss::new(a, b, ctx).unwrap();
    engine.execute().unwrap();

    let stats = engine.stats().snapshot();
    // Two records of A pass; each sees all three records of B
    assert_eq!(stats.candidates, 6);
    assert_eq!(stats.comparisons, 4);
    assert_eq!(sink.len(), 4);
    assert!(sink.snapshot().iter().all(|p| p.record.id1 != 2 && p.record.id2 != 2));
}

#[test]
fn test_pair_filter_thresholds() {
    let (a, b) = sources(&[a1(), b1()]);
    let sink = memory_sink();
    let ctx = ApssContext::new(sink.clone()).with_pair_filter(filter::all_of(vec![
        filter::min_similarity(0.1),
        filter::exclude_identity(),
    ]));
    let mut engine = NaiveApss::new(a, b, ctx).unwrap();
    engine.execute().unwrap();

    let records: Vec<TokenPair> = sorted_pairs(&sink).iter().map(|p| p.record).collect();
    assert_eq!(records, vec![TokenPair::new(0, 1), TokenPair::new(1, 0)]);
    assert_eq!(engine.stats().productions(), 2);
}

#[test]
fn test_batches_sorted_and_bounded() {
    let records = corpus(6, 10, 3);
    let (a, b) = sources(&records);
    let sink = Arc::new(BatchSink::default());
    let ctx = ApssContext::new(sink.clone()).with_output_buffer_size(4);
    let mut engine = NaiveApss::new(a, b, ctx).unwrap();
    engine.execute().unwrap();

    let batches = sink.batches.lock();
    let total: usize = batches.iter().map(Vec::len).sum();
    assert_eq!(total, 36);
    for batch in batches.iter() {
        // Flushed as soon as the buffer exceeds its limit
        assert!(batch.len() <= 5);
        assert!(batch.windows(2).all(|w| w[0].record <= w[1].record));
    }
}

#[test]
fn test_direct_and_decomposed_agree() {
    let records = corpus(15, 12, 11);

    let run = |proximity: Proximity| {
        let (a, b) = sources(&records);
        let sink = memory_sink();
        let ctx = ApssContext::new(sink.clone()).with_measure(proximity);
        NaiveApss::new(a, b, ctx).unwrap().execute().unwrap();
        sorted_pairs(&sink)
    };

    let decomposed = run(Proximity::decomposable(Jaccard));
    let direct = run(Proximity::direct(Jaccard));
    assert_eq!(decomposed, direct);
}

#[test]
fn test_progress_completes() {
    let (a, b) = sources(&[a1(), b1()]);
    let mut engine = NaiveApss::new(a, b, ApssContext::new(memory_sink())).unwrap();
    assert_eq!(engine.progress().state(), TaskState::Pending);
    engine.execute().unwrap();
    assert_eq!(engine.progress().state(), TaskState::Completed);
    assert_eq!(engine.progress().percent(), 100.0);
}

#[test]
fn test_sink_failure_propagates() {
    let (a, b) = sources(&[a1(), b1()]);
    let mut engine = NaiveApss::new(a, b, ApssContext::new(Arc::new(FailingSink))).unwrap();
    assert!(matches!(engine.execute(), Err(Error::Io(_))));
    assert_eq!(engine.progress().state(), TaskState::Failed);
}

#[test]
fn test_run_flushes_sink() {
    let sink = Arc::new(CountingSink::new());
    let (a, b) = sources(&[a1(), b1()]);
    let mut engine = NaiveApss::new(a, b, ApssContext::new(sink.clone())).unwrap();
    engine.execute().unwrap();

    assert_eq!(sink.records(), 4);
    assert!(sink.flushes() > 0);
}

#[test]
fn test_flush_failure_fails_run() {
    let (a, b) = sources(&[a1(), b1()]);
    let mut engine = NaiveApss::new(a, b, ApssContext::new(Arc::new(UnflushableSink))).unwrap();
    assert!(matches!(engine.execute(), Err(Error::Io(_))));
    assert_eq!(engine.progress().state(), TaskState::Failed);
}
