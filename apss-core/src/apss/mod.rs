//! All-pairs similarity search engines
//!
//! Three engines share one contract: compare every vector of source A against
//! every vector of source B, score each pair with a measure, and write pairs
//! that pass the pair filter to a sink.
//!
//! - `NaiveApss`: full Cartesian product
//! - `InvertedApss`: only pairs sharing at least one feature, found through a
//!   feature index over A
//! - `ThreadedApss`: partitions both sources into chunks and runs one inner
//!   engine per chunk pair on a bounded worker pool
//!
//! Emitted pairs are `(b.key, a.key)` weighted by `similarity(a, b)`.

mod inverted;
mod naive;
mod threaded;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use log::{debug, info, warn};
use rustc_hash::FxHashMap;

use crate::TokenId;
use crate::error::Result;
use crate::filter::{self, PairFilter, RecordFilter};
use crate::measure::{DecomposableMeasure, DecomposedScorer, DirectScorer, PairScorer, Proximity};
use crate::progress::{Progress, TaskState};
use crate::sink::ObjectSink;
use crate::source::SeekableSource;
use crate::stats::ApssStats;
use crate::structures::{IndexedVector, TokenPair, Weighted, WeightedPair};

pub use inverted::{FeatureIndex, InvertedApss};
pub use naive::NaiveApss;
pub use threaded::{DEFAULT_MAX_CHUNK_SIZE, InnerEngine, ThreadedApss, chunk_size};

/// Pairs held before a batch is sorted and written
pub const DEFAULT_OUTPUT_BUFFER_SIZE: usize = 100_000;

/// A unit of work with a three-phase lifecycle
pub trait ApssTask {
    fn name(&self) -> &str;

    /// Validate inputs and build per-run state
    fn initialise(&mut self) -> Result<()>;

    fn run(&mut self) -> Result<()>;

    /// Release per-run state
    fn finalise(&mut self) -> Result<()>;

    fn progress(&self) -> &Progress;

    fn stats(&self) -> &Arc<ApssStats>;

    /// Drive `initialise`, `run` and `finalise`, recording the outcome in
    /// `progress`. `finalise` runs even if an earlier phase failed; the first
    /// error wins.
    fn execute(&mut self) -> Result<()> {
        self.progress().set_state(TaskState::Running);
        debug!("[apss] {} initialising", self.name());

        let mut result = self.initialise();
        if result.is_ok() {
            debug!("[apss] {} running", self.name());
            result = self.run();
        }
        let finalised = self.finalise();
        if result.is_ok() {
            result = finalised;
        } else if let Err(e) = finalised {
            warn!("[apss] {} finalise failed after error: {}", self.name(), e);
        }

        match &result {
            Ok(()) => {
                self.progress().set_state(TaskState::Completed);
                debug!("[apss] {} completed: {}", self.name(), self.stats());
            }
            Err(e) => {
                self.progress().set_message(e.to_string());
                self.progress().set_state(TaskState::Failed);
                info!("[apss] {} failed: {}", self.name(), e);
            }
        }
        result
    }
}

/// Everything an engine shares with the other engines of a run
#[derive(Clone)]
pub struct ApssContext {
    pub proximity: Proximity,
    pub record_filter: RecordFilter,
    pub pair_filter: PairFilter,
    pub sink: Arc<dyn ObjectSink<WeightedPair>>,
    pub stats: Arc<ApssStats>,
    pub output_buffer_size: usize,
}

impl ApssContext {
    /// Context with the default measure (Jaccard), accept-all filters and
    /// fresh statistics
    pub fn new(sink: Arc<dyn ObjectSink<WeightedPair>>) -> Self {
        Self {
            proximity: Proximity::default(),
            record_filter: filter::accept_all(),
            pair_filter: filter::accept_all(),
            sink,
            stats: Arc::new(ApssStats::new()),
            output_buffer_size: DEFAULT_OUTPUT_BUFFER_SIZE,
        }
    }

    pub fn with_measure(mut self, proximity: Proximity) -> Self {
        self.proximity = proximity;
        self
    }

    pub fn with_record_filter(mut self, record_filter: RecordFilter) -> Self {
        self.record_filter = record_filter;
        self
    }

    pub fn with_pair_filter(mut self, pair_filter: PairFilter) -> Self {
        self.pair_filter = pair_filter;
        self
    }

    /// Share `stats` with other runs instead of counting separately
    pub fn with_stats(mut self, stats: Arc<ApssStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_output_buffer_size(mut self, output_buffer_size: usize) -> Self {
        self.output_buffer_size = output_buffer_size;
        self
    }

    /// Resolve the measure into a scorer, precomputing per-vector terms with
    /// `left` (A side) and `right` (B side) when the measure decomposes
    pub(crate) fn scorer<L, R>(&self, left: L, right: R) -> Result<Box<dyn PairScorer>>
    where
        L: FnOnce(&dyn DecomposableMeasure) -> Result<FxHashMap<TokenId, f64>>,
        R: FnOnce(&dyn DecomposableMeasure) -> Result<FxHashMap<TokenId, f64>>,
    {
        let scorer: Box<dyn PairScorer> = match &self.proximity {
            Proximity::Direct(m) => Box::new(DirectScorer::new(Arc::clone(m))),
            Proximity::Decomposable(m) => {
                let l = left(m.as_ref())?;
                let r = right(m.as_ref())?;
                debug!(
                    "[apss] precalculated {} left and {} right terms",
                    l.len(),
                    r.len()
                );
                Box::new(DecomposedScorer::new(Arc::clone(m), l, r))
            }
        };
        Ok(scorer)
    }
}

/// Read one record, counting it in the shared statistics
#[inline]
pub(crate) fn read_counted<S>(source: &mut S, stats: &ApssStats) -> Result<IndexedVector>
where
    S: SeekableSource<Item = IndexedVector> + ?Sized,
{
    let record = source.read()?;
    stats.increment_source_reads();
    Ok(record)
}

/// Score one pair, emitting it as `(b.key, a.key)`
#[inline]
pub(crate) fn score_pair(
    scorer: &dyn PairScorer,
    a: &IndexedVector,
    b: &IndexedVector,
) -> WeightedPair {
    let similarity = scorer.score(a, b);
    Weighted::new(TokenPair::new(b.key(), a.key()), similarity)
}

/// Counts gathered over one inner loop, published to the shared statistics
/// in one step
#[derive(Debug, Default)]
pub(crate) struct LoopCounts {
    pub candidates: u64,
    pub comparisons: u64,
    pub productions: u64,
}

impl LoopCounts {
    pub(crate) fn publish(&mut self, stats: &ApssStats) {
        let counts = std::mem::take(self);
        stats.add_candidates(counts.candidates);
        stats.add_comparisons(counts.comparisons);
        stats.add_productions(counts.productions);
    }
}

/// Scan `source` once, mapping each vector id to `term(vector)`, then restore
/// the source to where it was
pub(crate) fn precalculate<S, F>(source: &mut S, term: F) -> Result<FxHashMap<TokenId, f64>>
where
    S: SeekableSource<Item = IndexedVector> + ?Sized,
    F: Fn(&IndexedVector) -> f64,
{
    let start = source.position()?;
    let mut terms = FxHashMap::default();
    while source.has_next()? {
        let v = source.read()?;
        terms.insert(v.key(), term(&v));
    }
    source.seek(&start)?;
    Ok(terms)
}

/// Buffers accepted pairs, writing them to the sink in index-ordered batches
pub(crate) struct PairBuffer {
    sink: Arc<dyn ObjectSink<WeightedPair>>,
    pairs: Vec<WeightedPair>,
    limit: usize,
}

impl PairBuffer {
    pub(crate) fn new(sink: Arc<dyn ObjectSink<WeightedPair>>, limit: usize) -> Self {
        Self {
            sink,
            pairs: Vec::new(),
            limit,
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, pair: WeightedPair) -> Result<()> {
        self.pairs.push(pair);
        if self.pairs.len() > self.limit {
            self.flush()?;
        }
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.pairs.is_empty() {
            return Ok(());
        }
        self.pairs.sort_by(Weighted::record_order);
        let batch = std::mem::take(&mut self.pairs);
        debug!("[apss] flushing {} pairs", batch.len());
        self.sink.write_batch(batch)
    }

    /// Write the remaining pairs and flush the sink itself
    pub(crate) fn finish(&mut self) -> Result<()> {
        self.flush()?;
        self.sink.flush()
    }
}
