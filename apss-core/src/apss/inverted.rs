//! Engine that only compares pairs sharing at least one feature

use std::sync::Arc;

use log::debug;
use rustc_hash::FxHashMap;

use super::{
    ApssContext, ApssTask, LoopCounts, PairBuffer, precalculate, read_counted, score_pair,
};
use crate::TokenId;
use crate::error::{Error, Result};
use crate::measure::PairScorer;
use crate::progress::Progress;
use crate::source::{SeekableSource, ensure_distinct};
use crate::stats::ApssStats;
use crate::structures::{IndexedVector, SparseVector};

/// Immutable feature -> vector index over one side of a comparison.
///
/// Vectors live in an arena; each posting list holds arena offsets in
/// insertion order. Once built the index is only read, so one instance can
/// be shared by every task comparing against the same A chunk.
#[derive(Debug, Default)]
pub struct FeatureIndex {
    vectors: Vec<IndexedVector>,
    postings: FxHashMap<TokenId, Vec<u32>>,
}

impl FeatureIndex {
    /// Largest number of vectors one index can hold
    pub const MAX_VECTORS: usize = u32::MAX as usize;

    /// Index `vectors` in order. Fails with `Error::Config` beyond
    /// `MAX_VECTORS`, since posting lists hold `u32` offsets.
    pub fn from_vectors(vectors: impl IntoIterator<Item = IndexedVector>) -> Result<Self> {
        let vectors: Vec<IndexedVector> = vectors.into_iter().collect();
        if vectors.len() > Self::MAX_VECTORS {
            return Err(Error::Config(format!(
                "feature index limited to {} vectors, got {}",
                Self::MAX_VECTORS,
                vectors.len()
            )));
        }
        let mut postings: FxHashMap<TokenId, Vec<u32>> = FxHashMap::default();
        for (offset, v) in vectors.iter().enumerate() {
            for &key in v.value().keys() {
                postings.entry(key).or_default().push(offset as u32);
            }
        }
        Ok(Self { vectors, postings })
    }

    /// Index every record of `source`, restoring its position afterwards
    pub fn build<S>(source: &mut S, stats: &ApssStats) -> Result<Self>
    where
        S: SeekableSource<Item = IndexedVector> + ?Sized,
    {
        let start = source.position()?;
        let mut vectors = Vec::new();
        while source.has_next()? {
            vectors.push(source.read()?);
        }
        source.seek(&start)?;
        stats.add_source_reads(vectors.len() as u64);
        let index = Self::from_vectors(vectors)?;
        debug!(
            "[inverted] indexed {} vectors over {} features",
            index.len(),
            index.num_features()
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Number of distinct feature keys with a posting list
    pub fn num_features(&self) -> usize {
        self.postings.len()
    }

    pub fn vectors(&self) -> &[IndexedVector] {
        &self.vectors
    }

    pub fn get(&self, offset: u32) -> Option<&IndexedVector> {
        self.vectors.get(offset as usize)
    }

    pub fn postings(&self, key: TokenId) -> &[u32] {
        self.postings.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Offsets of every indexed vector sharing a key with `v`, ascending and
    /// without duplicates
    pub fn find_candidates(&self, v: &SparseVector) -> Vec<u32> {
        let mut candidates: Vec<u32> = v
            .keys()
            .iter()
            .flat_map(|&key| self.postings(key).iter().copied())
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }
}

/// Inverted-index engine.
///
/// Iterates B once; for each `b` only the vectors of A sharing a feature with
/// it are compared. The index over A is built on `initialise` unless one was
/// supplied with `with_index`.
pub struct InvertedApss<A, B> {
    name: String,
    source_a: A,
    source_b: B,
    ctx: ApssContext,
    progress: Progress,
    index: Option<Arc<FeatureIndex>>,
    index_supplied: bool,
    scorer: Option<Box<dyn PairScorer>>,
}

impl<A, B> InvertedApss<A, B>
where
    A: SeekableSource<Item = IndexedVector>,
    B: SeekableSource<Item = IndexedVector>,
{
    /// Fails with `Error::Config` if both sources read through one cursor
    pub fn new(source_a: A, source_b: B, ctx: ApssContext) -> Result<Self> {
        ensure_distinct(&source_a, &source_b)?;
        Ok(Self {
            name: "InvertedApss".to_string(),
            source_a,
            source_b,
            ctx,
            progress: Progress::new("InvertedApss"),
            index: None,
            index_supplied: false,
            scorer: None,
        })
    }

    /// Use a prebuilt index of A instead of scanning `source_a`
    pub fn with_index(mut self, index: Arc<FeatureIndex>) -> Self {
        self.index = Some(index);
        self.index_supplied = true;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn index(&self) -> Option<&Arc<FeatureIndex>> {
        self.index.as_ref()
    }

    pub fn context(&self) -> &ApssContext {
        &self.ctx
    }
}

impl<A, B> ApssTask for InvertedApss<A, B>
where
    A: SeekableSource<Item = IndexedVector>,
    B: SeekableSource<Item = IndexedVector>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self) -> Result<()> {
        let a_empty = match &self.index {
            Some(index) => index.is_empty(),
            None => !self.source_a.has_next()?,
        };
        if a_empty {
            return Err(Error::SourceExhausted("sourceA is empty"));
        }
        if !self.source_b.has_next()? {
            return Err(Error::SourceExhausted("sourceB is empty"));
        }

        if self.index.is_none() {
            let index = FeatureIndex::build(&mut self.source_a, &self.ctx.stats)?;
            self.index = Some(Arc::new(index));
        }

        let index = self.index.as_deref();
        let source_b = &mut self.source_b;
        let scorer = self.ctx.scorer(
            |m| {
                Ok(index
                    .map(|index| {
                        index
                            .vectors()
                            .iter()
                            .map(|v| (v.key(), m.left(v.value())))
                            .collect::<FxHashMap<TokenId, f64>>()
                    })
                    .unwrap_or_default())
            },
            |m| precalculate(source_b, |v| m.right(v.value())),
        )?;
        self.scorer = Some(scorer);
        self.progress.set_percent(0.0);
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let Self {
            name,
            source_b,
            ctx,
            progress,
            index,
            scorer,
            ..
        } = self;
        let (index, scorer) = match (index.as_deref(), scorer.as_deref()) {
            (Some(index), Some(scorer)) => (index, scorer),
            _ => {
                return Err(Error::Config(format!("{} run before initialise", name)));
            }
        };
        let stats: &ApssStats = &ctx.stats;
        let mut buffer = PairBuffer::new(Arc::clone(&ctx.sink), ctx.output_buffer_size);

        let mut counts = LoopCounts::default();
        let start_b = source_b.position()?;
        while source_b.has_next()? {
            let b = read_counted(source_b, stats)?;
            if !(ctx.record_filter)(&b) {
                continue;
            }

            for offset in index.find_candidates(b.value()) {
                let a = &index.vectors()[offset as usize];
                if !(ctx.record_filter)(a) {
                    continue;
                }
                counts.candidates += 1;

                let pair = score_pair(scorer, a, &b);
                counts.comparisons += 1;
                if (ctx.pair_filter)(&pair) {
                    counts.productions += 1;
                    buffer.push(pair)?;
                }
            }
            counts.publish(stats);
        }
        buffer.finish()?;
        source_b.seek(&start_b)?;

        debug!("[inverted] {} done: {}", name, stats);
        progress.set_percent(100.0);
        Ok(())
    }

    fn finalise(&mut self) -> Result<()> {
        self.scorer = None;
        if !self.index_supplied {
            self.index = None;
        }
        Ok(())
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn stats(&self) -> &Arc<ApssStats> {
        &self.ctx.stats
    }
}
