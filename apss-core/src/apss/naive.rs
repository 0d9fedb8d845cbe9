//! Baseline engine comparing every vector of A against every vector of B

use std::sync::Arc;

use log::debug;

use super::{
    ApssContext, ApssTask, LoopCounts, PairBuffer, precalculate, read_counted, score_pair,
};
use crate::error::{Error, Result};
use crate::measure::PairScorer;
use crate::progress::Progress;
use crate::source::{SeekableSource, ensure_distinct};
use crate::stats::ApssStats;
use crate::structures::IndexedVector;

/// Quadratic all-pairs engine.
///
/// B is rewound once for every record of A that passes the record filter, so
/// B must be cheap to replay.
pub struct NaiveApss<A, B> {
    name: String,
    source_a: A,
    source_b: B,
    ctx: ApssContext,
    progress: Progress,
    scorer: Option<Box<dyn PairScorer>>,
}

impl<A, B> NaiveApss<A, B>
where
    A: SeekableSource<Item = IndexedVector>,
    B: SeekableSource<Item = IndexedVector>,
{
    /// Fails with `Error::Config` if both sources read through one cursor
    pub fn new(source_a: A, source_b: B, ctx: ApssContext) -> Result<Self> {
        ensure_distinct(&source_a, &source_b)?;
        Ok(Self {
            name: "NaiveApss".to_string(),
            source_a,
            source_b,
            ctx,
            progress: Progress::new("NaiveApss"),
            scorer: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn context(&self) -> &ApssContext {
        &self.ctx
    }
}

impl<A, B> ApssTask for NaiveApss<A, B>
where
    A: SeekableSource<Item = IndexedVector>,
    B: SeekableSource<Item = IndexedVector>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self) -> Result<()> {
        if !self.source_a.has_next()? {
            return Err(Error::SourceExhausted("sourceA is empty"));
        }
        if !self.source_b.has_next()? {
            return Err(Error::SourceExhausted("sourceB is empty"));
        }

        let (source_a, source_b) = (&mut self.source_a, &mut self.source_b);
        let scorer = self.ctx.scorer(
            |m| precalculate(source_a, |v| m.left(v.value())),
            |m| precalculate(source_b, |v| m.right(v.value())),
        )?;
        self.scorer = Some(scorer);
        self.progress.set_percent(0.0);
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let Self {
            name,
            source_a,
            source_b,
            ctx,
            progress,
            scorer,
        } = self;
        let scorer = scorer
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{} run before initialise", name)))?;
        let stats: &ApssStats = &ctx.stats;
        let mut buffer = PairBuffer::new(Arc::clone(&ctx.sink), ctx.output_buffer_size);

        let mut counts = LoopCounts::default();
        let start_b = source_b.position()?;
        while source_a.has_next()? {
            let a = read_counted(source_a, stats)?;
            if !(ctx.record_filter)(&a) {
                continue;
            }

            source_b.seek(&start_b)?;
            while source_b.has_next()? {
                let b = read_counted(source_b, stats)?;
                counts.candidates += 1;
                if !(ctx.record_filter)(&b) {
                    continue;
                }

                let pair = score_pair(scorer, &a, &b);
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

        debug!("[naive] {} done: {}", name, stats);
        progress.set_percent(100.0);
        Ok(())
    }

    fn finalise(&mut self) -> Result<()> {
        self.scorer = None;
        Ok(())
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn stats(&self) -> &Arc<ApssStats> {
        &self.ctx.stats
    }
}
