//! Chunked parallel engine
//!
//! Both sources are cut into chunks; every `(A_i, B_j)` pair of chunks becomes
//! an inner engine task on a rayon pool. A bounded channel acts as a counting
//! permit so at most `num_threads + 1` tasks are in flight (one queued ahead
//! of every busy worker), which bounds the number of live chunks.
//!
//! The first task error stops enumeration; tasks not yet started are skipped
//! through a shared abort flag and the error is returned once every started
//! task has finished.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{ApssContext, ApssTask, FeatureIndex, InvertedApss, NaiveApss};
use crate::chunk::{Chunk, Chunker};
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::source::{SeekableSource, ensure_distinct};
use crate::stats::ApssStats;
use crate::structures::IndexedVector;

/// Upper bound on records per chunk
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4000;

/// Estimated bytes held per stored feature of a live chunk
const BYTES_PER_ENTRY: u64 = 12;

/// Each task holds two chunks
const PAIRING_OVERHEAD: u64 = 2;

/// Engine run for each chunk pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InnerEngine {
    Naive,
    #[default]
    Inverted,
}

/// Chunk size for `num_threads` workers.
///
/// Without a memory budget this is `max_chunk_size`. With one, the budget is
/// spread over the `num_threads + 1` tasks that may be live at once. Never
/// below 1.
pub fn chunk_size(num_threads: usize, max_chunk_size: usize, memory_budget: Option<u64>) -> usize {
    let size = match memory_budget {
        Some(budget) => {
            let live_units = num_threads as u64 + 1;
            let per_record = BYTES_PER_ENTRY * live_units * PAIRING_OVERHEAD;
            let fit = (budget / per_record).min(usize::MAX as u64) as usize;
            fit.min(max_chunk_size)
        }
        None => max_chunk_size,
    };
    size.max(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[derive(Debug, Default)]
struct Tally {
    queued: usize,
    completed: usize,
    /// Known once the first pass over B's chunks finishes
    chunks_b: Option<usize>,
}

/// Parallel engine fanning chunk pairs out to Naive or Inverted inner tasks
pub struct ThreadedApss<A, B> {
    name: String,
    source_a: Chunker<A>,
    source_b: Chunker<B>,
    ctx: ApssContext,
    progress: Progress,
    inner: InnerEngine,
    num_threads: usize,
    max_chunk_size: usize,
    memory_budget: Option<u64>,
    pool: Option<rayon::ThreadPool>,
    abort: Arc<AtomicBool>,
}

impl<A, B> ThreadedApss<A, B>
where
    A: SeekableSource<Item = IndexedVector>,
    B: SeekableSource<Item = IndexedVector>,
{
    /// Fails with `Error::Config` if both sources read through one cursor
    pub fn new(source_a: A, source_b: B, ctx: ApssContext) -> Result<Self> {
        ensure_distinct(&source_a, &source_b)?;
        Ok(Self {
            name: "ThreadedApss".to_string(),
            source_a: Chunker::new(source_a, DEFAULT_MAX_CHUNK_SIZE)?,
            source_b: Chunker::new(source_b, DEFAULT_MAX_CHUNK_SIZE)?,
            ctx,
            progress: Progress::new("ThreadedApss"),
            inner: InnerEngine::default(),
            num_threads: num_cpus::get() + 1,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            memory_budget: None,
            pool: None,
            abort: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_inner(mut self, inner: InnerEngine) -> Self {
        self.inner = inner;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    /// Shrink chunks so that live chunks fit in roughly `bytes`
    pub fn with_memory_budget(mut self, bytes: Option<u64>) -> Self {
        self.memory_budget = bytes;
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

    pub fn inner(&self) -> InnerEngine {
        self.inner
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn context(&self) -> &ApssContext {
        &self.ctx
    }

    /// Build the engine for one chunk pair
    fn inner_task(
        &self,
        chunk_a: &Chunk<IndexedVector>,
        chunk_b: &Chunk<IndexedVector>,
        index: Option<&Arc<FeatureIndex>>,
    ) -> Result<Box<dyn ApssTask + Send>> {
        let name = format!("{}[{}x{}]", self.name, chunk_a.name(), chunk_b.name());
        let progress = Progress::new(name.clone());
        let task: Box<dyn ApssTask + Send> = match (self.inner, index) {
            (InnerEngine::Inverted, Some(index)) => Box::new(
                InvertedApss::new(chunk_a.source(), chunk_b.source(), self.ctx.clone())?
                    .with_index(Arc::clone(index))
                    .with_name(name)
                    .with_progress(progress),
            ),
            (InnerEngine::Inverted, None) => Box::new(
                InvertedApss::new(chunk_a.source(), chunk_b.source(), self.ctx.clone())?
                    .with_name(name)
                    .with_progress(progress),
            ),
            (InnerEngine::Naive, _) => Box::new(
                NaiveApss::new(chunk_a.source(), chunk_b.source(), self.ctx.clone())?
                    .with_name(name)
                    .with_progress(progress),
            ),
        };
        Ok(task)
    }

    fn report(&self, tally: &Tally) {
        if let Some(chunks_b) = tally.chunks_b {
            let total = 2.0 * (chunks_b * chunks_b) as f64;
            if total > 0.0 {
                let done = (tally.completed + tally.queued) as f64;
                self.progress.set_percent(100.0 * done / total);
            }
        }
    }

    /// Collect finished results without blocking, failing on the first error
    fn poll(&self, results: &Receiver<Result<()>>, tally: &mut Tally) -> Result<()> {
        while let Ok(result) = results.try_recv() {
            tally.completed += 1;
            result?;
        }
        Ok(())
    }

    /// Enumerate every chunk pair and submit one task per pair
    fn submit_all(
        &mut self,
        pool: &rayon::ThreadPool,
        result_tx: &Sender<Result<()>>,
        result_rx: &Receiver<Result<()>>,
        tally: &mut Tally,
    ) -> Result<()> {
        let (permit_tx, permit_rx) = crossbeam_channel::bounded::<()>(self.num_threads + 1);

        let start_b = self.source_b.position()?;
        while self.source_a.has_next()? {
            let chunk_a = self.source_a.read()?;
            let index = match self.inner {
                InnerEngine::Inverted => Some(Arc::new(FeatureIndex::from_vectors(
                    chunk_a.records().iter().cloned(),
                )?)),
                InnerEngine::Naive => None,
            };

            self.source_b.seek(&start_b)?;
            let mut row = 0;
            while self.source_b.has_next()? {
                let chunk_b = self.source_b.read()?;
                row += 1;

                self.poll(result_rx, tally)?;

                // Blocks while num_threads + 1 tasks are in flight
                permit_tx
                    .send(())
                    .map_err(|e| Error::ThreadPool(e.to_string()))?;

                let mut task = match self.inner_task(&chunk_a, &chunk_b, index.as_ref()) {
                    Ok(task) => task,
                    Err(e) => {
                        let _ = permit_rx.recv();
                        return Err(e);
                    }
                };

                let permits = permit_rx.clone();
                let results = result_tx.clone();
                let abort = Arc::clone(&self.abort);
                pool.spawn(move || {
                    if abort.load(Ordering::SeqCst) {
                        let _ = permits.recv();
                        return;
                    }
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.execute()))
                        .unwrap_or_else(|payload| {
                            Err(Error::TaskPanicked(panic_message(payload.as_ref())))
                        });
                    let _ = permits.recv();
                    let _ = results.send(outcome);
                });

                tally.queued += 1;
                self.report(tally);
            }

            if tally.chunks_b.is_none() {
                debug!("[threaded] source B split into {} chunks", row);
                tally.chunks_b = Some(row);
            }
        }
        Ok(())
    }
}

impl<A, B> ApssTask for ThreadedApss<A, B>
where
    A: SeekableSource<Item = IndexedVector>,
    B: SeekableSource<Item = IndexedVector>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(Error::Config("num_threads must be at least 1".into()));
        }
        if self.max_chunk_size == 0 {
            return Err(Error::Config("max_chunk_size must be at least 1".into()));
        }
        if self.max_chunk_size > FeatureIndex::MAX_VECTORS {
            return Err(Error::Config(format!(
                "max_chunk_size must be at most {}",
                FeatureIndex::MAX_VECTORS
            )));
        }
        if !self.source_a.has_next()? {
            return Err(Error::SourceExhausted("sourceA is empty"));
        }
        if !self.source_b.has_next()? {
            return Err(Error::SourceExhausted("sourceB is empty"));
        }

        let size = chunk_size(self.num_threads, self.max_chunk_size, self.memory_budget);
        self.source_a.set_max_chunk_size(size)?;
        self.source_b.set_max_chunk_size(size)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(|i| format!("apss-worker-{}", i))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        self.pool = Some(pool);
        self.abort.store(false, Ordering::SeqCst);

        info!(
            "[threaded] {} threads, chunk size {}, inner engine {:?}, measure {}",
            self.num_threads,
            size,
            self.inner,
            self.ctx.proximity.name()
        );
        self.progress.set_percent(0.0);
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let pool = self
            .pool
            .take()
            .ok_or_else(|| Error::Config(format!("{} run before initialise", self.name)))?;

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<Result<()>>();
        let mut tally = Tally::default();

        let submitted = self.submit_all(&pool, &result_tx, &result_rx, &mut tally);
        drop(result_tx);

        let mut first_error = submitted.err();
        if first_error.is_some() {
            self.abort.store(true, Ordering::SeqCst);
        }

        // Drain: ends once every spawned task has dropped its sender
        for result in result_rx.iter() {
            tally.completed += 1;
            if let Err(e) = result {
                if first_error.is_none() {
                    self.abort.store(true, Ordering::SeqCst);
                    first_error = Some(e);
                } else {
                    debug!("[threaded] suppressed task error: {}", e);
                }
            }
            self.report(&tally);
        }
        self.pool = Some(pool);

        debug!(
            "[threaded] {} tasks queued, {} completed",
            tally.queued, tally.completed
        );
        match first_error {
            Some(e) => Err(e),
            None => self.ctx.sink.flush(),
        }
    }

    fn finalise(&mut self) -> Result<()> {
        self.pool = None;
        Ok(())
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn stats(&self) -> &Arc<ApssStats> {
        &self.ctx.stats
    }
}
