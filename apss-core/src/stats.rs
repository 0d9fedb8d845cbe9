//! Comparison counters shared by every engine of a run

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of `ApssStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
    /// Pairs considered for comparison
    pub candidates: u64,
    /// Similarity evaluations
    pub comparisons: u64,
    /// Pairs that passed the pair filter and were emitted
    pub productions: u64,
    /// Records read from the input sources
    pub source_reads: u64,
}

/// Thread-safe, monotonically increasing counters
#[derive(Debug, Default)]
pub struct ApssStats {
    candidates: AtomicU64,
    comparisons: AtomicU64,
    productions: AtomicU64,
    source_reads: AtomicU64,
}

impl ApssStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_candidates(&self, n: u64) {
        self.candidates.fetch_add(n, Ordering::Relaxed);
    }

    pub fn candidates(&self) -> u64 {
        self.candidates.load(Ordering::Relaxed)
    }

    pub fn add_comparisons(&self, n: u64) {
        self.comparisons.fetch_add(n, Ordering::Relaxed);
    }

    pub fn comparisons(&self) -> u64 {
        self.comparisons.load(Ordering::Relaxed)
    }

    pub fn add_productions(&self, n: u64) {
        self.productions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn productions(&self) -> u64 {
        self.productions.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn increment_source_reads(&self) {
        self.source_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_source_reads(&self, n: u64) {
        self.source_reads.fetch_add(n, Ordering::Relaxed);
    }

    pub fn source_reads(&self) -> u64 {
        self.source_reads.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            candidates: self.candidates(),
            comparisons: self.comparisons(),
            productions: self.productions(),
            source_reads: self.source_reads(),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "candidates={} comparisons={} productions={} source_reads={}",
            self.candidates, self.comparisons, self.productions, self.source_reads
        )
    }
}

impl fmt::Display for ApssStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.snapshot().fmt(f)
    }
}
