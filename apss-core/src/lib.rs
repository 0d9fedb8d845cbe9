//! apss - All-pairs similarity search over sparse feature vectors
//!
//! This library provides:
//! - Packed sparse vectors with binary-search mutation and a running sum
//! - Pluggable similarity measures, with precomputation for decomposable ones
//!   and optional feature weighting
//! - Naive, inverted-index and chunked parallel all-pairs engines
//! - Seekable sources, chunking, pair sinks and record/pair filters
//! - Thread-safe run statistics and progress reporting

pub mod apss;
pub mod chunk;
pub mod config;
pub mod error;
pub mod filter;
pub mod measure;
pub mod progress;
pub mod sink;
pub mod source;
pub mod stats;
pub mod structures;

// Re-exports from apss
pub use apss::{
    ApssContext, ApssTask, FeatureIndex, InnerEngine, InvertedApss, NaiveApss, ThreadedApss,
};

// Re-exports from structures
pub use structures::{
    Indexed, IndexedVector, SparseVector, TokenPair, Weighted, WeightedPair,
};

// Re-exports from measure
pub use measure::{
    DecomposableMeasure, FeatureMarginals, Measure, MeasureParams, Proximity, Weighting,
};

// Re-exports from other modules
pub use chunk::{Chunk, Chunker};
pub use config::ApssConfig;
pub use error::{Error, Result};
pub use filter::{PairFilter, RecordFilter};
pub use progress::{Progress, ProgressEvent, TaskState};
pub use sink::{CountingSink, MemorySink, ObjectSink};
pub use source::{CursorId, MemorySource, SeekableSource, SharedSource};
pub use stats::{ApssStats, StatsSnapshot};

/// Feature and entry identifier
pub type TokenId = u32;
