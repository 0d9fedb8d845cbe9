//! Engine scenarios shared by the naive, inverted and threaded tests

mod inverted;
mod naive;

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::measure::Measure;
use crate::sink::{MemorySink, ObjectSink};
use crate::source::MemorySource;
use crate::structures::{Indexed, IndexedVector, SparseVector, Weighted, WeightedPair};

/// `a1 = {1: 1, 3: 2}` with id 0
fn a1() -> IndexedVector {
    let mut v = SparseVector::new(5);
    v.set(1, 1.0);
    v.set(3, 2.0);
    Indexed::new(0, v)
}

/// `b1 = {1: 1, 2: 1}` with id 1
fn b1() -> IndexedVector {
    let mut v = SparseVector::new(5);
    v.set(1, 1.0);
    v.set(2, 1.0);
    Indexed::new(1, v)
}

/// Deterministic sparse corpus: 1 to 4 features per vector, weights 1 to 5
fn corpus(n: u32, cardinality: u32, seed: u64) -> Vec<IndexedVector> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as u32
    };
    (0..n)
        .map(|id| {
            let mut v = SparseVector::new(cardinality as usize);
            let entries = 1 + next() % 4;
            for _ in 0..entries {
                let key = next() % cardinality;
                let weight = 1.0 + (next() % 5) as f64;
                v.set(key, weight);
            }
            Indexed::new(id, v)
        })
        .collect()
}

/// Two independent cursors over the same records
fn sources(records: &[IndexedVector]) -> (MemorySource<IndexedVector>, MemorySource<IndexedVector>) {
    let a = MemorySource::from(records.to_vec());
    let b = a.clone();
    (a, b)
}

fn memory_sink() -> Arc<MemorySink<WeightedPair>> {
    Arc::new(MemorySink::new())
}

/// Everything written to `sink`, in index order
fn sorted_pairs(sink: &MemorySink<WeightedPair>) -> Vec<WeightedPair> {
    let mut pairs = sink.snapshot();
    pairs.sort_by(Weighted::record_order);
    pairs
}

/// Keeps every batch separately
#[derive(Default)]
struct BatchSink {
    batches: Mutex<Vec<Vec<WeightedPair>>>,
}

impl ObjectSink<WeightedPair> for BatchSink {
    fn write(&self, record: WeightedPair) -> Result<()> {
        self.batches.lock().push(vec![record]);
        Ok(())
    }

    fn write_batch(&self, records: Vec<WeightedPair>) -> Result<()> {
        self.batches.lock().push(records);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Rejects every write
struct FailingSink;

impl ObjectSink<WeightedPair> for FailingSink {
    fn write(&self, _record: WeightedPair) -> Result<()> {
        Err(Error::Io(io::Error::other("disk full")))
    }

    fn write_batch(&self, _records: Vec<WeightedPair>) -> Result<()> {
        Err(Error::Io(io::Error::other("disk full")))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Accepts every write but cannot flush
struct UnflushableSink;

impl ObjectSink<WeightedPair> for UnflushableSink {
    fn write(&self, _record: WeightedPair) -> Result<()> {
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Err(Error::Io(io::Error::other("no space left on device")))
    }
}

/// Panics on every comparison
#[derive(Debug)]
struct Explosive;

impl Measure for Explosive {
    fn similarity(&self, _a: &SparseVector, _b: &SparseVector) -> f64 {
        panic!("measure exploded")
    }

    fn name(&self) -> String {
        "Explosive".to_string()
    }
}
