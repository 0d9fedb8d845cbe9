//! Record sinks shared by concurrently running engines

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::Result;

/// Ordered-write destination. Implementations synchronise internally.
pub trait ObjectSink<T>: Send + Sync {
    fn write(&self, record: T) -> Result<()>;

    /// Write a whole batch. Implementations should hold their lock once for
    /// the batch so that batches from different writers never interleave.
    fn write_batch(&self, records: Vec<T>) -> Result<()> {
        for record in records {
            self.write(record)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()>;
}

/// Collects every record in memory
#[derive(Debug)]
pub struct MemorySink<T> {
    records: Mutex<Vec<T>>,
}

impl<T> MemorySink<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Remove and return everything written so far
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn into_inner(self) -> Vec<T> {
        self.records.into_inner()
    }
}

impl<T: Clone> MemorySink<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.records.lock().clone()
    }
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ObjectSink<T> for MemorySink<T> {
    fn write(&self, record: T) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }

    fn write_batch(&self, mut records: Vec<T>) -> Result<()> {
        self.records.lock().append(&mut records);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Discards records, keeping only write, batch and flush counts
#[derive(Debug, Default)]
pub struct CountingSink {
    records: AtomicU64,
    batches: AtomicU64,
    flushes: AtomicU64,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

impl<T> ObjectSink<T> for CountingSink {
    fn write(&self, _record: T) -> Result<()> {
        self.records.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_batch(&self, records: Vec<T>) -> Result<()> {
        self.records
            .fetch_add(records.len() as u64, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        sink.write(1).unwrap();
        sink.write_batch(vec![2, 3]).unwrap();
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.snapshot(), vec![1, 2, 3]);
        assert_eq!(sink.take(), vec![1, 2, 3]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_counting_sink() {
        let sink = CountingSink::new();
        ObjectSink::<u32>::write(&sink, 1).unwrap();
        ObjectSink::<u32>::write_batch(&sink, vec![1, 2, 3]).unwrap();
        assert_eq!(sink.records(), 4);
        assert_eq!(sink.batches(), 1);
        assert_eq!(sink.flushes(), 0);
        ObjectSink::<u32>::flush(&sink).unwrap();
        assert_eq!(sink.flushes(), 1);
    }
}
