//! Splitting a source into bounded, independently replayable chunks

use std::sync::Arc;

use log::trace;

use crate::error::{Error, Result};
use crate::source::{CursorId, MemorySource, SeekableSource};

/// A materialised run of consecutive records
#[derive(Debug)]
pub struct Chunk<T> {
    name: String,
    records: Arc<[T]>,
}

impl<T> Chunk<T> {
    pub fn new(name: impl Into<String>, records: Vec<T>) -> Self {
        Self {
            name: name.into(),
            records: records.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    /// Fresh cursor over the chunk's records, starting at the first one
    pub fn source(&self) -> MemorySource<T> {
        MemorySource::new(Arc::clone(&self.records))
    }
}

impl<T> Clone for Chunk<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            records: Arc::clone(&self.records),
        }
    }
}

/// Position of a `Chunker`: the inner position plus the number of chunks
/// already produced, so chunk names survive a rewind
#[derive(Debug, Clone)]
pub struct ChunkerPosition<P> {
    inner: P,
    chunks_read: usize,
}

/// Reads up to `max_chunk_size` records at a time from an inner source
pub struct Chunker<S> {
    inner: S,
    max_chunk_size: usize,
    chunks_read: usize,
}

impl<S: SeekableSource> Chunker<S> {
    pub fn new(inner: S, max_chunk_size: usize) -> Result<Self> {
        if max_chunk_size == 0 {
            return Err(Error::Config("chunk size must be at least 1".into()));
        }
        Ok(Self {
            inner,
            max_chunk_size,
            chunks_read: 0,
        })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn set_max_chunk_size(&mut self, max_chunk_size: usize) -> Result<()> {
        if max_chunk_size == 0 {
            return Err(Error::Config("chunk size must be at least 1".into()));
        }
        self.max_chunk_size = max_chunk_size;
        Ok(())
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: SeekableSource> SeekableSource for Chunker<S> {
    type Item = Chunk<S::Item>;
    type Position = ChunkerPosition<S::Position>;

    fn has_next(&mut self) -> Result<bool> {
        self.inner.has_next()
    }

    fn read(&mut self) -> Result<Chunk<S::Item>> {
        if !self.inner.has_next()? {
            return Err(Error::SourceExhausted("read past the end of chunker"));
        }
        let mut records = Vec::with_capacity(self.max_chunk_size);
        while records.len() < self.max_chunk_size && self.inner.has_next()? {
            records.push(self.inner.read()?);
        }
        let name = format!("chunk-{}", self.chunks_read);
        self.chunks_read += 1;
        trace!("[chunker] {} holds {} records", name, records.len());
        Ok(Chunk::new(name, records))
    }

    fn position(&mut self) -> Result<Self::Position> {
        Ok(ChunkerPosition {
            inner: self.inner.position()?,
            chunks_read: self.chunks_read,
        })
    }

    fn seek(&mut self, position: &Self::Position) -> Result<()> {
        self.inner.seek(&position.inner)?;
        self.chunks_read = position.chunks_read;
        Ok(())
    }

    fn cursor_id(&self) -> CursorId {
        self.inner.cursor_id()
    }
}
