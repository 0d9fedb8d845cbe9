//! Seekable record sources
//!
//! Engines consume ordered, replayable streams. A source hands out an opaque
//! `Position` ("tell") that can later be restored with `seek`, which is how
//! one pass over a source is replayed once per outer record.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Identity of the cursor behind a source.
///
/// Two handles with the same id advance the same underlying position, so an
/// engine must never read both of its inputs through one cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CursorId(u64);

impl CursorId {
    /// Allocate a process-unique id
    pub fn unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        CursorId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor#{}", self.0)
    }
}

/// Ordered stream of records that can be rewound to a captured position
pub trait SeekableSource {
    type Item;
    type Position: Clone + Send + fmt::Debug;

    /// True if another record can be read
    fn has_next(&mut self) -> Result<bool>;

    /// Read the next record. Fails with `SourceExhausted` past the end.
    fn read(&mut self) -> Result<Self::Item>;

    /// Capture the current cursor position
    fn position(&mut self) -> Result<Self::Position>;

    /// Restore a position previously returned by `position`
    fn seek(&mut self, position: &Self::Position) -> Result<()>;

    fn cursor_id(&self) -> CursorId;
}

/// Source over an immutable in-memory slice.
///
/// Cloning creates an independent cursor over the same records.
#[derive(Debug)]
pub struct MemorySource<T> {
    records: Arc<[T]>,
    offset: usize,
    id: CursorId,
}

impl<T> MemorySource<T> {
    pub fn new(records: impl Into<Arc<[T]>>) -> Self {
        Self {
            records: records.into(),
            offset: 0,
            id: CursorId::unique(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records not yet read
    pub fn remaining(&self) -> usize {
        self.records.len() - self.offset
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }
}

impl<T> Clone for MemorySource<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            offset: self.offset,
            id: CursorId::unique(),
        }
    }
}

impl<T> From<Vec<T>> for MemorySource<T> {
    fn from(records: Vec<T>) -> Self {
        Self::new(records)
    }
}

impl<T: Clone> SeekableSource for MemorySource<T> {
    type Item = T;
    type Position = usize;

    #[inline]
    fn has_next(&mut self) -> Result<bool> {
        Ok(self.offset < self.records.len())
    }

    fn read(&mut self) -> Result<T> {
        let record = self
            .records
            .get(self.offset)
            .cloned()
            .ok_or(Error::SourceExhausted("read past the end of memory source"))?;
        self.offset += 1;
        Ok(record)
    }

    fn position(&mut self) -> Result<usize> {
        Ok(self.offset)
    }

    fn seek(&mut self, position: &usize) -> Result<()> {
        if *position > self.records.len() {
            return Err(Error::Config(format!(
                "seek to {} beyond source of {} records",
                position,
                self.records.len()
            )));
        }
        self.offset = *position;
        Ok(())
    }

    fn cursor_id(&self) -> CursorId {
        self.id
    }
}

/// Handle to a source whose cursor is shared by every clone of the handle
pub struct SharedSource<S> {
    inner: Arc<Mutex<S>>,
    id: CursorId,
}

impl<S: SeekableSource> SharedSource<S> {
    pub fn new(source: S) -> Self {
        let id = source.cursor_id();
        Self {
            inner: Arc::new(Mutex::new(source)),
            id,
        }
    }
}

impl<S> Clone for SharedSource<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            id: self.id,
        }
    }
}

impl<S: SeekableSource> SeekableSource for SharedSource<S> {
    type Item = S::Item;
    type Position = S::Position;

    fn has_next(&mut self) -> Result<bool> {
        self.inner.lock().has_next()
    }

    fn read(&mut self) -> Result<S::Item> {
        self.inner.lock().read()
    }

    fn position(&mut self) -> Result<S::Position> {
        self.inner.lock().position()
    }

    fn seek(&mut self, position: &S::Position) -> Result<()> {
        self.inner.lock().seek(position)
    }

    fn cursor_id(&self) -> CursorId {
        self.id
    }
}

/// Fail unless the two sources read through distinct cursors
pub(crate) fn ensure_distinct<A, B>(a: &A, b: &B) -> Result<()>
where
    A: SeekableSource + ?Sized,
    B: SeekableSource + ?Sized,
{
    if a.cursor_id() == b.cursor_id() {
        return Err(Error::Config(format!(
            "sourceA and sourceB share {}; open the input twice",
            a.cursor_id()
        )));
    }
    Ok(())
}
