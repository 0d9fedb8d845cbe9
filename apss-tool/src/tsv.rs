//! Tab-separated vector input and pair output
//!
//! Vectors are read one per line:
//!
//! ```text
//! entry<TAB>feature<TAB>weight[<TAB>feature<TAB>weight ...]
//! ```
//!
//! Entry and feature ids are already-enumerated integers. Pairs are written
//! as `id1<TAB>id2<TAB>weight`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use apss_core::{
    CursorId, Error, Indexed, IndexedVector, ObjectSink, Result, SeekableSource, SparseVector,
    TokenId, WeightedPair,
};

/// Parse one vector line
pub fn parse_vector(line: &str) -> Result<IndexedVector> {
    let mut fields = line.trim_end_matches(['\r', '\n']).split('\t');
    let entry = parse_id(fields.next().unwrap_or_default(), "entry id")?;

    let rest: Vec<&str> = fields.collect();
    if rest.len() % 2 != 0 {
        return Err(Error::Format(format!(
            "entry {}: feature without a weight",
            entry
        )));
    }

    let mut entries = Vec::with_capacity(rest.len() / 2);
    for pair in rest.chunks_exact(2) {
        let feature = parse_id(pair[0], "feature id")?;
        let weight: f64 = pair[1].trim().parse().map_err(|_| {
            Error::Format(format!("entry {}: invalid weight {:?}", entry, pair[1]))
        })?;
        if !weight.is_finite() {
            return Err(Error::Format(format!(
                "entry {}: non-finite weight {}",
                entry, weight
            )));
        }
        entries.push((feature, weight));
    }

    let cardinality = entries
        .iter()
        .map(|&(k, _)| k as usize + 1)
        .max()
        .unwrap_or(0);
    let mut vector = SparseVector::with_capacity(cardinality, entries.len());
    for (feature, weight) in entries {
        vector.set(feature, weight);
    }
    Ok(Indexed::new(entry, vector))
}

fn parse_id(field: &str, what: &str) -> Result<TokenId> {
    field
        .trim()
        .parse()
        .map_err(|_| Error::Format(format!("invalid {} {:?}", what, field)))
}

/// Seekable vector source over a TSV file.
///
/// Positions are byte offsets of the next unread line.
pub struct TsvVectorSource {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    line: String,
    id: CursorId,
}

impl TsvVectorSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            offset: 0,
            line: String::new(),
            id: CursorId::unique(),
        })
    }

    /// Consume blank lines so that `has_next` only reports real records
    fn skip_blank_lines(&mut self) -> Result<()> {
        loop {
            let buf = self.reader.fill_buf()?;
            let blank = buf
                .iter()
                .take_while(|&&b| b == b'\n' || b == b'\r')
                .count();
            if blank == 0 {
                return Ok(());
            }
            self.reader.consume(blank);
            self.offset += blank as u64;
        }
    }
}

impl SeekableSource for TsvVectorSource {
    type Item = IndexedVector;
    type Position = u64;

    fn has_next(&mut self) -> Result<bool> {
        self.skip_blank_lines()?;
        Ok(!self.reader.fill_buf()?.is_empty())
    }

    fn read(&mut self) -> Result<IndexedVector> {
        self.skip_blank_lines()?;
        let start = self.offset;
        self.line.clear();
        let n = self.reader.read_line(&mut self.line)?;
        if n == 0 {
            return Err(Error::SourceExhausted("read past the end of TSV source"));
        }
        self.offset += n as u64;
        parse_vector(&self.line).map_err(|e| match e {
            Error::Format(msg) => Error::Format(format!(
                "{} at byte {}: {}",
                self.path.display(),
                start,
                msg
            )),
            other => other,
        })
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.offset)
    }

    fn seek(&mut self, position: &u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(*position))?;
        self.offset = *position;
        Ok(())
    }

    fn cursor_id(&self) -> CursorId {
        self.id
    }
}

/// Pair sink writing `id1<TAB>id2<TAB>weight` lines
pub struct TsvPairSink {
    writer: Mutex<BufWriter<File>>,
}

impl TsvPairSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

fn write_pair<W: Write>(w: &mut W, pair: &WeightedPair) -> std::io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}",
        pair.record.id1, pair.record.id2, pair.weight
    )
}

impl ObjectSink<WeightedPair> for TsvPairSink {
    fn write(&self, record: WeightedPair) -> Result<()> {
        write_pair(&mut *self.writer.lock(), &record)?;
        Ok(())
    }

    fn write_batch(&self, records: Vec<WeightedPair>) -> Result<()> {
        let mut writer = self.writer.lock();
        for record in &records {
            write_pair(&mut *writer, record)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}
