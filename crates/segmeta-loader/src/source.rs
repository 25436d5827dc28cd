//! Split readers and the record source bound to them
//!
//! The host opens one [`RecordReader`] per [`InputSplit`] and hands it to the
//! loader. Split bounds are already applied by the reader, so the loader keeps
//! the reader and ignores the split.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::record::{Record, RecordValue};

/// Failure reported by a split reader
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `offset` is the file byte offset where the bad line starts
    #[error("Malformed record at byte {offset}: {message}")]
    Malformed { offset: u64, message: String },

    /// The host cancelled the read cooperatively
    #[error("Read interrupted")]
    Interrupted,
}

/// Host capability: sequential access to the (key, value) records of one split
pub trait RecordReader: Send {
    /// Move to the next record; `false` at end of split
    fn advance(&mut self) -> Result<bool, ReadError>;

    /// Key of the current record
    fn current_key(&self) -> Option<&str>;

    /// Value of the current record, or `None` if the reader holds nothing
    fn current(&self) -> Option<&RecordValue>;
}

/// A host-defined partition of one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSplit {
    pub path: PathBuf,
    pub start: u64,
    pub length: u64,
}

impl InputSplit {
    pub fn new(path: impl Into<PathBuf>, start: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            start,
            length,
        }
    }

    /// A split covering a whole file of `length` bytes
    pub fn whole_file(path: impl Into<PathBuf>, length: u64) -> Self {
        Self::new(path, 0, length)
    }
}

impl fmt::Display for InputSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}+{}", self.path.display(), self.start, self.length)
    }
}

/// Reader handle bound to the loader for the duration of one split
pub struct RecordSource {
    reader: Box<dyn RecordReader>,
}

impl RecordSource {
    /// Keep `reader`; the split is not consulted since the reader already
    /// encapsulates its bounds.
    pub fn bind(reader: Box<dyn RecordReader>, split: &InputSplit) -> Self {
        debug!(split = %split, "Bound record reader");
        Self { reader }
    }

    pub fn advance(&mut self) -> Result<bool, ReadError> {
        self.reader.advance()
    }

    pub fn current(&self) -> Option<&RecordValue> {
        self.reader.current()
    }

    pub fn current_key(&self) -> Option<&str> {
        self.reader.current_key()
    }
}

impl fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSource").finish_non_exhaustive()
    }
}

/// In-memory reader over a fixed record list
///
/// Scripted failures let callers exercise the error paths of a split.
#[derive(Debug, Default)]
pub struct VecRecordReader {
    pending: VecDeque<Step>,
    current: Option<Record>,
    cancel: Option<CancellationToken>,
}

#[derive(Debug)]
enum Step {
    Record(Record),
    Fail(ReadError),
}

impl VecRecordReader {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            pending: records.into_iter().map(Step::Record).collect(),
            current: None,
            cancel: None,
        }
    }

    /// Fail the next advance after the records queued so far
    pub fn then_fail(mut self, err: ReadError) -> Self {
        self.pending.push_back(Step::Fail(err));
        self
    }

    /// Report [`ReadError::Interrupted`] once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl RecordReader for VecRecordReader {
    fn advance(&mut self) -> Result<bool, ReadError> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(ReadError::Interrupted);
        }

        match self.pending.pop_front() {
            Some(Step::Record(record)) => {
                self.current = Some(record);
                Ok(true)
            },
            Some(Step::Fail(err)) => {
                self.current = None;
                Err(err)
            },
            None => {
                self.current = None;
                Ok(false)
            },
        }
    }

    fn current_key(&self) -> Option<&str> {
        self.current.as_ref().map(|r| r.key.as_str())
    }

    fn current(&self) -> Option<&RecordValue> {
        self.current.as_ref().map(|r| &r.value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::{Metadata, ParseData};

    fn page(key: &str) -> Record {
        Record::new(key, ParseData::new(None, Metadata::new()))
    }

    #[test]
    fn test_vec_reader_walks_records_then_ends() {
        let mut reader = VecRecordReader::new(vec![page("a"), page("b")]);
        assert!(reader.current().is_none());

        assert!(reader.advance().unwrap());
        assert_eq!(reader.current_key(), Some("a"));
        assert!(reader.advance().unwrap());
        assert_eq!(reader.current_key(), Some("b"));
        assert!(!reader.advance().unwrap());
        assert!(reader.current().is_none());
        assert!(!reader.advance().unwrap());
    }

    #[test]
    fn test_scripted_failure_after_records() {
        let mut reader = VecRecordReader::new(vec![page("a")]).then_fail(ReadError::Io(
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"),
        ));
        assert!(reader.advance().unwrap());
        assert!(matches!(reader.advance(), Err(ReadError::Io(_))));
    }

    #[test]
    fn test_cancelled_reader_is_interrupted() {
        let token = CancellationToken::new();
        let mut reader = VecRecordReader::new(vec![page("a"), page("b")])
            .with_cancellation(token.clone());
        assert!(reader.advance().unwrap());
        token.cancel();
        assert!(matches!(reader.advance(), Err(ReadError::Interrupted)));
    }

    #[test]
    fn test_bind_ignores_split_bounds() {
        let reader = VecRecordReader::new(vec![page("a"), page("b"), page("c")]);
        let split = InputSplit::new("/crawl/a/parse_data/part-00000", 0, 1);
        let mut source = RecordSource::bind(Box::new(reader), &split);

        let mut seen = 0;
        while source.advance().unwrap() {
            seen += 1;
        }
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_split_display() {
        let split = InputSplit::whole_file("/crawl/a/data", 42);
        assert_eq!(split.to_string(), "/crawl/a/data:0+42");
    }
}
