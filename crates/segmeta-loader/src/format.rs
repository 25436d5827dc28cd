//! Container input format: split planning and per-split readers
//!
//! Segments are stored as sequences of text-keyed records with polymorphic
//! values. Locally each container file holds one JSON [`Record`] per line.
//! Split planning follows sequence-file input rules:
//!
//! - a registered file is read directly
//! - a registered directory contributes its children, skipping hidden names
//!   (leading `_` or `.`)
//! - a child directory is a map-file and contributes its `data` file
//!
//! Files larger than the split size are cut into several byte ranges; each
//! reader owns the lines that start inside its range.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::record::{Record, RecordValue};
use crate::source::{InputSplit, ReadError, RecordReader};

/// Default upper bound on the bytes covered by one split
pub const DEFAULT_SPLIT_BYTES: u64 = 128 * 1024 * 1024;

/// Name of the data file inside a map-file directory
pub const MAP_FILE_DATA: &str = "data";

/// Descriptor for segment containers of (text key, polymorphic value) records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceInputFormat {
    split_bytes: u64,
}

impl Default for SequenceInputFormat {
    fn default() -> Self {
        Self {
            split_bytes: DEFAULT_SPLIT_BYTES,
        }
    }
}

impl SequenceInputFormat {
    pub fn new(split_bytes: u64) -> Self {
        Self {
            split_bytes: split_bytes.max(1),
        }
    }

    pub fn describe(&self) -> &'static str {
        "sequence of (text key, polymorphic value) records"
    }

    pub fn split_bytes(&self) -> u64 {
        self.split_bytes
    }

    /// Plan the splits covering every registered input path
    pub fn splits(&self, inputs: &[PathBuf]) -> io::Result<Vec<InputSplit>> {
        let mut splits = Vec::new();
        for input in inputs {
            for file in container_files(input)? {
                let len = std::fs::metadata(&file)?.len();
                self.cut(&file, len, &mut splits);
            }
        }
        debug!(inputs = inputs.len(), splits = splits.len(), "Planned splits");
        Ok(splits)
    }

    /// Open a reader over the records of `split`
    pub fn open(
        &self,
        split: &InputSplit,
        cancel: CancellationToken,
    ) -> io::Result<Box<dyn RecordReader>> {
        Ok(Box::new(JsonLinesRecordReader::open(split, cancel)?))
    }

    fn cut(&self, file: &Path, len: u64, out: &mut Vec<InputSplit>) {
        if len == 0 {
            out.push(InputSplit::whole_file(file, 0));
            return;
        }
        let mut start = 0;
        while start < len {
            let length = self.split_bytes.min(len - start);
            out.push(InputSplit::new(file, start, length));
            start += length;
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_') || n.starts_with('.'))
}

/// Container files reachable from one registered input path
fn container_files(input: &Path) -> io::Result<Vec<PathBuf>> {
    if !std::fs::metadata(input)?.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut children = std::fs::read_dir(input)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    children.sort();

    let mut files = Vec::new();
    for child in children.into_iter().filter(|c| !is_hidden(c)) {
        if child.is_dir() {
            let data = child.join(MAP_FILE_DATA);
            if data.is_file() {
                files.push(data);
            } else {
                warn!(dir = %child.display(), "Directory has no map-file data; skipping");
            }
        } else {
            files.push(child);
        }
    }
    Ok(files)
}

/// Reads the JSON-lines records whose first byte falls inside a split
///
/// Lines are handled as raw bytes so a split boundary may fall anywhere,
/// including inside a multi-byte character; only whole lines are decoded.
pub struct JsonLinesRecordReader {
    lines: BufReader<File>,
    /// File offset of the next unread byte
    pos: u64,
    end: u64,
    buf: Vec<u8>,
    current: Option<Record>,
    cancel: CancellationToken,
}

impl JsonLinesRecordReader {
    pub fn open(split: &InputSplit, cancel: CancellationToken) -> io::Result<Self> {
        let mut file = File::open(&split.path)?;
        file.seek(SeekFrom::Start(split.start))?;

        let mut reader = Self {
            lines: BufReader::new(file),
            pos: split.start,
            end: split.start + split.length,
            buf: Vec::new(),
            current: None,
            cancel,
        };

        // A line straddling the start belongs to the previous split
        if split.start != 0 {
            reader.read_line()?;
        }
        Ok(reader)
    }

    /// Read one line into `buf`, returning the file offset it started at
    fn read_line(&mut self) -> io::Result<Option<u64>> {
        self.buf.clear();
        let at = self.pos;
        let n = self.lines.read_until(b'\n', &mut self.buf)?;
        self.pos += n as u64;
        Ok((n > 0).then_some(at))
    }
}

impl RecordReader for JsonLinesRecordReader {
    fn advance(&mut self) -> Result<bool, ReadError> {
        loop {
            if self.cancel.is_cancelled() {
                self.current = None;
                return Err(ReadError::Interrupted);
            }
            // Lines starting exactly at `end` still belong here; the next
            // split skips its first line.
            if self.pos > self.end {
                self.current = None;
                return Ok(false);
            }
            let Some(offset) = self.read_line()? else {
                self.current = None;
                return Ok(false);
            };

            let line = self.buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            let record: Record =
                serde_json::from_slice(line).map_err(|e| ReadError::Malformed {
                    offset,
                    message: e.to_string(),
                })?;
            self.current = Some(record);
            return Ok(true);
        }
    }

    fn current_key(&self) -> Option<&str> {
        self.current.as_ref().map(|r| r.key.as_str())
    }

    fn current(&self) -> Option<&RecordValue> {
        self.current.as_ref().map(|r| &r.value)
    }
}
