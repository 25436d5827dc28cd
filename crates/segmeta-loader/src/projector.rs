//! Record-to-tuple projection
//!
//! Pulls records from a bound [`RecordSource`], keeps only parse-data values
//! and shapes each one into a six-field tuple. Foreign record kinds are
//! skipped without ending the stream; missing fields become empty strings.
//!
//! State machine:
//!
//! | state     | event                      | next state |
//! |-----------|----------------------------|------------|
//! | ready     | advance -> false           | exhausted  |
//! | ready     | advance -> true, parse-data| ready      |
//! | ready     | advance -> true, other     | ready      |
//! | ready     | reader error               | failed     |
//! | exhausted | next                       | exhausted  |
//! | failed    | next                       | failed     |

use tracing::{error, trace};

use crate::error::{ExecException, LoaderError, Result};
use crate::record::{ParseData, RecordValue};
use crate::source::{ReadError, RecordSource};
use crate::tuple::{FieldSource, TupleFactory, PAGE_FIELDS, TUPLE_ARITY};

#[derive(Debug, Clone)]
enum State {
    Ready,
    Exhausted,
    Failed(LoaderError),
}

/// Per-split projection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionStats {
    /// Records pulled from the reader
    pub records: u64,
    /// Tuples emitted
    pub tuples: u64,
    /// Non-parse-data records passed over
    pub skipped: u64,
}

/// Turns the records of one split into tuples, one per parse-data record
#[derive(Debug)]
pub struct TupleProjector<F> {
    source: RecordSource,
    factory: F,
    state: State,
    stats: ProjectionStats,
}

impl<F: TupleFactory> TupleProjector<F> {
    pub fn new(source: RecordSource, factory: F) -> Self {
        Self {
            source,
            factory,
            state: State::Ready,
            stats: ProjectionStats::default(),
        }
    }

    /// Next tuple of the split, `Ok(None)` at end of stream
    ///
    /// Once a read has failed every later call returns the same error.
    pub fn next_tuple(&mut self) -> Result<Option<F::Tuple>> {
        match &self.state {
            State::Exhausted => return Ok(None),
            State::Failed(err) => return Err(err.clone()),
            State::Ready => {},
        }

        loop {
            match self.source.advance() {
                Ok(true) => {},
                Ok(false) => {
                    self.state = State::Exhausted;
                    return Ok(None);
                },
                Err(err) => return Err(self.fail(err)),
            }
            self.stats.records += 1;

            let tuple = match self.source.current() {
                Some(RecordValue::ParseData(pd)) => project(&self.factory, pd),
                Some(RecordValue::Other { kind }) => {
                    trace!(key = ?self.source.current_key(), kind = %kind, "Skipping foreign record");
                    self.stats.skipped += 1;
                    continue;
                },
                None => {
                    self.state = State::Exhausted;
                    return Ok(None);
                },
            };

            self.stats.tuples += 1;
            return Ok(Some(tuple));
        }
    }

    pub fn stats(&self) -> ProjectionStats {
        self.stats
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted)
    }

    /// Iterator over the remaining tuples
    ///
    /// A failure is yielded once, after which the iterator ends.
    pub fn tuples(&mut self) -> Tuples<'_, F> {
        Tuples {
            projector: self,
            done: false,
        }
    }

    fn fail(&mut self, err: ReadError) -> LoaderError {
        let err = match err {
            ReadError::Interrupted => LoaderError::Exec(ExecException::interrupted()),
            ReadError::Io(e) => LoaderError::from(e),
            ReadError::Malformed { offset, message } => LoaderError::from(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("malformed record at byte {offset}: {message}"),
            )),
        };
        error!(error = %err, records = self.stats.records, "Split read failed");
        self.state = State::Failed(err.clone());
        err
    }
}

/// Borrowing iterator returned by [`TupleProjector::tuples`]
pub struct Tuples<'a, F> {
    projector: &'a mut TupleProjector<F>,
    done: bool,
}

impl<F: TupleFactory> Iterator for Tuples<'_, F> {
    type Item = Result<F::Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.projector.next_tuple() {
            Ok(Some(tuple)) => Some(Ok(tuple)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}

/// Shape one parse-data record into a tuple
///
/// Every field goes through the same absent-to-empty fold.
pub fn project<F: TupleFactory>(factory: &F, pd: &ParseData) -> F::Tuple {
    let fields: [String; TUPLE_ARITY] = PAGE_FIELDS.map(|(_, source)| {
        let value = match source {
            FieldSource::Metadata(key) => pd.content_meta.get(key),
            FieldSource::Title => pd.title.as_deref(),
        };
        value.unwrap_or_default().to_string()
    });
    factory.new_tuple(fields)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::{Metadata, Record};
    use crate::source::{InputSplit, VecRecordReader};
    use crate::tuple::{DefaultTupleFactory, Tuple};

    fn parse_data(title: Option<&str>, meta: &[(&str, &str)]) -> Record {
        let bag: Metadata = meta.iter().copied().collect();
        Record::new("k", ParseData::new(title.map(String::from), bag))
    }

    fn projector(reader: VecRecordReader) -> TupleProjector<DefaultTupleFactory> {
        let split = InputSplit::whole_file("/segment/parse_data/part-00000/data", 0);
        TupleProjector::new(RecordSource::bind(Box::new(reader), &split), DefaultTupleFactory)
    }

    #[test]
    fn test_title_comes_from_title_slot_not_metadata() {
        let pd = ParseData::new(
            Some("Slot".into()),
            [("title", "FromMeta"), ("url", "u")].into_iter().collect(),
        );
        let tuple: Tuple = project(&DefaultTupleFactory, &pd);
        assert_eq!(tuple.title, "Slot");
        assert_eq!(tuple.url, "u");
    }

    #[test]
    fn test_extra_metadata_keys_are_ignored() {
        let pd = ParseData::new(
            None,
            [("url", "u"), ("digest", "abc"), ("Length", "9")]
                .into_iter()
                .collect(),
        );
        let tuple = project(&DefaultTupleFactory, &pd);
        assert_eq!(tuple.into_fields(), ["u", "", "", "", "", ""].map(String::from));
    }

    #[test]
    fn test_exhausted_stays_exhausted() {
        let mut p = projector(VecRecordReader::new(vec![parse_data(None, &[("url", "a")])]));
        assert!(p.next_tuple().unwrap().is_some());
        assert!(p.next_tuple().unwrap().is_none());
        assert!(p.is_exhausted());
        assert!(p.next_tuple().unwrap().is_none());
    }

    #[test]
    fn test_failed_reraises_last_error() {
        let reader = VecRecordReader::new(vec![parse_data(None, &[("url", "a")])])
            .then_fail(ReadError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "namenode went away",
            )));
        let mut p = projector(reader);

        assert!(p.next_tuple().unwrap().is_some());
        let first = p.next_tuple().unwrap_err();
        let second = p.next_tuple().unwrap_err();
        assert!(matches!(first, LoaderError::Read(_)));
        assert_eq!(first.to_string(), second.to_string());
        assert!(second.to_string().contains("namenode went away"));
    }

    #[test]
    fn test_interruption_maps_to_coded_failure() {
        let reader = VecRecordReader::new(Vec::new()).then_fail(ReadError::Interrupted);
        let mut p = projector(reader);

        let err = p.next_tuple().unwrap_err();
        assert_eq!(err.code(), Some(6018));
        match err {
            LoaderError::Exec(exec) => assert!(exec.is_retriable()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_record_is_read_failure() {
        let reader = VecRecordReader::new(Vec::new()).then_fail(ReadError::Malformed {
            offset: 3,
            message: "expected value".into(),
        });
        let mut p = projector(reader);
        let err = p.next_tuple().unwrap_err();
        assert!(matches!(err, LoaderError::Read(_)));
        assert!(err.to_string().contains("byte 3"));
    }

    #[test]
    fn test_stats_count_skips() {
        let reader = VecRecordReader::new(vec![
            Record::new("x", RecordValue::other("parse_text")),
            parse_data(None, &[("url", "a")]),
            Record::new("y", RecordValue::other("crawl_datum")),
        ]);
        let mut p = projector(reader);
        let tuples: Vec<_> = p.tuples().collect::<Result<_>>().unwrap();

        assert_eq!(tuples.len(), 1);
        assert_eq!(
            p.stats(),
            ProjectionStats {
                records: 3,
                tuples: 1,
                skipped: 2
            }
        );
    }

    #[test]
    fn test_iterator_yields_error_once() {
        let reader = VecRecordReader::new(vec![parse_data(None, &[("url", "a")])])
            .then_fail(ReadError::Interrupted);
        let mut p = projector(reader);
        let items: Vec<_> = p.tuples().collect();

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
