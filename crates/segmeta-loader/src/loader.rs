//! Host-facing loader
//!
//! [`MetadataLoader`] is what the query engine talks to. It loads the
//! per-page metadata of a crawl segment's `parse_data` directory, one tuple
//! per page: `(url, title, length, date, type, collection)`.
//!
//! Call order for one split: [`MetadataLoader::prepare_to_read`] once, then
//! [`MetadataLoader::get_next`] until it returns `Ok(None)` or an error.

use crate::error::{LoaderError, Result};
use crate::format::SequenceInputFormat;
use crate::location::{self, FileSystem, InputPathRegistry};
use crate::projector::{ProjectionStats, TupleProjector};
use crate::source::{InputSplit, RecordReader, RecordSource};
use crate::tuple::{DefaultTupleFactory, Schema, TupleFactory};

#[derive(Debug)]
pub struct MetadataLoader<F = DefaultTupleFactory> {
    input_format: SequenceInputFormat,
    factory: F,
    projector: Option<TupleProjector<F>>,
}

impl Default for MetadataLoader<DefaultTupleFactory> {
    fn default() -> Self {
        Self::new(DefaultTupleFactory)
    }
}

impl<F: TupleFactory + Clone> MetadataLoader<F> {
    pub fn new(factory: F) -> Self {
        Self {
            input_format: SequenceInputFormat::default(),
            factory,
            projector: None,
        }
    }

    pub fn with_input_format(mut self, input_format: SequenceInputFormat) -> Self {
        self.input_format = input_format;
        self
    }

    /// The container format the host should decode inputs with
    pub fn input_format(&self) -> SequenceInputFormat {
        self.input_format
    }

    /// Expand `location` and register every match as a job input
    ///
    /// The location is expected to point at `parse_data` directories; it is
    /// not checked and sibling directories are never added.
    pub fn set_location<J>(&self, location: &str, fs: &dyn FileSystem, job: &mut J) -> Result<usize>
    where
        J: InputPathRegistry + ?Sized,
    {
        location::register(location, fs, job)
    }

    /// Bind the reader of the next split
    pub fn prepare_to_read(&mut self, reader: Box<dyn RecordReader>, split: &InputSplit) {
        let source = RecordSource::bind(reader, split);
        self.projector = Some(TupleProjector::new(source, self.factory.clone()));
    }

    /// Next tuple of the bound split, `Ok(None)` at end of stream
    pub fn get_next(&mut self) -> Result<Option<F::Tuple>> {
        self.projector
            .as_mut()
            .ok_or(LoaderError::NotBound)?
            .next_tuple()
    }

    /// Declared output schema
    pub fn schema(&self) -> Schema {
        Schema::page_metadata()
    }

    /// Counters of the currently bound split
    pub fn stats(&self) -> ProjectionStats {
        self.projector
            .as_ref()
            .map(TupleProjector::stats)
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::{Metadata, ParseData, Record};
    use crate::source::VecRecordReader;

    #[test]
    fn test_get_next_before_bind_fails() {
        let mut loader: MetadataLoader = MetadataLoader::default();
        assert!(matches!(loader.get_next(), Err(LoaderError::NotBound)));
    }

    #[test]
    fn test_rebinding_starts_a_fresh_split() {
        let mut loader: MetadataLoader = MetadataLoader::default();
        let split = InputSplit::whole_file("/s/parse_data/part-00000/data", 0);
        let page = |url: &str| {
            let meta: Metadata = [("url", url)].into_iter().collect();
            Record::new(url, ParseData::new(None, meta))
        };

        loader.prepare_to_read(Box::new(VecRecordReader::new(vec![page("a")])), &split);
        assert_eq!(loader.get_next().unwrap().unwrap().url, "a");
        assert!(loader.get_next().unwrap().is_none());

        loader.prepare_to_read(Box::new(VecRecordReader::new(vec![page("b")])), &split);
        assert_eq!(loader.stats().tuples, 0);
        assert_eq!(loader.get_next().unwrap().unwrap().url, "b");
        assert_eq!(loader.stats().tuples, 1);
    }

    #[test]
    fn test_schema_is_page_metadata() {
        let loader: MetadataLoader = MetadataLoader::default();
        assert_eq!(loader.schema().fields.len(), 6);
        assert_eq!(loader.schema(), Schema::page_metadata());
    }
}
