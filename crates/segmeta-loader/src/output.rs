//! Tuple sinks for the local driver

use serde_jsonlines::JsonLinesWriter;
use std::io::{self, Write};

use crate::config::OutputFormat;
use crate::tuple::{Schema, Tuple};

/// Destination for projected tuples
pub trait TupleSink: Send {
    fn write(&mut self, tuple: &Tuple) -> io::Result<()>;

    fn finish(&mut self) -> io::Result<()>;
}

/// Tab-separated output; fields containing tabs, quotes or newlines are quoted
pub struct TsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .delimiter(b'\t')
                .has_headers(false)
                .from_writer(inner),
        }
    }

    /// Start the output with a row of schema field names
    pub fn with_header(mut self, schema: &Schema) -> io::Result<Self> {
        self.writer.write_record(schema.field_names())?;
        Ok(self)
    }
}

impl<W: Write + Send> TupleSink for TsvSink<W> {
    fn write(&mut self, tuple: &Tuple) -> io::Result<()> {
        self.writer.write_record(tuple.fields())?;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// One JSON object per tuple, keyed by schema field name
pub struct JsonLinesSink<W: Write> {
    writer: JsonLinesWriter<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: JsonLinesWriter::new(inner),
        }
    }
}

impl<W: Write + Send> TupleSink for JsonLinesSink<W> {
    fn write(&mut self, tuple: &Tuple) -> io::Result<()> {
        self.writer.write(tuple)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Build the sink for `format` over `inner`
pub fn sink_for<W>(
    format: OutputFormat,
    inner: W,
    header: bool,
    schema: &Schema,
) -> io::Result<Box<dyn TupleSink>>
where
    W: Write + Send + 'static,
{
    Ok(match format {
        OutputFormat::Tsv if header => Box::new(TsvSink::new(inner).with_header(schema)?),
        OutputFormat::Tsv => Box::new(TsvSink::new(inner)),
        OutputFormat::Jsonl => Box::new(JsonLinesSink::new(inner)),
    })
}

/// In-memory sink collecting tuples in arrival order
#[derive(Debug, Default)]
pub struct VecSink {
    pub tuples: Vec<Tuple>,
}

impl TupleSink for VecSink {
    fn write(&mut self, tuple: &Tuple) -> io::Result<()> {
        self.tuples.push(tuple.clone());
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}
