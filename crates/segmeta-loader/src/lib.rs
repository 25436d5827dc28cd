//! Segmeta Loader Library
//!
//! Exposes the parse output of a web-crawl segment as a flat relation for a
//! data-flow query engine. Every parse-data record becomes one tuple:
//!
//! `(url, title, length, date, type, collection)`
//!
//! All six fields are strings; missing values are empty strings.
//!
//! # Components
//!
//! - **Location expansion** ([`location`]): wildcard locations expanded by the
//!   filesystem and registered as job inputs
//! - **Record source** ([`source`], [`format`]): split readers yielding
//!   text-keyed records of mixed kinds
//! - **Projection** ([`projector`]): parse-data records shaped into tuples,
//!   foreign records skipped
//! - **Local driver** ([`runner`], [`output`]): reads splits concurrently and
//!   writes TSV or JSON lines
//!
//! # Example
//!
//! ```no_run
//! use segmeta_loader::{LoaderConfig, LocalRunner, output::VecSink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runner = LocalRunner::new(LoaderConfig::default());
//!     let mut sink = VecSink::default();
//!     let summary = runner.run("/crawl/*/parse_data", &mut sink).await?;
//!     assert_eq!(summary.tuples as usize, sink.tuples.len());
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod format;
pub mod loader;
pub mod location;
pub mod output;
pub mod projector;
pub mod record;
pub mod runner;
pub mod source;
pub mod tuple;

// Re-export commonly used types
pub use config::{LoaderConfig, OutputFormat};
pub use error::{ErrorSource, ExecException, LoaderError, Result};
pub use loader::MetadataLoader;
pub use record::{Metadata, ParseData, Record, RecordValue};
pub use runner::{LocalJob, LocalRunner, RunSummary};
pub use source::{InputSplit, ReadError, RecordReader};
pub use tuple::{Schema, Tuple, TupleFactory};
