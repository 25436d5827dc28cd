//! Local host driver
//!
//! Plays the part of the data-flow framework for local runs: registers the
//! location, plans splits, reads each split through its own
//! [`MetadataLoader`] on a blocking worker and hands tuples to a sink.
//! Up to `max_concurrent_splits` splits are read at once. Each worker streams
//! its tuples through a bounded channel and the driver drains the channels
//! in split order, so output order matches split order.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};

use crate::config::LoaderConfig;
use crate::error::{ExecException, LoaderError};
use crate::format::SequenceInputFormat;
use crate::loader::MetadataLoader;
use crate::location::{FileSystem, InputPathRegistry, LocalFileSystem};
use crate::output::TupleSink;
use crate::projector::ProjectionStats;
use crate::source::InputSplit;
use crate::tuple::{DefaultTupleFactory, Tuple};

/// Tuples a worker may read ahead of the writer, per split
pub const SPLIT_CHANNEL_CAPACITY: usize = 1024;

/// Job handle collecting registered input paths
#[derive(Debug, Default, Clone)]
pub struct LocalJob {
    inputs: Vec<PathBuf>,
}

impl LocalJob {
    pub fn input_paths(&self) -> &[PathBuf] {
        &self.inputs
    }
}

impl InputPathRegistry for LocalJob {
    fn add_input_path(&mut self, path: PathBuf) {
        self.inputs.push(path);
    }
}

/// Totals of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub splits: usize,
    pub failed_splits: usize,
    pub records: u64,
    pub tuples: u64,
    pub skipped: u64,
}

impl RunSummary {
    fn absorb(&mut self, stats: ProjectionStats) {
        self.records += stats.records;
        self.tuples += stats.tuples;
        self.skipped += stats.skipped;
    }
}

struct SplitOutcome {
    stats: ProjectionStats,
    result: std::result::Result<(), LoaderError>,
}

/// A split whose worker has been started
struct RunningSplit {
    split: InputSplit,
    tuples: mpsc::Receiver<Tuple>,
    worker: JoinHandle<SplitOutcome>,
}

pub struct LocalRunner {
    config: LoaderConfig,
    fs: Arc<dyn FileSystem + Send + Sync>,
    cancel: CancellationToken,
}

impl LocalRunner {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            fs: Arc::new(LocalFileSystem),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem + Send + Sync>) -> Self {
        self.fs = fs;
        self
    }

    /// Token that interrupts every in-flight split read when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn loader(&self) -> MetadataLoader {
        MetadataLoader::new(DefaultTupleFactory)
            .with_input_format(SequenceInputFormat::new(self.config.split_bytes))
    }

    /// Expand `location` and plan the splits that would be read
    pub fn plan(&self, location: &str) -> Result<Vec<InputSplit>> {
        let loader = self.loader();
        let mut job = LocalJob::default();
        loader.set_location(location, self.fs.as_ref(), &mut job)?;

        let splits = loader
            .input_format()
            .splits(job.input_paths())
            .with_context(|| format!("Failed to plan splits for '{location}'"))?;
        Ok(splits)
    }

    /// Load every tuple under `location` into `sink`
    ///
    /// Tuples a split produced before failing are already written when the
    /// failure is seen.
    pub async fn run(&self, location: &str, sink: &mut dyn TupleSink) -> Result<RunSummary> {
        let splits = self.plan(location)?;

        info!(
            location = %location,
            splits = splits.len(),
            concurrency = self.config.max_concurrent_splits,
            "Starting load"
        );

        // Cancelled on every exit so read-ahead workers stop with the run
        let run_token = self.cancel.child_token();
        let result = self.drive(splits, sink, &run_token).await;
        run_token.cancel();
        let summary = result?;

        sink.finish().context("Failed to flush output")?;

        if self.cancel.is_cancelled() {
            return Err(LoaderError::from(ExecException::interrupted()).into());
        }

        info!(
            splits = summary.splits,
            failed = summary.failed_splits,
            tuples = summary.tuples,
            skipped = summary.skipped,
            "Load complete"
        );
        Ok(summary)
    }

    async fn drive(
        &self,
        splits: Vec<InputSplit>,
        sink: &mut dyn TupleSink,
        token: &CancellationToken,
    ) -> Result<RunSummary> {
        let format = self.loader().input_format();
        let concurrency = self.config.max_concurrent_splits.max(1);
        let mut summary = RunSummary {
            splits: splits.len(),
            ..RunSummary::default()
        };

        let mut queued = splits.into_iter();
        let mut running: VecDeque<RunningSplit> = VecDeque::with_capacity(concurrency);

        loop {
            while running.len() < concurrency {
                let Some(split) = queued.next() else { break };
                running.push_back(start_split(format, split, token.clone()));
            }
            let Some(RunningSplit {
                split,
                mut tuples,
                worker,
            }) = running.pop_front()
            else {
                break;
            };

            while let Some(tuple) = tuples.recv().await {
                sink.write(&tuple).context("Failed to write tuple")?;
            }
            let outcome = worker.await.context("Split worker panicked")?;
            summary.absorb(outcome.stats);

            match outcome.result {
                Ok(()) => {},
                Err(err) if self.config.fail_fast => {
                    return Err(err).with_context(|| format!("Split {split} failed"));
                },
                Err(err) => {
                    warn!(split = %split, error = %err, "Split failed; continuing");
                    summary.failed_splits += 1;
                },
            }
        }

        Ok(summary)
    }
}

fn start_split(
    format: SequenceInputFormat,
    split: InputSplit,
    cancel: CancellationToken,
) -> RunningSplit {
    let (tx, rx) = mpsc::channel(SPLIT_CHANNEL_CAPACITY);
    let worker = {
        let split = split.clone();
        tokio::task::spawn_blocking(move || read_split(format, split, cancel, tx))
    };
    RunningSplit {
        split,
        tuples: rx,
        worker,
    }
}

/// Read one split to completion on the current (blocking) thread
fn read_split(
    format: SequenceInputFormat,
    split: InputSplit,
    cancel: CancellationToken,
    tx: mpsc::Sender<Tuple>,
) -> SplitOutcome {
    let span = info_span!("split", path = %split.path.display(), start = split.start);
    let _entered = span.enter();

    let reader = match format.open(&split, cancel) {
        Ok(reader) => reader,
        Err(err) => {
            return SplitOutcome {
                stats: ProjectionStats::default(),
                result: Err(LoaderError::from(err)),
            }
        },
    };

    let mut loader = MetadataLoader::new(DefaultTupleFactory);
    loader.prepare_to_read(reader, &split);

    let result = loop {
        match loader.get_next() {
            Ok(Some(tuple)) => {
                // Receiver gone: the run was abandoned
                if tx.blocking_send(tuple).is_err() {
                    break Ok(());
                }
            },
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        }
    };

    let stats = loader.stats();
    info!(tuples = stats.tuples, skipped = stats.skipped, "Split done");
    SplitOutcome { stats, result }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::{ParseData, Record};
    use std::io::Write;
    use std::path::Path;

    fn write_pages(path: &Path, count: usize) -> InputSplit {
        let mut file = std::fs::File::create(path).unwrap();
        for i in 0..count {
            let meta = [("url", format!("u{i}"))].into_iter().collect();
            let record = Record::new(format!("u{i}"), ParseData::new(None, meta));
            writeln!(file, "{}", serde_json::to_string(&record).unwrap()).unwrap();
        }
        InputSplit::whole_file(path, std::fs::metadata(path).unwrap().len())
    }

    #[tokio::test]
    async fn test_worker_stops_when_writer_goes_away() {
        let dir = tempfile::tempdir().unwrap();
        let split = write_pages(&dir.path().join("data"), 100);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let outcome = tokio::task::spawn_blocking(move || {
            read_split(SequenceInputFormat::default(), split, CancellationToken::new(), tx)
        })
        .await
        .unwrap();

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.stats.tuples, 1);
    }

    #[tokio::test]
    async fn test_worker_stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let split = write_pages(&dir.path().join("data"), 100);

        let token = CancellationToken::new();
        token.cancel();
        let running = start_split(SequenceInputFormat::default(), split, token);
        let outcome = running.worker.await.unwrap();

        assert_eq!(outcome.stats.records, 0);
        assert_eq!(outcome.result.unwrap_err().code(), Some(6018));
    }

    #[tokio::test]
    async fn test_split_larger_than_channel_streams_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let count = SPLIT_CHANNEL_CAPACITY * 3 + 7;
        let split = write_pages(&dir.path().join("data"), count);

        let mut running = start_split(SequenceInputFormat::default(), split, CancellationToken::new());
        let mut urls = Vec::new();
        while let Some(tuple) = running.tuples.recv().await {
            urls.push(tuple.url);
        }
        let outcome = running.worker.await.unwrap();

        assert!(outcome.result.is_ok());
        assert_eq!(urls.len(), count);
        assert!(urls.iter().enumerate().all(|(i, u)| *u == format!("u{i}")));
    }
}
