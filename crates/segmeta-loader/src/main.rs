//! segmeta - load crawl segment page metadata as tuples

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use segmeta_common::logging::{init_logging, LogConfig, LogLevel};
use segmeta_loader::output::sink_for;
use segmeta_loader::{LoaderConfig, LocalRunner, OutputFormat, Schema};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "segmeta")]
#[command(author, version, about = "Load per-page metadata from crawl segments")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load tuples from every parse_data location matching LOCATION
    Load {
        /// Path to parse_data directories; may contain wildcards
        location: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: tsv or jsonl
        #[arg(short, long, env = "SEGMETA_OUTPUT_FORMAT")]
        format: Option<OutputFormat>,

        /// Write a header row (tsv only)
        #[arg(long)]
        header: bool,

        /// Maximum number of splits read at once
        #[arg(short, long, env = "SEGMETA_MAX_CONCURRENT_SPLITS")]
        concurrency: Option<usize>,

        /// Maximum bytes per split
        #[arg(long, env = "SEGMETA_SPLIT_BYTES")]
        split_bytes: Option<u64>,

        /// Keep going when a split fails
        #[arg(long)]
        keep_going: bool,
    },

    /// Print the output schema
    Schema,

    /// List the splits LOCATION expands to
    Splits {
        /// Path to parse_data directories; may contain wildcards
        location: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    // Environment variables take precedence
    let log_config = LogConfig::with_level(level);
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI still works if a subscriber is already installed
    let guard = init_logging(&log_config).ok();

    let code = match execute(cli.command).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e:#}");
            1
        },
    };

    drop(guard);
    process::exit(code);
}

async fn execute(command: Command) -> Result<()> {
    match command {
        Command::Load {
            location,
            output,
            format,
            header,
            concurrency,
            split_bytes,
            keep_going,
        } => {
            let mut config = LoaderConfig::from_env()?;
            if let Some(format) = format {
                config.output_format = format;
            }
            if let Some(n) = concurrency {
                config.max_concurrent_splits = n.max(1);
            }
            if let Some(bytes) = split_bytes {
                config.split_bytes = bytes.max(1);
            }
            config.include_header |= header;
            config.fail_fast &= !keep_going;

            load(&location, output, config).await
        },
        Command::Schema => {
            println!("{}", Schema::page_metadata());
            Ok(())
        },
        Command::Splits { location } => {
            let runner = LocalRunner::new(LoaderConfig::from_env()?);
            let mut stdout = std::io::stdout().lock();
            for split in runner.plan(&location)? {
                writeln!(stdout, "{split}")?;
            }
            Ok(())
        },
    }
}

async fn load(location: &str, output: Option<PathBuf>, config: LoaderConfig) -> Result<()> {
    let schema = Schema::page_metadata();
    let mut sink = match &output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            sink_for(config.output_format, BufWriter::new(file), config.include_header, &schema)?
        },
        None => sink_for(
            config.output_format,
            std::io::stdout(),
            config.include_header,
            &schema,
        )?,
    };

    let runner = LocalRunner::new(config);
    let cancel = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling split reads");
            cancel.cancel();
        }
    });

    let summary = runner.run(location, sink.as_mut()).await?;
    info!(
        tuples = summary.tuples,
        failed_splits = summary.failed_splits,
        "Wrote tuples"
    );
    Ok(())
}
