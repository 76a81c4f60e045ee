//! Entistream CLI
//!
//! Command-line tools for entity streams.
//!
//! # Commands
//!
//! - `entities` - Read the current entities of a dataset
//! - `changes` - Read the change log of a dataset
//! - `decode` - Decode a stream from a file or stdin

mod commands;

use clap::{Args, Parser, Subcommand};
use commands::decode::{self, SummaryFormat};
use commands::read::{self, ReadArgs};
use commands::OutputOptions;
use entistream_sync::{CancellationToken, DatasetKind};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Entistream command-line tools.
#[derive(Parser)]
#[command(name = "entistream")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(global = true, short, long, env = "ENTISTREAM_SERVER")]
    server: Option<String>,

    /// Bearer token for the server
    #[arg(global = true, long, env = "ENTISTREAM_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments shared by the dataset reads.
#[derive(Args)]
struct DatasetArgs {
    /// Dataset name
    dataset: String,

    /// Continuation token to resume from
    #[arg(long)]
    since: Option<String>,

    /// Maximum number of entities to read
    #[arg(short, long)]
    limit: Option<usize>,

    /// Read newest first
    #[arg(short, long)]
    reverse: bool,

    /// Expand compressed ids and keys to full URIs
    #[arg(short, long)]
    expanded: bool,

    /// Output format (raw, pretty)
    #[arg(short, long, default_value = "raw")]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the current entities of a dataset
    Entities(DatasetArgs),

    /// Read the change log of a dataset
    Changes(DatasetArgs),

    /// Decode a stream from a file or stdin
    Decode {
        /// Stream file (stdin when omitted)
        file: Option<PathBuf>,

        /// Expand compressed ids and keys to full URIs
        #[arg(short, long)]
        expanded: bool,

        /// Print a summary instead of the stream
        #[arg(long)]
        summary: bool,

        /// Output format (raw, pretty; text, json with --summary)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Show version information
    Version,
}

/// Token cancelled by the first Ctrl-C or SIGTERM.
///
/// A second signal while the first is still being handled exits at once.
fn interrupt_token() -> io::Result<CancellationToken> {
    let flag = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(signal, 130, Arc::clone(&flag))?;
        signal_hook::flag::register(signal, Arc::clone(&flag))?;
    }
    Ok(CancellationToken::from_flag(flag))
}

fn read_dataset(
    cli_server: Option<String>,
    cli_token: Option<String>,
    kind: DatasetKind,
    args: DatasetArgs,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = OutputOptions::parse(&args.format, args.expanded)?;
    let read_args = ReadArgs {
        server: cli_server,
        token: cli_token,
        dataset: args.dataset,
        since: args.since,
        limit: args.limit,
        reverse: args.reverse,
    };
    let out = BufWriter::new(io::stdout().lock());
    let report = read::run(&read_args, kind, &output, out, cancel)?;
    if report.is_interrupted() {
        warn!(entities = report.entities, "read interrupted");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the stream
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cancel = interrupt_token()?;

    match cli.command {
        Commands::Entities(args) => {
            read_dataset(cli.server, cli.token, DatasetKind::Entities, args, &cancel)?;
        }
        Commands::Changes(args) => {
            read_dataset(cli.server, cli.token, DatasetKind::Changes, args, &cancel)?;
        }
        Commands::Decode {
            file,
            expanded,
            summary,
            format,
        } => {
            let input: Box<dyn io::Read> = match &file {
                Some(path) => Box::new(BufReader::new(File::open(path)?)),
                None => Box::new(io::stdin().lock()),
            };
            let out = BufWriter::new(io::stdout().lock());
            if summary {
                let format = SummaryFormat::parse(format.as_deref().unwrap_or("text"))?;
                decode::summarize(input, format, out, &cancel)?;
            } else {
                let output = OutputOptions::parse(format.as_deref().unwrap_or("raw"), expanded)?;
                decode::run(input, &output, out, &cancel)?;
            }
        }
        Commands::Version => {
            println!("Entistream CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_dataset_reads() {
        let cli = Cli::try_parse_from([
            "entistream",
            "--server",
            "http://localhost:8080",
            "changes",
            "people",
            "--since",
            "t1",
            "--limit",
            "50",
            "--expanded",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://localhost:8080"));
        match cli.command {
            Commands::Changes(args) => {
                assert_eq!(args.dataset, "people");
                assert_eq!(args.since.as_deref(), Some("t1"));
                assert_eq!(args.limit, Some(50));
                assert!(args.expanded);
                assert_eq!(args.format, "raw");
            }
            _ => panic!("expected changes"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn termination_signal_cancels_the_token() {
        let cancel = interrupt_token().unwrap();
        assert!(!cancel.is_cancelled());
        signal_hook::low_level::raise(SIGTERM).unwrap();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn parses_decode() {
        let cli = Cli::try_parse_from(["entistream", "decode", "--summary", "-f", "json"]).unwrap();
        match cli.command {
            Commands::Decode {
                file,
                summary,
                format,
                ..
            } => {
                assert!(file.is_none());
                assert!(summary);
                assert_eq!(format.as_deref(), Some("json"));
            }
            _ => panic!("expected decode"),
        }
    }
}
