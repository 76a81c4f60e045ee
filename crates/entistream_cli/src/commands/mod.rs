//! CLI command implementations.

pub mod decode;
pub mod read;

use entistream_sync::{ExpandingSink, JsonFormat, JsonSink, Sink, SyncError};
use std::io::Write;
use thiserror::Error;

/// Errors reported by the CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No server was given on the command line or in the environment.
    #[error("server required: pass --server or set ENTISTREAM_SERVER")]
    MissingServer,

    /// The requested output format is not known.
    #[error("unknown format '{format}' (expected {expected})")]
    UnknownFormat {
        /// Format name as given.
        format: String,
        /// Formats accepted in this position.
        expected: &'static str,
    },

    /// A sync failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Writing the output failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    /// Rendering a summary failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Options controlling how a stream is written to the output.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Layout of the written stream.
    pub format: JsonFormat,
    /// Expand compressed ids and keys using the stream's context.
    pub expanded: bool,
}

impl OutputOptions {
    /// Parses a `raw` / `pretty` format name.
    pub fn parse(format: &str, expanded: bool) -> CliResult<Self> {
        let format = match format {
            "raw" | "compact" => JsonFormat::Compact,
            "pretty" => JsonFormat::Pretty,
            other => {
                return Err(CliError::UnknownFormat {
                    format: other.to_string(),
                    expected: "raw or pretty",
                })
            }
        };
        Ok(Self { format, expanded })
    }

    /// Builds the sink writing a stream to `writer`.
    pub fn sink<'a, W: Write + 'a>(&self, writer: W) -> Box<dyn Sink + 'a> {
        let sink = JsonSink::with_format(writer, self.format);
        if self.expanded {
            Box::new(ExpandingSink::new(sink))
        } else {
            Box::new(sink)
        }
    }
}
