//! Dataset read command implementation.

use super::{CliError, CliResult, OutputOptions};
use entistream_sync::{CancellationToken, DatasetKind, EntityManager, ReadOptions, SyncReport};
use std::io::Write;
use tracing::info;

/// Arguments of an `entities` or `changes` read.
#[derive(Debug, Clone)]
pub struct ReadArgs {
    /// Server base URL.
    pub server: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
    /// Dataset name.
    pub dataset: String,
    /// Continuation token to resume from.
    pub since: Option<String>,
    /// Maximum number of entities to read.
    pub limit: Option<usize>,
    /// Read newest first.
    pub reverse: bool,
}

impl ReadArgs {
    fn read_options(&self) -> ReadOptions {
        let mut options = ReadOptions::new();
        if let Some(since) = &self.since {
            options = options.with_since(since.clone());
        }
        if let Some(limit) = self.limit {
            options = options.with_limit(limit);
        }
        if self.reverse {
            options = options.reversed();
        }
        options
    }

    fn manager(&self) -> CliResult<EntityManager> {
        let server = self.server.as_deref().ok_or(CliError::MissingServer)?;
        let mut manager = EntityManager::new(server);
        if let Some(token) = &self.token {
            manager = manager.with_token(token.clone());
        }
        Ok(manager)
    }
}

/// Runs a dataset read, writing the stream to `out`.
pub fn run<W: Write>(
    args: &ReadArgs,
    kind: DatasetKind,
    output: &OutputOptions,
    out: W,
    cancel: &CancellationToken,
) -> CliResult<SyncReport> {
    let manager = args.manager()?;
    let report = manager.read(
        &args.dataset,
        kind,
        &args.read_options(),
        output.sink(out),
        cancel,
    )?;

    info!(
        dataset = %args.dataset,
        %kind,
        entities = report.entities,
        reads = report.reads,
        continuation = report.continuation.as_deref().unwrap_or(""),
        "read finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ReadArgs {
        ReadArgs {
            server: Some("http://localhost:8080".into()),
            token: None,
            dataset: "people".into(),
            since: Some("t1".into()),
            limit: Some(20),
            reverse: true,
        }
    }

    #[test]
    fn builds_read_options() {
        let options = args().read_options();
        assert_eq!(options.since.as_deref(), Some("t1"));
        assert_eq!(options.limit, Some(20));
        assert!(options.reverse);
    }

    #[test]
    fn server_is_required() {
        let args = ReadArgs {
            server: None,
            ..args()
        };
        let output = OutputOptions::parse("raw", false).unwrap();
        let cancel = CancellationToken::new();
        let err = run(&args, DatasetKind::Entities, &output, Vec::new(), &cancel).unwrap_err();
        assert!(matches!(err, CliError::MissingServer));
    }
}
