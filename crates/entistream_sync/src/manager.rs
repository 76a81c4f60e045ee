//! Reading dataset entities and changes from a server.

use crate::cancel::CancellationToken;
use crate::config::{HttpSourceConfig, PipelineConfig, DEFAULT_BATCH_SIZE};
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpSource, ReqwestClient};
use crate::pipeline::{Pipeline, SyncReport};
use crate::sink::Sink;
use reqwest::Url;
use std::fmt;
use tracing::info;

/// Which view of a dataset to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// Current state of every entity.
    Entities,
    /// Change log, one entry per recorded change.
    Changes,
}

impl DatasetKind {
    /// Path segment of the view.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Entities => "entities",
            DatasetKind::Changes => "changes",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for one dataset read.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Position to start from.
    pub since: Option<String>,
    /// Maximum number of entities, `None` (or zero) for all.
    pub limit: Option<usize>,
    /// Newest first.
    pub reverse: bool,
}

impl ReadOptions {
    /// Creates options reading everything from the start.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the start position.
    pub fn with_since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }

    /// Sets the limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reads newest first.
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Entities requested per page.
    pub fn page_size(&self) -> usize {
        self.limit
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_BATCH_SIZE)
            .min(DEFAULT_BATCH_SIZE)
    }

    /// Entities to read before stopping. A zero limit reads everything.
    pub fn max_entities(&self) -> usize {
        self.limit.filter(|n| *n > 0).unwrap_or(usize::MAX)
    }
}

/// Reads datasets from a server through a sync pipeline.
#[derive(Debug, Clone)]
pub struct EntityManager {
    server: String,
    token: Option<String>,
    template: HttpSourceConfig,
}

impl EntityManager {
    /// Creates a manager for a server base URL.
    pub fn new(server: impl Into<String>) -> Self {
        let server = server.into();
        Self {
            template: HttpSourceConfig::new(server.clone()).with_since_param("from"),
            server,
            token: None,
        }
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Overrides timeouts and other source settings. The endpoint, token
    /// and since parameter of `config` are ignored.
    pub fn with_source_config(mut self, config: HttpSourceConfig) -> Self {
        self.template = config.with_since_param("from");
        self
    }

    /// Returns the server base URL.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// URL of a dataset view.
    pub fn dataset_url(
        &self,
        dataset: &str,
        kind: DatasetKind,
        options: &ReadOptions,
    ) -> SyncResult<String> {
        let invalid = || SyncError::source_error(format!("invalid server url '{}'", self.server));
        let mut url = Url::parse(&self.server).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["datasets", dataset, kind.as_str()]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &options.page_size().to_string());
            if options.reverse {
                query.append_pair("reverse", "true");
            }
        }
        Ok(url.into())
    }

    /// Source config for a dataset view.
    pub fn source_config(
        &self,
        dataset: &str,
        kind: DatasetKind,
        options: &ReadOptions,
    ) -> SyncResult<HttpSourceConfig> {
        let mut config = self.template.clone();
        config.endpoint = self.dataset_url(dataset, kind, options)?;
        config.token = self.token.clone();
        Ok(config)
    }

    /// Reads a dataset view into `sink` with a `reqwest` client.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::sync`].
    pub fn read<K: Sink>(
        &self,
        dataset: &str,
        kind: DatasetKind,
        options: &ReadOptions,
        sink: K,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncReport> {
        let config = self.source_config(dataset, kind, options)?;
        let client = ReqwestClient::new(&config)?;
        self.read_with(client, dataset, kind, options, sink, cancel)
    }

    /// Reads a dataset view into `sink` with the given client.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::sync`].
    pub fn read_with<C: HttpClient, K: Sink>(
        &self,
        client: C,
        dataset: &str,
        kind: DatasetKind,
        options: &ReadOptions,
        sink: K,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncReport> {
        let config = self.source_config(dataset, kind, options)?;
        info!(dataset, %kind, url = %config.endpoint, "reading dataset");

        let source = HttpSource::with_client(config, client);
        let pipeline_config = PipelineConfig::new().with_batch_size(options.page_size());
        let mut pipeline = Pipeline::with_config(source, sink, pipeline_config);
        pipeline.sync(
            cancel,
            options.since.as_deref(),
            options.max_entities(),
        )
    }
}
