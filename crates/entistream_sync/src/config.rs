//! Configuration for sources and the sync pipeline.

use std::time::Duration;

/// Batch size used when a non-positive batch size is requested.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Configuration for an HTTP-backed source.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Endpoint URL, possibly with its own query string.
    pub endpoint: String,
    /// Bearer token sent in the `Authorization` header.
    pub token: Option<String>,
    /// Name of the query parameter carrying the since token.
    pub since_param: String,
    /// Maximum silence between two decoded entities.
    pub idle_timeout: Duration,
    /// Deadline for a whole read, counted from connection start.
    pub overall_timeout: Duration,
    /// Connection and TLS handshake timeout.
    pub connect_timeout: Duration,
    /// Capacity of the body pump channel, in chunks.
    pub pump_capacity: usize,
}

impl HttpSourceConfig {
    /// Creates a configuration for an endpoint with default timeouts.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            since_param: "since".to_string(),
            idle_timeout: Duration::from_secs(2),
            overall_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pump_capacity: 16,
        }
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the since query parameter name.
    pub fn with_since_param(mut self, name: impl Into<String>) -> Self {
        self.since_param = name.into();
        self
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the overall read deadline.
    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the body pump channel capacity.
    pub fn with_pump_capacity(mut self, capacity: usize) -> Self {
        self.pump_capacity = capacity.max(1);
        self
    }
}

/// Configuration for a [`Pipeline`](crate::Pipeline) run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Entities requested per read; `None` uses the limit.
    pub batch_size: Option<usize>,
    /// Upper bound on the number of reads, `None` for unbounded.
    pub max_reads: Option<usize>,
}

impl PipelineConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Caps the number of reads per sync.
    pub fn with_max_reads(mut self, reads: usize) -> Self {
        self.max_reads = Some(reads);
        self
    }

    /// Batch size to use for a sync with the given limit.
    pub fn effective_batch_size(&self, limit: usize) -> usize {
        match self.batch_size {
            Some(size) if size > 0 => size,
            _ if limit > 0 => limit,
            _ => DEFAULT_BATCH_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_source_defaults() {
        let config = HttpSourceConfig::new("http://localhost:8080/datasets/people/changes");
        assert_eq!(config.since_param, "since");
        assert_eq!(config.idle_timeout, Duration::from_secs(2));
        assert_eq!(config.overall_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.token.is_none());
    }

    #[test]
    fn http_source_builder() {
        let config = HttpSourceConfig::new("http://x")
            .with_token("secret")
            .with_since_param("from")
            .with_idle_timeout(Duration::from_millis(50))
            .with_pump_capacity(0);
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.since_param, "from");
        assert_eq!(config.idle_timeout, Duration::from_millis(50));
        assert_eq!(config.pump_capacity, 1);
    }

    #[test]
    fn batch_size_falls_back_to_limit() {
        assert_eq!(PipelineConfig::new().effective_batch_size(25), 25);
        assert_eq!(PipelineConfig::new().with_batch_size(10).effective_batch_size(25), 10);
        assert_eq!(PipelineConfig::new().with_batch_size(0).effective_batch_size(25), 25);
        assert_eq!(PipelineConfig::new().effective_batch_size(0), DEFAULT_BATCH_SIZE);
    }
}
