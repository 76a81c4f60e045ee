//! HTTP-backed entity source.
//!
//! The HTTP client is abstracted via a trait so tests can serve canned or
//! stalling bodies without a network. [`ReqwestClient`] is the default,
//! built on the blocking `reqwest` client.

use crate::cancel::CancellationToken;
use crate::config::HttpSourceConfig;
use crate::error::{SyncError, SyncResult, TransportError};
use crate::source::{decode_batched, BatchFn, EntityBatcher, Source};
use crate::watchdog::Watchdog;
use reqwest::Url;
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;
use tracing::{debug, warn};

/// How often a blocked body read re-checks its cancellation tokens.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

const CHUNK_SIZE: usize = 8 * 1024;

/// A response whose body has not been read yet.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request and returns once the status line has arrived.
    fn get(&self, url: &str, bearer: Option<&str>) -> SyncResult<HttpResponse>;
}

/// Blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client with the connect and overall timeouts of `config`.
    pub fn new(config: &HttpSourceConfig) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.overall_timeout)
            .build()
            .map_err(|e| SyncError::connection(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, bearer: Option<&str>) -> SyncResult<HttpResponse> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| SyncError::connection(e.to_string()))?;
        Ok(HttpResponse::new(response.status().as_u16(), response))
    }
}

/// Source reading one stream per HTTP GET.
pub struct HttpSource<C = ReqwestClient> {
    config: HttpSourceConfig,
    client: C,
}

impl HttpSource<ReqwestClient> {
    /// Creates a source using a `reqwest` client.
    pub fn new(config: HttpSourceConfig) -> SyncResult<Self> {
        let client = ReqwestClient::new(&config)?;
        Ok(Self::with_client(config, client))
    }
}

impl<C: HttpClient> HttpSource<C> {
    /// Creates a source using the given client.
    pub fn with_client(config: HttpSourceConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    /// Returns the client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// URL for a read starting at `since`.
    pub fn request_url(&self, since: Option<&str>) -> SyncResult<String> {
        let mut url = Url::parse(&self.config.endpoint).map_err(|e| {
            SyncError::source_error(format!("invalid endpoint '{}': {e}", self.config.endpoint))
        })?;
        if let Some(since) = since.filter(|s| !s.is_empty()) {
            url.query_pairs_mut()
                .append_pair(&self.config.since_param, since);
        }
        Ok(url.into())
    }
}

impl<C: HttpClient> Source for HttpSource<C> {
    fn read_entities(
        &mut self,
        since: Option<&str>,
        batch_size: usize,
        cancel: &CancellationToken,
        on_batch: &mut BatchFn<'_>,
    ) -> SyncResult<()> {
        if cancel.is_cancelled() {
            return Err(SyncError::Interrupted);
        }

        let url = self.request_url(since)?;
        debug!(url = %url, batch_size, "reading entities");

        let watchdog = Watchdog::start(self.config.idle_timeout, self.config.overall_timeout)?;
        let response = self.client.get(&url, self.config.token.as_deref())?;
        if let Some(err) = TransportError::from_status(response.status) {
            warn!(url = %url, status = response.status, "entity read rejected");
            return Err(err.into());
        }

        let body = WatchedReader::spawn(
            response.body,
            self.config.pump_capacity,
            vec![watchdog.token().clone(), cancel.clone()],
        )?;

        let mut batcher = EntityBatcher::new(batch_size);
        match decode_batched(body, &mut batcher, on_batch, || watchdog.reset()) {
            Ok(count) => {
                debug!(url = %url, entities = count, "read complete");
                Ok(())
            }
            Err(SyncError::Codec(err)) => {
                if let Some(kind) = watchdog.fired() {
                    batcher.flush(on_batch)?;
                    return Err(SyncError::Timeout(kind));
                }
                if cancel.is_cancelled() {
                    return Err(SyncError::Interrupted);
                }
                Err(SyncError::Codec(err))
            }
            Err(err) => Err(err),
        }
    }
}

/// Body reader that gives up once any of its tokens is cancelled.
///
/// A pump thread copies the underlying body into a bounded channel, so a
/// connection that has gone silent can be abandoned without waiting for
/// the socket to time out.
pub struct WatchedReader {
    chunks: Receiver<io::Result<Vec<u8>>>,
    buf: Vec<u8>,
    pos: usize,
    done: bool,
    tokens: Vec<CancellationToken>,
}

impl WatchedReader {
    /// Starts pumping `body` on a background thread.
    pub fn spawn(
        body: Box<dyn Read + Send>,
        capacity: usize,
        tokens: Vec<CancellationToken>,
    ) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        std::thread::Builder::new()
            .name("entistream-body-pump".to_string())
            .spawn(move || pump(body, &tx))?;
        Ok(Self {
            chunks: rx,
            buf: Vec::new(),
            pos: 0,
            done: false,
            tokens,
        })
    }

    fn aborted(&self) -> bool {
        self.tokens.iter().any(CancellationToken::is_cancelled)
    }
}

fn pump(mut body: Box<dyn Read + Send>, tx: &SyncSender<io::Result<Vec<u8>>>) {
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        match body.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => {
                if tx.send(Ok(chunk[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

impl Read for WatchedReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.buf.len() {
            if self.done {
                return Ok(0);
            }
            if self.aborted() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "read aborted"));
            }
            match self.chunks.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(chunk)) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.done = true,
            }
        }

        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
