//! Scripted sources, recording sinks and fake HTTP clients.

use entistream_codec::Entity;
use entistream_sync::{
    BatchFn, CancellationToken, HttpClient, HttpResponse, Sink, Source, SyncError, SyncResult,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

/// One scripted physical read.
#[derive(Debug, Clone)]
pub enum ScriptedRead {
    /// Deliver these groups, then finish.
    Groups(Vec<Vec<Entity>>),
    /// Deliver these groups, then fail with a source error.
    GroupsThenFail(Vec<Vec<Entity>>, String),
}

/// Source that replays a script of reads.
///
/// Reads past the end of the script deliver nothing. The `since` and
/// batch size of every read are recorded.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: VecDeque<ScriptedRead>,
    /// `since` of each read, in order.
    pub sinces: Vec<Option<String>>,
    /// Batch size of each read, in order.
    pub batch_sizes: Vec<usize>,
    cancel_after: Option<(usize, CancellationToken)>,
    groups_delivered: usize,
}

impl ScriptedSource {
    /// Creates a source from a script.
    pub fn new(script: impl IntoIterator<Item = ScriptedRead>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Creates a source where each read delivers one group.
    pub fn single_groups(groups: impl IntoIterator<Item = Vec<Entity>>) -> Self {
        Self::new(groups.into_iter().map(|g| ScriptedRead::Groups(vec![g])))
    }

    /// Cancels `token` right after the `n`th group (1-based) is delivered.
    pub fn cancel_after_groups(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    /// Number of reads performed.
    pub fn reads(&self) -> usize {
        self.sinces.len()
    }

    fn deliver(&mut self, groups: Vec<Vec<Entity>>, on_batch: &mut BatchFn<'_>) -> SyncResult<()> {
        for group in groups {
            on_batch(group)?;
            self.groups_delivered += 1;
            if let Some((n, token)) = &self.cancel_after {
                if self.groups_delivered >= *n {
                    token.cancel();
                }
            }
        }
        Ok(())
    }
}

impl Source for ScriptedSource {
    fn read_entities(
        &mut self,
        since: Option<&str>,
        batch_size: usize,
        _cancel: &CancellationToken,
        on_batch: &mut BatchFn<'_>,
    ) -> SyncResult<()> {
        self.sinces.push(since.map(str::to_string));
        self.batch_sizes.push(batch_size);
        match self.script.pop_front() {
            None => Ok(()),
            Some(ScriptedRead::Groups(groups)) => self.deliver(groups, on_batch),
            Some(ScriptedRead::GroupsThenFail(groups, message)) => {
                self.deliver(groups, on_batch)?;
                Err(SyncError::source_error(message))
            }
        }
    }
}

/// A page of `content` entities with optional sentinels.
pub fn page(prefix: &str, content: usize, context: bool, continuation: Option<&str>) -> Vec<Entity> {
    let mut group = Vec::with_capacity(content + 2);
    if context {
        group.push(Entity::context([("people", crate::fixtures::PEOPLE)]));
    }
    group.extend((0..content).map(|i| Entity::new(format!("people:{prefix}{i}"))));
    if let Some(token) = continuation {
        group.push(Entity::continuation(token));
    }
    group
}

/// Calls observed by a [`RecordingSink`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkLog {
    /// Number of `start` calls.
    pub starts: usize,
    /// Number of `end` calls.
    pub ends: usize,
    /// Sizes of the groups received.
    pub batches: Vec<usize>,
    /// Every entity received, sentinels included.
    pub entities: Vec<Entity>,
}

impl SinkLog {
    /// Content entities received.
    pub fn content(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.is_content())
    }
}

/// Sink recording every call into a shared log.
///
/// Clones share the log, so a test can keep a handle while the pipeline
/// owns the sink.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    fail_on_batch: Option<usize>,
    fail_on_end: bool,
}

impl RecordingSink {
    /// Creates a sink with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails `process_entities` on the `n`th batch (1-based).
    pub fn failing_on_batch(mut self, n: usize) -> Self {
        self.fail_on_batch = Some(n);
        self
    }

    /// Fails `end`.
    pub fn failing_on_end(mut self) -> Self {
        self.fail_on_end = true;
        self
    }

    /// Snapshot of the log.
    pub fn log(&self) -> SinkLog {
        self.log.lock().clone()
    }
}

impl Sink for RecordingSink {
    fn start(&mut self) -> SyncResult<()> {
        self.log.lock().starts += 1;
        Ok(())
    }

    fn process_entities(&mut self, entities: Vec<Entity>) -> SyncResult<()> {
        let mut log = self.log.lock();
        if self.fail_on_batch == Some(log.batches.len() + 1) {
            return Err(SyncError::sink("scripted batch failure"));
        }
        log.batches.push(entities.len());
        log.entities.extend(entities);
        Ok(())
    }

    fn end(&mut self) -> SyncResult<()> {
        self.log.lock().ends += 1;
        if self.fail_on_end {
            return Err(SyncError::sink("scripted end failure"));
        }
        Ok(())
    }
}

/// Response served by a [`ScriptedClient`].
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Status and complete body.
    Body(u16, String),
    /// 200 with a body that stops after `head` and then stays silent.
    Stall(String),
    /// The connection fails.
    Refused(String),
}

/// HTTP client replaying scripted responses in order.
///
/// Requests past the end of the script get a 404.
#[derive(Debug, Clone, Default)]
pub struct ScriptedClient {
    responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl ScriptedClient {
    /// Creates a client from a script.
    pub fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            requests: Arc::default(),
        }
    }

    /// Creates a client serving 200 responses with the given bodies.
    pub fn pages(bodies: impl IntoIterator<Item = String>) -> Self {
        Self::new(bodies.into_iter().map(|b| ScriptedResponse::Body(200, b)))
    }

    /// URLs and bearer tokens of the requests so far.
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().clone()
    }
}

impl HttpClient for ScriptedClient {
    fn get(&self, url: &str, bearer: Option<&str>) -> SyncResult<HttpResponse> {
        self.requests
            .lock()
            .push((url.to_string(), bearer.map(str::to_string)));
        match self.responses.lock().pop_front() {
            Some(ScriptedResponse::Body(status, body)) => {
                Ok(HttpResponse::new(status, Cursor::new(body.into_bytes())))
            }
            Some(ScriptedResponse::Stall(head)) => Ok(HttpResponse::new(200, StallingBody::new(head))),
            Some(ScriptedResponse::Refused(message)) => Err(SyncError::connection(message)),
            None => Ok(HttpResponse::new(404, io::empty())),
        }
    }
}

/// Body that yields its head and then blocks for a long time.
#[derive(Debug)]
pub struct StallingBody {
    head: Cursor<Vec<u8>>,
    stall: Duration,
}

impl StallingBody {
    /// Creates a body that stalls for 30 seconds after `head`.
    pub fn new(head: impl Into<Vec<u8>>) -> Self {
        Self {
            head: Cursor::new(head.into()),
            stall: Duration::from_secs(30),
        }
    }
}

impl Read for StallingBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.head.read(buf)?;
        if n == 0 {
            std::thread::sleep(self.stall);
        }
        Ok(n)
    }
}
