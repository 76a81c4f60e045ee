//! Sync pipeline state machine.

use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::error::{SyncError, SyncResult};
use crate::sink::Sink;
use crate::source::Source;
use entistream_codec::Entity;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The current state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// No sync has run yet.
    #[default]
    Idle,
    /// A source read is in progress.
    Reading,
    /// A batch is being handed to the sink.
    Dispatching,
    /// The loop has stopped and the sink is being ended.
    Draining,
    /// The last sync completed.
    Done,
    /// The last sync was cancelled.
    Cancelled,
    /// The last sync failed.
    Failed,
}

impl PipelineState {
    /// Returns true while a sync is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PipelineState::Reading | PipelineState::Dispatching | PipelineState::Draining
        )
    }

    /// Returns true once a sync has finished, however it ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Done | PipelineState::Cancelled | PipelineState::Failed
        )
    }
}

/// How a sync ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The source ran out of data or the limit was reached.
    Completed,
    /// The sync was cancelled.
    Interrupted,
}

/// Result of a sync that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// How the sync ended.
    pub outcome: SyncOutcome,
    /// Content entities delivered to the sink.
    pub entities: usize,
    /// Physical reads performed.
    pub reads: usize,
    /// Continuation token returned by the last read, for resuming later.
    /// `None` once a read ends without one.
    pub continuation: Option<String>,
    /// Wall time of the sync.
    pub duration: Duration,
}

impl SyncReport {
    /// Returns true if the sync was cancelled.
    pub fn is_interrupted(&self) -> bool {
        self.outcome == SyncOutcome::Interrupted
    }
}

/// Drives a [`Source`] into a [`Sink`].
pub struct Pipeline<S, K> {
    source: S,
    sink: K,
    config: PipelineConfig,
    state: PipelineState,
}

impl<S: Source, K: Sink> Pipeline<S, K> {
    /// Creates a pipeline with the default configuration.
    pub fn new(source: S, sink: K) -> Self {
        Self::with_config(source, sink, PipelineConfig::default())
    }

    /// Creates a pipeline with the given configuration.
    pub fn with_config(source: S, sink: K, config: PipelineConfig) -> Self {
        Self {
            source,
            sink,
            config,
            state: PipelineState::Idle,
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Returns the source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the sink.
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Splits the pipeline into its source and sink.
    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }

    /// Reads from the source until `limit` content entities have been
    /// delivered, the data runs out, or `cancel` fires.
    ///
    /// Each read starts at the continuation token of the previous one;
    /// a read without a continuation, or whose last group is short of the
    /// batch size, ends the loop. `Sink::end` runs exactly once after a
    /// successful `Sink::start`.
    ///
    /// # Errors
    ///
    /// Returns the first source, decode, transport, timeout or sink
    /// error. Cancellation is not an error: it yields a report with the
    /// [`SyncOutcome::Interrupted`] outcome.
    pub fn sync(
        &mut self,
        cancel: &CancellationToken,
        since: Option<&str>,
        limit: usize,
    ) -> SyncResult<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport {
            outcome: SyncOutcome::Completed,
            entities: 0,
            reads: 0,
            continuation: None,
            duration: Duration::ZERO,
        };

        if let Err(e) = self.sink.start() {
            self.state = PipelineState::Failed;
            return Err(e);
        }

        let result = self.run(cancel, since, limit, &mut report);

        self.state = PipelineState::Draining;
        let ended = self.sink.end();
        report.duration = started.elapsed();

        let outcome = match result {
            Ok(()) if cancel.is_cancelled() => SyncOutcome::Interrupted,
            Ok(()) => SyncOutcome::Completed,
            Err(SyncError::Interrupted) => SyncOutcome::Interrupted,
            Err(e) => {
                if let Err(end_err) = ended {
                    warn!(error = %end_err, "sink end failed after sync error");
                }
                warn!(error = %e, reads = report.reads, "sync failed");
                self.state = PipelineState::Failed;
                return Err(e);
            }
        };

        if let Err(e) = ended {
            self.state = PipelineState::Failed;
            return Err(e);
        }

        report.outcome = outcome;
        self.state = match outcome {
            SyncOutcome::Completed => PipelineState::Done,
            SyncOutcome::Interrupted => {
                info!(entities = report.entities, "sync interrupted");
                PipelineState::Cancelled
            }
        };
        debug!(
            entities = report.entities,
            reads = report.reads,
            elapsed_ms = report.duration.as_millis() as u64,
            "sync finished"
        );
        Ok(report)
    }

    fn run(
        &mut self,
        cancel: &CancellationToken,
        since: Option<&str>,
        limit: usize,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let batch_size = self.config.effective_batch_size(limit);
        let mut since = since.map(str::to_string);

        loop {
            if report.entities >= limit || cancel.is_cancelled() {
                return Ok(());
            }
            if self.config.max_reads.is_some_and(|max| report.reads >= max) {
                return Ok(());
            }

            let mut continuation: Option<String> = None;
            let mut short = false;
            let sink = &mut self.sink;
            let state = &mut self.state;
            let delivered = &mut report.entities;

            *state = PipelineState::Reading;
            let mut on_batch = |group: Vec<Entity>| -> SyncResult<()> {
                if cancel.is_cancelled() {
                    return Err(SyncError::Interrupted);
                }
                *state = PipelineState::Dispatching;
                let content = group.iter().filter(|e| e.is_content()).count();
                if let Some(token) = group.iter().rev().find_map(Entity::continuation_token) {
                    continuation = Some(token.to_string());
                }
                short = content < batch_size;
                *delivered += content;
                let result = sink.process_entities(group);
                *state = PipelineState::Reading;
                result
            };

            let read = self
                .source
                .read_entities(since.as_deref(), batch_size, cancel, &mut on_batch);
            report.reads += 1;
            read?;

            debug!(
                reads = report.reads,
                entities = report.entities,
                continuation = continuation.as_deref().unwrap_or(""),
                "read finished"
            );

            // Resume from this read's token only; a page without one is the end.
            report.continuation.clone_from(&continuation);
            match continuation {
                Some(token) => since = Some(token),
                None => return Ok(()),
            }
            if short {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectorSink;
    use crate::source::{BatchFn, EntityListSource};

    /// Serves pages of `page` content entities, `pages` times.
    struct PagedSource {
        page: usize,
        pages: usize,
        sinces: Vec<Option<String>>,
    }

    impl PagedSource {
        fn new(page: usize, pages: usize) -> Self {
            Self {
                page,
                pages,
                sinces: Vec::new(),
            }
        }
    }

    impl Source for PagedSource {
        fn read_entities(
            &mut self,
            since: Option<&str>,
            _batch_size: usize,
            _cancel: &CancellationToken,
            on_batch: &mut BatchFn<'_>,
        ) -> SyncResult<()> {
            let n = self.sinces.len();
            self.sinces.push(since.map(str::to_string));
            let mut group = vec![Entity::context([("p", "http://p/")])];
            group.extend((0..self.page).map(|i| Entity::new(format!("p:{n}-{i}"))));
            if n + 1 < self.pages {
                group.push(Entity::continuation(format!("page-{}", n + 1)));
            }
            on_batch(group)
        }
    }

    #[derive(Default)]
    struct CountingSink {
        starts: usize,
        ends: usize,
        entities: usize,
        fail_end: bool,
        fail_process: bool,
    }

    impl Sink for CountingSink {
        fn start(&mut self) -> SyncResult<()> {
            self.starts += 1;
            Ok(())
        }

        fn process_entities(&mut self, entities: Vec<Entity>) -> SyncResult<()> {
            if self.fail_process {
                return Err(SyncError::sink("rejected"));
            }
            self.entities += entities.len();
            Ok(())
        }

        fn end(&mut self) -> SyncResult<()> {
            self.ends += 1;
            if self.fail_end {
                return Err(SyncError::sink("end failed"));
            }
            Ok(())
        }
    }

    #[test]
    fn follows_continuations_until_limit() {
        let config = PipelineConfig::new().with_batch_size(5);
        let mut pipeline =
            Pipeline::with_config(PagedSource::new(5, 10), CollectorSink::new(), config);
        let report = pipeline.sync(&CancellationToken::new(), None, 15).unwrap();
        assert_eq!(report.outcome, SyncOutcome::Completed);
        assert_eq!(report.entities, 15);
        assert_eq!(report.reads, 3);
        assert_eq!(report.continuation.as_deref(), Some("page-3"));
        assert_eq!(pipeline.state(), PipelineState::Done);

        let (source, sink) = pipeline.into_parts();
        assert_eq!(
            source.sinces,
            vec![None, Some("page-1".to_string()), Some("page-2".to_string())]
        );
        assert_eq!(sink.entities().len(), 15);
    }

    #[test]
    fn stops_without_continuation() {
        let config = PipelineConfig::new().with_batch_size(5);
        let mut pipeline =
            Pipeline::with_config(PagedSource::new(5, 2), CollectorSink::new(), config);
        let report = pipeline
            .sync(&CancellationToken::new(), Some("start"), 100)
            .unwrap();
        assert_eq!(report.reads, 2);
        assert_eq!(report.entities, 10);
        assert_eq!(pipeline.source().sinces[0].as_deref(), Some("start"));
    }

    #[test]
    fn last_page_without_token_clears_continuation() {
        let config = PipelineConfig::new().with_batch_size(5);
        let mut pipeline =
            Pipeline::with_config(PagedSource::new(5, 2), CollectorSink::new(), config);
        let report = pipeline.sync(&CancellationToken::new(), None, 100).unwrap();
        assert_eq!(report.reads, 2);
        assert_eq!(report.continuation, None);
        assert_eq!(pipeline.sink().continuation_token(), None);
    }

    #[test]
    fn short_delivery_ends_the_loop() {
        let config = PipelineConfig::new().with_batch_size(10);
        let mut pipeline =
            Pipeline::with_config(PagedSource::new(4, 10), CollectorSink::new(), config);
        let report = pipeline.sync(&CancellationToken::new(), None, 1000).unwrap();
        assert_eq!(report.reads, 1);
        assert_eq!(report.entities, 4);
    }

    #[test]
    fn zero_limit_reads_nothing() {
        let mut pipeline = Pipeline::new(PagedSource::new(5, 10), CountingSink::default());
        let report = pipeline.sync(&CancellationToken::new(), None, 0).unwrap();
        assert_eq!(report.reads, 0);
        assert_eq!(pipeline.sink().starts, 1);
        assert_eq!(pipeline.sink().ends, 1);
    }

    #[test]
    fn max_reads_caps_the_loop() {
        let config = PipelineConfig::new().with_batch_size(5).with_max_reads(2);
        let mut pipeline =
            Pipeline::with_config(PagedSource::new(5, 10), CollectorSink::new(), config);
        let report = pipeline.sync(&CancellationToken::new(), None, 1000).unwrap();
        assert_eq!(report.reads, 2);
    }

    #[test]
    fn cancelled_token_interrupts_and_ends_once() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut pipeline = Pipeline::new(PagedSource::new(5, 10), CountingSink::default());
        let report = pipeline.sync(&cancel, None, 100).unwrap();
        assert!(report.is_interrupted());
        assert_eq!(report.reads, 0);
        assert_eq!(pipeline.sink().ends, 1);
        assert_eq!(pipeline.state(), PipelineState::Cancelled);
    }

    #[test]
    fn sink_errors_fail_the_sync_but_end_runs() {
        let sink = CountingSink {
            fail_process: true,
            ..CountingSink::default()
        };
        let mut pipeline = Pipeline::new(PagedSource::new(5, 10), sink);
        let err = pipeline.sync(&CancellationToken::new(), None, 100).unwrap_err();
        assert!(matches!(err, SyncError::Sink(_)));
        assert_eq!(pipeline.sink().ends, 1);
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[test]
    fn end_error_after_success_is_returned() {
        let sink = CountingSink {
            fail_end: true,
            ..CountingSink::default()
        };
        let mut pipeline = Pipeline::new(EntityListSource::new(vec![Entity::new("p:a")]), sink);
        let err = pipeline.sync(&CancellationToken::new(), None, 100).unwrap_err();
        assert!(matches!(err, SyncError::Sink(ref m) if m == "end failed"));
    }

    #[test]
    fn list_source_is_read_once() {
        let entities = vec![
            Entity::context([("p", "http://p/")]),
            Entity::new("p:a"),
            Entity::new("p:b"),
        ];
        let mut pipeline = Pipeline::new(EntityListSource::new(entities), CollectorSink::new());
        let report = pipeline.sync(&CancellationToken::new(), None, 100).unwrap();
        assert_eq!(report.reads, 1);
        assert_eq!(report.entities, 2);
        assert!(pipeline.sink().context().is_some());
    }

    #[test]
    fn state_predicates() {
        assert!(PipelineState::Reading.is_active());
        assert!(!PipelineState::Idle.is_active());
        assert!(PipelineState::Cancelled.is_terminal());
        assert!(!PipelineState::Draining.is_terminal());
    }
}
