//! Entity sinks.

use crate::error::{SyncError, SyncResult};
use entistream_codec::{Entity, Expander};
use std::io::Write;

/// A consumer of entity batches.
///
/// The pipeline calls [`Sink::start`] once, [`Sink::process_entities`]
/// for every group a source delivers, and [`Sink::end`] exactly once
/// when the sync stops for any reason.
pub trait Sink {
    /// Called before the first batch.
    fn start(&mut self) -> SyncResult<()> {
        Ok(())
    }

    /// Consumes one group, which may include the sentinel entities.
    fn process_entities(&mut self, entities: Vec<Entity>) -> SyncResult<()>;

    /// Called once after the last batch.
    fn end(&mut self) -> SyncResult<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn start(&mut self) -> SyncResult<()> {
        (**self).start()
    }

    fn process_entities(&mut self, entities: Vec<Entity>) -> SyncResult<()> {
        (**self).process_entities(entities)
    }

    fn end(&mut self) -> SyncResult<()> {
        (**self).end()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn start(&mut self) -> SyncResult<()> {
        (**self).start()
    }

    fn process_entities(&mut self, entities: Vec<Entity>) -> SyncResult<()> {
        (**self).process_entities(entities)
    }

    fn end(&mut self) -> SyncResult<()> {
        (**self).end()
    }
}

/// Collects everything it receives in memory.
///
/// Content entities accumulate across batches and reads; the latest
/// context and the last read's continuation token are kept apart.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    context: Option<Entity>,
    entities: Vec<Entity>,
    continuation: Option<String>,
    batches: usize,
}

impl CollectorSink {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent context entity.
    pub fn context(&self) -> Option<&Entity> {
        self.context.as_ref()
    }

    /// Content entities in arrival order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// The most recent continuation token.
    pub fn continuation_token(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    /// Number of groups received.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Consumes the collector, returning its content entities.
    pub fn into_entities(self) -> Vec<Entity> {
        self.entities
    }
}

impl Sink for CollectorSink {
    fn process_entities(&mut self, entities: Vec<Entity>) -> SyncResult<()> {
        self.batches += 1;
        for entity in entities {
            if entity.is_context() {
                // Each read opens with a context; an earlier read's token is stale.
                self.context = Some(entity);
                self.continuation = None;
            } else if entity.is_continuation() {
                self.continuation = entity.continuation_token().map(str::to_string);
            } else {
                self.entities.push(entity);
            }
        }
        Ok(())
    }
}

/// Output layout of a [`JsonSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// One line, no whitespace.
    #[default]
    Compact,
    /// Indented, one entity per block.
    Pretty,
}

/// Writes the received stream back out in the wire format.
///
/// Only the first context is written, and the continuation is held back
/// until [`Sink::end`], so the output of a multi-read sync is a single
/// well-formed stream. The continuation written is the one from the last
/// read, if that read carried one.
pub struct JsonSink<W: Write> {
    writer: W,
    format: JsonFormat,
    written: usize,
    wrote_context: bool,
    continuation: Option<Entity>,
}

impl<W: Write> JsonSink<W> {
    /// Creates a compact sink.
    pub fn new(writer: W) -> Self {
        Self::with_format(writer, JsonFormat::Compact)
    }

    /// Creates a sink with the given layout.
    pub fn with_format(writer: W, format: JsonFormat) -> Self {
        Self {
            writer,
            format,
            written: 0,
            wrote_context: false,
            continuation: None,
        }
    }

    /// Number of entities written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_entity(&mut self, entity: &Entity) -> SyncResult<()> {
        if self.written > 0 {
            self.writer.write_all(b",")?;
        }
        let result = match self.format {
            JsonFormat::Compact => serde_json::to_writer(&mut self.writer, entity),
            JsonFormat::Pretty => {
                self.writer.write_all(b"\n")?;
                serde_json::to_writer_pretty(&mut self.writer, entity)
            }
        };
        result.map_err(|e| SyncError::Io(e.into()))?;
        self.written += 1;
        Ok(())
    }
}

impl<W: Write> Sink for JsonSink<W> {
    fn start(&mut self) -> SyncResult<()> {
        self.writer.write_all(b"[")?;
        Ok(())
    }

    fn process_entities(&mut self, entities: Vec<Entity>) -> SyncResult<()> {
        for entity in entities {
            if entity.is_continuation() {
                self.continuation = Some(entity);
                continue;
            }
            if entity.is_context() {
                self.continuation = None;
                if self.wrote_context {
                    continue;
                }
                self.wrote_context = true;
            }
            self.write_entity(&entity)?;
        }
        Ok(())
    }

    fn end(&mut self) -> SyncResult<()> {
        if let Some(continuation) = self.continuation.take() {
            self.write_entity(&continuation)?;
        }
        if self.format == JsonFormat::Pretty {
            self.writer.write_all(b"\n")?;
        }
        self.writer.write_all(b"]\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Expands prefixed identifiers to full URIs before forwarding.
///
/// The namespace table comes from the most recent context entity seen,
/// across batch boundaries. Entities arriving before any context are
/// forwarded unchanged.
pub struct ExpandingSink<S> {
    inner: S,
    expander: Option<Expander>,
}

impl<S: Sink> ExpandingSink<S> {
    /// Wraps a sink.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            expander: None,
        }
    }

    /// Returns the wrapped sink.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwraps the sink.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Sink> Sink for ExpandingSink<S> {
    fn start(&mut self) -> SyncResult<()> {
        self.inner.start()
    }

    fn process_entities(&mut self, mut entities: Vec<Entity>) -> SyncResult<()> {
        for entity in &mut entities {
            if entity.is_context() {
                self.expander = Expander::from_context(entity);
            } else if let Some(expander) = &self.expander {
                expander.expand_entity(entity);
            }
        }
        self.inner.process_entities(entities)
    }

    fn end(&mut self) -> SyncResult<()> {
        self.inner.end()
    }
}
