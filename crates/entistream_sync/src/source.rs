//! Entity sources.

use crate::cancel::CancellationToken;
use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::{SyncError, SyncResult};
use entistream_codec::{Entity, EntityStreamParser};
use std::io::Read;
use tracing::debug;

/// Callback receiving one group of decoded entities.
pub type BatchFn<'a> = dyn FnMut(Vec<Entity>) -> SyncResult<()> + 'a;

/// A producer of entity streams.
pub trait Source {
    /// Performs exactly one physical read.
    ///
    /// `on_batch` is called zero or more times with groups of at most
    /// `batch_size + 2` entities, so a full page still fits in one group
    /// together with its context and continuation. An error returned by
    /// `on_batch` ends the read and is returned unchanged.
    fn read_entities(
        &mut self,
        since: Option<&str>,
        batch_size: usize,
        cancel: &CancellationToken,
        on_batch: &mut BatchFn<'_>,
    ) -> SyncResult<()>;
}

impl<S: Source + ?Sized> Source for &mut S {
    fn read_entities(
        &mut self,
        since: Option<&str>,
        batch_size: usize,
        cancel: &CancellationToken,
        on_batch: &mut BatchFn<'_>,
    ) -> SyncResult<()> {
        (**self).read_entities(since, batch_size, cancel, on_batch)
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn read_entities(
        &mut self,
        since: Option<&str>,
        batch_size: usize,
        cancel: &CancellationToken,
        on_batch: &mut BatchFn<'_>,
    ) -> SyncResult<()> {
        (**self).read_entities(since, batch_size, cancel, on_batch)
    }
}

/// Groups decoded entities for delivery.
#[derive(Debug)]
pub struct EntityBatcher {
    capacity: usize,
    pending: Vec<Entity>,
}

impl EntityBatcher {
    /// Creates a batcher for the given batch size; 0 selects the default.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        let capacity = batch_size.saturating_add(2);
        Self {
            capacity,
            pending: Vec::with_capacity(capacity.min(4096)),
        }
    }

    /// Maximum group size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entities waiting for delivery.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Adds an entity, delivering the group once it is full.
    pub fn push<F>(&mut self, entity: Entity, on_batch: &mut F) -> SyncResult<()>
    where
        F: FnMut(Vec<Entity>) -> SyncResult<()> + ?Sized,
    {
        self.pending.push(entity);
        if self.pending.len() >= self.capacity {
            return self.flush(on_batch);
        }
        Ok(())
    }

    /// Delivers whatever is pending.
    pub fn flush<F>(&mut self, on_batch: &mut F) -> SyncResult<()>
    where
        F: FnMut(Vec<Entity>) -> SyncResult<()> + ?Sized,
    {
        if self.pending.is_empty() {
            return Ok(());
        }
        let group = std::mem::take(&mut self.pending);
        on_batch(group)
    }
}

/// Decodes a whole stream from `reader`, delivering batches as it goes.
///
/// `observe` runs once per decoded entity, before it is batched. On a
/// decode error the pending group is left in the batcher so the caller
/// can decide whether to deliver it.
pub(crate) fn decode_batched<R, F>(
    reader: R,
    batcher: &mut EntityBatcher,
    on_batch: &mut BatchFn<'_>,
    mut observe: F,
) -> SyncResult<usize>
where
    R: Read,
    F: FnMut(),
{
    let mut count = 0usize;
    EntityStreamParser::new().parse_stream(reader, |entity| {
        observe();
        count += 1;
        batcher.push(entity, on_batch)
    })?;
    batcher.flush(on_batch)?;
    Ok(count)
}

/// In-memory source delivering a fixed list in a single group.
///
/// The list is handed out by the first read; later reads deliver nothing.
#[derive(Debug, Clone, Default)]
pub struct EntityListSource {
    entities: Vec<Entity>,
}

impl EntityListSource {
    /// Creates a source over a list of entities.
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    /// Entities not yet delivered.
    pub fn remaining(&self) -> usize {
        self.entities.len()
    }
}

impl Source for EntityListSource {
    fn read_entities(
        &mut self,
        _since: Option<&str>,
        _batch_size: usize,
        _cancel: &CancellationToken,
        on_batch: &mut BatchFn<'_>,
    ) -> SyncResult<()> {
        if self.entities.is_empty() {
            return Ok(());
        }
        on_batch(std::mem::take(&mut self.entities))
    }
}

/// Source decoding a wire-format stream from any reader, e.g. a file or
/// standard input.
///
/// The reader is consumed by the first read; later reads deliver nothing.
/// `since` is ignored.
pub struct ReaderSource<R> {
    reader: Option<R>,
}

impl<R: Read> ReaderSource<R> {
    /// Creates a source over a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }
}

impl ReaderSource<std::fs::File> {
    /// Opens a file as a source.
    pub fn open(path: impl AsRef<std::path::Path>) -> SyncResult<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            SyncError::source_error(format!("cannot open {}: {e}", path.as_ref().display()))
        })?;
        Ok(Self::new(file))
    }
}

impl<R: Read> Source for ReaderSource<R> {
    fn read_entities(
        &mut self,
        _since: Option<&str>,
        batch_size: usize,
        _cancel: &CancellationToken,
        on_batch: &mut BatchFn<'_>,
    ) -> SyncResult<()> {
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };
        let mut batcher = EntityBatcher::new(batch_size);
        let count = decode_batched(reader, &mut batcher, on_batch, || {})?;
        debug!(entities = count, "decoded stream from reader");
        Ok(())
    }
}
