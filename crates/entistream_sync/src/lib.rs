//! # Entistream Sync
//!
//! Incremental sync pipeline for entity streams.
//!
//! This crate provides:
//! - [`Source`] and [`Sink`] traits at the pipeline boundary
//! - [`Pipeline`], which follows continuation tokens across reads,
//!   batches entities and stops on limit, short pages or cancellation
//! - [`HttpSource`] with idle and overall read deadlines
//! - file, reader and in-memory sources
//! - collecting, JSON-writing and URI-expanding sinks
//! - [`EntityManager`] for dataset entity and change views
//!
//! ## Key Invariants
//!
//! - `Sink::end` runs exactly once per sync after a successful start
//! - cancellation ends a sync with an interrupted outcome, not an error
//! - entities decoded before a read deadline expires are still delivered
//!
//! ## Usage
//!
//! ```
//! use entistream_codec::Entity;
//! use entistream_sync::{CancellationToken, CollectorSink, EntityListSource, Pipeline};
//!
//! let source = EntityListSource::new(vec![
//!     Entity::context([("p", "http://data.example.io/p/")]),
//!     Entity::new("p:homer"),
//! ]);
//! let mut pipeline = Pipeline::new(source, CollectorSink::new());
//! let report = pipeline.sync(&CancellationToken::new(), None, 100).unwrap();
//! assert_eq!(report.entities, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod config;
mod error;
mod http;
mod manager;
mod pipeline;
mod sink;
mod source;
mod watchdog;

pub use cancel::CancellationToken;
pub use config::{HttpSourceConfig, PipelineConfig, DEFAULT_BATCH_SIZE};
pub use error::{SyncError, SyncResult, TimeoutKind, TransportError};
pub use http::{HttpClient, HttpResponse, HttpSource, ReqwestClient, WatchedReader};
pub use manager::{DatasetKind, EntityManager, ReadOptions};
pub use pipeline::{Pipeline, PipelineState, SyncOutcome, SyncReport};
pub use sink::{CollectorSink, ExpandingSink, JsonFormat, JsonSink, Sink};
pub use source::{BatchFn, EntityBatcher, EntityListSource, ReaderSource, Source};
pub use watchdog::Watchdog;
