//! Error types for sources, sinks and the sync pipeline.

use entistream_codec::CodecError;
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Which deadline of an HTTP read expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No entity arrived within the idle window.
    Idle,
    /// The read exceeded its overall deadline.
    Overall,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Idle => f.write_str("idle"),
            TimeoutKind::Overall => f.write_str("overall"),
        }
    }
}

/// Failures reported by the transport of an HTTP source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The dataset or endpoint does not exist (404).
    #[error("dataset not found")]
    NotFound,

    /// The server failed to handle the request (500).
    #[error("internal server error")]
    ServerError,

    /// The credentials were rejected (403).
    #[error("access denied")]
    Forbidden,

    /// Any other non-200 status.
    #[error("unexpected http status {0}")]
    Status(u16),

    /// The connection could not be established or broke.
    #[error("connection failed: {0}")]
    Connection(String),
}

impl TransportError {
    /// Maps an HTTP status code to a transport error. 200 is not an error.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200 => None,
            404 => Some(Self::NotFound),
            500 => Some(Self::ServerError),
            403 => Some(Self::Forbidden),
            other => Some(Self::Status(other)),
        }
    }

    /// The HTTP status, if this error came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound => Some(404),
            Self::ServerError => Some(500),
            Self::Forbidden => Some(403),
            Self::Status(s) => Some(*s),
            Self::Connection(_) => None,
        }
    }
}

/// Errors that can occur during a sync.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The stream could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A read deadline expired.
    #[error("{0} timeout while reading entities")]
    Timeout(TimeoutKind),

    /// The sync was cancelled. The pipeline turns this into an
    /// interrupted outcome rather than an error.
    #[error("sync interrupted")]
    Interrupted,

    /// A source failed for a reason of its own.
    #[error("source error: {0}")]
    Source(String),

    /// A sink rejected entities.
    #[error("sink error: {0}")]
    Sink(String),

    /// I/O failure outside the decoder, e.g. while writing output.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Creates a source error.
    pub fn source_error(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }

    /// Creates a sink error.
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink(message.into())
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Transport(TransportError::Connection(message.into()))
    }

    /// Returns true if this is the cancellation signal.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, SyncError::Interrupted)
    }

    /// Returns true if repeating the sync may succeed.
    ///
    /// Nothing in this crate retries; the classification is for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Timeout(_) => true,
            SyncError::Transport(TransportError::ServerError)
            | SyncError::Transport(TransportError::Connection(_)) => true,
            SyncError::Transport(TransportError::Status(s)) => *s >= 500,
            _ => false,
        }
    }
}
