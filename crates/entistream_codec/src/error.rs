//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding an entity stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The stream does not follow the entity stream grammar
    /// (wrong leading token, missing or invalid context).
    #[error("protocol violation: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// The token stream could not be read.
    #[error("parse error at byte {offset}: {message}")]
    Parse {
        /// Byte offset where the failure was detected.
        offset: u64,
        /// Description of the failure.
        message: String,
    },

    /// An identifier could not be compressed into `prefix:local` form.
    #[error("namespace resolution failed: {message}")]
    Namespace {
        /// Description of the resolution failure.
        message: String,
    },
}

impl CodecError {
    /// Create a protocol violation error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a parse error at the given offset.
    pub fn parse(offset: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }

    /// Create a namespace resolution error.
    pub fn namespace(message: impl Into<String>) -> Self {
        Self::Namespace {
            message: message.into(),
        }
    }

    /// Returns true for grammar violations.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns true for token read failures.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Returns true for namespace resolution failures.
    pub fn is_namespace(&self) -> bool {
        matches!(self, Self::Namespace { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CodecError::parse(17, "unexpected end of input");
        assert_eq!(
            err.to_string(),
            "parse error at byte 17: unexpected end of input"
        );

        let err = CodecError::protocol("expected [ at start of document");
        assert!(err.to_string().starts_with("protocol violation"));
    }

    #[test]
    fn error_kinds() {
        assert!(CodecError::protocol("x").is_protocol());
        assert!(CodecError::parse(0, "x").is_parse());
        assert!(CodecError::namespace("x").is_namespace());
        assert!(!CodecError::namespace("x").is_parse());
    }
}
