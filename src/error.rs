//! Error types for OData batch processing.
//!
//! Every failure raised while reading a batch request body is a
//! [`DeserializerError`]: a [`MessageKey`] naming the malformed construct, a
//! human readable message, and (where the construct has a position) the
//! 1-based line number in the batch body. The surrounding server translates
//! these into `400 Bad Request`.
//!
//! Failures of individual sub-requests are *not* errors. Once a batch has been
//! parsed, a failing sub-request is an ordinary [`BatchResponse`] with a 4xx or
//! 5xx status that ends up inside the serialized batch response.
//!
//! # Error Categories
//!
//! | Category | Variants | HTTP status |
//! |----------|----------|-------------|
//! | Wire format | `Deserializer` | 400 |
//! | Input source | `Io` | 500 |
//! | Change-set strategy | `Processor` | 500 |
//!
//! # Examples
//!
//! ```
//! use odata_batch_axum::error::{BatchError, MessageKey};
//!
//! let err = BatchError::deserializer(MessageKey::ForbiddenHeader, "Range is not allowed", 7);
//! assert_eq!(err.message_key(), Some(MessageKey::ForbiddenHeader));
//! assert_eq!(err.line(), Some(7));
//! assert_eq!(err.status_code(), 400);
//! ```
//!
//! [`BatchResponse`]: crate::types::BatchResponse

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Identifies which construct of a batch body was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MessageKey {
    /// Malformed content: unexpected delimiter, non-empty GET body, missing status line.
    InvalidContent,
    /// A change-set member has no `Content-ID` on either header block.
    MissingContentId,
    /// A header is ambiguous or malformed where a single value is required.
    InvalidHeader,
    /// A sub-request carries a header that batch requests must not contain.
    ForbiddenHeader,
    /// Wrong `Content-Type` or `Content-Transfer-Encoding` on a MIME part.
    InvalidBodyPartHeader,
    /// The boundary token violates RFC 2046.
    InvalidBoundary,
    /// No opening `--boundary` delimiter was found.
    MissingBoundaryDelimiter,
    /// No closing `--boundary--` delimiter was found.
    MissingCloseDelimiter,
    /// A header block is not terminated by a blank line (strict mode).
    MissingBlankLine,
    /// The request line is not `METHOD SP target SP version`.
    InvalidStatusLine,
    /// The HTTP version of a sub-request is not `HTTP/1.1`.
    InvalidHttpVersion,
    /// Unknown method, or a `GET` inside a change set.
    InvalidMethod,
    /// The request target cannot be resolved against the service root.
    InvalidUri,
    /// `Content-Length` is not a number or exceeds the available body.
    InvalidContentLength,
    /// Two members of one change set share a `Content-ID`.
    DuplicateContentId,
    /// A change set without members.
    EmptyChangeSet,
}

impl MessageKey {
    /// The wire name of this key.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::InvalidContent => "INVALID_CONTENT",
            MessageKey::MissingContentId => "MISSING_CONTENT_ID",
            MessageKey::InvalidHeader => "INVALID_HEADER",
            MessageKey::ForbiddenHeader => "FORBIDDEN_HEADER",
            MessageKey::InvalidBodyPartHeader => "INVALID_BODY_PART_HEADER",
            MessageKey::InvalidBoundary => "INVALID_BOUNDARY",
            MessageKey::MissingBoundaryDelimiter => "MISSING_BOUNDARY_DELIMITER",
            MessageKey::MissingCloseDelimiter => "MISSING_CLOSE_DELIMITER",
            MessageKey::MissingBlankLine => "MISSING_BLANK_LINE",
            MessageKey::InvalidStatusLine => "INVALID_STATUS_LINE",
            MessageKey::InvalidHttpVersion => "INVALID_HTTP_VERSION",
            MessageKey::InvalidMethod => "INVALID_METHOD",
            MessageKey::InvalidUri => "INVALID_URI",
            MessageKey::InvalidContentLength => "INVALID_CONTENT_LENGTH",
            MessageKey::DuplicateContentId => "DUPLICATE_CONTENT_ID",
            MessageKey::EmptyChangeSet => "EMPTY_CHANGE_SET",
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected batch request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializerError {
    /// The malformed construct.
    pub key: MessageKey,
    /// Description of the failure.
    pub message: String,
    /// 1-based line number in the batch body, when known.
    pub line: Option<usize>,
}

impl fmt::Display for DeserializerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} at line {}: {}", self.key, line, self.message),
            None => write!(f, "{}: {}", self.key, self.message),
        }
    }
}

impl std::error::Error for DeserializerError {}

/// Errors that can occur while processing a batch.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BatchError {
    /// The batch body violates the multipart batch grammar.
    #[error("Batch deserializer error: {0}")]
    Deserializer(#[from] DeserializerError),

    /// Reading the batch body from its source failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A change-set strategy failed without producing a response.
    #[error("Processor error: {0}")]
    Processor(String),

    /// A configuration document could not be read, or holds unusable values.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BatchError {
    /// Build a deserializer error positioned at `line`.
    pub fn deserializer(key: MessageKey, message: impl Into<String>, line: usize) -> Self {
        BatchError::Deserializer(DeserializerError {
            key,
            message: message.into(),
            line: Some(line),
        })
    }

    /// Build a deserializer error without a source position.
    pub fn deserializer_unpositioned(key: MessageKey, message: impl Into<String>) -> Self {
        BatchError::Deserializer(DeserializerError {
            key,
            message: message.into(),
            line: None,
        })
    }

    /// Attach a position to an unpositioned deserializer error.
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        if let BatchError::Deserializer(err) = &mut self {
            err.line.get_or_insert(line);
        }
        self
    }

    /// The message key, for deserializer errors.
    #[must_use]
    pub fn message_key(&self) -> Option<MessageKey> {
        match self {
            BatchError::Deserializer(err) => Some(err.key),
            _ => None,
        }
    }

    /// The offending line, for positioned deserializer errors.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            BatchError::Deserializer(err) => err.line,
            _ => None,
        }
    }

    /// HTTP status the surrounding server answers with.
    ///
    /// Malformed batch bodies are client errors; everything else is a server
    /// failure.
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            BatchError::Deserializer(_) => 400,
            _ => 500,
        }
    }
}
