//! Batch response formatter.
//!
//! Converts a sequence of [`ResponsePart`]s into a `multipart/mixed` body.
//!
//! # Response Format
//!
//! ```text
//! --batch_4e0c...                              <- one delimiter per part
//! Content-Type: application/http
//! Content-Transfer-Encoding: binary
//! Content-Id: 1                                <- only when the response has one
//!
//! HTTP/1.1 200 OK
//! Content-Type: application/json
//! Content-Length: 15                           <- always recomputed
//!
//! <body>
//!                                              <- CRLF written after every body
//! --batch_4e0c...
//! Content-Type: multipart/mixed; boundary=changeset_91aa...
//!
//! --changeset_91aa...
//! ...same layout as above, once per member...
//! --changeset_91aa...--
//! --batch_4e0c...--
//! ```
//!
//! Change-set boundaries are generated fresh for every change set through a
//! [`BoundaryGenerator`], so no boundary is ever reused across responses.

use crate::protocol::constants::{headers, media, CHANGE_SET_BOUNDARY_PREFIX, CRLF, HTTP_VERSION};
use crate::protocol::format_multipart_content_type;
use crate::types::{BatchResponse, ResponsePart};
use bytes::{Bytes, BytesMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Source of boundary tokens.
pub trait BoundaryGenerator: Send + Sync {
    /// Produce a new boundary starting with `prefix`.
    fn generate(&self, prefix: &str) -> String;
}

/// Random `prefix + UUIDv4` boundaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidBoundaryGenerator;

impl BoundaryGenerator for UuidBoundaryGenerator {
    fn generate(&self, prefix: &str) -> String {
        format!("{}{}", prefix, Uuid::new_v4())
    }
}

/// Deterministic `prefix + counter` boundaries, for tests and fixtures.
///
/// ```
/// use odata_batch_axum::protocol::{BoundaryGenerator, SequentialBoundaryGenerator};
///
/// let generator = SequentialBoundaryGenerator::new();
/// assert_eq!(generator.generate("changeset_"), "changeset_1");
/// assert_eq!(generator.generate("changeset_"), "changeset_2");
/// ```
#[derive(Debug, Default)]
pub struct SequentialBoundaryGenerator {
    counter: AtomicUsize,
}

impl SequentialBoundaryGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoundaryGenerator for SequentialBoundaryGenerator {
    fn generate(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{}", prefix, n)
    }
}

/// Serializes response parts into a batch response body.
#[derive(Clone)]
pub struct BatchResponseSerializer {
    generator: Arc<dyn BoundaryGenerator>,
    change_set_prefix: String,
}

impl BatchResponseSerializer {
    /// Serializer with random change-set boundaries.
    pub fn new() -> Self {
        Self::with_generator(Arc::new(UuidBoundaryGenerator))
    }

    /// Serializer drawing change-set boundaries from `generator`.
    pub fn with_generator(generator: Arc<dyn BoundaryGenerator>) -> Self {
        BatchResponseSerializer {
            generator,
            change_set_prefix: CHANGE_SET_BOUNDARY_PREFIX.to_string(),
        }
    }

    pub fn with_change_set_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.change_set_prefix = prefix.into();
        self
    }

    /// Render `parts` framed by `boundary`.
    pub fn serialize(&self, parts: &[ResponsePart], boundary: &str) -> Bytes {
        let mut buffer = BytesMut::new();

        for part in parts {
            write_delimiter(&mut buffer, boundary, false);
            match part {
                ResponsePart::Single(response) => format_response(&mut buffer, response),
                ResponsePart::ChangeSet(responses) => {
                    let nested = self.generator.generate(&self.change_set_prefix);
                    write_header(
                        &mut buffer,
                        headers::CONTENT_TYPE,
                        &format_multipart_content_type(&nested),
                    );
                    buffer.extend_from_slice(CRLF.as_bytes());

                    for response in responses {
                        write_delimiter(&mut buffer, &nested, false);
                        format_response(&mut buffer, response);
                    }
                    write_delimiter(&mut buffer, &nested, true);
                }
            }
        }
        write_delimiter(&mut buffer, boundary, true);

        tracing::debug!(parts = parts.len(), bytes = buffer.len(), "serialized batch response");
        buffer.freeze()
    }
}

impl Default for BatchResponseSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize `parts` with random change-set boundaries.
///
/// # Examples
///
/// ```
/// use odata_batch_axum::protocol::serialize_batch_response;
/// use odata_batch_axum::{BatchResponse, ResponsePart};
///
/// let parts = vec![ResponsePart::Single(BatchResponse::new(204))];
/// let body = serialize_batch_response(&parts, "batch_X");
/// let text = std::str::from_utf8(&body).unwrap();
/// assert!(text.starts_with("--batch_X\r\n"));
/// assert!(text.ends_with("--batch_X--\r\n"));
/// ```
pub fn serialize_batch_response(parts: &[ResponsePart], boundary: &str) -> Bytes {
    BatchResponseSerializer::new().serialize(parts, boundary)
}

fn write_delimiter(buffer: &mut BytesMut, boundary: &str, close: bool) {
    buffer.extend_from_slice(b"--");
    buffer.extend_from_slice(boundary.as_bytes());
    if close {
        buffer.extend_from_slice(b"--");
    }
    buffer.extend_from_slice(CRLF.as_bytes());
}

fn write_header(buffer: &mut BytesMut, key: &str, value: &str) {
    buffer.extend_from_slice(key.as_bytes());
    buffer.extend_from_slice(b": ");
    buffer.extend_from_slice(value.as_bytes());
    buffer.extend_from_slice(CRLF.as_bytes());
}

fn format_response(buffer: &mut BytesMut, response: &BatchResponse) {
    write_header(buffer, headers::CONTENT_TYPE, media::APPLICATION_HTTP);
    write_header(buffer, headers::CONTENT_TRANSFER_ENCODING, media::BINARY);
    if let Some(content_id) = response.content_id() {
        write_header(buffer, headers::CONTENT_ID_OUT, &content_id);
    }
    buffer.extend_from_slice(CRLF.as_bytes());

    let status_line = format!("{} {} {}", HTTP_VERSION, response.status, response.reason());
    buffer.extend_from_slice(status_line.trim_end().as_bytes());
    buffer.extend_from_slice(CRLF.as_bytes());

    for field in &response.headers {
        if field.is(headers::CONTENT_ID) || field.is(headers::CONTENT_LENGTH) {
            continue;
        }
        write_header(buffer, field.name(), &field.value());
    }
    write_header(buffer, headers::CONTENT_LENGTH, &response.body.len().to_string());
    buffer.extend_from_slice(CRLF.as_bytes());

    buffer.extend_from_slice(&response.body);
    buffer.extend_from_slice(CRLF.as_bytes());
}
