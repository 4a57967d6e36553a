//! Batch request parsing.
//!
//! [`parse_batch_request`] turns a `multipart/mixed` batch body into the
//! ordered [`RequestPart`]s the dispatcher executes. Parsing runs in two
//! passes: [`body`] recovers the multipart structure line by line, and
//! [`transformator`] applies the batch grammar rules and builds requests.
//!
//! Every failure is a [`BatchError::Deserializer`] carrying a
//! [`MessageKey`](crate::error::MessageKey) and, where the construct has one,
//! the line it was found on.
//!
//! [`BatchError::Deserializer`]: crate::error::BatchError::Deserializer

pub mod body;
pub mod line_reader;
pub mod options;
pub mod response;
pub mod status_line;
pub mod transformator;

pub use line_reader::{join_lines, LineEnding, LineReader, RawLine};
pub use options::{BatchOptions, BatchOptionsBuilder};
pub use response::parse_batch_response;
pub use status_line::{resolve_target, RequestLine, ResolvedTarget};
pub use transformator::RequestTransformator;

use crate::error::{BatchError, MessageKey, Result};
use crate::protocol::validate_boundary;
use crate::types::RequestPart;
use bytes::Bytes;
use std::io::Read;

/// Parse a batch request body framed by `boundary`.
///
/// # Examples
///
/// ```
/// use odata_batch_axum::parser::{parse_batch_request, BatchOptions};
///
/// let body = "--batch_1\r\n\
///             Content-Type: application/http\r\n\
///             Content-Transfer-Encoding: binary\r\n\
///             \r\n\
///             GET People HTTP/1.1\r\n\
///             \r\n\
///             \r\n\
///             --batch_1--\r\n";
/// let options = BatchOptions::builder().raw_base_uri("http://host/svc").build();
/// let parts = parse_batch_request(body, "batch_1", &options).unwrap();
/// assert_eq!(parts.len(), 1);
/// assert_eq!(parts[0].requests()[0].raw_request_uri, "http://host/svc/People");
/// ```
pub fn parse_batch_request(
    body: impl Into<Bytes>,
    boundary: &str,
    options: &BatchOptions,
) -> Result<Vec<RequestPart>> {
    parse_lines(LineReader::new(body), boundary, options)
}

/// Parse a batch request body read from `source`.
///
/// # Errors
///
/// Read failures surface as [`BatchError::Io`](crate::error::BatchError::Io).
pub fn parse_batch_request_from_reader(
    source: impl Read,
    boundary: &str,
    options: &BatchOptions,
) -> Result<Vec<RequestPart>> {
    parse_lines(LineReader::from_reader(source)?, boundary, options)
}

fn parse_lines(reader: LineReader, boundary: &str, options: &BatchOptions) -> Result<Vec<RequestPart>> {
    validate_boundary(boundary)?;
    let lines: Vec<RawLine> = reader.collect();
    let total = lines.len();
    let first_delimiter = body::first_delimiter_line(&lines, boundary);

    let transformator = RequestTransformator::new(options);
    let mut parts = Vec::new();
    for part_lines in body::split_by_boundary(lines, boundary, 1)? {
        let context = part_lines.first().map_or(1, RawLine::number);
        let part = body::parse_body_part(part_lines, options.strict, context)?;
        parts.push(transformator.transform(part)?);
    }
    if parts.is_empty() {
        return Err(BatchError::deserializer(
            MessageKey::MissingBoundaryDelimiter,
            "Batch contains no body parts",
            first_delimiter.unwrap_or(1),
        ));
    }

    tracing::debug!(
        parts = parts.len(),
        lines = total,
        strict = options.strict,
        "parsed batch request"
    );
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessageKey;
    use std::io;

    const BATCH: &str = "--batch_1\r\n\
        Content-Type: application/http\r\n\
        Content-Transfer-Encoding: binary\r\n\
        \r\n\
        GET People HTTP/1.1\r\n\
        \r\n\
        \r\n\
        --batch_1\r\n\
        Content-Type: multipart/mixed; boundary=changeset_1\r\n\
        \r\n\
        --changeset_1\r\n\
        Content-Type: application/http\r\n\
        Content-Transfer-Encoding: binary\r\n\
        Content-ID: 1\r\n\
        \r\n\
        POST People HTTP/1.1\r\n\
        Content-Type: application/json\r\n\
        \r\n\
        {\"Name\":\"Walter\"}\r\n\
        --changeset_1--\r\n\
        \r\n\
        --batch_1--\r\n";

    fn options() -> BatchOptions {
        BatchOptions::builder().raw_base_uri("http://host/svc").build()
    }

    #[test]
    fn test_parse_mixed_batch() {
        let parts = parse_batch_request(BATCH, "batch_1", &options()).unwrap();
        assert_eq!(parts.len(), 2);
        assert!(!parts[0].is_change_set());
        assert!(parts[1].is_change_set());

        let post = &parts[1].requests()[0];
        assert_eq!(post.raw_odata_path, "/People");
        assert_eq!(post.content_id(), Some("1"));
        assert_eq!(post.body_str(), Some("{\"Name\":\"Walter\"}"));
    }

    #[test]
    fn test_batch_without_parts() {
        let err = parse_batch_request("preamble\r\n--batch_1--\r\n", "batch_1", &options()).unwrap_err();
        assert_eq!(err.message_key(), Some(MessageKey::MissingBoundaryDelimiter));
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("no body parts"));
    }

    #[test]
    fn test_wrong_boundary() {
        let err = parse_batch_request(BATCH, "batch_2", &options()).unwrap_err();
        assert_eq!(err.message_key(), Some(MessageKey::MissingBoundaryDelimiter));
    }

    #[test]
    fn test_invalid_boundary_token() {
        let err = parse_batch_request(BATCH, "", &options()).unwrap_err();
        assert_eq!(err.message_key(), Some(MessageKey::InvalidBoundary));
    }

    #[test]
    fn test_from_reader() {
        let parts = parse_batch_request_from_reader(BATCH.as_bytes(), "batch_1", &options()).unwrap();
        assert_eq!(parts.len(), 2);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn test_reader_failure_is_io_error() {
        let err = parse_batch_request_from_reader(FailingReader, "batch_1", &options()).unwrap_err();
        assert!(matches!(err, crate::error::BatchError::Io(_)));
    }
}
