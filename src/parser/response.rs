//! Reading serialized batch responses.
//!
//! The client side of the exchange: a `multipart/mixed` batch response body
//! is split with the same machinery as a request body and each part is read
//! back into a [`BatchResponse`]. The MIME part's `Content-Id` is moved onto
//! the response headers, where the serializer originally took it from.

use crate::error::{BatchError, MessageKey, Result};
use crate::parser::body::{parse_header_block, split_by_boundary};
use crate::parser::line_reader::{join_lines, LineReader, RawLine};
use crate::protocol::constants::headers;
use crate::protocol::{extract_boundary, is_multipart_mixed, validate_boundary};
use crate::types::{BatchResponse, Headers, ResponsePart};
use bytes::Bytes;

/// Parse a batch response body framed by `boundary`.
///
/// # Examples
///
/// ```
/// use odata_batch_axum::parser::parse_batch_response;
///
/// let body = "--b\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n\
///             HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n\r\n--b--\r\n";
/// let parts = parse_batch_response(body, "b").unwrap();
/// assert_eq!(parts.len(), 1);
/// assert_eq!(parts[0].responses()[0].status, 204);
/// ```
pub fn parse_batch_response(body: impl Into<Bytes>, boundary: &str) -> Result<Vec<ResponsePart>> {
    validate_boundary(boundary)?;
    let lines: Vec<RawLine> = LineReader::new(body).collect();

    let mut parts = Vec::new();
    for part in split_by_boundary(lines, boundary, 1)? {
        let context = part.first().map_or(1, RawLine::number);
        let (part_headers, rest) = parse_header_block(&part, false, context)?;

        let nested = part_headers
            .get(headers::CONTENT_TYPE)
            .filter(|field| is_multipart_mixed(&field.value()))
            .and_then(|field| extract_boundary(&field.value()));

        match nested {
            Some(nested) => {
                let mut responses = Vec::new();
                for member in split_by_boundary(rest.to_vec(), &nested, part_headers.line())? {
                    let context = member.first().map_or(part_headers.line(), RawLine::number);
                    let (member_headers, rest) = parse_header_block(&member, false, context)?;
                    responses.push(parse_response(&member_headers, rest)?);
                }
                parts.push(ResponsePart::ChangeSet(responses));
            }
            None => parts.push(ResponsePart::Single(parse_response(&part_headers, rest)?)),
        }
    }

    tracing::debug!(parts = parts.len(), "parsed batch response");
    Ok(parts)
}

fn parse_status_line(line: &RawLine) -> Result<u16> {
    let text = line.text();
    let mut tokens = text.trim_end().splitn(3, ' ');
    let version = tokens.next().unwrap_or("");
    let status = tokens.next().and_then(|code| code.parse::<u16>().ok());

    match status {
        Some(status) if version.starts_with("HTTP/") => Ok(status),
        _ => Err(BatchError::deserializer(
            MessageKey::InvalidStatusLine,
            format!("Invalid status line '{}'", text.trim_end()),
            line.number(),
        )),
    }
}

fn parse_response(part_headers: &Headers, lines: &[RawLine]) -> Result<BatchResponse> {
    let first = lines.iter().position(|l| !l.is_blank()).unwrap_or(lines.len());
    let Some((status_line, rest)) = lines[first..].split_first() else {
        return Err(BatchError::deserializer(
            MessageKey::InvalidContent,
            "Missing status line",
            part_headers.line(),
        ));
    };

    let status = parse_status_line(status_line)?;
    let (mut response_headers, body) = parse_header_block(rest, false, status_line.number())?;

    let mut body = join_lines(body);
    if let Some(field) = response_headers.get(headers::CONTENT_LENGTH) {
        let length = field
            .single_value()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|length| *length <= body.len())
            .ok_or_else(|| {
                BatchError::deserializer(
                    MessageKey::InvalidContentLength,
                    format!("Invalid Content-Length '{}'", field.value()),
                    field.line(),
                )
            })?;
        body = body.slice(..length);
    }

    if let Some(content_id) = part_headers.value(headers::CONTENT_ID) {
        response_headers.set(headers::CONTENT_ID, content_id);
    }

    Ok(BatchResponse {
        status,
        headers: response_headers,
        body,
    })
}
