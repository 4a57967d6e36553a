//! Boundary-aware splitting of a batch body into parts.
//!
//! # Parsing Flow
//!
//! 1. **Split**: partition the lines at `--boundary` delimiters, dropping the
//!    preamble and everything after `--boundary--`
//! 2. **Part headers**: read the MIME header block of each part up to its
//!    blank line
//! 3. **Classify**: `multipart/mixed; boundary=X` makes the part a change set,
//!    whose remainder is split again at `--X`; anything else is a single
//!    operation
//! 4. **Operation**: request line, request header block, then the remaining
//!    lines as body
//!
//! The line terminator in front of a delimiter belongs to the delimiter
//! (RFC 2046), so it is stripped from the last line of every part.

use crate::error::{BatchError, MessageKey, Result};
use crate::parser::line_reader::RawLine;
use crate::protocol::constants::headers;
use crate::protocol::{extract_boundary, is_multipart_mixed, validate_boundary};
use crate::types::Headers;

/// A request as written inside a batch part, before any validation.
#[derive(Debug, Clone)]
pub struct Operation {
    pub status_line: RawLine,
    pub headers: Headers,
    /// Lines between the request header block and the next delimiter.
    pub body: Vec<RawLine>,
}

/// One member of a change set: its MIME headers and the embedded request.
#[derive(Debug, Clone)]
pub struct ChangeSetMember {
    pub headers: Headers,
    pub operation: Operation,
}

/// One top-level part of a batch body.
#[derive(Debug, Clone)]
pub enum BodyPart {
    Single {
        headers: Headers,
        operation: Operation,
    },
    ChangeSet {
        headers: Headers,
        boundary: String,
        members: Vec<ChangeSetMember>,
    },
}

impl BodyPart {
    pub fn headers(&self) -> &Headers {
        match self {
            BodyPart::Single { headers, .. } | BodyPart::ChangeSet { headers, .. } => headers,
        }
    }

    pub fn is_change_set(&self) -> bool {
        matches!(self, BodyPart::ChangeSet { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Open,
    Close,
}

fn delimiter_kind(line: &RawLine, boundary: &str) -> Option<Delimiter> {
    let content = line.content();
    let trimmed_len = content
        .iter()
        .rposition(|b| *b != b' ' && *b != b'\t')
        .map_or(0, |i| i + 1);
    let content = &content[..trimmed_len];

    let rest = content.strip_prefix(b"--")?.strip_prefix(boundary.as_bytes())?;
    match rest {
        b"" => Some(Delimiter::Open),
        b"--" => Some(Delimiter::Close),
        _ => None,
    }
}

/// Line number of the first delimiter of `boundary`, if any.
pub fn first_delimiter_line(lines: &[RawLine], boundary: &str) -> Option<usize> {
    lines
        .iter()
        .find(|line| delimiter_kind(line, boundary).is_some())
        .map(RawLine::number)
}

fn finish_part(mut lines: Vec<RawLine>) -> Vec<RawLine> {
    if let Some(last) = lines.last_mut() {
        *last = last.without_ending();
    }
    lines
}

/// Partition `lines` at the delimiters of `boundary`.
///
/// `context_line` positions errors when the region has no lines of its own.
///
/// # Errors
///
/// `MISSING_BOUNDARY_DELIMITER` without any delimiter line,
/// `MISSING_CLOSE_DELIMITER` without the `--boundary--` line. A close
/// delimiter with no part before it yields no parts; callers decide whether
/// that is acceptable.
pub fn split_by_boundary(
    lines: Vec<RawLine>,
    boundary: &str,
    context_line: usize,
) -> Result<Vec<Vec<RawLine>>> {
    let last_line = lines.last().map_or(context_line, RawLine::number);
    let mut parts = Vec::new();
    let mut current: Option<Vec<RawLine>> = None;
    let mut opened = false;

    for line in lines {
        match delimiter_kind(&line, boundary) {
            Some(Delimiter::Open) => {
                if let Some(part) = current.take() {
                    parts.push(finish_part(part));
                }
                opened = true;
                current = Some(Vec::new());
            }
            Some(Delimiter::Close) => {
                if let Some(part) = current.take() {
                    parts.push(finish_part(part));
                }
                return Ok(parts);
            }
            None => {
                if let Some(part) = current.as_mut() {
                    part.push(line);
                }
            }
        }
    }

    if opened {
        Err(BatchError::deserializer(
            MessageKey::MissingCloseDelimiter,
            format!("Missing close delimiter '--{}--'", boundary),
            last_line,
        ))
    } else {
        Err(BatchError::deserializer(
            MessageKey::MissingBoundaryDelimiter,
            format!("Missing boundary delimiter '--{}'", boundary),
            context_line,
        ))
    }
}

fn is_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

/// Read a header block up to and including its terminating blank line.
///
/// Returns the headers and the lines after the blank line.
pub fn parse_header_block(
    lines: &[RawLine],
    strict: bool,
    context_line: usize,
) -> Result<(Headers, &[RawLine])> {
    let mut headers = Headers::at_line(lines.first().map_or(context_line, RawLine::number));

    for (index, line) in lines.iter().enumerate() {
        if line.is_blank() {
            return Ok((headers, &lines[index + 1..]));
        }

        let text = line.text();
        if text.starts_with("--") {
            return Err(BatchError::deserializer(
                MessageKey::InvalidContent,
                format!("Unexpected boundary delimiter '{}'", text.trim_end()),
                line.number(),
            ));
        }

        if text.starts_with(&[' ', '\t'][..]) {
            if let Some(field) = headers.last_mut() {
                field.append_to_last(text.trim());
                continue;
            }
        } else if let Some((name, value)) = text.split_once(':') {
            if is_header_name(name) {
                headers.add(name, value.trim(), line.number());
                continue;
            }
        }

        if strict {
            return Err(BatchError::deserializer(
                MessageKey::InvalidHeader,
                format!("Invalid header line '{}'", text.trim_end()),
                line.number(),
            ));
        }
        tracing::warn!(line = line.number(), "skipping malformed header line");
    }

    if strict {
        let line = lines.last().map_or(context_line, RawLine::number);
        return Err(BatchError::deserializer(
            MessageKey::MissingBlankLine,
            "Header block is not terminated by a blank line",
            line,
        ));
    }
    Ok((headers, &lines[lines.len()..]))
}

/// Parse an embedded request: request line, headers, body.
pub fn parse_operation(lines: &[RawLine], strict: bool, context_line: usize) -> Result<Operation> {
    let lines = if strict {
        lines
    } else {
        let first = lines.iter().position(|l| !l.is_blank()).unwrap_or(lines.len());
        &lines[first..]
    };

    let Some((status_line, rest)) = lines.split_first() else {
        return Err(BatchError::deserializer(
            MessageKey::InvalidContent,
            "Missing request line",
            context_line,
        ));
    };
    if status_line.is_blank() {
        return Err(BatchError::deserializer(
            MessageKey::InvalidContent,
            "Missing request line",
            status_line.number(),
        ));
    }

    let (headers, body) = parse_header_block(rest, strict, status_line.number())?;
    Ok(Operation {
        status_line: status_line.clone(),
        headers,
        body: body.to_vec(),
    })
}

/// Parse the lines of one top-level part.
pub fn parse_body_part(lines: Vec<RawLine>, strict: bool, context_line: usize) -> Result<BodyPart> {
    let (headers, rest) = parse_header_block(&lines, strict, context_line)?;

    let change_set_type = headers
        .get(headers::CONTENT_TYPE)
        .filter(|field| is_multipart_mixed(&field.value()))
        .cloned();

    let Some(content_type) = change_set_type else {
        let operation = parse_operation(rest, strict, headers.line())?;
        return Ok(BodyPart::Single { headers, operation });
    };

    let boundary = extract_boundary(&content_type.value()).ok_or_else(|| {
        BatchError::deserializer(
            MessageKey::InvalidBodyPartHeader,
            "Change set content type without boundary",
            content_type.line(),
        )
    })?;
    validate_boundary(&boundary).map_err(|e| e.at_line(content_type.line()))?;

    let member_parts = split_by_boundary(rest.to_vec(), &boundary, headers.line())?;
    if member_parts.is_empty() {
        return Err(BatchError::deserializer(
            MessageKey::EmptyChangeSet,
            "Change set has no members",
            headers.line(),
        ));
    }

    let mut members = Vec::with_capacity(member_parts.len());
    for member in member_parts {
        let context = member.first().map_or(headers.line(), RawLine::number);
        let (member_headers, rest) = parse_header_block(&member, strict, context)?;
        let operation = parse_operation(rest, strict, member_headers.line())?;
        members.push(ChangeSetMember {
            headers: member_headers,
            operation,
        });
    }

    Ok(BodyPart::ChangeSet {
        headers,
        boundary,
        members,
    })
}
