//! Validation and conversion of parsed body parts into requests.
//!
//! [`BodyPart`]s only reflect the multipart structure. This module checks the
//! batch grammar rules that need the whole part (MIME headers, Content-ID
//! propagation, forbidden headers, GET bodies, `Content-Length`) and produces
//! the [`RequestPart`]s handed to the dispatcher.

use crate::error::{BatchError, MessageKey, Result};
use crate::parser::body::{BodyPart, ChangeSetMember, Operation};
use crate::parser::line_reader::{join_lines, RawLine};
use crate::parser::options::BatchOptions;
use crate::parser::status_line::RequestLine;
use crate::protocol::constants::headers;
use crate::protocol::{is_application_http, is_binary_encoding, is_multipart_mixed};
use crate::types::{BatchRequest, HeaderField, Headers, RequestPart};
use bytes::Bytes;
use http::Method;
use std::collections::HashSet;

/// Converts [`BodyPart`]s into [`RequestPart`]s.
#[derive(Debug, Clone)]
pub struct RequestTransformator<'a> {
    options: &'a BatchOptions,
}

impl<'a> RequestTransformator<'a> {
    pub fn new(options: &'a BatchOptions) -> Self {
        RequestTransformator { options }
    }

    /// Validate `part` and build its requests.
    pub fn transform(&self, part: BodyPart) -> Result<RequestPart> {
        match part {
            BodyPart::Single {
                headers,
                mut operation,
            } => {
                validate_content_type(&headers, false)?;
                validate_transfer_encoding(&headers)?;

                if let Some(field) = content_id_field(&headers)? {
                    if content_id_field(&operation.headers)?.is_none() {
                        operation.headers.replace_field(field.clone());
                    }
                }
                let request = self.create_request(operation, false)?;
                Ok(RequestPart::Single(request))
            }
            BodyPart::ChangeSet {
                headers, members, ..
            } => {
                validate_content_type(&headers, true)?;

                let mut seen = HashSet::new();
                let mut requests = Vec::with_capacity(members.len());
                for member in members {
                    let (id, line, operation) = resolve_member_content_id(member)?;
                    if !seen.insert(id.clone()) {
                        return Err(BatchError::deserializer(
                            MessageKey::DuplicateContentId,
                            format!("Content-ID '{}' is used twice in one change set", id),
                            line,
                        ));
                    }
                    requests.push(self.create_request(operation, true)?);
                }
                Ok(RequestPart::ChangeSet(requests))
            }
        }
    }

    fn create_request(&self, operation: Operation, in_change_set: bool) -> Result<BatchRequest> {
        let request_line = RequestLine::parse(&operation.status_line)?;
        if in_change_set {
            request_line.validate_change_set_method()?;
        }
        let target = request_line.resolve(&self.options.raw_base_uri)?;

        validate_forbidden_headers(&operation.headers)?;

        let body = if request_line.method == Method::GET {
            if has_get_body(&operation.body) {
                return Err(BatchError::deserializer(
                    MessageKey::InvalidContent,
                    "GET requests must not carry a body",
                    request_line.line,
                ));
            }
            Bytes::new()
        } else {
            body_bytes(&operation.headers, &operation.body)?
        };

        let mut request = BatchRequest {
            method: request_line.method,
            raw_base_uri: target.base_uri,
            raw_odata_path: target.odata_path,
            raw_query_path: target.query,
            raw_request_uri: String::new(),
            raw_service_resolution_uri: self.options.raw_service_resolution_uri.clone(),
            headers: operation.headers,
            body,
        };
        request.refresh_request_uri();
        Ok(request)
    }
}

/// The single-valued `Content-ID` field of a header block, if any.
fn content_id_field(headers: &Headers) -> Result<Option<&HeaderField>> {
    match headers.get(headers::CONTENT_ID) {
        None => Ok(None),
        Some(field) if field.single_value().is_some() => Ok(Some(field)),
        Some(field) => Err(BatchError::deserializer(
            MessageKey::InvalidHeader,
            "Content-ID must have exactly one value",
            field.line(),
        )),
    }
}

/// Apply the member Content-ID rule: the MIME wrapper's value wins and is
/// copied onto the request.
fn resolve_member_content_id(member: ChangeSetMember) -> Result<(String, usize, Operation)> {
    let ChangeSetMember {
        headers,
        mut operation,
    } = member;

    validate_content_type(&headers, false)?;
    validate_transfer_encoding(&headers)?;

    let wrapper = content_id_field(&headers)?.cloned();
    let field = match wrapper {
        Some(field) => {
            operation.headers.replace_field(field.clone());
            field
        }
        None => match content_id_field(&operation.headers)? {
            Some(field) => field.clone(),
            None => {
                return Err(BatchError::deserializer(
                    MessageKey::MissingContentId,
                    "Change set member without Content-ID",
                    headers.line(),
                ))
            }
        },
    };

    let id = field.single_value().unwrap_or_default().to_string();
    Ok((id, field.line(), operation))
}

fn validate_content_type(headers: &Headers, change_set: bool) -> Result<()> {
    let Some(field) = headers.get(headers::CONTENT_TYPE) else {
        return Err(BatchError::deserializer(
            MessageKey::InvalidBodyPartHeader,
            "Missing Content-Type on body part",
            headers.line(),
        ));
    };
    let value = field.value();
    let valid = if change_set {
        is_multipart_mixed(&value)
    } else {
        is_application_http(&value)
    };
    if !valid {
        return Err(BatchError::deserializer(
            MessageKey::InvalidBodyPartHeader,
            format!("Unexpected Content-Type '{}'", value),
            field.line(),
        ));
    }
    Ok(())
}

fn validate_transfer_encoding(headers: &Headers) -> Result<()> {
    match headers.get(headers::CONTENT_TRANSFER_ENCODING) {
        Some(field) if is_binary_encoding(&field.value()) => Ok(()),
        Some(field) => Err(BatchError::deserializer(
            MessageKey::InvalidBodyPartHeader,
            format!("Unexpected Content-Transfer-Encoding '{}'", field.value()),
            field.line(),
        )),
        None => Err(BatchError::deserializer(
            MessageKey::InvalidBodyPartHeader,
            "Missing Content-Transfer-Encoding: binary",
            headers.line(),
        )),
    }
}

fn validate_forbidden_headers(request_headers: &Headers) -> Result<()> {
    for name in headers::FORBIDDEN {
        if let Some(field) = request_headers.get(name) {
            return Err(BatchError::deserializer(
                MessageKey::ForbiddenHeader,
                format!("Header '{}' is not allowed in a batch request", field.name()),
                field.line(),
            ));
        }
    }
    Ok(())
}

fn has_get_body(body: &[RawLine]) -> bool {
    match body {
        [] => false,
        [line] => !line.is_blank(),
        _ => true,
    }
}

fn body_bytes(request_headers: &Headers, body: &[RawLine]) -> Result<Bytes> {
    let bytes = join_lines(body);
    let Some(field) = request_headers.get(headers::CONTENT_LENGTH) else {
        return Ok(bytes);
    };

    let length = field
        .single_value()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .ok_or_else(|| {
            BatchError::deserializer(
                MessageKey::InvalidContentLength,
                format!("Invalid Content-Length '{}'", field.value()),
                field.line(),
            )
        })?;
    if length > bytes.len() {
        return Err(BatchError::deserializer(
            MessageKey::InvalidContentLength,
            format!("Content-Length {} exceeds the {} available bytes", length, bytes.len()),
            field.line(),
        ));
    }
    Ok(bytes.slice(..length))
}
