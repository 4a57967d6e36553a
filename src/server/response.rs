//! The HTTP response carrying a serialized batch.
//!
//! # Response Format
//!
//! A processed batch always answers with:
//! - **Status**: `202 Accepted`, whatever the outcome of individual parts
//! - **Content-Type**: `multipart/mixed; boundary=batch_<uuid>`
//! - **Preference-Applied**: `odata.continue-on-error`, when the client asked
//!   for it
//! - **Content-Length**: length of the serialized body

use crate::error::BatchError;
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use std::collections::BTreeMap;

/// Builder for the outer batch response.
///
/// # Examples
///
/// ```
/// use odata_batch_axum::server::BatchHttpResponse;
///
/// let response = BatchHttpResponse::new(202)
///     .with_header("Content-Type", "multipart/mixed; boundary=batch_1")
///     .with_body("--batch_1--\r\n");
/// assert_eq!(response.status(), 202);
/// assert_eq!(response.header("content-type"), Some("multipart/mixed; boundary=batch_1"));
/// ```
#[derive(Clone, Debug)]
pub struct BatchHttpResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Bytes,
}

impl BatchHttpResponse {
    pub fn new(status: u16) -> Self {
        BatchHttpResponse {
            status,
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Build the axum response.
    ///
    /// A header that cannot be put on the wire turns the whole response into
    /// a `500 Internal Server Error`.
    pub fn build(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::builder().status(status);

        for (key, value) in &self.headers {
            let parsed = HeaderName::from_bytes(key.as_bytes())
                .ok()
                .zip(HeaderValue::from_str(value).ok());
            let Some((name, header_value)) = parsed else {
                tracing::error!(header = %key, value = ?value, "batch response header is not valid HTTP");
                return internal_error(format!("Invalid response header '{}'", key));
            };
            response = response.header(name, header_value);
        }

        response
            .header(header::CONTENT_LENGTH, self.body.len())
            .body(Body::from(self.body))
            .unwrap_or_else(|_| Response::default())
    }
}

impl IntoResponse for BatchHttpResponse {
    fn into_response(self) -> Response {
        self.build()
    }
}

fn internal_error(message: String) -> Response {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Rejected batches answer with their status code and the error text.
impl IntoResponse for BatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            BatchError::Deserializer(err) => tracing::warn!(key = %err.key, line = ?err.line, "rejected batch request"),
            other => tracing::error!(error = %other, "batch processing failed"),
        }
        BatchHttpResponse::new(status)
            .with_header(header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8")
            .with_body(self.to_string())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessageKey;

    #[test]
    fn test_build_sets_content_length() {
        let response = BatchHttpResponse::new(202).with_body("abc").build();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "3");
    }

    #[test]
    fn test_invalid_header_value_is_server_error() {
        let response = BatchHttpResponse::new(202)
            .with_header("Content-Type", "multipart/mixed; boundary=bad;\r\nx")
            .with_body("--bad--\r\n")
            .build();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn test_deserializer_error_is_bad_request() {
        let err = BatchError::deserializer(MessageKey::MissingContentId, "no id", 12);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn test_processor_error_is_server_error() {
        let response = BatchError::Processor("rollback failed".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
