//! A sub-response produced by the request processor.

use crate::protocol::constants::headers;
use crate::types::Headers;
use bytes::Bytes;
use http::StatusCode;

/// One pseudo-HTTP response inside a batch response.
#[derive(Clone, Debug)]
pub struct BatchResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl BatchResponse {
    pub fn new(status: u16) -> Self {
        BatchResponse {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value, 0);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Joined value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.value(name)
    }

    pub fn content_id(&self) -> Option<String> {
        self.header(headers::CONTENT_ID)
    }

    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Canonical reason phrase, empty for unregistered codes.
    pub fn reason(&self) -> &'static str {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether this response makes a change set fail.
    #[inline]
    pub fn is_error(&self) -> bool {
        (400..600).contains(&self.status)
    }
}

impl Default for BatchResponse {
    fn default() -> Self {
        BatchResponse::new(200)
    }
}
