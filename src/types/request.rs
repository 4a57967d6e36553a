//! A sub-request ready for dispatch.

use crate::protocol::constants::headers;
use crate::types::Headers;
use bytes::Bytes;
use http::Method;

/// One pseudo-HTTP request extracted from a batch body.
///
/// The URI is kept in the raw, undecoded pieces the request processor needs to
/// resolve it: the service root (`raw_base_uri`), the resource path relative
/// to it (`raw_odata_path`, always starting with `/`) and the query string
/// without its `?`.
#[derive(Clone, Debug)]
pub struct BatchRequest {
    pub method: Method,
    pub raw_base_uri: String,
    pub raw_odata_path: String,
    pub raw_query_path: String,
    pub raw_request_uri: String,
    pub raw_service_resolution_uri: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl BatchRequest {
    /// Create a request for `odata_path` relative to `base_uri`.
    ///
    /// Mostly useful for processors and tests that synthesize requests; the
    /// batch parser fills every field itself.
    pub fn new(method: Method, base_uri: impl Into<String>, odata_path: impl Into<String>) -> Self {
        let mut request = BatchRequest {
            method,
            raw_base_uri: base_uri.into(),
            raw_odata_path: odata_path.into(),
            raw_query_path: String::new(),
            raw_request_uri: String::new(),
            raw_service_resolution_uri: String::new(),
            headers: Headers::new(),
            body: Bytes::new(),
        };
        request.refresh_request_uri();
        request
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.raw_query_path = query.into();
        self.refresh_request_uri();
        self
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

    /// The request's `Content-ID`, if it carries exactly one.
    pub fn content_id(&self) -> Option<&str> {
        self.headers.get(headers::CONTENT_ID).and_then(|f| f.single_value())
    }

    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Recompute `raw_request_uri` from the base, path and query pieces.
    pub fn refresh_request_uri(&mut self) {
        let mut uri = format!("{}{}", self.raw_base_uri, self.raw_odata_path);
        if !self.raw_query_path.is_empty() {
            uri.push('?');
            uri.push_str(&self.raw_query_path);
        }
        self.raw_request_uri = uri;
    }
}
