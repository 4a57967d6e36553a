//! Content-ID reference rewriting inside a change set.
//!
//! A change-set member may refer to an entity created by an earlier member
//! with `$<Content-ID>`, either as the first path segment (`$1/Orders`) or in
//! its body (`{"Friend@odata.bind": "$1"}`). After each successful dispatch the
//! created resource is recorded in the change set's [`ContentIdMapping`];
//! before each dispatch references to recorded ids are replaced.
//!
//! Unknown references are left alone. The processor reports them as a 4xx
//! like any other unresolvable resource.

use crate::protocol::constants::headers;
use crate::types::{BatchRequest, BatchResponse};
use http::Method;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$([A-Za-z0-9._~-]+)").expect("reference pattern is valid"))
}

/// Locations of the resources created so far in one change set, by Content-ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentIdMapping {
    locations: HashMap<String, String>,
}

impl ContentIdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `location` for `content_id`. The first recorded location wins.
    pub fn insert(&mut self, content_id: impl Into<String>, location: impl Into<String>) {
        self.locations.entry(content_id.into()).or_insert_with(|| location.into());
    }

    pub fn get(&self, content_id: &str) -> Option<&str> {
        self.locations.get(content_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

fn relative_to_base(location: &str, base_uri: &str) -> String {
    let base_uri = base_uri.trim_end_matches('/');
    let path = if base_uri.is_empty() {
        location
    } else {
        location.strip_prefix(base_uri).unwrap_or(location)
    };
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn rewrite_path(request: &mut BatchRequest, mapping: &ContentIdMapping) -> bool {
    let path = request.raw_odata_path.trim_start_matches('/');
    let (first, rest) = match path.find('/') {
        Some(i) => path.split_at(i),
        None => (path, ""),
    };
    let Some(location) = first.strip_prefix('$').and_then(|id| mapping.get(id)) else {
        return false;
    };

    request.raw_odata_path = format!("{}{}", relative_to_base(location, &request.raw_base_uri), rest);
    request.refresh_request_uri();
    true
}

/// Resolve the token after a `$`, letting trailing periods end a sentence.
fn resolve_token<'a>(token: &'a str, mapping: &'a ContentIdMapping) -> Option<(&'a str, &'a str)> {
    if let Some(location) = mapping.get(token) {
        return Some((location, ""));
    }
    let id = token.trim_end_matches('.');
    if id.is_empty() || id.len() == token.len() {
        return None;
    }
    mapping.get(id).map(|location| (location, &token[id.len()..]))
}

fn rewrite_body(request: &mut BatchRequest, mapping: &ContentIdMapping) -> bool {
    let Some(text) = request.body_str() else {
        return false;
    };

    let mut replaced = false;
    let rewritten = reference_pattern().replace_all(text, |caps: &Captures<'_>| {
        match resolve_token(&caps[1], mapping) {
            Some((location, trailing)) => {
                replaced = true;
                format!("{}{}", location, trailing)
            }
            None => caps[0].to_string(),
        }
    });
    if !replaced {
        return false;
    }

    let rewritten = rewritten.into_owned();
    if request.headers.contains(headers::CONTENT_LENGTH) {
        request.headers.set(headers::CONTENT_LENGTH, rewritten.len().to_string());
    }
    request.body = rewritten.into();
    true
}

/// Replace `$<Content-ID>` references in `request` with recorded locations.
///
/// Only the leading path segment and the body are rewritten; the query
/// string is kept as written.
///
/// # Examples
///
/// ```
/// use http::Method;
/// use odata_batch_axum::server::{rewrite, ContentIdMapping};
/// use odata_batch_axum::BatchRequest;
///
/// let mut mapping = ContentIdMapping::new();
/// mapping.insert("1", "http://host/svc/People(5)");
///
/// let request = BatchRequest::new(Method::POST, "http://host/svc", "/$1/Trips");
/// let request = rewrite(request, &mapping);
/// assert_eq!(request.raw_odata_path, "/People(5)/Trips");
/// assert_eq!(request.raw_request_uri, "http://host/svc/People(5)/Trips");
/// ```
pub fn rewrite(mut request: BatchRequest, mapping: &ContentIdMapping) -> BatchRequest {
    if mapping.is_empty() {
        return request;
    }
    let path = rewrite_path(&mut request, mapping);
    let body = rewrite_body(&mut request, mapping);
    if path || body {
        tracing::debug!(uri = %request.raw_request_uri, path, body, "rewrote content-id references");
    }
    request
}

/// Record where the entity handled by `request` lives, if the dispatch
/// succeeded and the request has a Content-ID.
pub fn add_mapping(mapping: &mut ContentIdMapping, request: &BatchRequest, response: &BatchResponse) {
    if response.status >= 400 {
        return;
    }
    let Some(content_id) = request.content_id() else {
        return;
    };

    let location = if request.method == Method::POST {
        response
            .header(headers::LOCATION)
            .or_else(|| response.header(headers::ODATA_ENTITY_ID))
    } else {
        Some(request.raw_odata_path.clone()).filter(|path| !path.is_empty())
    };

    if let Some(location) = location {
        mapping.insert(content_id, location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://host/svc";

    fn mapping() -> ContentIdMapping {
        let mut mapping = ContentIdMapping::new();
        mapping.insert("1", "http://host/svc/People(5)");
        mapping
    }

    #[test]
    fn test_first_location_wins() {
        let mut mapping = mapping();
        mapping.insert("1", "http://host/svc/People(6)");
        assert_eq!(mapping.get("1"), Some("http://host/svc/People(5)"));
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_rewrites_reference_segment_only() {
        let request = BatchRequest::new(Method::PATCH, BASE, "/$1").with_query("$filter=x eq $1");
        let request = rewrite(request, &mapping());
        assert_eq!(request.raw_odata_path, "/People(5)");
        assert_eq!(request.raw_query_path, "$filter=x eq $1");
        assert_eq!(request.raw_request_uri, "http://host/svc/People(5)?$filter=x eq $1");
    }

    #[test]
    fn test_unknown_reference_is_untouched() {
        let request = BatchRequest::new(Method::PATCH, BASE, "/$2/Trips");
        let request = rewrite(request, &mapping());
        assert_eq!(request.raw_odata_path, "/$2/Trips");
    }

    #[test]
    fn test_reference_must_be_whole_segment() {
        let request = BatchRequest::new(Method::PATCH, BASE, "/$10");
        let request = rewrite(request, &mapping());
        assert_eq!(request.raw_odata_path, "/$10");
    }

    #[test]
    fn test_body_references_update_content_length() {
        let body = r#"{"Friend@odata.bind":"$1","Other":"$12"}"#;
        let request = BatchRequest::new(Method::POST, BASE, "/People")
            .with_header("Content-Length", body.len().to_string())
            .with_body(body);
        let request = rewrite(request, &mapping());

        let expected = r#"{"Friend@odata.bind":"http://host/svc/People(5)","Other":"$12"}"#;
        assert_eq!(request.body_str(), Some(expected));
        assert_eq!(request.header("content-length"), Some(expected.len().to_string()));
    }

    #[test]
    fn test_body_reference_before_period() {
        let request = BatchRequest::new(Method::POST, BASE, "/Notes").with_body("see $1. and $1.. but not $12.");
        let request = rewrite(request, &mapping());
        assert_eq!(
            request.body_str(),
            Some("see http://host/svc/People(5). and http://host/svc/People(5).. but not $12.")
        );
    }

    #[test]
    fn test_binary_body_is_untouched() {
        let request = BatchRequest::new(Method::PUT, BASE, "/Photos(1)/$value")
            .with_body(vec![0xff_u8, b'$', b'1']);
        let request = rewrite(request, &mapping());
        assert_eq!(&request.body[..], &[0xff, b'$', b'1']);
    }

    #[test]
    fn test_post_mapping_from_location() {
        let mut mapping = ContentIdMapping::new();
        let request = BatchRequest::new(Method::POST, BASE, "/People").with_header("Content-ID", "1");
        let response = BatchResponse::new(201).with_header("Location", "http://host/svc/People(7)");
        add_mapping(&mut mapping, &request, &response);
        assert_eq!(mapping.get("1"), Some("http://host/svc/People(7)"));
    }

    #[test]
    fn test_post_mapping_falls_back_to_entity_id() {
        let mut mapping = ContentIdMapping::new();
        let request = BatchRequest::new(Method::POST, BASE, "/People").with_header("Content-ID", "1");
        let response = BatchResponse::new(204).with_header("OData-EntityId", "People(8)");
        add_mapping(&mut mapping, &request, &response);
        assert_eq!(mapping.get("1"), Some("People(8)"));
    }

    #[test]
    fn test_update_mapping_uses_request_path() {
        let mut mapping = ContentIdMapping::new();
        let request = BatchRequest::new(Method::PATCH, BASE, "/People(3)").with_header("Content-ID", "2");
        add_mapping(&mut mapping, &request, &BatchResponse::new(204));
        assert_eq!(mapping.get("2"), Some("/People(3)"));
    }

    #[test]
    fn test_failed_dispatch_records_nothing() {
        let mut mapping = ContentIdMapping::new();
        let request = BatchRequest::new(Method::POST, BASE, "/People").with_header("Content-ID", "1");
        let response = BatchResponse::new(400).with_header("Location", "http://host/svc/People(9)");
        add_mapping(&mut mapping, &request, &response);
        assert!(mapping.is_empty());
    }
}
