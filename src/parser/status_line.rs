//! Request line parsing and request-target resolution.
//!
//! A sub-request line is `METHOD SP request-target SP HTTP/1.1`. The target
//! may be written in three forms, all resolved against the service root
//! (`raw_base_uri`):
//!
//! | Form | Example | OData path |
//! |------|---------|------------|
//! | Absolute URI | `http://host/svc/People(1)` | `/People(1)` |
//! | Absolute path | `/svc/People(1)` | `/People(1)` |
//! | Relative path | `People(1)`, `$1/Orders` | `/People(1)`, `/$1/Orders` |

use crate::error::{BatchError, MessageKey, Result};
use crate::parser::line_reader::RawLine;
use crate::protocol::constants::HTTP_VERSION;
use http::Method;
use url::Url;

/// Methods a sub-request may use.
const ALLOWED_METHODS: [&str; 6] = ["GET", "POST", "PUT", "PATCH", "MERGE", "DELETE"];

/// A parsed sub-request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
    pub line: usize,
}

impl RequestLine {
    /// Parse a request line.
    ///
    /// # Errors
    ///
    /// `INVALID_STATUS_LINE` unless there are exactly three tokens,
    /// `INVALID_METHOD` for methods outside the supported set,
    /// `INVALID_HTTP_VERSION` for anything but `HTTP/1.1`.
    pub fn parse(raw: &RawLine) -> Result<Self> {
        let text = raw.text();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let [method, target, version] = tokens.as_slice() else {
            return Err(BatchError::deserializer(
                MessageKey::InvalidStatusLine,
                format!("Invalid request line '{}'", text.trim_end()),
                raw.number(),
            ));
        };

        if !ALLOWED_METHODS.contains(method) {
            return Err(BatchError::deserializer(
                MessageKey::InvalidMethod,
                format!("Unsupported method '{}'", method),
                raw.number(),
            ));
        }
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| {
            BatchError::deserializer(
                MessageKey::InvalidMethod,
                format!("Unsupported method '{}'", method),
                raw.number(),
            )
        })?;

        if *version != HTTP_VERSION {
            return Err(BatchError::deserializer(
                MessageKey::InvalidHttpVersion,
                format!("Unsupported HTTP version '{}'", version),
                raw.number(),
            ));
        }

        Ok(RequestLine {
            method,
            target: target.to_string(),
            line: raw.number(),
        })
    }

    /// Reject methods that cannot appear inside a change set.
    pub fn validate_change_set_method(&self) -> Result<()> {
        if self.method == Method::GET {
            return Err(BatchError::deserializer(
                MessageKey::InvalidMethod,
                "GET requests are not allowed inside a change set",
                self.line,
            ));
        }
        Ok(())
    }

    /// Resolve the request target against `base_uri`.
    pub fn resolve(&self, base_uri: &str) -> Result<ResolvedTarget> {
        resolve_target(&self.target, base_uri).map_err(|e| e.at_line(self.line))
    }
}

/// The pieces of a resolved request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Service root without trailing slash.
    pub base_uri: String,
    /// Resource path relative to the service root, starting with `/` unless empty.
    pub odata_path: String,
    /// Query string without `?`.
    pub query: String,
}

fn invalid_uri(target: &str) -> BatchError {
    BatchError::deserializer_unpositioned(
        MessageKey::InvalidUri,
        format!("Request target '{}' is not part of the service", target),
    )
}

fn with_leading_slash(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Split `target` into service root, OData path and query.
///
/// # Examples
///
/// ```
/// use odata_batch_axum::parser::resolve_target;
///
/// let resolved = resolve_target("People?$top=1", "http://host/svc/").unwrap();
/// assert_eq!(resolved.base_uri, "http://host/svc");
/// assert_eq!(resolved.odata_path, "/People");
/// assert_eq!(resolved.query, "$top=1");
/// ```
pub fn resolve_target(target: &str, base_uri: &str) -> Result<ResolvedTarget> {
    let base_uri = base_uri.trim_end_matches('/');
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    let odata_path = if path.contains("://") {
        let url = Url::parse(path).map_err(|_| invalid_uri(target))?;
        if base_uri.is_empty() {
            url.path().to_string()
        } else {
            let rest = path.strip_prefix(base_uri).ok_or_else(|| invalid_uri(target))?;
            if !(rest.is_empty() || rest.starts_with('/')) {
                return Err(invalid_uri(target));
            }
            rest.to_string()
        }
    } else if path.starts_with('/') {
        let base_path = if base_uri.is_empty() {
            String::new()
        } else {
            let url = Url::parse(base_uri).map_err(|_| invalid_uri(base_uri))?;
            url.path().trim_end_matches('/').to_string()
        };
        let rest = path.strip_prefix(base_path.as_str()).ok_or_else(|| invalid_uri(target))?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return Err(invalid_uri(target));
        }
        rest.to_string()
    } else {
        with_leading_slash(path)
    };

    Ok(ResolvedTarget {
        base_uri: base_uri.to_string(),
        odata_path,
        query: query.to_string(),
    })
}
