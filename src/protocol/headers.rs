//! Header value parsing and formatting for the batch wire format.
//!
//! # Header Formats
//!
//! | Header | Format | Example |
//! |--------|--------|---------|
//! | Content-Type (batch, change set) | `multipart/mixed; boundary=<token>` | `multipart/mixed; boundary=batch_36522ad7` |
//! | Content-Type (operation) | `application/http` | `application/http` |
//! | Content-Transfer-Encoding | `binary` | `binary` |
//! | Prefer | comma separated preferences | `odata.continue-on-error, odata.maxpagesize=10` |
//!
//! # Examples
//!
//! ```
//! use odata_batch_axum::protocol::{extract_boundary, format_multipart_content_type};
//!
//! let boundary = extract_boundary("multipart/mixed; boundary=\"batch_1\"").unwrap();
//! assert_eq!(boundary, "batch_1");
//! assert_eq!(format_multipart_content_type("batch_1"), "multipart/mixed; boundary=batch_1");
//! ```
//!
//! Boundary tokens follow [RFC 2046 section 5.1.1].
//!
//! [RFC 2046 section 5.1.1]: https://datatracker.ietf.org/doc/html/rfc2046#section-5.1.1

use crate::error::{BatchError, MessageKey, Result};
use crate::protocol::constants::{media, PREFERENCE_CONTINUE_ON_ERROR};
use regex::Regex;
use std::sync::OnceLock;

fn boundary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9'()+_,\-./:=? ]{0,69}[A-Za-z0-9'()+_,\-./:=?]$")
            .expect("boundary pattern is valid")
    })
}

/// The media type of a `Content-Type` value, without parameters.
pub fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or("").trim()
}

/// Whether a `Content-Type` value is `application/http`.
pub fn is_application_http(value: &str) -> bool {
    media_type(value).eq_ignore_ascii_case(media::APPLICATION_HTTP)
}

/// Whether a `Content-Type` value is `multipart/mixed`.
pub fn is_multipart_mixed(value: &str) -> bool {
    media_type(value).eq_ignore_ascii_case(media::MULTIPART_MIXED)
}

/// Whether a `Content-Transfer-Encoding` value is `binary`.
pub fn is_binary_encoding(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(media::BINARY)
}

/// Extract the boundary parameter of a `multipart/mixed` content type.
///
/// Returns `None` for other media types and for a missing or empty boundary.
/// Quoted boundaries are unquoted.
///
/// # Examples
///
/// ```
/// use odata_batch_axum::protocol::extract_boundary;
///
/// assert_eq!(
///     extract_boundary("multipart/mixed;boundary=changeset_4f1c").as_deref(),
///     Some("changeset_4f1c")
/// );
/// assert_eq!(extract_boundary("application/http"), None);
/// assert_eq!(extract_boundary("multipart/mixed"), None);
/// ```
pub fn extract_boundary(content_type: &str) -> Option<String> {
    if !is_multipart_mixed(content_type) {
        return None;
    }

    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Check a boundary token against RFC 2046.
///
/// # Errors
///
/// `INVALID_BOUNDARY` when the token is empty, longer than 70 characters,
/// ends in a space, or contains characters outside `bchars`.
pub fn validate_boundary(boundary: &str) -> Result<()> {
    if boundary_pattern().is_match(boundary) {
        Ok(())
    } else {
        Err(BatchError::deserializer_unpositioned(
            MessageKey::InvalidBoundary,
            format!("Invalid boundary: '{}'", boundary),
        ))
    }
}

/// Format the `Content-Type` of a multipart body.
#[inline]
pub fn format_multipart_content_type(boundary: &str) -> String {
    format!("{}; boundary={}", media::MULTIPART_MIXED, boundary)
}

/// Read the continue-on-error preference from `Prefer` header values.
///
/// `odata.continue-on-error` and `odata.continue-on-error=true` enable it,
/// `odata.continue-on-error=false` disables it. Returns `None` when the
/// preference is absent.
///
/// # Examples
///
/// ```
/// use odata_batch_axum::protocol::parse_continue_on_error;
///
/// let values = vec!["odata.maxpagesize=10, odata.continue-on-error".to_string()];
/// assert_eq!(parse_continue_on_error(&values), Some(true));
/// assert_eq!(parse_continue_on_error(&[]), None);
/// ```
pub fn parse_continue_on_error(values: &[String]) -> Option<bool> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .filter_map(|preference| {
            let preference = preference.split(';').next().unwrap_or("").trim();
            let (name, value) = match preference.split_once('=') {
                Some((name, value)) => (name.trim(), Some(value.trim().trim_matches('"'))),
                None => (preference, None),
            };
            if !name.eq_ignore_ascii_case(PREFERENCE_CONTINUE_ON_ERROR) {
                return None;
            }
            match value {
                None => Some(true),
                Some(v) if v.eq_ignore_ascii_case("true") => Some(true),
                Some(v) if v.eq_ignore_ascii_case("false") => Some(false),
                Some(_) => None,
            }
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_boundary_plain() {
        let b = extract_boundary("multipart/mixed; boundary=batch_36522ad7-fc75-4b56-8c71-56071383e77b");
        assert_eq!(b.as_deref(), Some("batch_36522ad7-fc75-4b56-8c71-56071383e77b"));
    }

    #[test]
    fn test_extract_boundary_case_and_params() {
        let b = extract_boundary("Multipart/Mixed; charset=utf-8; BOUNDARY=\"cs 1\"");
        assert_eq!(b.as_deref(), Some("cs 1"));
    }

    #[test]
    fn test_extract_boundary_missing() {
        assert_eq!(extract_boundary("multipart/mixed; boundary="), None);
        assert_eq!(extract_boundary("application/json; boundary=x"), None);
    }

    #[test]
    fn test_validate_boundary() {
        assert!(validate_boundary("batch_123-abc").is_ok());
        assert!(validate_boundary("with space inside").is_ok());
        assert!(validate_boundary("").is_err());
        assert!(validate_boundary("trailing ").is_err());
        assert!(validate_boundary(&"a".repeat(71)).is_err());
        assert!(validate_boundary("semi;colon").is_err());
    }

    #[test]
    fn test_validate_boundary_error_key() {
        let err = validate_boundary("").unwrap_err();
        assert_eq!(err.message_key(), Some(MessageKey::InvalidBoundary));
    }

    #[test]
    fn test_media_type_checks() {
        assert!(is_application_http("application/http"));
        assert!(is_application_http("Application/HTTP ; msgtype=request"));
        assert!(!is_application_http("application/json"));
        assert!(is_binary_encoding(" Binary "));
        assert!(!is_binary_encoding("base64"));
    }

    #[test]
    fn test_parse_continue_on_error() {
        let on = vec!["odata.continue-on-error".to_string()];
        assert_eq!(parse_continue_on_error(&on), Some(true));

        let explicit_off = vec!["odata.continue-on-error=false".to_string()];
        assert_eq!(parse_continue_on_error(&explicit_off), Some(false));

        let other = vec!["return=minimal".to_string()];
        assert_eq!(parse_continue_on_error(&other), None);
    }
}
