//! Wire-level constants of the multipart batch format.

/// Line terminator used for everything this crate writes.
pub const CRLF: &str = "\r\n";

/// The only HTTP version accepted on sub-requests and written on sub-responses.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Header names.
pub mod headers {
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
    pub const CONTENT_ID: &str = "Content-ID";
    /// Spelling used when writing a part's `Content-ID`.
    pub const CONTENT_ID_OUT: &str = "Content-Id";
    pub const LOCATION: &str = "Location";
    pub const ODATA_ENTITY_ID: &str = "OData-EntityId";
    pub const PREFER: &str = "Prefer";
    pub const PREFERENCE_APPLIED: &str = "Preference-Applied";

    /// Headers a sub-request must not carry.
    pub const FORBIDDEN: [&str; 6] = ["Authorization", "Expect", "From", "Max-Forwards", "Range", "TE"];
}

/// Media types and header values.
pub mod media {
    pub const APPLICATION_HTTP: &str = "application/http";
    pub const MULTIPART_MIXED: &str = "multipart/mixed";
    pub const BINARY: &str = "binary";
}

/// Preference that keeps a batch running after a failed part.
pub const PREFERENCE_CONTINUE_ON_ERROR: &str = "odata.continue-on-error";

/// Default prefix of generated top-level boundaries.
pub const BATCH_BOUNDARY_PREFIX: &str = "batch_";

/// Default prefix of generated change-set boundaries.
pub const CHANGE_SET_BOUNDARY_PREFIX: &str = "changeset_";
