//! Batch parts: the unit of dispatch and the unit of serialization.

use crate::types::{BatchRequest, BatchResponse};

/// A processor-ready batch part, produced one-to-one from a parsed body part.
#[derive(Clone, Debug)]
pub enum RequestPart {
    /// A single request outside any change set.
    Single(BatchRequest),
    /// The members of one change set, in source order.
    ChangeSet(Vec<BatchRequest>),
}

impl RequestPart {
    /// Whether this part is a change set.
    pub fn is_change_set(&self) -> bool {
        matches!(self, RequestPart::ChangeSet(_))
    }

    /// The part's requests; a single request is a one-element slice.
    pub fn requests(&self) -> &[BatchRequest] {
        match self {
            RequestPart::Single(request) => std::slice::from_ref(request),
            RequestPart::ChangeSet(requests) => requests,
        }
    }
}

/// The outcome of handling one [`RequestPart`].
///
/// A failed change set collapses into [`ResponsePart::Single`] carrying the
/// failing member's response; it is not serialized as multipart.
#[derive(Clone, Debug)]
pub enum ResponsePart {
    /// One response, serialized as an `application/http` part.
    Single(BatchResponse),
    /// The responses of a successful change set, in request order.
    ChangeSet(Vec<BatchResponse>),
}

impl ResponsePart {
    /// Whether this part is serialized as a nested change set.
    pub fn is_change_set(&self) -> bool {
        matches!(self, ResponsePart::ChangeSet(_))
    }

    /// The part's responses; a single response is a one-element slice.
    pub fn responses(&self) -> &[BatchResponse] {
        match self {
            ResponsePart::Single(response) => std::slice::from_ref(response),
            ResponsePart::ChangeSet(responses) => responses,
        }
    }

    /// Whether any response in this part carries a 4xx/5xx status.
    pub fn is_error(&self) -> bool {
        self.responses().iter().any(BatchResponse::is_error)
    }
}
