//! Dispatch of batch parts to the request processor.
//!
//! # Change Set Contract
//!
//! Members of a change set run in source order through a [`ChangeSetFacade`],
//! which rewrites `$<Content-ID>` references before each dispatch and records
//! the created resource after it. The first member answering with a 4xx or
//! 5xx status aborts the change set: the responses collected so far are
//! dropped and the part collapses into that single failing response. Undoing
//! the side effects of earlier members is the processor's job.
//!
//! Processors with their own transaction handling override
//! [`RequestProcessor::process_change_set`] and drive the facade themselves.

use crate::error::Result;
use crate::protocol::constants::headers;
use crate::server::rewriter::{add_mapping, rewrite, ContentIdMapping};
use crate::types::{BatchRequest, BatchResponse, RequestPart, ResponsePart};
use async_trait::async_trait;
use std::sync::Arc;

/// Executes individual sub-requests.
#[async_trait]
pub trait RequestProcessor: Send + Sync {
    /// Execute one sub-request.
    ///
    /// Failures are reported as 4xx/5xx responses, never as errors.
    async fn process(&self, request: BatchRequest) -> BatchResponse;

    /// Execute the members of one change set.
    ///
    /// The default runs the members in order through `facade` and aborts at
    /// the first failing member.
    async fn process_change_set(
        &self,
        facade: &mut ChangeSetFacade<'_>,
        requests: Vec<BatchRequest>,
    ) -> Result<ResponsePart> {
        let total = requests.len();
        let mut responses = Vec::with_capacity(total);
        for request in requests {
            let response = facade.handle(request).await;
            if response.is_error() {
                tracing::info!(
                    status = response.status,
                    completed = responses.len(),
                    total,
                    "change set aborted"
                );
                return Ok(ResponsePart::Single(response));
            }
            responses.push(response);
        }
        Ok(ResponsePart::ChangeSet(responses))
    }
}

/// Copy the request's Content-ID onto its response.
fn tag_content_id(response: &mut BatchResponse, content_id: Option<String>) {
    if let Some(content_id) = content_id {
        response.headers.set(headers::CONTENT_ID, content_id);
    }
}

/// Runs the members of one change set, owning its [`ContentIdMapping`].
pub struct ChangeSetFacade<'a> {
    processor: &'a dyn RequestProcessor,
    mapping: ContentIdMapping,
    log_requests: bool,
}

impl<'a> ChangeSetFacade<'a> {
    pub fn new(processor: &'a dyn RequestProcessor) -> Self {
        ChangeSetFacade {
            processor,
            mapping: ContentIdMapping::new(),
            log_requests: false,
        }
    }

    /// Rewrite references in `request`, dispatch it and record where the
    /// entity it touched lives.
    pub async fn handle(&mut self, request: BatchRequest) -> BatchResponse {
        let request = rewrite(request, &self.mapping);
        if self.log_requests {
            tracing::debug!(method = %request.method, uri = %request.raw_request_uri, "dispatching change set member");
        }

        let content_id = request.content_id().map(str::to_string);
        let mut response = self.processor.process(request.clone()).await;
        add_mapping(&mut self.mapping, &request, &response);
        tag_content_id(&mut response, content_id);
        response
    }

    pub fn mapping(&self) -> &ContentIdMapping {
        &self.mapping
    }
}

/// Handles one [`RequestPart`] at a time.
#[derive(Clone)]
pub struct BatchPartHandler {
    processor: Arc<dyn RequestProcessor>,
    log_requests: bool,
}

impl BatchPartHandler {
    pub fn new(processor: Arc<dyn RequestProcessor>) -> Self {
        BatchPartHandler {
            processor,
            log_requests: false,
        }
    }

    /// Log every dispatched sub-request at debug level.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    /// Dispatch a request outside any change set.
    pub async fn handle(&self, request: BatchRequest) -> BatchResponse {
        if self.log_requests {
            tracing::debug!(method = %request.method, uri = %request.raw_request_uri, "dispatching request");
        }
        let content_id = request.content_id().map(str::to_string);
        let mut response = self.processor.process(request).await;
        tag_content_id(&mut response, content_id);
        response
    }

    /// Dispatch a whole part.
    ///
    /// # Errors
    ///
    /// Only a custom [`RequestProcessor::process_change_set`] can fail.
    pub async fn handle_batch_request(&self, part: RequestPart) -> Result<ResponsePart> {
        match part {
            RequestPart::Single(request) => Ok(ResponsePart::Single(self.handle(request).await)),
            RequestPart::ChangeSet(requests) => {
                let mut facade = ChangeSetFacade::new(self.processor.as_ref());
                facade.log_requests = self.log_requests;
                self.processor.process_change_set(&mut facade, requests).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::sync::Mutex;

    /// Creates `People(n)` for every POST and fails requests to `/Fail`.
    #[derive(Default)]
    struct PeopleProcessor {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RequestProcessor for PeopleProcessor {
        async fn process(&self, request: BatchRequest) -> BatchResponse {
            let mut seen = self.seen.lock().unwrap();
            seen.push(format!("{} {}", request.method, request.raw_odata_path));
            if request.raw_odata_path == "/Fail" {
                return BatchResponse::new(500);
            }
            if request.method == Method::POST {
                let location = format!("{}/People({})", request.raw_base_uri, seen.len());
                return BatchResponse::new(201).with_header("Location", location);
            }
            BatchResponse::new(204)
        }
    }

    fn member(method: Method, path: &str, id: &str) -> BatchRequest {
        BatchRequest::new(method, "http://host/svc", path).with_header("Content-ID", id)
    }

    #[tokio::test]
    async fn test_single_request_keeps_content_id() {
        let handler = BatchPartHandler::new(Arc::new(PeopleProcessor::default()));
        let part = RequestPart::Single(member(Method::GET, "/People", "7"));
        let response = handler.handle_batch_request(part).await.unwrap();
        assert_eq!(response.responses()[0].content_id().as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_change_set_resolves_forward_references() {
        let processor = Arc::new(PeopleProcessor::default());
        let handler = BatchPartHandler::new(processor.clone());
        let part = RequestPart::ChangeSet(vec![
            member(Method::POST, "/People", "1"),
            member(Method::PATCH, "/$1", "2"),
        ]);

        let response = handler.handle_batch_request(part).await.unwrap();
        assert!(response.is_change_set());
        assert_eq!(response.responses().len(), 2);
        assert_eq!(response.responses()[1].content_id().as_deref(), Some("2"));

        let seen = processor.seen.lock().unwrap();
        assert_eq!(seen[1], "PATCH /People(1)");
    }

    #[tokio::test]
    async fn test_change_set_aborts_at_first_failure() {
        let processor = Arc::new(PeopleProcessor::default());
        let handler = BatchPartHandler::new(processor.clone());
        let part = RequestPart::ChangeSet(vec![
            member(Method::POST, "/People", "1"),
            member(Method::DELETE, "/Fail", "2"),
            member(Method::POST, "/People", "3"),
        ]);

        let response = handler.handle_batch_request(part).await.unwrap();
        assert!(!response.is_change_set());
        assert_eq!(response.responses()[0].status, 500);
        assert_eq!(response.responses()[0].content_id().as_deref(), Some("2"));
        assert_eq!(processor.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_facade_mapping_is_per_change_set() {
        let processor = PeopleProcessor::default();
        let mut facade = ChangeSetFacade::new(&processor);
        facade.handle(member(Method::POST, "/People", "1")).await;
        assert_eq!(facade.mapping().get("1"), Some("http://host/svc/People(1)"));

        let fresh = ChangeSetFacade::new(&processor);
        assert!(fresh.mapping().is_empty());
    }
}
