//! The batch driver: parse, dispatch part by part, serialize.

use crate::error::{BatchError, MessageKey, Result};
use crate::parser::{parse_batch_request, BatchOptions};
use crate::protocol::constants::{headers, PREFERENCE_CONTINUE_ON_ERROR};
use crate::protocol::{
    format_multipart_content_type, BatchResponseSerializer, BoundaryGenerator, UuidBoundaryGenerator,
};
use crate::server::config::BatchConfig;
use crate::server::handler::{BatchPartHandler, RequestProcessor};
use crate::server::middleware::BatchState;
use crate::server::response::BatchHttpResponse;
use crate::types::{RequestPart, ResponsePart};
use bytes::Bytes;
use std::sync::Arc;

/// Executes whole batch requests against a [`RequestProcessor`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use odata_batch_axum::server::{BatchHandler, BatchState, RequestProcessor};
/// use odata_batch_axum::{BatchRequest, BatchResponse};
/// use std::sync::Arc;
///
/// struct NoContent;
///
/// #[async_trait]
/// impl RequestProcessor for NoContent {
///     async fn process(&self, _request: BatchRequest) -> BatchResponse {
///         BatchResponse::new(204)
///     }
/// }
///
/// let handler = BatchHandler::new(Arc::new(NoContent));
/// let state = BatchState {
///     content_type: Some("multipart/mixed; boundary=b".into()),
///     boundary: Some("b".into()),
///     ..Default::default()
/// };
/// let body = "--b\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n\
///             DELETE People(1) HTTP/1.1\r\n\r\n\r\n--b--\r\n";
///
/// let response = tokio_test::block_on(handler.handle(&state, body)).unwrap();
/// assert_eq!(response.status(), 202);
/// ```
#[derive(Clone)]
pub struct BatchHandler {
    part_handler: BatchPartHandler,
    config: BatchConfig,
    generator: Arc<dyn BoundaryGenerator>,
}

impl BatchHandler {
    pub fn new(processor: Arc<dyn RequestProcessor>) -> Self {
        Self::from_parts(processor, BatchConfig::default())
    }

    /// # Errors
    ///
    /// `BatchError::Config` when a boundary prefix in `config` is unusable.
    pub fn with_config(processor: Arc<dyn RequestProcessor>, config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(processor, config))
    }

    fn from_parts(processor: Arc<dyn RequestProcessor>, config: BatchConfig) -> Self {
        BatchHandler {
            part_handler: BatchPartHandler::new(processor).with_request_logging(config.enable_logging),
            config,
            generator: Arc::new(UuidBoundaryGenerator),
        }
    }

    /// Draw response and change-set boundaries from `generator`.
    pub fn with_boundary_generator(mut self, generator: Arc<dyn BoundaryGenerator>) -> Self {
        self.generator = generator;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Parser options for a batch addressed to `base_uri`.
    pub fn parse_options(&self, base_uri: &str) -> BatchOptions {
        BatchOptions::builder()
            .strict(self.config.strict)
            .raw_base_uri(base_uri)
            .raw_service_resolution_uri(base_uri)
            .build()
    }

    /// Whether to keep going after a failed part, given the client preference.
    pub fn continue_on_error(&self, preference: Option<bool>) -> bool {
        preference.unwrap_or(self.config.continue_on_error)
    }

    /// Dispatch `parts` in order.
    ///
    /// Without continue-on-error, processing stops after the first part that
    /// yields an error status; that part is still part of the result.
    pub async fn handle_parts(
        &self,
        parts: Vec<RequestPart>,
        continue_on_error: bool,
    ) -> Result<Vec<ResponsePart>> {
        let total = parts.len();
        let mut responses = Vec::with_capacity(total);

        for part in parts {
            let response = self.part_handler.handle_batch_request(part).await?;
            let failed = response.is_error();
            responses.push(response);

            if failed && !continue_on_error {
                tracing::info!(handled = responses.len(), total, "batch stopped after failed part");
                break;
            }
        }
        Ok(responses)
    }

    /// Serialize response parts with a fresh top-level boundary.
    ///
    /// Returns the boundary together with the body.
    pub fn serialize(&self, parts: &[ResponsePart]) -> (String, Bytes) {
        let boundary = self.generator.generate(&self.config.response_boundary_prefix);
        let serializer = BatchResponseSerializer::with_generator(self.generator.clone())
            .with_change_set_prefix(self.config.change_set_boundary_prefix.clone());
        let body = serializer.serialize(parts, &boundary);
        (boundary, body)
    }

    /// Process one batch request end to end.
    ///
    /// # Errors
    ///
    /// A missing or invalid batch boundary and every grammar violation in the
    /// body are deserializer errors; nothing is dispatched in that case.
    pub async fn handle(&self, state: &BatchState, body: impl Into<Bytes>) -> Result<BatchHttpResponse> {
        let boundary = state.boundary.as_deref().ok_or_else(|| {
            BatchError::deserializer_unpositioned(
                MessageKey::InvalidBodyPartHeader,
                format!(
                    "Batch request needs a multipart/mixed content type with boundary, got '{}'",
                    state.content_type.as_deref().unwrap_or("")
                ),
            )
        })?;

        let options = self.parse_options(&state.base_uri);
        let parts = parse_batch_request(body, boundary, &options)?;

        let continue_on_error = self.continue_on_error(state.continue_on_error);
        let responses = self.handle_parts(parts, continue_on_error).await?;
        let (response_boundary, body) = self.serialize(&responses);

        let mut response = BatchHttpResponse::new(202).with_header(
            headers::CONTENT_TYPE,
            format_multipart_content_type(&response_boundary),
        );
        if state.continue_on_error == Some(true) {
            response = response.with_header(headers::PREFERENCE_APPLIED, PREFERENCE_CONTINUE_ON_ERROR);
        }
        Ok(response.with_body(body))
    }
}
