//! Axum service exposing the `$batch` endpoint.

use crate::error::Result;
use crate::protocol::BoundaryGenerator;
use crate::server::batch::BatchHandler;
use crate::server::config::BatchConfig;
use crate::server::handler::RequestProcessor;
use crate::server::middleware::{BatchLayer, BatchState};
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Router,
};
use bytes::Bytes;
use std::sync::Arc;

/// A batch endpoint in front of a [`RequestProcessor`].
///
/// ```ignore
/// let app = Router::new().nest("/odata", BatchService::new(processor).router());
/// // POST /odata/$batch
/// ```
#[derive(Clone)]
pub struct BatchService {
    handler: Arc<BatchHandler>,
    layer: BatchLayer,
}

impl BatchService {
    pub fn new(processor: Arc<dyn RequestProcessor>) -> Self {
        BatchService {
            handler: Arc::new(BatchHandler::new(processor)),
            layer: BatchLayer::new(),
        }
    }

    /// # Errors
    ///
    /// `BatchError::Config` when a boundary prefix in `config` is unusable.
    pub fn with_config(processor: Arc<dyn RequestProcessor>, config: BatchConfig) -> Result<Self> {
        Ok(BatchService {
            handler: Arc::new(BatchHandler::with_config(processor, config.clone())?),
            layer: BatchLayer::with_config(config),
        })
    }

    /// Use `generator` for every response and change-set boundary.
    pub fn with_boundary_generator(self, generator: Arc<dyn BoundaryGenerator>) -> Self {
        let handler = self.handler.as_ref().clone().with_boundary_generator(generator);
        BatchService {
            handler: Arc::new(handler),
            layer: self.layer,
        }
    }

    pub fn handler(&self) -> &BatchHandler {
        &self.handler
    }

    /// Router with `POST /$batch`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/$batch", post(handle_batch))
            .layer(self.layer.middleware())
            .with_state(self.handler.clone())
    }
}

async fn handle_batch(
    State(handler): State<Arc<BatchHandler>>,
    Extension(state): Extension<Arc<BatchState>>,
    body: Bytes,
) -> Response {
    match handler.handle(&state, body).await {
        Ok(response) => response.into_response(),
        Err(err) => err.into_response(),
    }
}
