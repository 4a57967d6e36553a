//! Axum middleware for batch requests.
//!
//! Extracts the batch-level information from the outer HTTP request (the
//! multipart boundary, the `Prefer` header and the service root) and makes it
//! available to handlers.
//!
//! # Usage
//!
//! ```ignore
//! use axum::{Router, routing::post, Extension};
//! use odata_batch_axum::server::{BatchLayer, BatchState};
//! use std::sync::Arc;
//!
//! async fn handler(Extension(batch): Extension<Arc<BatchState>>) -> String {
//!     format!("{:?}", batch.boundary)
//! }
//!
//! let app = Router::new()
//!     .route("/$batch", post(handler))
//!     .layer(BatchLayer::new().middleware());
//! ```

use crate::protocol::constants::headers;
use crate::protocol::{extract_boundary, parse_continue_on_error};
use crate::server::config::BatchConfig;
use axum::{
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Path segment of the batch endpoint.
pub const BATCH_SEGMENT: &str = "$batch";

async fn batch_middleware_handler(State(layer): State<BatchLayer>, req: Request, next: Next) -> Response {
    layer.handle_middleware(req, next).await
}

/// Batch information extracted from the outer request.
#[derive(Clone, Debug, Default)]
pub struct BatchState {
    /// Full `Content-Type` of the batch request.
    pub content_type: Option<String>,

    /// Boundary parameter of a `multipart/mixed` content type.
    pub boundary: Option<String>,

    /// `odata.continue-on-error` from `Prefer`, `None` when not requested.
    pub continue_on_error: Option<bool>,

    /// Service root that sub-request targets resolve against.
    pub base_uri: String,
}

impl BatchState {
    /// Parse the batch headers of a request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let boundary = content_type.as_deref().and_then(extract_boundary);

        let prefer: Vec<String> = headers
            .get_all(headers::PREFER)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        BatchState {
            content_type,
            boundary,
            continue_on_error: parse_continue_on_error(&prefer),
            base_uri: String::new(),
        }
    }

    /// Derive the service root from the request URI of the batch endpoint.
    ///
    /// `http://host/svc/$batch` and `/svc/$batch` with `Host: host` both give
    /// `http://host/svc`.
    #[must_use]
    pub fn with_request_uri(mut self, uri: &Uri, headers: &HeaderMap) -> Self {
        let path = uri.path().trim_end_matches('/');
        let root = path
            .strip_suffix(BATCH_SEGMENT)
            .unwrap_or(path)
            .trim_end_matches('/');

        let authority = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| {
                headers
                    .get(axum::http::header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            });
        let scheme = uri.scheme_str().unwrap_or("http");

        self.base_uri = match authority {
            Some(authority) => format!("{}://{}{}", scheme, authority, root),
            None => root.to_string(),
        };
        self
    }
}

/// Axum middleware layer attaching [`BatchState`] to every request.
#[derive(Clone, Debug, Default)]
pub struct BatchLayer {
    config: BatchConfig,
}

impl BatchLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: BatchConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Create the middleware for use with `Router::layer()`.
    #[must_use]
    pub fn middleware(
        &self,
    ) -> impl tower::Layer<
        axum::routing::Route,
        Service = impl tower::Service<
            Request,
            Response = Response,
            Error = std::convert::Infallible,
            Future = impl Send + 'static,
        > + Clone
                      + Send
                      + Sync
                      + 'static,
    > + Clone {
        axum::middleware::from_fn_with_state(self.clone(), batch_middleware_handler)
    }

    async fn handle_middleware(&self, mut req: Request, next: Next) -> Response {
        let uri = req
            .extensions()
            .get::<OriginalUri>()
            .map_or_else(|| req.uri().clone(), |original| original.0.clone());
        let state = BatchState::from_headers(req.headers()).with_request_uri(&uri, req.headers());
        if self.config.enable_logging {
            tracing::debug!(
                base_uri = %state.base_uri,
                boundary = ?state.boundary,
                continue_on_error = ?state.continue_on_error,
                "batch request received"
            );
        }
        req.extensions_mut().insert(Arc::new(state));
        next.run(req).await
    }
}
