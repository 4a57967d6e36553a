//! Batch execution and the Axum integration.
//!
//! # Module Organization
//!
//! ```text
//! server/
//! ├── config      - BatchConfig options
//! ├── handler     - RequestProcessor, ChangeSetFacade, BatchPartHandler
//! ├── rewriter    - ContentIdMapping and $<Content-ID> rewriting
//! ├── batch       - BatchHandler driver (continue-on-error, serialization)
//! ├── middleware  - BatchLayer and BatchState extractor
//! ├── response    - BatchHttpResponse and error responses
//! └── service     - BatchService router for POST /$batch
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RequestProcessor`] | Executes sub-requests; implemented by the application |
//! | [`BatchHandler`] | Runs a whole batch request |
//! | [`BatchService`] | Axum router for the batch endpoint |
//! | [`BatchConfig`] | Server configuration options |

mod batch;
mod config;
mod handler;
mod middleware;
mod response;
mod rewriter;
mod service;

#[cfg(test)]
mod tests;

pub use batch::BatchHandler;
pub use config::BatchConfig;
pub use handler::{BatchPartHandler, ChangeSetFacade, RequestProcessor};
pub use middleware::{BatchLayer, BatchState, BATCH_SEGMENT};
pub use response::BatchHttpResponse;
pub use rewriter::{add_mapping, rewrite, ContentIdMapping};
pub use service::BatchService;
