#![doc = include_str!("../README.md")]

//! # OData Batch Processing
//!
//! This crate implements the OData `$batch` request: many HTTP requests
//! packed into one `multipart/mixed` body, executed in order, and answered by
//! one `multipart/mixed` response.
//!
//! ## Overview
//!
//! A batch request is processed in four stages:
//!
//! 1. **Parsing** - Split the body at boundary delimiters, validate the batch
//!    grammar, and build one [`RequestPart`] per top-level part
//! 2. **Dispatch** - Hand each part to the application's [`RequestProcessor`];
//!    change sets run atomically and may reference earlier members through
//!    `$<Content-ID>`
//! 3. **Continue-on-error** - Stop after the first failed part unless the
//!    client sent `Prefer: odata.continue-on-error`
//! 4. **Serialization** - Write the [`ResponsePart`]s back as
//!    `multipart/mixed` with fresh boundaries
//!
//! Malformed bodies are rejected as a whole with a [`BatchError`] naming the
//! construct ([`MessageKey`]) and the line it was found on. Failing
//! sub-requests are not errors: they travel inside the batch response.
//!
//! ## Server Usage
//!
//! ```ignore
//! use async_trait::async_trait;
//! use axum::Router;
//! use odata_batch_axum::{BatchRequest, BatchResponse, BatchService, RequestProcessor};
//! use std::sync::Arc;
//!
//! struct Service;
//!
//! #[async_trait]
//! impl RequestProcessor for Service {
//!     async fn process(&self, request: BatchRequest) -> BatchResponse {
//!         BatchResponse::new(204)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new().nest("/odata", BatchService::new(Arc::new(Service)).router());
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[types]** - Requests, responses, parts and header blocks
//! - **[error]** - Error types and result handling
//! - **[parser]** - Batch request and batch response parsing
//! - **[server]** - Dispatch, reference rewriting and Axum integration
//! - **[protocol]** - Wire constants, header parsing and the response serializer

pub mod error;
pub mod parser;
pub mod protocol;
pub mod server;
pub mod types;

pub use error::{BatchError, DeserializerError, MessageKey, Result};
pub use parser::{parse_batch_request, parse_batch_response, BatchOptions};
pub use protocol::serialize_batch_response;
pub use server::{BatchConfig, BatchHandler, BatchService, RequestProcessor};
pub use types::{BatchRequest, BatchResponse, HeaderField, Headers, RequestPart, ResponsePart};
