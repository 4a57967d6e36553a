//! OData batch server example
//!
//! Serves an in-memory `Products` entity set behind `POST /odata/$batch`.
//!
//! Run with: cargo run --example batch_server
//!
//! Then send a batch:
//!
//! ```sh
//! curl -s http://localhost:3000/odata/\$batch \
//!   -H 'Content-Type: multipart/mixed; boundary=b' \
//!   --data-binary $'--b\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\nGET Products HTTP/1.1\r\n\r\n\r\n--b--\r\n'
//! ```

use async_trait::async_trait;
use axum::Router;
use odata_batch_axum::{BatchConfig, BatchRequest, BatchResponse, BatchService, RequestProcessor};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Products {
    items: RwLock<BTreeMap<u32, String>>,
}

#[async_trait]
impl RequestProcessor for Products {
    async fn process(&self, request: BatchRequest) -> BatchResponse {
        tracing::info!(method = %request.method, uri = %request.raw_request_uri, "sub-request");

        let path = request.raw_odata_path.as_str();
        if path == "/Products" {
            return match request.method.as_str() {
                "GET" => {
                    let items = self.items.read().await;
                    let names: Vec<&str> = items.values().map(String::as_str).collect();
                    BatchResponse::new(200)
                        .with_header("Content-Type", "text/plain")
                        .with_body(names.join("\n"))
                }
                "POST" => {
                    let mut items = self.items.write().await;
                    let id = items.keys().next_back().map_or(1, |last| last + 1);
                    items.insert(id, request.body_str().unwrap_or_default().to_string());
                    BatchResponse::new(201)
                        .with_header("Location", format!("{}/Products({})", request.raw_base_uri, id))
                }
                _ => BatchResponse::new(405),
            };
        }

        let id = path
            .strip_prefix("/Products(")
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(|key| key.parse::<u32>().ok());
        let Some(id) = id else {
            return BatchResponse::new(404);
        };

        let mut items = self.items.write().await;
        if !items.contains_key(&id) {
            return BatchResponse::new(404);
        }
        match request.method.as_str() {
            "GET" => BatchResponse::new(200)
                .with_header("Content-Type", "text/plain")
                .with_body(items[&id].clone()),
            "PUT" | "PATCH" | "MERGE" => {
                items.insert(id, request.body_str().unwrap_or_default().to_string());
                BatchResponse::new(204)
            }
            "DELETE" => {
                items.remove(&id);
                BatchResponse::new(204)
            }
            _ => BatchResponse::new(405),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = BatchConfig {
        strict: false,
        ..BatchConfig::default()
    };
    let service = BatchService::with_config(Arc::new(Products::default()), config)?;
    let app = Router::new().nest("/odata", service.router());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("listening on http://localhost:3000/odata/$batch");
    axum::serve(listener, app).await?;
    Ok(())
}
