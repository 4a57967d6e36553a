//! Tests for the batch server module.
//!
//! - BatchConfig
//! - BatchHandler driver and continue-on-error
//! - BatchService router

#[cfg(test)]
mod config_tests {
    use crate::server::BatchConfig;

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert!(config.strict);
        assert!(!config.continue_on_error);
        assert!(config.enable_logging);
        assert_eq!(config.response_boundary_prefix, "batch_");
        assert_eq!(config.change_set_boundary_prefix, "changeset_");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{"strict": false, "change_set_boundary_prefix": "cs_"}"#;
        let config = BatchConfig::from_json(json).unwrap();
        assert!(!config.strict);
        assert_eq!(config.change_set_boundary_prefix, "cs_");
        assert_eq!(config.response_boundary_prefix, "batch_");
    }

    #[test]
    fn test_config_rejects_unusable_boundary_prefix() {
        let err = BatchConfig::from_json(r#"{"response_boundary_prefix": "bad;\r\nx"}"#).unwrap_err();
        assert!(matches!(err, crate::BatchError::Config(_)));
        assert!(err.to_string().contains("response_boundary_prefix"));

        let long = BatchConfig {
            change_set_boundary_prefix: "c".repeat(40),
            ..BatchConfig::default()
        };
        assert!(long.validate().is_err());
        assert!(BatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_handler_rejects_unusable_boundary_prefix() {
        let config = BatchConfig {
            response_boundary_prefix: "bad;\r\nx".into(),
            ..BatchConfig::default()
        };
        let processor = std::sync::Arc::new(super::fixtures::TestProcessor);
        assert!(crate::server::BatchHandler::with_config(processor.clone(), config.clone()).is_err());
        assert!(crate::server::BatchService::with_config(processor, config).is_err());
    }

    #[test]
    fn test_config_rejects_malformed_json() {
        let err = BatchConfig::from_json("{\"strict\": \"yes\"}").unwrap_err();
        assert!(matches!(err, crate::BatchError::Config(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_config_debug() {
        let debug_str = format!("{:?}", BatchConfig::default());
        assert!(debug_str.contains("BatchConfig"));
        assert!(debug_str.contains("continue_on_error"));
    }
}

#[cfg(test)]
mod fixtures {
    use crate::server::RequestProcessor;
    use crate::{BatchRequest, BatchResponse};
    use async_trait::async_trait;

    /// Answers 404 for `/Missing`, 201 with a Location for POST, 200 otherwise.
    pub struct TestProcessor;

    #[async_trait]
    impl RequestProcessor for TestProcessor {
        async fn process(&self, request: BatchRequest) -> BatchResponse {
            if request.raw_odata_path == "/Missing" {
                return BatchResponse::new(404);
            }
            if request.method == http::Method::POST {
                return BatchResponse::new(201)
                    .with_header("Location", format!("{}/People(1)", request.raw_base_uri));
            }
            BatchResponse::new(200)
                .with_header("Content-Type", "application/json")
                .with_body("{}")
        }
    }

    pub fn get_part(boundary: &str, path: &str) -> String {
        format!(
            "--{}\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n\
             GET {} HTTP/1.1\r\n\r\n\r\n",
            boundary, path
        )
    }

    pub fn batch(boundary: &str, paths: &[&str]) -> String {
        let mut body: String = paths.iter().map(|path| get_part(boundary, path)).collect();
        body.push_str(&format!("--{}--\r\n", boundary));
        body
    }
}

#[cfg(test)]
mod driver_tests {
    use super::fixtures::{batch, TestProcessor};
    use crate::error::MessageKey;
    use crate::protocol::SequentialBoundaryGenerator;
    use crate::server::{BatchConfig, BatchHandler, BatchState};
    use crate::parser::parse_batch_response;
    use std::sync::Arc;

    fn state(prefer: Option<bool>) -> BatchState {
        BatchState {
            content_type: Some("multipart/mixed; boundary=batch_in".into()),
            boundary: Some("batch_in".into()),
            continue_on_error: prefer,
            base_uri: "http://host/svc".into(),
        }
    }

    fn handler(config: BatchConfig) -> BatchHandler {
        BatchHandler::with_config(Arc::new(TestProcessor), config)
            .unwrap()
            .with_boundary_generator(Arc::new(SequentialBoundaryGenerator::new()))
    }

    #[tokio::test]
    async fn test_stops_after_failed_part() {
        let body = batch("batch_in", &["People", "Missing", "People"]);
        let response = handler(BatchConfig::default()).handle(&state(None), body).await.unwrap();

        assert_eq!(response.status(), 202);
        assert_eq!(response.header("content-type"), Some("multipart/mixed; boundary=batch_1"));
        assert_eq!(response.header("preference-applied"), None);

        let parts = parse_batch_response(response.body().clone(), "batch_1").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].responses()[0].status, 404);
    }

    #[tokio::test]
    async fn test_continue_on_error_preference() {
        let body = batch("batch_in", &["People", "Missing", "People"]);
        let response = handler(BatchConfig::default())
            .handle(&state(Some(true)), body)
            .await
            .unwrap();

        assert_eq!(response.header("preference-applied"), Some("odata.continue-on-error"));
        let parts = parse_batch_response(response.body().clone(), "batch_1").unwrap();
        assert_eq!(parts.len(), 3);
    }

    #[tokio::test]
    async fn test_config_fallback_and_explicit_false() {
        let config = BatchConfig {
            continue_on_error: true,
            ..Default::default()
        };
        let handler = handler(config);
        assert!(handler.continue_on_error(None));
        assert!(!handler.continue_on_error(Some(false)));

        let body = batch("batch_in", &["Missing", "People"]);
        let response = handler.handle(&state(Some(false)), body).await.unwrap();
        let boundary = response
            .header("content-type")
            .and_then(crate::protocol::extract_boundary)
            .unwrap();
        let parts = parse_batch_response(response.body().clone(), &boundary).unwrap();
        assert_eq!(parts.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_boundary_is_rejected() {
        let state = BatchState {
            content_type: Some("application/json".into()),
            ..Default::default()
        };
        let err = handler(BatchConfig::default())
            .handle(&state, batch("batch_in", &["People"]))
            .await
            .unwrap_err();
        assert_eq!(err.message_key(), Some(MessageKey::InvalidBodyPartHeader));
    }

    #[test]
    fn test_handle_blocking() {
        let body = batch("batch_in", &["People"]);
        let handler = handler(BatchConfig::default());
        let response = tokio_test::block_on(handler.handle(&state(None), body)).unwrap();
        assert_eq!(response.status(), 202);
    }
}

#[cfg(test)]
mod router_tests {
    use super::fixtures::{batch, TestProcessor};
    use crate::protocol::SequentialBoundaryGenerator;
    use crate::server::BatchService;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn service() -> BatchService {
        BatchService::new(Arc::new(TestProcessor))
            .with_boundary_generator(Arc::new(SequentialBoundaryGenerator::new()))
    }

    fn request(content_type: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/$batch")
            .header(header::HOST, "host")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_batch_endpoint() {
        let response = service()
            .router()
            .oneshot(request("multipart/mixed; boundary=batch_in", batch("batch_in", &["People"])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "multipart/mixed; boundary=batch_1"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.starts_with("--batch_1\r\n"));
        assert!(text.contains("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("--batch_1--\r\n"));
    }

    #[tokio::test]
    async fn test_malformed_batch_is_bad_request() {
        let body = "--batch_in\r\nContent-Type: application/http\r\n\r\nGET People HTTP/1.1\r\n\r\n--batch_in--\r\n";
        let response = service()
            .router()
            .oneshot(request("multipart/mixed; boundary=batch_in", body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains("INVALID_BODY_PART_HEADER"));
        assert!(text.contains("line 2"));
    }

    #[tokio::test]
    async fn test_non_multipart_request() {
        let response = service()
            .router()
            .oneshot(request("application/json", "{}".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
