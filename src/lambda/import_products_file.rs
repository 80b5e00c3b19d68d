// src/lambda/import_products_file.rs

//! HTTP endpoint issuing presigned upload URLs.
//!
//! `GET /import?name=<file>` answers with the bare URL as text; errors
//! answer with a JSON `{"error": ...}` body.

use lambda_http::{Body, Error as LambdaError, Request, RequestExt, Response};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::error::AppError;
use crate::services::UploadIssuer;

const NAME_PARAMETER: &str = "name";

fn response(status: u16, content_type: &str, body: String) -> Result<Response<Body>, LambdaError> {
    Ok(Response::builder()
        .status(status)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET,OPTIONS")
        .header("Content-Type", content_type)
        .body(Body::from(body))?)
}

fn error_response(error: &AppError) -> Result<Response<Body>, LambdaError> {
    let status = error.status_code();
    if error.is_client_error() {
        warn!(status, "Rejected upload request: {}", error);
    } else {
        error!(status, "Upload request failed: {}", error);
    }
    response(
        status,
        "application/json",
        json!({ "error": error.to_string() }).to_string(),
    )
}

/// Issue an upload URL for `name`.
pub async fn respond(
    issuer: &UploadIssuer,
    name: Option<&str>,
) -> Result<Response<Body>, LambdaError> {
    match issuer.issue(name).await {
        Ok(ticket) => {
            info!("Issued upload URL for {}", ticket.location);
            response(200, "text/plain", ticket.url)
        }
        Err(e) => error_response(&e),
    }
}

/// Lambda handler.
#[instrument(skip(issuer, request))]
pub async fn handler(
    issuer: &UploadIssuer,
    request: Request,
) -> Result<Response<Body>, LambdaError> {
    let parameters = request.query_string_parameters_ref();
    let name = parameters.and_then(|query| query.first(NAME_PARAMETER));
    respond(issuer, name).await
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::models::ImportConfig;
    use crate::services::MISSING_NAME;
    use crate::storage::MemorySigner;

    fn issuer() -> UploadIssuer {
        UploadIssuer::new(&ImportConfig::default(), Arc::new(MemorySigner))
    }

    fn body_text(response: &Response<Body>) -> String {
        match response.body() {
            Body::Text(text) => text.clone(),
            Body::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Body::Empty => String::new(),
        }
    }

    fn request(query: &[(&str, &str)]) -> Request {
        let parameters: HashMap<String, String> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        lambda_http::http::Request::builder()
            .uri("/import")
            .body(Body::Empty)
            .unwrap()
            .with_query_string_parameters(parameters)
    }

    #[tokio::test]
    async fn test_returns_url_for_name() {
        let response = handler(&issuer(), request(&[("name", "test.csv")]))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");
        assert!(body_text(&response).contains("uploaded/test.csv"));
    }

    #[tokio::test]
    async fn test_missing_name_is_400() {
        let response = handler(&issuer(), request(&[])).await.unwrap();

        assert_eq!(response.status(), 400);
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");
        let body: serde_json::Value = serde_json::from_str(&body_text(&response)).unwrap();
        assert!(body["error"].as_str().unwrap().contains(MISSING_NAME));
    }

    #[tokio::test]
    async fn test_signer_fault_is_500() {
        struct BrokenSigner;

        #[async_trait::async_trait]
        impl crate::storage::UploadSigner for BrokenSigner {
            async fn presign_put(
                &self,
                _location: &crate::models::ObjectLocation,
                _content_type: &str,
                _expires_in: std::time::Duration,
            ) -> crate::error::Result<String> {
                Err(AppError::storage("credentials expired"))
            }
        }

        let issuer = UploadIssuer::new(&ImportConfig::default(), Arc::new(BrokenSigner));
        let response = respond(&issuer, Some("test.csv")).await.unwrap();

        assert_eq!(response.status(), 500);
    }
}
