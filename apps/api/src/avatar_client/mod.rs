//! Talking-avatar video client (HeyGen).
//!
//! Render submission is slow, so requests carry a long read timeout. TLS
//! certificate validation stays on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::errors::ProviderError;

const HEYGEN_BASE_URL: &str = "https://api.heygen.com";
const PROVIDER: &str = "HeyGen";

/// Minimal JSON transport over the avatar provider's REST API.
#[async_trait]
pub trait AvatarApi: Send + Sync {
    async fn post(&self, path: &str, payload: &Value) -> Result<Value, ProviderError>;

    async fn get(&self, path: &str) -> Result<Value, ProviderError>;
}

#[derive(Clone)]
pub struct AvatarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AvatarClient {
    pub fn new(api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()?,
            base_url: HEYGEN_BASE_URL.to_string(),
            api_key,
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or(ProviderError::Configuration {
            provider: PROVIDER,
            key: "HEYGEN_API_KEY",
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, ProviderError> {
        let api_key = self.api_key()?;

        let response = request
            .header("X-Api-Key", api_key)
            .send()
            .await
            .map_err(|e| api_error(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| api_error(format!("failed to read response body: {e}")))?;

        handle_response(status, &body)
    }
}

#[async_trait]
impl AvatarApi for AvatarClient {
    async fn post(&self, path: &str, payload: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        self.send(self.client.post(url).json(payload)).await
    }

    async fn get(&self, path: &str) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        self.send(self.client.get(url)).await
    }
}

fn api_error(message: String) -> ProviderError {
    ProviderError::Api {
        provider: PROVIDER,
        message,
    }
}

fn handle_response(status: reqwest::StatusCode, body: &str) -> Result<Value, ProviderError> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| api_error(format!("failed to parse response: {e}")))?;

    if !status.is_success() {
        let message = parsed
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return Err(api_error(format!("status {status}: {message}")));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let client = AvatarClient::new(None).unwrap();
        let err = client
            .post("/v2/video/generate", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Configuration {
                key: "HEYGEN_API_KEY",
                ..
            }
        ));
    }

    #[test]
    fn test_handle_response_surfaces_error_message() {
        let err = handle_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"avatar not found"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("avatar not found"));
        assert!(matches!(err, ProviderError::Api { .. }));
    }

    #[test]
    fn test_handle_response_rejects_non_json_body() {
        let err = handle_response(StatusCode::OK, "<html>gateway</html>").unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
    }

    #[test]
    fn test_handle_response_returns_parsed_body() {
        let value = handle_response(StatusCode::OK, r#"{"data":{"video_id":"abc"}}"#).unwrap();
        assert_eq!(value["data"]["video_id"], "abc");
    }
}
