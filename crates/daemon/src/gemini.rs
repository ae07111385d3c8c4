use bytes::Bytes;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::StudioError;

/// Thin JSON client for the Gemini REST API, shared by the video and agent models.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        GeminiClient {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, StudioError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| StudioError::Precondition("GEMINI_API_KEY environment variable not set".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, StudioError> {
        let url = self.url(path);
        debug!("[Gemini] POST {}", url);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key()?)
            .json(body)
            .send()
            .await
            .map_err(network)?;
        read_json(response).await
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, StudioError> {
        let url = self.url(path);
        debug!("[Gemini] GET {}", url);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", self.api_key()?)
            .send()
            .await
            .map_err(network)?;
        read_json(response).await
    }

    /// Download a file the API handed back by absolute URI.
    pub async fn get_bytes(&self, uri: &str) -> Result<Bytes, StudioError> {
        let response = self
            .http
            .get(uri)
            .header("x-goog-api-key", self.api_key()?)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_failure(status, &body));
        }
        response.bytes().await.map_err(network)
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, StudioError> {
    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| StudioError::Network(format!("Invalid JSON from Gemini API: {}", e)))
    } else {
        let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        Err(classify_failure(status, &body))
    }
}

fn network(err: reqwest::Error) -> StudioError {
    StudioError::Network(err.to_string())
}

/// Map a non-success response onto the error taxonomy. Quota exhaustion is
/// kept apart from everything else so the caller can surface it persistently.
pub fn classify_failure(status: StatusCode, body: &str) -> StudioError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(|m| m.to_string()))
        .unwrap_or_else(|| body.trim().to_string());

    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        StudioError::QuotaExceeded(message)
    } else if status.is_client_error() {
        StudioError::Input(format!("Gemini API rejected the request ({}): {}", status, message))
    } else {
        StudioError::Network(format!("Gemini API error ({}): {}", status, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_is_distinguished_from_other_failures() {
        let quota = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(quota, StudioError::QuotaExceeded(ref m) if m == "Quota exceeded"));

        let bad = classify_failure(StatusCode::BAD_REQUEST, "nope");
        assert_eq!(bad.kind(), "input");

        let down = classify_failure(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(down.kind(), "network");
    }

    #[tokio::test]
    async fn missing_key_is_a_precondition() {
        let client = GeminiClient::new(&Config::default());
        let err = client.get_json("operations/x").await.unwrap_err();
        assert_eq!(err.kind(), "precondition");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let config = Config {
            api_key: Some("test-key".to_string()),
            api_base: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        let err = GeminiClient::new(&config).get_json("operations/x").await.unwrap_err();
        assert_eq!(err.kind(), "network");
    }
}
