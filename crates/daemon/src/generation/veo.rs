use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use engine::GenerationRequest;
use serde_json::{json, Value};

use super::{GenerationBackend, PollStatus};
use crate::error::StudioError;
use crate::gemini::GeminiClient;

/// Long-running video generation through `predictLongRunning`.
pub struct VeoBackend {
    client: GeminiClient,
    model: String,
}

impl VeoBackend {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        VeoBackend {
            client,
            model: model.into(),
        }
    }
}

/// Request body for `predictLongRunning`.
pub fn build_request_body(request: &GenerationRequest) -> Value {
    let mut instance = json!({ "prompt": request.prompt() });
    if let Some(image) = request.conditioning_image() {
        instance["image"] = json!({
            "bytesBase64Encoded": STANDARD.encode(&image.bytes),
            "mimeType": image.mime_type
        });
    }
    json!({
        "instances": [instance],
        "parameters": {
            "aspectRatio": request.aspect_ratio().as_str(),
            "durationSeconds": request.duration_seconds(),
            "resolution": request.resolution().as_str(),
            "numberOfVideos": 1
        }
    })
}

/// Interpret an operation document returned by a poll.
pub fn parse_operation(body: &Value) -> PollStatus {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("generation failed")
            .to_string();
        return PollStatus::Failed(message);
    }
    if !body.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
        return PollStatus::Running;
    }

    let video_uris = body
        .pointer("/response/generateVideoResponse/generatedSamples")
        .and_then(|s| s.as_array())
        .map(|samples| {
            samples
                .iter()
                .filter_map(|s| s.pointer("/video/uri").and_then(|u| u.as_str()))
                .map(|u| u.to_string())
                .collect()
        })
        .unwrap_or_default();
    PollStatus::Done { video_uris }
}

#[async_trait]
impl GenerationBackend for VeoBackend {
    async fn submit(&self, request: &GenerationRequest) -> Result<String, StudioError> {
        let path = format!("models/{}:predictLongRunning", self.model);
        let result = self.client.post_json(&path, &build_request_body(request)).await?;
        result
            .get("name")
            .and_then(|n| n.as_str())
            .map(|n| n.to_string())
            .ok_or_else(|| StudioError::Network("Invalid response format: missing operation name".to_string()))
    }

    async fn poll(&self, operation: &str) -> Result<PollStatus, StudioError> {
        let result = self.client.get_json(operation).await?;
        Ok(parse_operation(&result))
    }

    async fn fetch(&self, uri: &str) -> Result<Bytes, StudioError> {
        let data = self.client.get_bytes(uri).await?;
        if data.is_empty() {
            return Err(StudioError::NoOutput);
        }
        Ok(data)
    }
}
