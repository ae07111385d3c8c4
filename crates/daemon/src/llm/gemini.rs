use async_trait::async_trait;
use engine::ToolDeclaration;
use serde_json::{json, Value};

use super::{LanguageModel, ModelReply, ToolCall, Turn};
use crate::error::StudioError;
use crate::gemini::GeminiClient;

const SYSTEM_PROMPT: &str = "You operate a small video studio. You can set the prompt, aspect ratio, \
duration and quality for video generation, start a generation, open or close the editor, trim the \
current video and apply visual effects. Use the tools to carry out what the user asks, one call at a \
time, then reply briefly in plain language. If a tool reports a problem, explain it to the user \
instead of retrying blindly.";

/// Agent model backed by `generateContent` function calling.
pub struct GeminiModel {
    client: GeminiClient,
    model: String,
}

impl GeminiModel {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        GeminiModel {
            client,
            model: model.into(),
        }
    }
}

fn text_content(role: &str, text: &str) -> Value {
    json!({ "role": role, "parts": [{ "text": text }] })
}

/// Conversation history in `contents` form.
pub fn build_contents(history: &[Turn]) -> Vec<Value> {
    history
        .iter()
        .map(|turn| match turn {
            Turn::User { text } => text_content("user", text),
            Turn::Agent { text } => text_content("model", text),
            Turn::ToolCall { call } => {
                let mut part = json!({
                    "functionCall": { "name": call.name, "args": call.arguments }
                });
                if let Some(signature) = &call.thought_signature {
                    part["thoughtSignature"] = json!(signature);
                }
                json!({ "role": "model", "parts": [part] })
            }
            Turn::ToolResult { name, result } => json!({
                "role": "user",
                "parts": [{
                    "functionResponse": { "name": name, "response": { "result": result } }
                }]
            }),
        })
        .collect()
}

pub fn build_request_body(history: &[Turn], tools: &[ToolDeclaration]) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
        "contents": build_contents(history),
        "tools": [{ "functionDeclarations": tools }]
    })
}

/// Take the first function call if there is one, otherwise the joined text.
pub fn parse_reply(body: &Value) -> Result<ModelReply, StudioError> {
    let parts = body
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = body
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            StudioError::Network(format!("The agent model returned no answer ({})", reason))
        })?;

    for part in parts {
        if let Some(call) = part.get("functionCall") {
            let name = call
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| StudioError::Network("Function call without a name".to_string()))?;
            return Ok(ModelReply::ToolCall(ToolCall {
                name: name.to_string(),
                arguments: call.get("args").cloned().unwrap_or_else(|| json!({})),
                thought_signature: part
                    .get("thoughtSignature")
                    .and_then(|s| s.as_str())
                    .map(|s| s.to_string()),
            }));
        }
    }

    let text: Vec<&str> = parts
        .iter()
        .filter(|p| !p.get("thought").and_then(|t| t.as_bool()).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Ok(ModelReply::Text(text.join("").trim().to_string()))
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn respond(&self, history: &[Turn], tools: &[ToolDeclaration]) -> Result<ModelReply, StudioError> {
        let path = format!("models/{}:generateContent", self.model);
        let body = self.client.post_json(&path, &build_request_body(history, tools)).await?;
        parse_reply(&body)
    }
}
