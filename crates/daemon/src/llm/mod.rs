pub mod gemini;

use async_trait::async_trait;
use engine::ToolDeclaration;
use serde::Serialize;
use serde_json::Value;

use crate::error::StudioError;

/// Tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
    /// Opaque reasoning token Gemini 2.5 expects echoed back with the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl ToolCall {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        ToolCall {
            name: name.into(),
            arguments,
            thought_signature: None,
        }
    }
}

/// One entry of an agent conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    Agent { text: String },
    ToolCall { call: ToolCall },
    ToolResult { name: String, result: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCall(ToolCall),
}

/// A chat model that may answer with text or ask for one tool call.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn respond(&self, history: &[Turn], tools: &[ToolDeclaration]) -> Result<ModelReply, StudioError>;
}
