use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use engine::{tool_declarations, ToolDeclaration};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AppState;
use crate::capture::{speech_error_message, SpeechResult};
use crate::error::StudioError;
use crate::llm::Turn;
use crate::orchestrator::AgentReply;

#[derive(Deserialize)]
pub struct MessageRequest {
    text: String,
}

#[derive(Serialize)]
pub struct ToolResponse {
    result: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpeechResponse {
    Reply { transcript: String, agent: AgentReply },
    Status { code: String, message: &'static str },
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/:name", post(invoke_tool))
        .route("/agent/messages", post(send_message))
        .route("/agent/history", get(get_history))
        .route("/agent/speech", post(speech_result))
        .with_state(state)
}

async fn list_tools() -> Json<Vec<ToolDeclaration>> {
    Json(tool_declarations())
}

/// Direct UI actions go through the same dispatcher the agent uses.
async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<ToolResponse>, StudioError> {
    let args = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let result = state.tools.dispatch_call(&name, &args).await?;
    Ok(Json(ToolResponse { result }))
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<AgentReply>, StudioError> {
    Ok(Json(state.agent.handle_message(&req.text).await?))
}

async fn get_history(State(state): State<AppState>) -> Json<Vec<Turn>> {
    Json(state.agent.history().await)
}

async fn speech_result(
    State(state): State<AppState>,
    Json(result): Json<SpeechResult>,
) -> Result<Json<SpeechResponse>, StudioError> {
    match result {
        SpeechResult::Transcript(transcript) => {
            let agent = state.agent.handle_message(&transcript).await?;
            Ok(Json(SpeechResponse::Reply { transcript, agent }))
        }
        SpeechResult::Error(code) => {
            let message = speech_error_message(&code);
            Ok(Json(SpeechResponse::Status { code, message }))
        }
    }
}
