use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use engine::OpError;
use serde_json::json;

/// Failures surfaced to the user or the agent. Everything here is
/// recoverable; none of it tears down the session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StudioError {
    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    Precondition(String),

    #[error("Another edit or generation is still running. Wait for it to finish.")]
    OperationInProgress,

    #[error("Generation quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The provider accepted the job but reported that it could not finish it.
    #[error("The video could not be generated: {0}")]
    Generation(String),

    #[error("Video processing failed: {0}")]
    Engine(String),

    #[error("{0}")]
    ClipTooShort(String),

    #[error("The generation finished without producing a video")]
    NoOutput,

    #[error("Clip library error: {0}")]
    Persistence(String),

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),
}

impl StudioError {
    pub fn kind(&self) -> &'static str {
        match self {
            StudioError::Input(_) => "input",
            StudioError::Precondition(_) => "precondition",
            StudioError::OperationInProgress => "operation_in_progress",
            StudioError::QuotaExceeded(_) => "quota_exceeded",
            StudioError::Network(_) => "network",
            StudioError::Generation(_) => "generation_failed",
            StudioError::Engine(_) => "engine",
            StudioError::ClipTooShort(_) => "clip_too_short",
            StudioError::NoOutput => "no_output",
            StudioError::Persistence(_) => "persistence",
            StudioError::UnknownTool(_) => "unknown_tool",
        }
    }

    pub fn no_video() -> Self {
        StudioError::Precondition("No video is loaded. Generate or load a clip first.".to_string())
    }

    pub fn editor_closed() -> Self {
        StudioError::Precondition("The editor is not open. Open the editor first.".to_string())
    }

    /// Wrap an engine-side failure, keeping the full cause chain.
    pub fn engine(err: anyhow::Error) -> Self {
        StudioError::Engine(format!("{:#}", err))
    }

    pub fn persistence(err: anyhow::Error) -> Self {
        StudioError::Persistence(format!("{:#}", err))
    }

    fn status(&self) -> StatusCode {
        match self {
            StudioError::Input(_) | StudioError::UnknownTool(_) => StatusCode::BAD_REQUEST,
            StudioError::Precondition(_) | StudioError::OperationInProgress => StatusCode::CONFLICT,
            StudioError::ClipTooShort(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StudioError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            StudioError::Network(_) | StudioError::Generation(_) | StudioError::NoOutput => {
                StatusCode::BAD_GATEWAY
            }
            StudioError::Engine(_) | StudioError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<OpError> for StudioError {
    fn from(err: OpError) -> Self {
        match err {
            OpError::ClipTooShort { .. } => StudioError::ClipTooShort(err.to_string()),
            OpError::InvalidRange { .. } => StudioError::Input(err.to_string()),
            OpError::NotEnoughInputs(_) => StudioError::Precondition(err.to_string()),
        }
    }
}

impl IntoResponse for StudioError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));
        (self.status(), body).into_response()
    }
}
