use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use bytes::Bytes;
use engine::EffectKind;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::StudioError;
use crate::session::state::SessionView;

#[derive(Deserialize)]
pub struct TrimRequest {
    start: f64,
    end: f64,
}

#[derive(Deserialize)]
pub struct EffectRequest {
    effect: String,
}

#[derive(Serialize)]
pub struct EditorResponse {
    changed: bool,
    session: SessionView,
}

#[derive(Serialize)]
pub struct RecordingResponse {
    recording: bool,
    bytes: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_session))
        .route("/video", get(get_video))
        .route("/editor/open", post(open_editor))
        .route("/editor/close", post(close_editor))
        .route("/trim", put(set_trim))
        .route("/trim/apply", post(apply_trim))
        .route("/effect", post(apply_effect))
        .route("/quota/dismiss", post(dismiss_quota_notice))
        .route("/notice/dismiss", post(dismiss_notice))
        .route("/recording/start", post(start_recording))
        .route("/recording/chunk", post(append_chunk))
        .route("/recording/stop", post(stop_recording))
        .with_state(state)
}

async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.session().view())
}

async fn get_video(State(state): State<AppState>) -> Result<Response, StudioError> {
    let (data, _) = state.session().active_bytes()?;
    Ok(([(header::CONTENT_TYPE, "video/mp4")], data).into_response())
}

async fn open_editor(State(state): State<AppState>) -> Result<Json<EditorResponse>, StudioError> {
    let changed = state.session().open_editor()?;
    Ok(Json(EditorResponse {
        changed,
        session: state.session().view(),
    }))
}

async fn close_editor(State(state): State<AppState>) -> Json<EditorResponse> {
    let changed = state.session().close_editor();
    Json(EditorResponse {
        changed,
        session: state.session().view(),
    })
}

async fn set_trim(
    State(state): State<AppState>,
    Json(req): Json<TrimRequest>,
) -> Result<Json<SessionView>, StudioError> {
    state.session().set_trim_range(req.start, req.end)?;
    Ok(Json(state.session().view()))
}

async fn apply_trim(State(state): State<AppState>) -> Result<Json<SessionView>, StudioError> {
    state.session().apply_trim().await?;
    Ok(Json(state.session().view()))
}

async fn apply_effect(
    State(state): State<AppState>,
    Json(req): Json<EffectRequest>,
) -> Result<Json<SessionView>, StudioError> {
    let effect: EffectKind = req.effect.parse().map_err(StudioError::Input)?;
    state.session().apply_effect(effect).await?;
    Ok(Json(state.session().view()))
}

async fn dismiss_quota_notice(State(state): State<AppState>) -> Json<SessionView> {
    state.session().set_quota_blocked(false);
    Json(state.session().view())
}

async fn dismiss_notice(State(state): State<AppState>) -> Json<SessionView> {
    state.session().dismiss_notice();
    Json(state.session().view())
}

async fn start_recording(State(state): State<AppState>) -> Result<Json<RecordingResponse>, StudioError> {
    state.recorder.start_recording()?;
    Ok(Json(RecordingResponse {
        recording: state.recorder.is_recording(),
        bytes: 0,
    }))
}

async fn append_chunk(State(state): State<AppState>, body: Bytes) -> Result<Json<RecordingResponse>, StudioError> {
    let bytes = state.recorder.append_chunk(&body)?;
    Ok(Json(RecordingResponse {
        recording: state.recorder.is_recording(),
        bytes,
    }))
}

async fn stop_recording(State(state): State<AppState>) -> Result<Json<SessionView>, StudioError> {
    state.recorder.stop_recording().await?;
    Ok(Json(state.session().view()))
}
