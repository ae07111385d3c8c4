use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::db::Clip;
use crate::error::StudioError;
use crate::session::state::SessionView;

#[derive(Deserialize)]
pub struct NameRequest {
    name: String,
}

#[derive(Serialize)]
pub struct SaveClipResponse {
    id: i64,
}

#[derive(Serialize)]
pub struct ClipResponse {
    id: i64,
    name: String,
    duration_seconds: f64,
    created_at: Option<String>,
    thumbnail_url: String,
    video_url: String,
}

impl ClipResponse {
    fn from_clip(clip: Clip) -> Option<Self> {
        let id = clip.id?;
        Some(ClipResponse {
            id,
            name: clip.name,
            duration_seconds: clip.duration_seconds,
            created_at: clip.created_at.map(|t| t.to_rfc3339()),
            thumbnail_url: format!("/api/clips/{}/thumbnail", id),
            video_url: format!("/api/clips/{}/video", id),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_clips).post(save_clip))
        .route("/:id", get(get_clip).patch(rename_clip).delete(delete_clip))
        .route("/:id/video", get(get_clip_video))
        .route("/:id/thumbnail", get(get_clip_thumbnail))
        .route("/:id/load", post(load_clip))
        .with_state(state)
}

fn find_clip(state: &AppState, id: i64) -> Result<Clip, StudioError> {
    state
        .db
        .get_clip(id)
        .map_err(StudioError::persistence)?
        .ok_or_else(|| StudioError::Input(format!("Clip {} does not exist", id)))
}

async fn list_clips(State(state): State<AppState>) -> Result<Json<Vec<ClipResponse>>, StudioError> {
    let clips = state.db.list_clips().map_err(StudioError::persistence)?;
    Ok(Json(clips.into_iter().filter_map(ClipResponse::from_clip).collect()))
}

async fn save_clip(
    State(state): State<AppState>,
    Json(req): Json<NameRequest>,
) -> Result<(StatusCode, Json<SaveClipResponse>), StudioError> {
    let id = state.session().save_active(&state.db, &req.name).await?;
    Ok((StatusCode::CREATED, Json(SaveClipResponse { id })))
}

async fn get_clip(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ClipResponse>, StudioError> {
    let clip = find_clip(&state, id)?;
    ClipResponse::from_clip(clip)
        .map(Json)
        .ok_or_else(|| StudioError::Persistence(format!("Clip {} has no id", id)))
}

async fn rename_clip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<NameRequest>,
) -> Result<StatusCode, StudioError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(StudioError::Input("A clip name is required".to_string()));
    }
    let renamed = state.db.rename_clip(id, name).map_err(StudioError::persistence)?;
    if !renamed {
        return Err(StudioError::Input(format!("Clip {} does not exist", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_clip(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, StudioError> {
    if !state.db.delete_clip(id).map_err(StudioError::persistence)? {
        return Err(StudioError::Input(format!("Clip {} does not exist", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_clip_video(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, StudioError> {
    let clip = find_clip(&state, id)?;
    Ok(([(header::CONTENT_TYPE, "video/mp4")], clip.video).into_response())
}

async fn get_clip_thumbnail(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, StudioError> {
    let clip = find_clip(&state, id)?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], clip.thumbnail).into_response())
}

async fn load_clip(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<SessionView>, StudioError> {
    let clip = find_clip(&state, id)?;
    state.session().load_clip(clip).await?;
    Ok(Json(state.session().view()))
}
