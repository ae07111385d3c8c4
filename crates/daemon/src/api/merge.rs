use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::StudioError;
use crate::session::state::{BinEntryView, SessionView};

#[derive(Deserialize)]
pub struct AddActiveRequest {
    #[serde(default)]
    name: String,
}

#[derive(Serialize)]
pub struct BinResponse {
    entries: Vec<BinEntryView>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_bin).delete(clear_bin))
        .route("/active", post(add_active))
        .route("/clips/:id", post(add_clip))
        .route("/:index", delete(remove_entry))
        .route("/apply", post(merge))
        .with_state(state)
}

fn bin_response(state: &AppState) -> Json<BinResponse> {
    Json(BinResponse {
        entries: state.session().bin(),
    })
}

async fn list_bin(State(state): State<AppState>) -> Json<BinResponse> {
    bin_response(&state)
}

async fn clear_bin(State(state): State<AppState>) -> Json<BinResponse> {
    state.session().clear_bin();
    bin_response(&state)
}

async fn add_active(
    State(state): State<AppState>,
    Json(req): Json<AddActiveRequest>,
) -> Result<Json<BinResponse>, StudioError> {
    state.session().add_active_to_bin(&req.name)?;
    Ok(bin_response(&state))
}

async fn add_clip(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<BinResponse>, StudioError> {
    let clip = state
        .db
        .get_clip(id)
        .map_err(StudioError::persistence)?
        .ok_or_else(|| StudioError::Input(format!("Clip {} does not exist", id)))?;
    state.session().add_clip_to_bin(clip);
    Ok(bin_response(&state))
}

async fn remove_entry(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<BinResponse>, StudioError> {
    state.session().remove_from_bin(index)?;
    Ok(bin_response(&state))
}

async fn merge(State(state): State<AppState>) -> Result<Json<SessionView>, StudioError> {
    state.session().merge().await?;
    Ok(Json(state.session().view()))
}
