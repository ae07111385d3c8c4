use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::error::StudioError;
use crate::generation::GenerationJob;
use crate::tools::GenerationConfig;

#[derive(Deserialize)]
pub struct FrameRequest {
    #[serde(default)]
    at_seconds: f64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(generate))
        .route("/config", get(get_config))
        .route("/image", post(set_image).delete(clear_image))
        .route("/frame", post(use_current_frame))
        .route("/jobs/:id", get(get_job))
        .with_state(state)
}

async fn get_config(State(state): State<AppState>) -> Json<GenerationConfig> {
    Json(state.tools.generation_config())
}

async fn set_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<GenerationConfig>, StudioError> {
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    state.tools.set_conditioning_image(body.to_vec(), mime_type)?;
    Ok(Json(state.tools.generation_config()))
}

async fn clear_image(State(state): State<AppState>) -> Json<GenerationConfig> {
    state.tools.clear_conditioning_image();
    Json(state.tools.generation_config())
}

async fn use_current_frame(
    State(state): State<AppState>,
    Json(req): Json<FrameRequest>,
) -> Result<Json<GenerationConfig>, StudioError> {
    state.tools.use_current_frame(req.at_seconds).await?;
    Ok(Json(state.tools.generation_config()))
}

async fn generate(State(state): State<AppState>) -> Result<(StatusCode, Json<GenerationJob>), StudioError> {
    let job = state.tools.generate().await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<GenerationJob>, StudioError> {
    state
        .tools
        .runner()
        .job(id)
        .map(Json)
        .ok_or_else(|| StudioError::Input(format!("Unknown generation job {}", id)))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::test_app;
    use crate::db::Clip;
    use crate::media::testing::fake_video;
    use axum::http::StatusCode;
    use bytes::Bytes;
    use engine::ToolCommand;
    use serde_json::json;

    #[tokio::test]
    async fn generate_requires_prompt() {
        let app = test_app(vec![]);
        let (status, body) = app.json("POST", "/generate", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "input");
    }

    #[tokio::test]
    async fn submitted_job_is_queryable() {
        let app = test_app(vec![]);
        app.state
            .tools
            .dispatch(ToolCommand::SetPrompt {
                prompt: "a cat skateboarding".to_string(),
            })
            .await;

        let (status, job) = app.json("POST", "/generate", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(job["status"], "pending");
        assert_eq!(job["request"]["prompt"], "a cat skateboarding");

        let id = job["id"].as_str().unwrap().to_string();
        let (status, _) = app.json("GET", &format!("/generate/jobs/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.json("POST", "/generate", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "operation_in_progress");
    }

    #[tokio::test]
    async fn conditioning_image_upload_and_frame_capture() {
        let app = test_app(vec![]);
        let (status, _) = app.upload("/generate/image", "text/plain", Bytes::from_static(b"hi")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, config) = app.upload("/generate/image", "image/png", Bytes::from_static(b"png")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(config["conditioning_image"]["mime_type"], "image/png");

        let (_, config) = app.json("DELETE", "/generate/image", None).await;
        assert!(config["conditioning_image"].is_null());

        let clip = Clip::transient("seed", fake_video(4.0).to_vec(), vec![], 4.0);
        app.state.session().load_clip(clip).await.unwrap();
        let (status, config) = app.json("POST", "/generate/frame", Some(json!({"at_seconds": 1.5}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(config["conditioning_image"]["mime_type"], "image/jpeg");
    }
}
