use axum::{response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, level_filters::LevelFilter, warn};

mod api;
mod capture;
mod config;
mod db;
mod error;
mod gemini;
mod generation;
mod llm;
mod media;
mod orchestrator;
mod session;
mod tools;

use media::MediaEngine;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(if config.debug_logging {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        })
        .init();

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&config.cache_dir)?;
    let db = Arc::new(db::Database::new(&config.db_path)?);
    info!("[ClipStore] Opened {:?}", config.db_path);

    let ffmpeg = Arc::new(media::ffmpeg::FFmpegWrapper::new(
        config.ffmpeg_path.clone(),
        config.ffprobe_path.clone(),
        config.cache_dir.join("staging"),
    ));
    // Warm the engine up in the background; edits await the same initialisation.
    let warmup = ffmpeg.clone();
    tokio::spawn(async move {
        if let Err(e) = warmup.ensure_loaded().await {
            warn!("[Engine] Not available yet: {:#}", e);
        }
    });

    if config.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; generation and the agent will be unavailable");
    }
    let gemini = gemini::GeminiClient::new(&config);
    let backend = Arc::new(generation::veo::VeoBackend::new(gemini.clone(), config.video_model.clone()));
    let runner = Arc::new(generation::GenerationRunner::new(backend, config.poll_interval));

    let session = Arc::new(session::EditingSession::new(ffmpeg, config.cache_dir.clone()));
    let tools = Arc::new(tools::ToolRouter::new(session.clone(), runner));
    let model = Arc::new(llm::gemini::GeminiModel::new(gemini, config.agent_model.clone()));
    let agent = Arc::new(orchestrator::Agent::new(model, tools.clone(), config.agent_max_steps));
    let recorder = capture::Recorder::new(session, config.recording_limit);

    let state = api::AppState {
        db,
        tools,
        agent,
        recorder,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false);

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api", api::router(state))
        .layer(cors);

    info!("Starting studio daemon on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
