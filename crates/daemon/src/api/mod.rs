use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;

use crate::capture::Recorder;
use crate::db::Database;
use crate::orchestrator::Agent;
use crate::session::EditingSession;
use crate::tools::ToolRouter;

pub mod agent;
pub mod clips;
pub mod generate;
pub mod merge;
pub mod session;

/// Uploaded recordings and images can be far larger than axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub tools: Arc<ToolRouter>,
    pub agent: Arc<Agent>,
    pub recorder: Arc<Recorder>,
}

impl AppState {
    pub fn session(&self) -> &Arc<EditingSession> {
        self.tools.session()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/session", session::router(state.clone()))
        .nest("/merge", merge::router(state.clone()))
        .nest("/clips", clips::router(state.clone()))
        .nest("/generate", generate::router(state.clone()))
        .merge(agent::router(state))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
