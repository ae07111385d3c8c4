//! Command dispatcher shared by direct UI actions and the agent.
//!
//! Every handler re-checks its own preconditions and answers with a short
//! sentence. Rejections are sentences too, so the agent can relay them
//! verbatim; only an unknown tool name is an error.

pub mod generation_config;

use engine::{format_seconds, ToolCallError, ToolCommand};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::error::StudioError;
use crate::generation::{GenerationJob, GenerationRunner};
use crate::session::state::SessionState;
use crate::session::EditingSession;
pub use generation_config::GenerationConfig;

pub struct ToolRouter {
    session: Arc<EditingSession>,
    runner: Arc<GenerationRunner>,
    config: Mutex<GenerationConfig>,
}

impl ToolRouter {
    pub fn new(session: Arc<EditingSession>, runner: Arc<GenerationRunner>) -> Self {
        ToolRouter {
            session,
            runner,
            config: Mutex::new(GenerationConfig::default()),
        }
    }

    pub fn session(&self) -> &Arc<EditingSession> {
        &self.session
    }

    pub fn runner(&self) -> &Arc<GenerationRunner> {
        &self.runner
    }

    fn config_mut(&self) -> MutexGuard<'_, GenerationConfig> {
        match self.config.lock() {
            Ok(config) => config,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn generation_config(&self) -> GenerationConfig {
        self.config_mut().clone()
    }

    pub fn set_conditioning_image(&self, bytes: Vec<u8>, mime_type: &str) -> Result<(), StudioError> {
        self.config_mut()
            .set_conditioning_image(bytes, mime_type)
            .map_err(StudioError::Input)
    }

    pub fn clear_conditioning_image(&self) -> bool {
        self.config_mut().clear_conditioning_image()
    }

    /// Condition the next generation on a still of the active video.
    pub async fn use_current_frame(&self, at_seconds: f64) -> Result<(), StudioError> {
        let frame = self.session.capture_frame(at_seconds).await?;
        self.set_conditioning_image(frame.to_vec(), "image/jpeg")
    }

    /// Submit the current configuration and return without waiting for the
    /// video. The single-flight permit travels with the background task and is
    /// released once the result is installed or the job fails.
    pub async fn generate(&self) -> Result<GenerationJob, StudioError> {
        let permit = self.session.try_begin()?;
        let request = self.config_mut().to_request().map_err(StudioError::Input)?;

        let job = match self.runner.submit(request).await {
            Ok(job) => job,
            Err(e) => {
                if matches!(e, StudioError::QuotaExceeded(_)) {
                    self.session.set_quota_blocked(true);
                }
                return Err(e);
            }
        };

        let session = self.session.clone();
        let runner = self.runner.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            match runner.result(job_id).await {
                Ok(video) => {
                    if let Err(e) = session.install_generated(permit, video).await {
                        error!("[Generation] Could not load result of job {}: {}", job_id, e);
                        runner.record_delivery_failure(job_id, &e);
                        session.set_notice(format!("The generated video could not be loaded: {}", e));
                    }
                }
                Err(e) => {
                    if matches!(e, StudioError::QuotaExceeded(_)) {
                        session.set_quota_blocked(true);
                    }
                    warn!("[Generation] Job {} ended without a video: {}", job_id, e);
                    session.set_notice(e.to_string());
                }
            }
        });

        Ok(job)
    }

    /// Parse and run a raw tool call. Bad arguments come back as a sentence.
    pub async fn dispatch_call(&self, name: &str, args: &Value) -> Result<String, StudioError> {
        match ToolCommand::parse(name, args) {
            Ok(command) => Ok(self.dispatch(command).await),
            Err(ToolCallError::UnknownTool(name)) => {
                warn!("[Tools] Rejected unknown tool '{}'", name);
                Err(StudioError::UnknownTool(name))
            }
            Err(e) => Ok(e.to_string()),
        }
    }

    pub async fn dispatch(&self, command: ToolCommand) -> String {
        let name = command.name();
        let result = match command {
            ToolCommand::SetPrompt { prompt } => {
                let reply = format!("Prompt set to \"{}\".", prompt);
                self.config_mut().prompt = prompt;
                reply
            }
            ToolCommand::SetAspectRatio { aspect_ratio } => {
                self.config_mut().aspect_ratio = aspect_ratio;
                format!("Aspect ratio set to {}.", aspect_ratio)
            }
            ToolCommand::SetDuration { duration_seconds } => {
                self.config_mut().duration_seconds = duration_seconds;
                format!("Duration set to {} seconds.", duration_seconds)
            }
            ToolCommand::SetQuality { quality } => {
                let mut config = self.config_mut();
                config.set_quality(quality);
                format!("Quality set to {} ({}).", quality.as_str(), config.resolution.as_str())
            }
            ToolCommand::ClickGenerate => self.click_generate().await,
            ToolCommand::OpenEditor => self.open_editor(),
            ToolCommand::CloseEditor => {
                if self.session.close_editor() {
                    "Closed the editor.".to_string()
                } else {
                    "The editor is already closed.".to_string()
                }
            }
            ToolCommand::TrimVideo { start_time, end_time } => self.trim_video(start_time, end_time).await,
            ToolCommand::ApplyEffect { effect } => self.apply_effect(effect).await,
        };
        info!("[Tools] {} -> {}", name, result);
        result
    }

    async fn click_generate(&self) -> String {
        let prompt = self.config_mut().prompt.clone();
        match self.generate().await {
            Ok(job) => format!(
                "Started generating \"{}\" ({}s, {}, {}). This usually takes a minute or two.",
                prompt,
                job.request.duration_seconds(),
                job.request.aspect_ratio(),
                job.request.resolution().as_str()
            ),
            Err(StudioError::Input(reason)) => format!("Cannot generate yet: {}.", reason),
            Err(e) => format!("Generation could not start: {}", e),
        }
    }

    fn open_editor(&self) -> String {
        match self.session.open_editor() {
            Ok(true) => match self.session.duration() {
                Some(d) => format!("Opened the editor. The video is {} seconds long.", format_seconds(d)),
                None => "Opened the editor.".to_string(),
            },
            Ok(false) => "The editor is already open.".to_string(),
            Err(e) => format!("Cannot open the editor: {}", e),
        }
    }

    /// Editing preconditions phrased for the user. The session enforces the
    /// same rules again.
    fn editing_precondition(&self) -> Result<f64, String> {
        match self.session.state() {
            SessionState::NoVideo => Err("There is no video to edit yet. Generate or load a clip first.".to_string()),
            SessionState::VideoLoaded => Err("The editor is not open. Open the editor first.".to_string()),
            SessionState::EditorOpen => self
                .session
                .duration()
                .ok_or_else(|| "There is no video to edit yet.".to_string()),
        }
    }

    async fn trim_video(&self, start: f64, end: f64) -> String {
        let duration = match self.editing_precondition() {
            Ok(d) => d,
            Err(reason) => return reason,
        };
        if start < 0.0 || end > duration || start >= end {
            return format!(
                "Invalid trim range {}s to {}s. The start must be before the end and both must lie within 0 and {} seconds.",
                format_seconds(start),
                format_seconds(end),
                format_seconds(duration)
            );
        }

        let outcome = match self.session.set_trim_range(start, end) {
            Ok(range) => self.session.apply_trim().await.map(|d| (range, d)),
            Err(e) => Err(e),
        };
        match outcome {
            Ok((range, new_duration)) => format!(
                "Trimmed the video to {}s through {}s. It is now {} seconds long.",
                format_seconds(range.start()),
                format_seconds(range.end()),
                format_seconds(new_duration)
            ),
            Err(e) => format!("Trim failed: {}", e),
        }
    }

    async fn apply_effect(&self, effect: engine::EffectKind) -> String {
        let duration = match self.editing_precondition() {
            Ok(d) => d,
            Err(reason) => return reason,
        };
        if duration < effect.min_source_duration() {
            return format!(
                "The {} effect needs a clip of at least {} seconds; this one is {} seconds.",
                effect,
                format_seconds(effect.min_source_duration()),
                format_seconds(duration)
            );
        }

        match self.session.apply_effect(effect).await {
            Ok(new_duration) => format!(
                "Applied the {} effect ({}). The video is now {} seconds long.",
                effect,
                effect.description(),
                format_seconds(new_duration)
            ),
            Err(e) => format!("Could not apply {}: {}", effect, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Clip;
    use crate::generation::testing::ScriptedBackend;
    use crate::generation::JobStatus;
    use crate::media::testing::{decode, fake_video, FakeEngine};
    use bytes::Bytes;
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        router: ToolRouter,
        _dir: tempfile::TempDir,
    }

    fn fixture(backend: ScriptedBackend) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(EditingSession::new(Arc::new(FakeEngine::new()), dir.path().join("media")));
        let runner = Arc::new(GenerationRunner::new(Arc::new(backend), Duration::from_millis(5)));
        Fixture {
            router: ToolRouter::new(session, runner),
            _dir: dir,
        }
    }

    fn idle() -> Fixture {
        fixture(ScriptedBackend::new(vec![], Bytes::new()))
    }

    async fn with_video(duration: f64) -> Fixture {
        let fx = idle();
        let clip = Clip::transient("seed", fake_video(duration).to_vec(), vec![], duration);
        fx.router.session().load_clip(clip).await.unwrap();
        fx
    }

    #[tokio::test]
    async fn parameter_tools_update_config() {
        let fx = idle();
        let router = &fx.router;

        router.dispatch_call("setPrompt", &json!({"prompt": "a cat skateboarding"})).await.unwrap();
        router.dispatch_call("setAspectRatio", &json!({"aspectRatio": "9:16"})).await.unwrap();
        router.dispatch_call("setDuration", &json!({"duration": 4})).await.unwrap();
        let reply = router.dispatch_call("setQuality", &json!({"quality": "high"})).await.unwrap();
        assert_eq!(reply, "Quality set to high (1080p).");

        let config = router.generation_config();
        assert_eq!(config.prompt, "a cat skateboarding");
        assert_eq!(config.aspect_ratio.as_str(), "9:16");
        assert_eq!(config.duration_seconds, 4);
        assert_eq!(config.resolution.as_str(), "1080p");
    }

    #[tokio::test]
    async fn invalid_arguments_are_described_not_raised() {
        let fx = idle();
        let reply = fx
            .router
            .dispatch_call("setAspectRatio", &json!({"aspectRatio": "2:1"}))
            .await
            .unwrap();
        assert!(reply.contains("Unsupported aspect ratio"));
        assert_eq!(fx.router.generation_config().aspect_ratio.as_str(), "16:9");

        let reply = fx.router.dispatch_call("setDuration", &json!({"duration": 2.5})).await.unwrap();
        assert!(reply.contains("whole number"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let fx = idle();
        let err = fx.router.dispatch_call("deleteEverything", &json!({})).await.unwrap_err();
        assert!(matches!(err, StudioError::UnknownTool(ref n) if n == "deleteEverything"));
    }

    #[tokio::test]
    async fn effect_with_closed_editor_is_refused_without_change() {
        let fx = with_video(5.0).await;
        let before = fx.router.session().active_path();

        let reply = fx
            .router
            .dispatch_call("applyEffect", &json!({"effectName": "grayscale"}))
            .await
            .unwrap();
        assert_eq!(reply, "The editor is not open. Open the editor first.");
        assert_eq!(fx.router.session().active_path(), before);
    }

    #[tokio::test]
    async fn effect_with_open_editor_replaces_video() {
        let fx = with_video(5.0).await;
        fx.router.dispatch(ToolCommand::OpenEditor).await;

        let reply = fx
            .router
            .dispatch_call("applyEffect", &json!({"effectName": "grayscale"}))
            .await
            .unwrap();
        assert!(reply.starts_with("Applied the grayscale effect"));

        let (data, _) = fx.router.session().active_bytes().unwrap();
        assert_eq!(decode(&data).history, vec!["filter:grayscale"]);
    }

    #[tokio::test]
    async fn trim_tool_checks_bounds_before_the_session() {
        let fx = with_video(10.0).await;
        fx.router.dispatch(ToolCommand::OpenEditor).await;

        let reply = fx
            .router
            .dispatch_call("trimVideo", &json!({"startTime": 4, "endTime": 12}))
            .await
            .unwrap();
        assert!(reply.starts_with("Invalid trim range"));
        assert_eq!(fx.router.session().duration(), Some(10.0));

        let reply = fx
            .router
            .dispatch_call("trimVideo", &json!({"startTime": 2, "endTime": "5"}))
            .await
            .unwrap();
        assert_eq!(reply, "Trimmed the video to 2s through 5s. It is now 3 seconds long.");
        let range = fx.router.session().trim_range().unwrap();
        assert_eq!((range.start(), range.end()), (0.0, 3.0));
    }

    #[tokio::test]
    async fn fade_on_short_clip_is_explained() {
        let fx = with_video(1.5).await;
        fx.router.dispatch(ToolCommand::OpenEditor).await;
        let reply = fx.router.dispatch(ToolCommand::ApplyEffect { effect: engine::EffectKind::Fade }).await;
        assert!(reply.contains("at least 2 seconds"));
    }

    #[tokio::test]
    async fn open_editor_without_video_is_explained() {
        let fx = idle();
        let reply = fx.router.dispatch(ToolCommand::OpenEditor).await;
        assert!(reply.starts_with("Cannot open the editor"));
    }

    #[tokio::test]
    async fn generate_without_prompt_is_refused() {
        let fx = idle();
        let reply = fx.router.dispatch(ToolCommand::ClickGenerate).await;
        assert!(reply.starts_with("Cannot generate yet"));
        assert!(!fx.router.session().is_busy());
    }

    async fn settle(router: &ToolRouter) {
        for _ in 0..400 {
            if !router.session().is_busy() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn generation_loads_video_with_editor_closed() {
        let fx = fixture(ScriptedBackend::done_after(2, fake_video(1.0)));
        let router = &fx.router;
        router.dispatch_call("setPrompt", &json!({"prompt": "a cat skateboarding"})).await.unwrap();
        router.dispatch_call("setDuration", &json!({"duration": 1})).await.unwrap();

        let job = router.generate().await.unwrap();
        assert!(router.session().is_busy());
        assert!(matches!(router.generate().await, Err(StudioError::OperationInProgress)));

        settle(router).await;

        assert_eq!(router.runner().job(job.id).unwrap().status, JobStatus::Done);
        assert_eq!(router.session().state(), SessionState::VideoLoaded);
        assert_eq!(router.session().duration(), Some(1.0));
        assert!(!router.session().is_busy());
    }

    #[tokio::test]
    async fn quota_failure_sets_persistent_flag() {
        let fx = fixture(ScriptedBackend::new(
            vec![Err(StudioError::QuotaExceeded("limit".into()))],
            Bytes::new(),
        ));
        fx.router.dispatch_call("setPrompt", &json!({"prompt": "waves"})).await.unwrap();
        let job = fx.router.generate().await.unwrap();

        settle(&fx.router).await;

        assert_eq!(fx.router.runner().job(job.id).unwrap().status, JobStatus::Failed);
        assert!(fx.router.session().view().quota_blocked);
        assert_eq!(fx.router.session().state(), SessionState::NoVideo);
    }

    #[tokio::test]
    async fn trim_reply_reports_the_applied_range() {
        let fx = with_video(10.0).await;
        fx.router.dispatch(ToolCommand::OpenEditor).await;

        let reply = fx
            .router
            .dispatch_call("trimVideo", &json!({"startTime": 2, "endTime": 2.05}))
            .await
            .unwrap();
        assert_eq!(reply, "Trimmed the video to 2s through 2.1s. It is now 0.1 seconds long.");
    }

    #[tokio::test]
    async fn unloadable_generated_video_is_reported() {
        let fx = fixture(ScriptedBackend::done_after(0, Bytes::from_static(b"not a video")));
        fx.router.dispatch_call("setPrompt", &json!({"prompt": "rain"})).await.unwrap();
        let job = fx.router.generate().await.unwrap();

        settle(&fx.router).await;
        for _ in 0..200 {
            if fx.router.session().view().notice.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let job = fx.router.runner().job(job.id).unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.delivery_error.is_some());
        let notice = fx.router.session().view().notice.unwrap();
        assert!(notice.starts_with("The generated video could not be loaded"), "{}", notice);
        assert_eq!(fx.router.session().state(), SessionState::NoVideo);
        assert!(!fx.router.session().is_busy());
    }

    #[tokio::test]
    async fn current_frame_becomes_conditioning_image() {
        let fx = with_video(4.0).await;
        fx.router.use_current_frame(2.0).await.unwrap();

        let image = fx.router.generation_config().conditioning_image.unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.bytes, b"jpeg@2/4".to_vec());
    }
}
