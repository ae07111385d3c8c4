pub mod veo;

use async_trait::async_trait;
use bytes::Bytes;
use engine::GenerationRequest;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StudioError;

/// Cosmetic status lines shown while a job is polling.
const PROGRESS_MESSAGES: [&str; 6] = [
    "Setting up the scene...",
    "Rolling camera...",
    "Framing the shot...",
    "Rendering frames...",
    "Adding the finishing touches...",
    "Almost there, polishing pixels...",
];

#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    Running,
    Done { video_uris: Vec<String> },
    Failed(String),
}

/// Long-running generation provider.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Returns an operation handle to poll.
    async fn submit(&self, request: &GenerationRequest) -> Result<String, StudioError>;
    async fn poll(&self, operation: &str) -> Result<PollStatus, StudioError>;
    async fn fetch(&self, uri: &str) -> Result<Bytes, StudioError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Polling,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub request: GenerationRequest,
    pub status: JobStatus,
    pub progress_message: String,
    pub error: Option<String>,
    /// The provider finished but the video could not be loaded into the session.
    pub delivery_error: Option<String>,
    #[serde(skip)]
    operation: Option<String>,
    #[serde(skip)]
    failure: Option<StudioError>,
}

impl GenerationJob {
    fn new(request: GenerationRequest) -> Self {
        GenerationJob {
            id: Uuid::new_v4(),
            request,
            status: JobStatus::Pending,
            progress_message: "Submitting request...".to_string(),
            error: None,
            delivery_error: None,
            operation: None,
            failure: None,
        }
    }

    /// Move to `next` unless the job already finished. Returns whether it moved.
    fn transition(&mut self, next: JobStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        true
    }
}

/// Finished jobs kept for status queries before the oldest are dropped.
const RETAINED_FINISHED_JOBS: usize = 16;

#[derive(Default)]
struct JobTable {
    jobs: HashMap<Uuid, GenerationJob>,
    finished: VecDeque<Uuid>,
}

impl JobTable {
    fn retire(&mut self, id: Uuid) {
        self.finished.push_back(id);
        while self.finished.len() > RETAINED_FINISHED_JOBS {
            if let Some(oldest) = self.finished.pop_front() {
                self.jobs.remove(&oldest);
            }
        }
    }
}

/// Submits generation requests and polls them to completion. The finished
/// video is handed to the caller of [`GenerationRunner::result`] and not kept.
pub struct GenerationRunner {
    backend: Arc<dyn GenerationBackend>,
    poll_interval: Duration,
    table: Mutex<JobTable>,
}

impl GenerationRunner {
    pub fn new(backend: Arc<dyn GenerationBackend>, poll_interval: Duration) -> Self {
        GenerationRunner {
            backend,
            poll_interval,
            table: Mutex::new(JobTable::default()),
        }
    }

    fn table(&self) -> MutexGuard<'_, JobTable> {
        match self.table.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn with_job<T>(&self, id: Uuid, f: impl FnOnce(&mut GenerationJob) -> T) -> Option<T> {
        self.table().jobs.get_mut(&id).map(f)
    }

    pub fn job(&self, id: Uuid) -> Option<GenerationJob> {
        self.with_job(id, |job| job.clone())
    }

    /// Move the job to its terminal state. `failure` of `None` means done.
    fn finish(&self, id: Uuid, failure: Option<&StudioError>) {
        let mut table = self.table();
        let moved = match table.jobs.get_mut(&id) {
            Some(job) => {
                let next = if failure.is_some() { JobStatus::Failed } else { JobStatus::Done };
                let moved = job.transition(next);
                if moved {
                    match failure {
                        Some(err) => {
                            job.error = Some(err.to_string());
                            job.failure = Some(err.clone());
                            job.progress_message = "Failed".to_string();
                        }
                        None => job.progress_message = "Done".to_string(),
                    }
                }
                moved
            }
            None => false,
        };
        if moved {
            table.retire(id);
        }
    }

    /// Note that a finished job's video could not be installed.
    pub fn record_delivery_failure(&self, id: Uuid, err: &StudioError) {
        self.with_job(id, |job| {
            job.delivery_error = Some(err.to_string());
            job.progress_message = "The video could not be loaded".to_string();
        });
    }

    /// Submit once. The returned job is `Pending`; drive it with [`Self::result`].
    pub async fn submit(&self, request: GenerationRequest) -> Result<GenerationJob, StudioError> {
        let job = GenerationJob::new(request.clone());
        let id = job.id;
        self.table().jobs.insert(id, job);

        info!(
            "[Generation] Submitting job {} ({}s, {}, {})",
            id,
            request.duration_seconds(),
            request.aspect_ratio(),
            request.resolution().as_str()
        );
        match self.backend.submit(&request).await {
            Ok(operation) => {
                self.with_job(id, |job| job.operation = Some(operation));
                self.job(id).ok_or_else(|| StudioError::Input(format!("job {} vanished", id)))
            }
            Err(e) => {
                warn!("[Generation] Submission of job {} failed: {}", id, e);
                self.finish(id, Some(&e));
                Err(e)
            }
        }
    }

    /// Poll until the job finishes and hand over its video. Failures are
    /// terminal; asking again returns the same failure without polling.
    pub async fn result(&self, id: Uuid) -> Result<Bytes, StudioError> {
        let job = self
            .job(id)
            .ok_or_else(|| StudioError::Input(format!("Unknown generation job {}", id)))?;
        match job.status {
            JobStatus::Done => {
                return Err(StudioError::Precondition(format!(
                    "Generation job {} already handed over its video",
                    id
                )))
            }
            JobStatus::Failed => {
                return Err(job
                    .failure
                    .unwrap_or_else(|| StudioError::Generation("Generation failed".to_string())))
            }
            _ => {}
        }
        let operation = job
            .operation
            .ok_or_else(|| StudioError::Precondition("Job was never submitted".to_string()))?;

        let outcome = self.poll_until_done(id, &operation).await;
        match &outcome {
            Ok(video) => {
                self.finish(id, None);
                info!("[Generation] Job {} done ({} bytes)", id, video.len());
            }
            Err(e) => {
                warn!("[Generation] Job {} failed: {}", id, e);
                self.finish(id, Some(e));
            }
        }
        outcome
    }

    async fn poll_until_done(&self, id: Uuid, operation: &str) -> Result<Bytes, StudioError> {
        let mut tick = 0usize;
        loop {
            tokio::time::sleep(self.poll_interval).await;
            self.with_job(id, |job| {
                if job.transition(JobStatus::Polling) {
                    job.progress_message = PROGRESS_MESSAGES[tick % PROGRESS_MESSAGES.len()].to_string();
                }
            });
            tick += 1;

            match self.backend.poll(operation).await? {
                PollStatus::Running => continue,
                PollStatus::Failed(message) => return Err(StudioError::Generation(message)),
                PollStatus::Done { video_uris } => {
                    let first = video_uris.first().ok_or(StudioError::NoOutput)?;
                    if video_uris.len() > 1 {
                        info!(
                            "[Generation] Job {} returned {} videos, using the first",
                            id,
                            video_uris.len()
                        );
                    }
                    return self.backend.fetch(first).await;
                }
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that replays a fixed script of poll results.
    pub struct ScriptedBackend {
        pub submit_error: Mutex<Option<StudioError>>,
        pub polls: Mutex<VecDeque<Result<PollStatus, StudioError>>>,
        pub video: Bytes,
        pub submits: AtomicUsize,
    }

    impl ScriptedBackend {
        pub fn new(polls: Vec<Result<PollStatus, StudioError>>, video: Bytes) -> Self {
            ScriptedBackend {
                submit_error: Mutex::new(None),
                polls: Mutex::new(polls.into()),
                video,
                submits: AtomicUsize::new(0),
            }
        }

        pub fn done_after(running_polls: usize, video: Bytes) -> Self {
            let mut polls: Vec<Result<PollStatus, StudioError>> =
                (0..running_polls).map(|_| Ok(PollStatus::Running)).collect();
            polls.push(Ok(PollStatus::Done {
                video_uris: vec!["mem://video/0".to_string()],
            }));
            ScriptedBackend::new(polls, video)
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn submit(&self, _request: &GenerationRequest) -> Result<String, StudioError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            match self.submit_error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok("operations/test".to_string()),
            }
        }

        async fn poll(&self, _operation: &str) -> Result<PollStatus, StudioError> {
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(PollStatus::Running))
        }

        async fn fetch(&self, _uri: &str) -> Result<Bytes, StudioError> {
            Ok(self.video.clone())
        }
    }
}
