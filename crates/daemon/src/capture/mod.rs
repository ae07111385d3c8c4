//! Camera recording and speech input boundaries.

use bytes::{Bytes, BytesMut};
use engine::format_seconds;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::StudioError;
use crate::session::EditingSession;

struct Recording {
    id: u64,
    data: BytesMut,
    timer: JoinHandle<()>,
    /// Set once the time limit is reached; no more chunks are accepted.
    stopped: bool,
}

/// Collects recorded chunks and hands the finished video to the session.
/// A recording left running is stopped by a timer after `limit` and loaded
/// as soon as the session is free.
pub struct Recorder {
    session: Arc<EditingSession>,
    limit: Duration,
    current: Mutex<Option<Recording>>,
    next_id: AtomicU64,
}

impl Recorder {
    pub fn new(session: Arc<EditingSession>, limit: Duration) -> Arc<Self> {
        Arc::new(Recorder {
            session,
            limit,
            current: Mutex::new(None),
            next_id: AtomicU64::new(0),
        })
    }

    fn current(&self) -> MutexGuard<'_, Option<Recording>> {
        match self.current.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.current().is_some()
    }

    pub fn start_recording(self: &Arc<Self>) -> Result<u64, StudioError> {
        let mut current = self.current();
        if current.is_some() {
            return Err(StudioError::Precondition("A recording is already in progress".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        let recorder: Weak<Recorder> = Arc::downgrade(self);
        let limit = self.limit;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            if let Some(recorder) = recorder.upgrade() {
                recorder.force_stop(id).await;
            }
        });

        *current = Some(Recording {
            id,
            data: BytesMut::new(),
            timer,
            stopped: false,
        });
        info!("[Capture] Recording {} started (limit {}s)", id, limit.as_secs());
        Ok(id)
    }

    /// Returns the number of bytes recorded so far.
    pub fn append_chunk(&self, chunk: &[u8]) -> Result<usize, StudioError> {
        let mut current = self.current();
        let recording = current
            .as_mut()
            .ok_or_else(|| StudioError::Precondition("No recording is in progress".to_string()))?;
        if recording.stopped {
            return Err(StudioError::Precondition(
                "The recording reached its time limit and was stopped".to_string(),
            ));
        }
        recording.data.extend_from_slice(chunk);
        Ok(recording.data.len())
    }

    /// Stop and load the recording as the active video. Returns its duration.
    /// While the session is busy the recording is kept and this fails with
    /// `OperationInProgress`, so the caller can stop again later.
    pub async fn stop_recording(&self) -> Result<f64, StudioError> {
        if !self.is_recording() {
            return Err(StudioError::Precondition("No recording is in progress".to_string()));
        }
        let permit = self.session.try_begin()?;
        let recording = self
            .current()
            .take()
            .ok_or_else(|| StudioError::Precondition("No recording is in progress".to_string()))?;
        recording.timer.abort();
        info!("[Capture] Recording {} stopped ({} bytes)", recording.id, recording.data.len());
        self.session.finalize_recording(permit, recording.data.freeze()).await
    }

    async fn force_stop(&self, id: u64) {
        {
            let mut current = self.current();
            match current.as_mut() {
                Some(recording) if recording.id == id => recording.stopped = true,
                _ => return,
            }
        }
        warn!("[Capture] Recording {} hit the {}s limit, stopping", id, self.limit.as_secs());
        self.session
            .set_notice(format!("Recording stopped at the {}s limit", format_seconds(self.limit.as_secs_f64())));

        let permit = match self.session.begin().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!("[Capture] Could not load recording {}: {}", id, e);
                return;
            }
        };
        let data: Bytes = {
            let mut current = self.current();
            if current.as_ref().map(|r| r.id) != Some(id) {
                return;
            }
            match current.take() {
                Some(recording) => recording.data.freeze(),
                None => return,
            }
        };
        if let Err(e) = self.session.finalize_recording(permit, data).await {
            warn!("[Capture] Could not load recording {}: {}", id, e);
            self.session.set_notice(format!("The recording could not be loaded: {}", e));
        }
    }
}

/// Final result from the speech recogniser. No interim results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechResult {
    Transcript(String),
    Error(String),
}

/// Status line for a recogniser error code.
pub fn speech_error_message(code: &str) -> &'static str {
    match code {
        "no-speech" => "No speech was detected. Try again.",
        "audio-capture" => "No microphone was found.",
        "not-allowed" => "Microphone permission was denied.",
        "network" => "Speech recognition needs a network connection.",
        _ => "Speech recognition failed. Try again.",
    }
}
