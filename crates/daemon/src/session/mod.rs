pub mod state;

use bytes::Bytes;
use engine::{EditOp, EffectKind, TrimRange};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

use crate::db::{Clip, Database};
use crate::error::StudioError;
use crate::media::{MediaEngine, VideoFile};
use state::{ActiveVideo, BinEntry, BinEntryView, EditorMode, SessionInner, SessionState, SessionView};

/// Owner of the active video, the editor sub-state and the merge bin.
///
/// Every path that replaces the active video (generation, trim, effect, merge,
/// loading a clip or a recording) first takes the single-flight permit, so a
/// second destructive call while one is pending fails with
/// [`StudioError::OperationInProgress`]. The state lock itself is never held
/// across an await.
pub struct EditingSession {
    engine: Arc<dyn MediaEngine>,
    cache_dir: PathBuf,
    inner: Mutex<SessionInner>,
    guard: Arc<Semaphore>,
}

impl EditingSession {
    pub fn new(engine: Arc<dyn MediaEngine>, cache_dir: PathBuf) -> Self {
        EditingSession {
            engine,
            cache_dir,
            inner: Mutex::new(SessionInner::default()),
            guard: Arc::new(Semaphore::new(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        // Every mutation below completes before the guard drops, so a
        // poisoned lock still holds consistent state.
        match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Take the single-flight permit or fail fast.
    pub fn try_begin(&self) -> Result<OwnedSemaphorePermit, StudioError> {
        self.guard
            .clone()
            .try_acquire_owned()
            .map_err(|_| StudioError::OperationInProgress)
    }

    /// Wait for the single-flight permit. For background work that must not
    /// be dropped just because another operation is running.
    pub async fn begin(&self) -> Result<OwnedSemaphorePermit, StudioError> {
        self.guard
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StudioError::OperationInProgress)
    }

    pub fn is_busy(&self) -> bool {
        self.guard.available_permits() == 0
    }

    pub fn view(&self) -> SessionView {
        let busy = self.is_busy();
        self.lock().view(busy)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    pub fn duration(&self) -> Option<f64> {
        self.lock().active.as_ref().map(|v| v.duration)
    }

    /// `None` while the editor is closed.
    #[cfg(test)]
    pub fn trim_range(&self) -> Option<TrimRange> {
        self.lock().editor.as_ref().map(|e| e.trim)
    }

    pub fn active_bytes(&self) -> Result<(Bytes, f64), StudioError> {
        let inner = self.lock();
        let active = inner.active.as_ref().ok_or_else(StudioError::no_video)?;
        Ok((active.data.clone(), active.duration))
    }

    #[cfg(test)]
    pub fn active_path(&self) -> Option<PathBuf> {
        self.lock().active.as_ref().map(|v| v.file.path().to_path_buf())
    }

    async fn materialize(&self, data: Bytes, duration: f64) -> Result<ActiveVideo, StudioError> {
        let file = VideoFile::materialize(&self.cache_dir, &data)
            .await
            .map_err(StudioError::engine)?;
        Ok(ActiveVideo { data, file, duration })
    }

    async fn probe(&self, data: &Bytes) -> Result<f64, StudioError> {
        self.engine.ensure_loaded().await.map_err(StudioError::engine)?;
        self.engine.probe_duration(data).await.map_err(StudioError::engine)
    }

    /// Replace the active video with one that arrived from outside the editor.
    /// The editor is left closed.
    async fn install(&self, data: Bytes, duration: Option<f64>, source: &str) -> Result<f64, StudioError> {
        if data.is_empty() {
            return Err(StudioError::Input(format!("The {} is empty", source)));
        }
        let duration = match duration.filter(|d| d.is_finite() && *d > 0.0) {
            Some(d) => d,
            None => self.probe(&data).await?,
        };
        let video = self.materialize(data, duration).await?;
        self.lock().replace_active(video, false);
        info!("[Session] Loaded {} ({:.2}s)", source, duration);
        Ok(duration)
    }

    pub async fn load_clip(&self, clip: Clip) -> Result<f64, StudioError> {
        let _permit = self.try_begin()?;
        let label = format!("clip '{}'", clip.name);
        self.install(Bytes::from(clip.video), Some(clip.duration_seconds), &label)
            .await
    }

    /// Load a finished recording. The caller takes the permit first so a busy
    /// session never costs it the recorded bytes.
    pub async fn finalize_recording(&self, permit: OwnedSemaphorePermit, data: Bytes) -> Result<f64, StudioError> {
        let duration = self.install(data, None, "recording").await?;
        drop(permit);
        Ok(duration)
    }

    /// Install a finished generation. The caller hands over the permit it held
    /// for the whole job.
    pub async fn install_generated(&self, permit: OwnedSemaphorePermit, data: Bytes) -> Result<f64, StudioError> {
        let duration = self.install(data, None, "generated video").await?;
        self.lock().quota_blocked = false;
        drop(permit);
        Ok(duration)
    }

    pub fn set_quota_blocked(&self, blocked: bool) {
        self.lock().quota_blocked = blocked;
    }

    pub fn set_notice(&self, notice: impl Into<String>) {
        let notice = notice.into();
        info!("[Session] Notice: {}", notice);
        self.lock().notice = Some(notice);
    }

    pub fn dismiss_notice(&self) {
        self.lock().notice = None;
    }

    /// Returns `false` when the editor was already open.
    pub fn open_editor(&self) -> Result<bool, StudioError> {
        let mut inner = self.lock();
        let duration = inner.active.as_ref().ok_or_else(StudioError::no_video)?.duration;
        if inner.editor.is_some() {
            return Ok(false);
        }
        inner.editor = Some(EditorMode::fresh(duration));
        info!("[Session] Editor opened, trim range [0, {:.2}]", duration);
        Ok(true)
    }

    /// Returns `false` when the editor was already closed.
    pub fn close_editor(&self) -> bool {
        let closed = self.lock().editor.take().is_some();
        if closed {
            info!("[Session] Editor closed");
        }
        closed
    }

    /// Clamp `[start, end]` into the active video and store it as the pending trim.
    pub fn set_trim_range(&self, start: f64, end: f64) -> Result<TrimRange, StudioError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let duration = inner.active.as_ref().ok_or_else(StudioError::no_video)?.duration;
        let editor = inner.editor.as_mut().ok_or_else(StudioError::editor_closed)?;
        editor.trim = TrimRange::clamped(start, end, duration);
        Ok(editor.trim)
    }

    /// Run `op` on a copy of `inputs` and wrap the result as a new active video.
    async fn run_edit(&self, inputs: Vec<Bytes>, durations: Vec<f64>, op: EditOp) -> Result<ActiveVideo, StudioError> {
        op.validate(&durations)?;
        self.engine.ensure_loaded().await.map_err(StudioError::engine)?;

        let source_duration = durations.first().copied().unwrap_or(0.0);
        let output = self
            .engine
            .transform(&inputs, &op, source_duration)
            .await
            .map_err(StudioError::engine)?;
        let duration = self.probe(&output).await?;
        self.materialize(output, duration).await
    }

    /// Cut the active video down to the pending trim range.
    pub async fn apply_trim(&self) -> Result<f64, StudioError> {
        let _permit = self.try_begin()?;
        let (input, duration, trim) = {
            let inner = self.lock();
            let active = inner.active.as_ref().ok_or_else(StudioError::no_video)?;
            let editor = inner.editor.as_ref().ok_or_else(StudioError::editor_closed)?;
            (active.data.clone(), active.duration, editor.trim)
        };

        let op = EditOp::Trim {
            start: trim.start(),
            end: trim.end(),
        };
        let video = match self.run_edit(vec![input], vec![duration], op).await {
            Ok(video) => video,
            Err(e) => {
                warn!("[Session] Trim failed, keeping current video: {}", e);
                return Err(e);
            }
        };
        let new_duration = video.duration;
        self.lock().replace_active(video, true);
        info!(
            "[Session] Trimmed [{:.2}, {:.2}] of {:.2}s, now {:.2}s",
            trim.start(),
            trim.end(),
            duration,
            new_duration
        );
        Ok(new_duration)
    }

    pub async fn apply_effect(&self, effect: EffectKind) -> Result<f64, StudioError> {
        let _permit = self.try_begin()?;
        let op = EditOp::Filter { effect };
        let (input, duration) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let active = inner.active.as_ref().ok_or_else(StudioError::no_video)?;
            let editor = inner.editor.as_mut().ok_or_else(StudioError::editor_closed)?;
            op.validate(&[active.duration])?;
            editor.pending_effect = Some(effect);
            (active.data.clone(), active.duration)
        };

        match self.run_edit(vec![input], vec![duration], op).await {
            Ok(video) => {
                let new_duration = video.duration;
                self.lock().replace_active(video, true);
                info!("[Session] Applied {} ({:.2}s -> {:.2}s)", effect, duration, new_duration);
                Ok(new_duration)
            }
            Err(e) => {
                if let Some(editor) = self.lock().editor.as_mut() {
                    editor.pending_effect = None;
                }
                warn!("[Session] Effect {} failed, keeping current video: {}", effect, e);
                Err(e)
            }
        }
    }

    /// Copy the active video into the merge bin. Returns the new bin length.
    pub fn add_active_to_bin(&self, name: &str) -> Result<usize, StudioError> {
        let mut inner = self.lock();
        let active = inner.active.as_ref().ok_or_else(StudioError::no_video)?;
        let entry = BinEntry::new(clip_name(name, inner.bin.len()), None, active.data.clone(), active.duration);
        Ok(inner.bin.push(entry))
    }

    pub fn add_clip_to_bin(&self, clip: Clip) -> usize {
        self.lock().bin.push(BinEntry::from(clip))
    }

    pub fn remove_from_bin(&self, index: usize) -> Result<(), StudioError> {
        self.lock()
            .bin
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| StudioError::Input(format!("No merge bin entry at position {}", index)))
    }

    pub fn clear_bin(&self) {
        self.lock().bin.clear();
    }

    pub fn bin(&self) -> Vec<BinEntryView> {
        self.view().bin
    }

    /// Concatenate the bin in order into a new active video. On success the
    /// merged entries leave the bin; entries added meanwhile stay.
    pub async fn merge(&self) -> Result<f64, StudioError> {
        let _permit = self.try_begin()?;
        let (inputs, durations, merged) = {
            let inner = self.lock();
            if inner.bin.len() < 2 {
                return Err(StudioError::Precondition(format!(
                    "Add at least two clips to the merge bin first ({} queued)",
                    inner.bin.len()
                )));
            }
            let entries = inner.bin.entries();
            let inputs: Vec<Bytes> = entries.iter().map(|e| e.data.clone()).collect();
            let durations: Vec<f64> = entries.iter().map(|e| e.duration).collect();
            let merged: Vec<u64> = entries.iter().map(BinEntry::seq).collect();
            (inputs, durations, merged)
        };
        let parts = inputs.len();

        let video = match self.run_edit(inputs, durations, EditOp::Concat { parts }).await {
            Ok(video) => video,
            Err(e) => {
                warn!("[Session] Merge of {} clips failed, bin kept: {}", parts, e);
                return Err(e);
            }
        };
        let duration = video.duration;
        let mut inner = self.lock();
        inner.replace_active(video, false);
        inner.bin.remove_merged(&merged);
        info!("[Session] Merged {} clips into {:.2}s", parts, duration);
        Ok(duration)
    }

    /// JPEG of the active video at `at_seconds`, clamped into the video.
    pub async fn capture_frame(&self, at_seconds: f64) -> Result<Bytes, StudioError> {
        let (data, duration) = self.active_bytes()?;
        let at = if at_seconds.is_finite() {
            at_seconds.clamp(0.0, duration)
        } else {
            0.0
        };
        self.engine.ensure_loaded().await.map_err(StudioError::engine)?;
        self.engine.extract_frame(&data, at).await.map_err(StudioError::engine)
    }

    /// Persist the active video as a new clip, with a thumbnail from its first second.
    pub async fn save_active(&self, db: &Database, name: &str) -> Result<i64, StudioError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StudioError::Input("A clip name is required".to_string()));
        }
        let (data, duration) = self.active_bytes()?;
        let thumbnail = self.capture_frame((duration / 2.0).min(1.0)).await?;

        let clip = Clip::transient(name, data.to_vec(), thumbnail.to_vec(), duration);
        let id = db.add_clip(&clip).map_err(StudioError::persistence)?;
        info!("[ClipStore] Saved clip {} '{}' ({:.2}s)", id, name, duration);
        Ok(id)
    }
}

/// Unnamed bin entries are numbered by position.
fn clip_name(name: &str, position: usize) -> String {
    let name = name.trim();
    if name.is_empty() {
        format!("Clip {}", position + 1)
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::{decode, fake_video, FakeEngine};
    use tokio::sync::Notify;

    struct Fixture {
        session: Arc<EditingSession>,
        engine: Arc<FakeEngine>,
        _dir: tempfile::TempDir,
    }

    fn fixture_with(engine: FakeEngine) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(engine);
        let session = Arc::new(EditingSession::new(engine.clone(), dir.path().join("media")));
        Fixture {
            session,
            engine,
            _dir: dir,
        }
    }

    fn clip(name: &str, duration: f64) -> Clip {
        Clip::transient(name, fake_video(duration).to_vec(), vec![], duration)
    }

    async fn loaded(duration: f64) -> Fixture {
        let fx = fixture_with(FakeEngine::new());
        fx.session.load_clip(clip("seed", duration)).await.unwrap();
        fx
    }

    #[tokio::test]
    async fn open_editor_without_video_is_precondition() {
        let fx = fixture_with(FakeEngine::new());
        let err = fx.session.open_editor().unwrap_err();
        assert_eq!(err.kind(), "precondition");
        assert_eq!(fx.session.state(), SessionState::NoVideo);
    }

    #[tokio::test]
    async fn editor_open_and_close_are_idempotent() {
        let fx = loaded(4.0).await;
        assert!(fx.session.open_editor().unwrap());
        assert!(!fx.session.open_editor().unwrap());
        assert!(fx.session.close_editor());
        assert!(!fx.session.close_editor());
        assert_eq!(fx.session.state(), SessionState::VideoLoaded);
        assert!(fx.session.trim_range().is_none());
    }

    #[tokio::test]
    async fn trim_replaces_video_and_resets_range() {
        let fx = loaded(10.0).await;
        fx.session.open_editor().unwrap();
        let range = fx.session.trim_range().unwrap();
        assert_eq!((range.start(), range.end()), (0.0, 10.0));

        fx.session.set_trim_range(2.0, 5.0).unwrap();
        let duration = fx.session.apply_trim().await.unwrap();
        assert!((duration - 3.0).abs() < 1e-9);

        let range = fx.session.trim_range().unwrap();
        assert_eq!(range.start(), 0.0);
        assert!((range.end() - 3.0).abs() < 1e-9);
        assert_eq!(fx.session.state(), SessionState::EditorOpen);

        let (data, _) = fx.session.active_bytes().unwrap();
        assert_eq!(decode(&data).history, vec!["trim:2-5"]);
    }

    #[tokio::test]
    async fn trim_range_is_clamped_not_rejected() {
        let fx = loaded(10.0).await;
        fx.session.open_editor().unwrap();

        let range = fx.session.set_trim_range(-5.0, 50.0).unwrap();
        assert_eq!((range.start(), range.end()), (0.0, 10.0));

        let range = fx.session.set_trim_range(7.0, 7.0).unwrap();
        assert!(range.start() < range.end());
    }

    #[tokio::test]
    async fn trim_requires_open_editor() {
        let fx = loaded(10.0).await;
        let err = fx.session.apply_trim().await.unwrap_err();
        assert_eq!(err.kind(), "precondition");
        assert_eq!(fx.engine.transforms.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fade_on_short_clip_is_rejected_without_change() {
        let fx = loaded(1.5).await;
        fx.session.open_editor().unwrap();
        let before = fx.session.active_path();

        let err = fx.session.apply_effect(EffectKind::Fade).await.unwrap_err();
        assert!(matches!(err, StudioError::ClipTooShort(_)));
        assert_eq!(fx.session.duration(), Some(1.5));
        assert_eq!(fx.session.active_path(), before);
        assert!(fx.session.view().pending_effect.is_none());
    }

    #[tokio::test]
    async fn slowmo_doubles_duration_and_rescales_range() {
        let fx = loaded(3.0).await;
        fx.session.open_editor().unwrap();

        let duration = fx.session.apply_effect(EffectKind::Slowmo).await.unwrap();
        assert!((duration - 6.0).abs() < 1e-9);
        assert!((fx.session.trim_range().unwrap().end() - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn engine_failure_keeps_previous_video() {
        let fx = loaded(5.0).await;
        fx.session.open_editor().unwrap();
        let before = fx.session.active_path().unwrap();
        fx.engine.fail_next_transform();

        let err = fx.session.apply_effect(EffectKind::Sepia).await.unwrap_err();
        assert_eq!(err.kind(), "engine");
        assert_eq!(fx.session.active_path(), Some(before.clone()));
        assert!(before.exists());
        assert_eq!(fx.session.state(), SessionState::EditorOpen);
    }

    #[tokio::test]
    async fn replacing_video_releases_previous_file() {
        let fx = loaded(5.0).await;
        let first = fx.session.active_path().unwrap();
        assert!(first.exists());

        fx.session.load_clip(clip("next", 2.0)).await.unwrap();
        assert!(!first.exists());
        assert!(fx.session.active_path().unwrap().exists());
    }

    #[tokio::test]
    async fn loading_a_clip_closes_the_editor() {
        let fx = loaded(5.0).await;
        fx.session.open_editor().unwrap();
        fx.session.load_clip(clip("next", 2.0)).await.unwrap();
        assert_eq!(fx.session.state(), SessionState::VideoLoaded);
    }

    #[tokio::test]
    async fn merge_needs_two_entries_and_keeps_bin() {
        let fx = loaded(4.0).await;
        fx.session.add_active_to_bin("only").unwrap();

        let err = fx.session.merge().await.unwrap_err();
        assert_eq!(err.kind(), "precondition");
        assert_eq!(fx.session.bin().len(), 1);
    }

    #[tokio::test]
    async fn merge_concatenates_in_order_and_clears_bin() {
        let fx = loaded(4.0).await;
        fx.session.add_active_to_bin("four").unwrap();
        fx.session.add_clip_to_bin(clip("six", 6.0));
        fx.session.open_editor().unwrap();

        let duration = fx.session.merge().await.unwrap();
        assert!((duration - 10.0).abs() < 1e-9);
        assert!(fx.session.bin().is_empty());
        assert_eq!(fx.session.state(), SessionState::VideoLoaded);
    }

    #[tokio::test]
    async fn failed_merge_preserves_bin() {
        let fx = loaded(4.0).await;
        fx.session.add_active_to_bin("a").unwrap();
        fx.session.add_active_to_bin("b").unwrap();
        fx.engine.fail_next_transform();

        assert!(fx.session.merge().await.is_err());
        assert_eq!(fx.session.bin().len(), 2);
        assert_eq!(fx.session.duration(), Some(4.0));
    }

    #[tokio::test]
    async fn entries_added_during_merge_survive_it() {
        let gate = Arc::new(Notify::new());
        let fx = fixture_with(FakeEngine::gated(gate.clone()));
        fx.session.add_clip_to_bin(clip("a", 2.0));
        fx.session.add_clip_to_bin(clip("b", 3.0));

        let session = fx.session.clone();
        let merging = tokio::spawn(async move { session.merge().await });
        while !fx.session.is_busy() {
            tokio::task::yield_now().await;
        }

        assert_eq!(fx.session.add_clip_to_bin(clip("late", 1.0)), 3);
        gate.notify_one();
        let duration = merging.await.unwrap().unwrap();
        assert!((duration - 5.0).abs() < 1e-9);

        let names: Vec<String> = fx.session.bin().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["late"]);
    }

    #[tokio::test]
    async fn trim_lengths_follow_requested_ranges() {
        let cases = [
            (0.0, 10.0, 0.0, 10.0),
            (0.0, 4.0, 0.0, 4.0),
            (6.5, 10.0, 6.5, 10.0),
            (2.0, 5.0, 2.0, 5.0),
            (3.0, 3.05, 3.0, 3.1),
            (-1.0, 12.0, 0.0, 10.0),
        ];
        for (start, end, cut_start, cut_end) in cases {
            let fx = loaded(10.0).await;
            fx.session.open_editor().unwrap();
            let range = fx.session.set_trim_range(start, end).unwrap();
            assert!((range.start() - cut_start).abs() < 1e-9, "start for [{}, {}]", start, end);
            assert!((range.end() - cut_end).abs() < 1e-9, "end for [{}, {}]", start, end);

            let duration = fx.session.apply_trim().await.unwrap();
            assert!(
                (duration - (cut_end - cut_start)).abs() < 1e-9,
                "[{}, {}] gave {}s",
                start,
                end,
                duration
            );
            assert!(duration >= engine::MIN_TRIM_SPAN - 1e-9);
        }
    }

    #[tokio::test]
    async fn edits_wait_for_a_running_generation() {
        let fx = loaded(6.0).await;
        fx.session.open_editor().unwrap();
        let generation = fx.session.try_begin().unwrap();

        assert!(matches!(fx.session.apply_trim().await, Err(StudioError::OperationInProgress)));
        assert!(matches!(
            fx.session.apply_effect(EffectKind::Sepia).await,
            Err(StudioError::OperationInProgress)
        ));
        assert!(fx.session.view().pending_effect.is_none());
        assert_eq!(fx.engine.transforms.load(std::sync::atomic::Ordering::SeqCst), 0);

        drop(generation);
        assert!(fx.session.apply_effect(EffectKind::Sepia).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_engine_load() {
        let fx = loaded(6.0).await;
        fx.session.open_editor().unwrap();
        assert!(fx.engine.loads.load(std::sync::atomic::Ordering::SeqCst) <= 1);

        let (a, b) = tokio::join!(fx.session.capture_frame(1.0), fx.session.capture_frame(2.0));
        a.unwrap();
        b.unwrap();
        fx.session.apply_effect(EffectKind::Grayscale).await.unwrap();
        assert_eq!(fx.engine.loads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bin_entries_can_be_removed_and_cleared() {
        let fx = loaded(4.0).await;
        fx.session.add_active_to_bin("").unwrap();
        fx.session.add_active_to_bin("second").unwrap();
        assert_eq!(fx.session.bin()[0].name, "Clip 1");

        fx.session.remove_from_bin(0).unwrap();
        assert_eq!(fx.session.bin()[0].name, "second");
        assert_eq!(fx.session.remove_from_bin(3).unwrap_err().kind(), "input");

        fx.session.clear_bin();
        assert!(fx.session.bin().is_empty());
    }

    #[tokio::test]
    async fn concurrent_edit_fails_fast() {
        let gate = Arc::new(Notify::new());
        let fx = fixture_with(FakeEngine::gated(gate.clone()));
        fx.session.load_clip(clip("seed", 5.0)).await.unwrap();
        fx.session.open_editor().unwrap();

        let session = fx.session.clone();
        let first = tokio::spawn(async move { session.apply_effect(EffectKind::Grayscale).await });
        while !fx.session.is_busy() {
            tokio::task::yield_now().await;
        }

        let err = fx.session.apply_effect(EffectKind::Sepia).await.unwrap_err();
        assert!(matches!(err, StudioError::OperationInProgress));
        assert!(matches!(fx.session.merge().await, Err(StudioError::OperationInProgress)));
        assert!(fx.session.view().busy);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(!fx.session.is_busy());

        let (data, _) = fx.session.active_bytes().unwrap();
        assert_eq!(decode(&data).history, vec!["filter:grayscale"]);
    }

    #[tokio::test]
    async fn saved_clip_is_listed_with_thumbnail() {
        let fx = loaded(4.0).await;
        let db = Database::open_in_memory().unwrap();

        assert_eq!(fx.session.save_active(&db, "   ").await.unwrap_err().kind(), "input");
        let id = fx.session.save_active(&db, "keeper").await.unwrap();

        let clips = db.list_clips().unwrap();
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].id, Some(id));
        assert_eq!(clips[0].thumbnail, b"jpeg@1/4".to_vec());
        assert_eq!(clips[0].duration_seconds, 4.0);
    }

    #[tokio::test]
    async fn recording_duration_is_measured() {
        let fx = fixture_with(FakeEngine::new());
        let permit = fx.session.try_begin().unwrap();
        let duration = fx.session.finalize_recording(permit, fake_video(7.5)).await.unwrap();
        assert_eq!(duration, 7.5);
        assert_eq!(fx.session.state(), SessionState::VideoLoaded);

        assert_eq!(
            fx.session
                .finalize_recording(fx.session.try_begin().unwrap(), Bytes::new())
                .await
                .unwrap_err()
                .kind(),
            "input"
        );
    }
}
