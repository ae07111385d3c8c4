use bytes::Bytes;
use engine::{EffectKind, TrimRange};
use serde::Serialize;

use crate::db::Clip;
use crate::media::VideoFile;

/// The one video currently loaded. Dropping it releases its on-disk handle.
#[derive(Debug)]
pub struct ActiveVideo {
    pub data: Bytes,
    pub file: VideoFile,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorMode {
    pub trim: TrimRange,
    pub pending_effect: Option<EffectKind>,
}

impl EditorMode {
    pub fn fresh(duration: f64) -> Self {
        EditorMode {
            trim: TrimRange::full(duration),
            pending_effect: None,
        }
    }
}

/// A clip waiting to be concatenated. Not necessarily saved.
#[derive(Debug, Clone)]
pub struct BinEntry {
    pub name: String,
    pub clip_id: Option<i64>,
    pub data: Bytes,
    pub duration: f64,
    /// Assigned by the bin on insertion; identifies the entry across edits.
    seq: u64,
}

impl BinEntry {
    pub fn new(name: String, clip_id: Option<i64>, data: Bytes, duration: f64) -> Self {
        BinEntry {
            name,
            clip_id,
            data,
            duration,
            seq: 0,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl From<Clip> for BinEntry {
    fn from(clip: Clip) -> Self {
        BinEntry::new(clip.name, clip.id, Bytes::from(clip.video), clip.duration_seconds)
    }
}

/// Ordered staging list; insertion order is merge order.
#[derive(Debug, Default)]
pub struct MergeBin {
    entries: Vec<BinEntry>,
    next_seq: u64,
}

impl MergeBin {
    pub fn push(&mut self, mut entry: BinEntry) -> usize {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(entry);
        self.entries.len()
    }

    /// Drop the entries that went into a merge, keeping anything added since.
    pub fn remove_merged(&mut self, merged: &[u64]) {
        self.entries.retain(|e| !merged.contains(&e.seq));
    }

    pub fn remove(&mut self, index: usize) -> Option<BinEntry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[BinEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NoVideo,
    VideoLoaded,
    EditorOpen,
}

#[derive(Debug, Default)]
pub struct SessionInner {
    pub active: Option<ActiveVideo>,
    /// `Some` only while the editor is open, and only with an active video.
    pub editor: Option<EditorMode>,
    pub bin: MergeBin,
    pub quota_blocked: bool,
    /// Status line that stays until dismissed, for failures that happened in
    /// the background.
    pub notice: Option<String>,
}

impl SessionInner {
    pub fn state(&self) -> SessionState {
        match (&self.active, &self.editor) {
            (None, _) => SessionState::NoVideo,
            (Some(_), None) => SessionState::VideoLoaded,
            (Some(_), Some(_)) => SessionState::EditorOpen,
        }
    }

    /// Swap in a new active video. The old one is dropped here, which removes
    /// its file. An open editor stays open with its range reset.
    pub fn replace_active(&mut self, video: ActiveVideo, keep_editor: bool) {
        let duration = video.duration;
        self.active = Some(video);
        self.editor = match (keep_editor, &self.editor) {
            (true, Some(_)) => Some(EditorMode::fresh(duration)),
            _ => None,
        };
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BinEntryView {
    pub index: usize,
    pub name: String,
    pub clip_id: Option<i64>,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrimView {
    pub start: f64,
    pub end: f64,
}

/// Read-only snapshot handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub video_uri: Option<String>,
    pub duration_seconds: Option<f64>,
    pub trim: Option<TrimView>,
    pub pending_effect: Option<EffectKind>,
    pub bin: Vec<BinEntryView>,
    pub busy: bool,
    pub quota_blocked: bool,
    pub notice: Option<String>,
}

impl SessionInner {
    pub fn view(&self, busy: bool) -> SessionView {
        SessionView {
            state: self.state(),
            video_uri: self.active.as_ref().map(|v| v.file.uri()),
            duration_seconds: self.active.as_ref().map(|v| v.duration),
            trim: self.editor.as_ref().map(|e| TrimView {
                start: e.trim.start(),
                end: e.trim.end(),
            }),
            pending_effect: self.editor.as_ref().and_then(|e| e.pending_effect),
            bin: self
                .bin
                .entries()
                .iter()
                .enumerate()
                .map(|(index, entry)| BinEntryView {
                    index,
                    name: entry.name.clone(),
                    clip_id: entry.clip_id,
                    duration_seconds: entry.duration,
                })
                .collect(),
            busy,
            quota_blocked: self.quota_blocked,
            notice: self.notice.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> BinEntry {
        BinEntry::new(name.to_string(), None, Bytes::new(), 1.0)
    }

    fn names(bin: &MergeBin) -> Vec<&str> {
        bin.entries().iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn bin_keeps_insertion_order() {
        let mut bin = MergeBin::default();
        bin.push(entry("a"));
        bin.push(entry("b"));
        bin.push(entry("c"));

        assert_eq!(bin.remove(1).map(|e| e.name), Some("b".to_string()));
        assert!(bin.remove(5).is_none());
        assert_eq!(names(&bin), vec!["a", "c"]);
    }

    #[test]
    fn removing_merged_entries_keeps_later_additions() {
        let mut bin = MergeBin::default();
        bin.push(entry("a"));
        bin.push(entry("b"));
        let merged: Vec<u64> = bin.entries().iter().map(BinEntry::seq).collect();

        bin.push(entry("late"));
        bin.remove(0);
        bin.remove_merged(&merged);
        assert_eq!(names(&bin), vec!["late"]);
    }

    #[test]
    fn empty_session_has_no_video() {
        let inner = SessionInner::default();
        assert_eq!(inner.state(), SessionState::NoVideo);
        let view = inner.view(false);
        assert!(view.video_uri.is_none());
        assert!(view.trim.is_none());
    }
}
