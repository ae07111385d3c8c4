pub mod ffmpeg;
#[cfg(test)]
pub mod testing;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use engine::EditOp;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Frame-level processing backend. Stateless per call: inputs are copied
/// into a staging area, so a failed call never touches the caller's bytes.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// One-time initialisation; concurrent callers share the same attempt.
    async fn ensure_loaded(&self) -> Result<()>;

    /// Run `op` over `inputs` (one input, or the ordered parts of a concat).
    /// `source_duration` is the duration of the first input.
    async fn transform(&self, inputs: &[Bytes], op: &EditOp, source_duration: f64) -> Result<Bytes>;

    async fn probe_duration(&self, input: &Bytes) -> Result<f64>;

    /// JPEG still at `at_seconds`.
    async fn extract_frame(&self, input: &Bytes, at_seconds: f64) -> Result<Bytes>;
}

pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// On-disk copy of the active video that the presentation layer streams from.
/// Removing it is tied to drop, so replacing the active video releases it.
#[derive(Debug)]
pub struct VideoFile {
    path: PathBuf,
    checksum: String,
}

impl VideoFile {
    pub async fn materialize(dir: &Path, data: &[u8]) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create media cache dir {:?}", dir))?;
        let path = dir.join(format!("active-{}.mp4", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write active video to {:?}", path))?;
        Ok(VideoFile {
            path,
            checksum: compute_checksum(data),
        })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cache-busting URI for the presentation layer.
    pub fn uri(&self) -> String {
        format!("/api/session/video?v={}", &self.checksum[..12])
    }
}

impl Drop for VideoFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("[Engine] Released {:?}", self.path),
            Err(e) => debug!("[Engine] Could not release {:?}: {}", self.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn video_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = VideoFile::materialize(dir.path(), b"frames").await.unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        assert!(file.uri().starts_with("/api/session/video?v="));

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn checksum_is_stable_hex() {
        let sum = compute_checksum(b"abc");
        assert_eq!(sum, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }
}
