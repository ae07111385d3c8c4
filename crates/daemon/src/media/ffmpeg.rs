use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use engine::render::{generate_frame_command, generate_render_commands, RenderCommand, INPUT_NAME};
use engine::EditOp;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::MediaEngine;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

/// Per-call scratch directory, removed when the call finishes either way.
struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    async fn create(root: &Path) -> Result<Self> {
        let path = root.join(format!("stage-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("Failed to create staging dir {:?}", path))?;
        Ok(StagingDir { path })
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!("[Engine] Failed to clean staging dir {:?}: {}", self.path, e);
        }
    }
}

/// [`MediaEngine`] backed by the ffmpeg/ffprobe binaries.
pub struct FFmpegWrapper {
    ffmpeg_path: String,
    ffprobe_path: String,
    staging_root: PathBuf,
    loaded: OnceCell<()>,
}

impl FFmpegWrapper {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>, staging_root: PathBuf) -> Self {
        FFmpegWrapper {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            staging_root,
            loaded: OnceCell::new(),
        }
    }

    async fn load(&self) -> Result<()> {
        for bin in [&self.ffmpeg_path, &self.ffprobe_path] {
            let output = Command::new(bin)
                .arg("-version")
                .output()
                .await
                .with_context(|| format!("Failed to execute {}. Make sure FFmpeg is installed.", bin))?;
            if !output.status.success() {
                anyhow::bail!("{} -version exited with {}", bin, output.status);
            }
        }
        tokio::fs::create_dir_all(&self.staging_root)
            .await
            .with_context(|| format!("Failed to create staging root {:?}", self.staging_root))?;
        info!("[Engine] ffmpeg ready, staging under {:?}", self.staging_root);
        Ok(())
    }

    /// Write inputs, run ffmpeg in the staging dir and read back the output.
    async fn execute(&self, command: &RenderCommand, inputs: &[Bytes]) -> Result<Bytes> {
        self.ensure_loaded().await?;

        if command.inputs.len() != inputs.len() {
            anyhow::bail!(
                "command expects {} inputs but {} were supplied",
                command.inputs.len(),
                inputs.len()
            );
        }

        let stage = StagingDir::create(&self.staging_root).await?;
        for (name, data) in command.inputs.iter().zip(inputs) {
            tokio::fs::write(stage.path.join(name), data)
                .await
                .with_context(|| format!("Failed to stage input {}", name))?;
        }
        if let Some((name, contents)) = &command.concat_list {
            tokio::fs::write(stage.path.join(name), contents)
                .await
                .context("Failed to write concat list")?;
        }

        debug!("[Engine] ffmpeg {}", command.ffmpeg_args.join(" "));
        let output = Command::new(&self.ffmpeg_path)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(&command.ffmpeg_args)
            .current_dir(&stage.path)
            .output()
            .await
            .context("Failed to execute ffmpeg. Make sure FFmpeg is installed.")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffmpeg failed: {}", stderr.trim());
        }

        let data = tokio::fs::read(stage.path.join(&command.output_name))
            .await
            .with_context(|| format!("ffmpeg produced no {}", command.output_name))?;
        if data.is_empty() {
            anyhow::bail!("ffmpeg produced an empty {}", command.output_name);
        }
        Ok(Bytes::from(data))
    }
}

#[async_trait]
impl MediaEngine for FFmpegWrapper {
    async fn ensure_loaded(&self) -> Result<()> {
        self.loaded.get_or_try_init(|| self.load()).await?;
        Ok(())
    }

    async fn transform(&self, inputs: &[Bytes], op: &EditOp, source_duration: f64) -> Result<Bytes> {
        let command = generate_render_commands(op, source_duration);
        info!(
            "[Engine] Running {:?} over {} input(s){}",
            op,
            inputs.len(),
            if op.reencodes() { " (re-encode)" } else { "" }
        );
        self.execute(&command, inputs).await
    }

    async fn probe_duration(&self, input: &Bytes) -> Result<f64> {
        self.ensure_loaded().await?;
        let stage = StagingDir::create(&self.staging_root).await?;
        tokio::fs::write(stage.path.join(INPUT_NAME), input)
            .await
            .context("Failed to stage probe input")?;

        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json", INPUT_NAME])
            .current_dir(&stage.path)
            .output()
            .await
            .context("Failed to execute ffprobe. Make sure FFmpeg is installed.")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffprobe failed: {}", stderr.trim());
        }

        parse_probe_duration(&output.stdout)
    }

    async fn extract_frame(&self, input: &Bytes, at_seconds: f64) -> Result<Bytes> {
        let command = generate_frame_command(at_seconds);
        self.execute(&command, std::slice::from_ref(input)).await
    }
}

fn parse_probe_duration(stdout: &[u8]) -> Result<f64> {
    let probe_output: ProbeOutput =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe JSON output")?;

    let duration = probe_output
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .context("ffprobe reported no usable duration")?;
    Ok(duration)
}
