use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub cache_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub api_key: Option<String>,
    pub api_base: String,
    pub video_model: String,
    pub agent_model: String,
    pub poll_interval: Duration,
    pub agent_max_steps: usize,
    pub recording_limit: Duration,
    pub debug_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: SocketAddr::from(([127, 0, 0, 1], 7777)),
            db_path: PathBuf::from(".cache/promptcut.db"),
            cache_dir: PathBuf::from(".cache/media"),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            video_model: "veo-3.0-generate-preview".to_string(),
            agent_model: "gemini-2.5-flash".to_string(),
            poll_interval: Duration::from_secs(10),
            agent_max_steps: 8,
            recording_limit: Duration::from_secs(30),
            debug_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(addr) = lookup("PROMPTCUT_ADDR") {
            config.addr = addr
                .parse()
                .with_context(|| format!("PROMPTCUT_ADDR is not a socket address: {}", addr))?;
        }
        if let Some(path) = lookup("PROMPTCUT_DB") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("PROMPTCUT_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(bin) = lookup("PROMPTCUT_FFMPEG") {
            config.ffmpeg_path = bin;
        }
        if let Some(bin) = lookup("PROMPTCUT_FFPROBE") {
            config.ffprobe_path = bin;
        }
        config.api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(base) = lookup("PROMPTCUT_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("PROMPTCUT_VIDEO_MODEL") {
            config.video_model = model;
        }
        if let Some(model) = lookup("PROMPTCUT_AGENT_MODEL") {
            config.agent_model = model;
        }
        if let Some(secs) = lookup("PROMPTCUT_POLL_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("PROMPTCUT_POLL_SECS must be whole seconds: {}", secs))?;
            config.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(steps) = lookup("PROMPTCUT_AGENT_MAX_STEPS") {
            let steps: usize = steps
                .parse()
                .with_context(|| format!("PROMPTCUT_AGENT_MAX_STEPS must be a number: {}", steps))?;
            anyhow::ensure!(steps > 0, "PROMPTCUT_AGENT_MAX_STEPS must be at least 1");
            config.agent_max_steps = steps;
        }
        if let Some(secs) = lookup("PROMPTCUT_RECORDING_LIMIT_SECS") {
            let secs: u64 = secs.parse().with_context(|| {
                format!("PROMPTCUT_RECORDING_LIMIT_SECS must be whole seconds: {}", secs)
            })?;
            config.recording_limit = Duration::from_secs(secs.max(1));
        }
        config.debug_logging = lookup("PROMPTCUT_LOG").as_deref() == Some("debug");

        Ok(config)
    }
}
