//! In-memory engine for tests. A "video" is a JSON document carrying its
//! duration and the ops that produced it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use engine::EditOp;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OnceCell};

use super::MediaEngine;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FakeVideo {
    pub duration: f64,
    pub history: Vec<String>,
}

pub fn fake_video(duration: f64) -> Bytes {
    encode(&FakeVideo {
        duration,
        history: Vec::new(),
    })
}

pub fn decode(data: &[u8]) -> FakeVideo {
    serde_json::from_slice(data).expect("fake video payload")
}

fn encode(video: &FakeVideo) -> Bytes {
    Bytes::from(serde_json::to_vec(video).expect("encode fake video"))
}

#[derive(Default)]
pub struct FakeEngine {
    /// Initializations actually run, not calls to `ensure_loaded`.
    pub loads: AtomicUsize,
    loaded: OnceCell<()>,
    pub transforms: AtomicUsize,
    fail_next: AtomicBool,
    gate: Option<Arc<Notify>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        FakeEngine::default()
    }

    /// Transforms block until `gate` is notified.
    pub fn gated(gate: Arc<Notify>) -> Self {
        FakeEngine {
            gate: Some(gate),
            ..FakeEngine::default()
        }
    }

    pub fn fail_next_transform(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn ensure_loaded(&self) -> Result<()> {
        self.loaded
            .get_or_init(|| async {
                tokio::task::yield_now().await;
                self.loads.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        Ok(())
    }

    async fn transform(&self, inputs: &[Bytes], op: &EditOp, _source_duration: f64) -> Result<Bytes> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.transforms.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("simulated engine failure");
        }

        let videos: Vec<FakeVideo> = inputs
            .iter()
            .map(|data| serde_json::from_slice(data).context("input is not a fake video"))
            .collect::<Result<_>>()?;
        let durations: Vec<f64> = videos.iter().map(|v| v.duration).collect();
        op.validate(&durations)?;

        let mut history: Vec<String> = videos.iter().flat_map(|v| v.history.clone()).collect();
        history.push(match op {
            EditOp::Trim { start, end } => format!("trim:{}-{}", start, end),
            EditOp::Filter { effect } => format!("filter:{}", effect),
            EditOp::Concat { parts } => format!("concat:{}", parts),
        });
        Ok(encode(&FakeVideo {
            duration: op.expected_duration(&durations),
            history,
        }))
    }

    async fn probe_duration(&self, input: &Bytes) -> Result<f64> {
        let video: FakeVideo = serde_json::from_slice(input).context("input is not a fake video")?;
        Ok(video.duration)
    }

    async fn extract_frame(&self, input: &Bytes, at_seconds: f64) -> Result<Bytes> {
        let video: FakeVideo = serde_json::from_slice(input).context("input is not a fake video")?;
        Ok(Bytes::from(format!("jpeg@{}/{}", at_seconds, video.duration)))
    }
}
