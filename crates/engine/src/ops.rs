use crate::video::{format_seconds, EffectKind};
use serde::{Deserialize, Serialize};

/// One frame-level transform handed to the media engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditOp {
    /// Stream-copy the `[start, end]` window, in seconds.
    Trim { start: f64, end: f64 },
    Filter { effect: EffectKind },
    /// Join `parts` inputs in the order given.
    Concat { parts: usize },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OpError {
    #[error(
        "Trim range {}s-{}s is outside the video (0s-{}s)",
        format_seconds(*.start),
        format_seconds(*.end),
        format_seconds(*.duration)
    )]
    InvalidRange { start: f64, end: f64, duration: f64 },

    #[error(
        "The {effect} effect needs at least {}s of video, but this clip is {}s",
        format_seconds(*.required),
        format_seconds(*.duration)
    )]
    ClipTooShort { effect: EffectKind, duration: f64, required: f64 },

    #[error("Merging needs at least 2 clips, got {0}")]
    NotEnoughInputs(usize),
}

impl EditOp {
    /// Check the operation against its inputs' durations (one per input).
    pub fn validate(&self, input_durations: &[f64]) -> Result<(), OpError> {
        let duration = input_durations.first().copied().unwrap_or(0.0);
        match self {
            EditOp::Trim { start, end } => {
                if !(start.is_finite() && end.is_finite())
                    || *start < 0.0
                    || start >= end
                    || *end > duration
                {
                    return Err(OpError::InvalidRange {
                        start: *start,
                        end: *end,
                        duration,
                    });
                }
                Ok(())
            }
            EditOp::Filter { effect } => {
                let required = effect.min_source_duration();
                if duration < required {
                    return Err(OpError::ClipTooShort {
                        effect: *effect,
                        duration,
                        required,
                    });
                }
                Ok(())
            }
            EditOp::Concat { parts } => {
                if *parts < 2 || input_durations.len() < *parts {
                    return Err(OpError::NotEnoughInputs((*parts).min(input_durations.len())));
                }
                Ok(())
            }
        }
    }

    /// Duration the output should have, before engine rounding.
    pub fn expected_duration(&self, input_durations: &[f64]) -> f64 {
        let duration = input_durations.first().copied().unwrap_or(0.0);
        match self {
            EditOp::Trim { start, end } => end - start,
            EditOp::Filter { effect } => duration * effect.duration_factor(),
            EditOp::Concat { parts } => input_durations.iter().take(*parts).sum(),
        }
    }

    /// Whether the op replaces every frame (as opposed to stream copy).
    pub fn reencodes(&self) -> bool {
        matches!(self, EditOp::Filter { .. })
    }
}
