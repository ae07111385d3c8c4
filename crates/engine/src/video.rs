use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest span a trim range may collapse to, in seconds.
pub const MIN_TRIM_SPAN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    ClassicPortrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Square,
        AspectRatio::Classic,
        AspectRatio::ClassicPortrait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Square => "1:1",
            AspectRatio::Classic => "4:3",
            AspectRatio::ClassicPortrait => "3:4",
        }
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        AspectRatio::Landscape
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| {
                format!(
                    "Unsupported aspect ratio '{}'. Choose one of: {}",
                    s,
                    AspectRatio::ALL.map(|r| r.as_str()).join(", ")
                )
            })
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::P720
    }
}

/// Two-valued proxy the agent speaks in; maps onto a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    High,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Standard => "standard",
            Quality::High => "high",
        }
    }

    pub fn resolution(&self) -> Resolution {
        match self {
            Quality::Standard => Resolution::P720,
            Quality::High => Resolution::P1080,
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Quality::Standard),
            "high" => Ok(Quality::High),
            other => Err(format!(
                "Unsupported quality '{}'. Choose 'standard' (720p) or 'high' (1080p)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditioningImage {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Parameters of one generation submission. Built through [`GenerationRequest::new`]
/// and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    prompt: String,
    conditioning_image: Option<ConditioningImage>,
    aspect_ratio: AspectRatio,
    duration_seconds: u32,
    resolution: Resolution,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        conditioning_image: Option<ConditioningImage>,
        aspect_ratio: AspectRatio,
        duration_seconds: u32,
        resolution: Resolution,
    ) -> Result<Self, String> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err("A prompt is required before generating".to_string());
        }
        if duration_seconds == 0 {
            return Err("Duration must be a positive number of seconds".to_string());
        }
        Ok(GenerationRequest {
            prompt,
            conditioning_image,
            aspect_ratio,
            duration_seconds,
            resolution,
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn conditioning_image(&self) -> Option<&ConditioningImage> {
        self.conditioning_image.as_ref()
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// Pending trim bounds in seconds. Always satisfies `0 <= start < end <= duration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    start: f64,
    end: f64,
}

impl TrimRange {
    pub fn full(duration: f64) -> Self {
        TrimRange::clamped(0.0, duration, duration)
    }

    /// Clamp arbitrary input into a valid range for `duration`.
    pub fn clamped(start: f64, end: f64, duration: f64) -> Self {
        let duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            MIN_TRIM_SPAN
        };
        let span = MIN_TRIM_SPAN.min(duration);
        let start = if start.is_finite() { start } else { 0.0 };
        let end = if end.is_finite() { end } else { duration };

        let start = start.clamp(0.0, duration - span);
        let end = end.clamp((start + span).min(duration), duration);
        TrimRange { start, end }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Grayscale,
    Sepia,
    Vignette,
    Fade,
    Slowmo,
    Fastforward,
}

impl EffectKind {
    pub const ALL: [EffectKind; 6] = [
        EffectKind::Grayscale,
        EffectKind::Sepia,
        EffectKind::Vignette,
        EffectKind::Fade,
        EffectKind::Slowmo,
        EffectKind::Fastforward,
    ];

    /// Length of each fade ramp in seconds.
    pub const FADE_SECONDS: f64 = 1.0;

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Grayscale => "grayscale",
            EffectKind::Sepia => "sepia",
            EffectKind::Vignette => "vignette",
            EffectKind::Fade => "fade",
            EffectKind::Slowmo => "slowmo",
            EffectKind::Fastforward => "fastforward",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EffectKind::Grayscale => "black and white",
            EffectKind::Sepia => "sepia tone",
            EffectKind::Vignette => "vignette",
            EffectKind::Fade => "fade in/out",
            EffectKind::Slowmo => "slow motion",
            EffectKind::Fastforward => "fast forward",
        }
    }

    /// Shortest source the effect accepts.
    pub fn min_source_duration(&self) -> f64 {
        match self {
            EffectKind::Fade => 2.0 * Self::FADE_SECONDS,
            _ => 0.0,
        }
    }

    /// Output duration divided by input duration.
    pub fn duration_factor(&self) -> f64 {
        match self {
            EffectKind::Slowmo => 2.0,
            EffectKind::Fastforward => 0.5,
            _ => 1.0,
        }
    }

    /// ffmpeg `-vf` expression for a source of `duration` seconds.
    pub fn filter_expression(&self, duration: f64) -> String {
        match self {
            EffectKind::Grayscale => "hue=s=0".to_string(),
            EffectKind::Sepia => {
                "colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131".to_string()
            }
            EffectKind::Vignette => "vignette=PI/4".to_string(),
            EffectKind::Fade => format!(
                "fade=t=in:st=0:d={fade},fade=t=out:st={out}:d={fade}",
                fade = Self::FADE_SECONDS,
                out = format_seconds((duration - Self::FADE_SECONDS).max(0.0)),
            ),
            EffectKind::Slowmo => "setpts=2.0*PTS".to_string(),
            EffectKind::Fastforward => "setpts=0.5*PTS".to_string(),
        }
    }
}

impl FromStr for EffectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        EffectKind::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "Unknown effect '{}'. Available effects: {}",
                    s,
                    EffectKind::ALL.map(|e| e.as_str()).join(", ")
                )
            })
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seconds rendered with millisecond precision and no trailing zeros.
pub fn format_seconds(seconds: f64) -> String {
    let s = format!("{:.3}", seconds);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
