use engine::{AspectRatio, ConditioningImage, GenerationRequest, Quality, Resolution};
use serde::Serialize;

/// Veo's default clip length.
pub const DEFAULT_DURATION_SECONDS: u32 = 8;

/// Parameters the next `clickGenerate` will submit.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub duration_seconds: u32,
    pub resolution: Resolution,
    pub conditioning_image: Option<ConditioningImage>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            prompt: String::new(),
            aspect_ratio: AspectRatio::default(),
            duration_seconds: DEFAULT_DURATION_SECONDS,
            resolution: Resolution::default(),
            conditioning_image: None,
        }
    }
}

impl GenerationConfig {
    pub fn set_quality(&mut self, quality: Quality) {
        self.resolution = quality.resolution();
    }

    pub fn set_conditioning_image(&mut self, bytes: Vec<u8>, mime_type: &str) -> Result<(), String> {
        if bytes.is_empty() {
            return Err("No image selected".to_string());
        }
        let mime_type = mime_type.trim();
        if !mime_type.starts_with("image/") {
            return Err(format!("'{}' is not an image type", mime_type));
        }
        self.conditioning_image = Some(ConditioningImage {
            bytes,
            mime_type: mime_type.to_string(),
        });
        Ok(())
    }

    pub fn clear_conditioning_image(&mut self) -> bool {
        self.conditioning_image.take().is_some()
    }

    /// Freeze the current settings into a request.
    pub fn to_request(&self) -> Result<GenerationRequest, String> {
        GenerationRequest::new(
            self.prompt.clone(),
            self.conditioning_image.clone(),
            self.aspect_ratio,
            self.duration_seconds,
            self.resolution,
        )
    }
}
