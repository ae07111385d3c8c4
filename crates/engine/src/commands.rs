//! The fixed tool vocabulary shared by direct UI actions and the agent.
//!
//! A tool call arrives as a name plus loosely typed JSON arguments; parsing it
//! into [`ToolCommand`] is the only place argument schemas are enforced.

use crate::video::{AspectRatio, EffectKind, Quality};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ToolCommand {
    SetPrompt { prompt: String },
    SetAspectRatio { aspect_ratio: AspectRatio },
    SetDuration { duration_seconds: u32 },
    SetQuality { quality: Quality },
    ClickGenerate,
    OpenEditor,
    CloseEditor,
    TrimVideo { start_time: f64, end_time: f64 },
    ApplyEffect { effect: EffectKind },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolCallError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
}

pub const TOOL_NAMES: [&str; 9] = [
    "setPrompt",
    "setAspectRatio",
    "setDuration",
    "setQuality",
    "clickGenerate",
    "openEditor",
    "closeEditor",
    "trimVideo",
    "applyEffect",
];

fn invalid(tool: &'static str, reason: impl Into<String>) -> ToolCallError {
    ToolCallError::InvalidArguments {
        tool,
        reason: reason.into(),
    }
}

fn string_arg<'a>(tool: &'static str, args: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolCallError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(invalid(tool, format!("'{}' must be a string, got {}", key, other))),
        None => Err(invalid(tool, format!("missing required argument '{}'", key))),
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn number_arg(tool: &'static str, args: &Map<String, Value>, key: &str) -> Result<f64, ToolCallError> {
    let value = match args.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
        None => return Err(invalid(tool, format!("missing required argument '{}'", key))),
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(tool, format!("'{}' must be a number", key)))
}

impl ToolCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCommand::SetPrompt { .. } => "setPrompt",
            ToolCommand::SetAspectRatio { .. } => "setAspectRatio",
            ToolCommand::SetDuration { .. } => "setDuration",
            ToolCommand::SetQuality { .. } => "setQuality",
            ToolCommand::ClickGenerate => "clickGenerate",
            ToolCommand::OpenEditor => "openEditor",
            ToolCommand::CloseEditor => "closeEditor",
            ToolCommand::TrimVideo { .. } => "trimVideo",
            ToolCommand::ApplyEffect { .. } => "applyEffect",
        }
    }

    /// Validate a raw call against the declared argument schema.
    pub fn parse(name: &str, args: &Value) -> Result<ToolCommand, ToolCallError> {
        let empty = Map::new();
        let args = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return match TOOL_NAMES.iter().find(|n| **n == name) {
                    Some(tool) => Err(invalid(*tool, "arguments must be a JSON object")),
                    None => Err(ToolCallError::UnknownTool(name.to_string())),
                }
            }
        };

        match name {
            "setPrompt" => {
                let prompt = string_arg("setPrompt", args, "prompt")?.trim();
                if prompt.is_empty() {
                    return Err(invalid("setPrompt", "'prompt' must not be empty"));
                }
                Ok(ToolCommand::SetPrompt {
                    prompt: prompt.to_string(),
                })
            }
            "setAspectRatio" => {
                let raw = string_arg("setAspectRatio", args, "aspectRatio")?;
                let aspect_ratio = raw.parse::<AspectRatio>().map_err(|e: String| invalid("setAspectRatio", e))?;
                Ok(ToolCommand::SetAspectRatio { aspect_ratio })
            }
            "setDuration" => {
                let raw = number_arg("setDuration", args, "duration")?;
                if raw < 1.0 || raw.fract() != 0.0 || raw > u32::MAX as f64 {
                    return Err(invalid(
                        "setDuration",
                        "'duration' must be a positive whole number of seconds",
                    ));
                }
                Ok(ToolCommand::SetDuration {
                    duration_seconds: raw as u32,
                })
            }
            "setQuality" => {
                let raw = string_arg("setQuality", args, "quality")?;
                let quality = raw.parse::<Quality>().map_err(|e: String| invalid("setQuality", e))?;
                Ok(ToolCommand::SetQuality { quality })
            }
            "clickGenerate" => Ok(ToolCommand::ClickGenerate),
            "openEditor" => Ok(ToolCommand::OpenEditor),
            "closeEditor" => Ok(ToolCommand::CloseEditor),
            "trimVideo" => Ok(ToolCommand::TrimVideo {
                start_time: number_arg("trimVideo", args, "startTime")?,
                end_time: number_arg("trimVideo", args, "endTime")?,
            }),
            "applyEffect" => {
                let raw = string_arg("applyEffect", args, "effectName")?;
                let effect = raw.parse::<EffectKind>().map_err(|e: String| invalid("applyEffect", e))?;
                Ok(ToolCommand::ApplyEffect { effect })
            }
            other => Err(ToolCallError::UnknownTool(other.to_string())),
        }
    }
}

/// Function declaration handed to the language model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

fn no_parameters() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub fn tool_declarations() -> Vec<ToolDeclaration> {
    let aspect_ratios: Vec<&str> = AspectRatio::ALL.iter().map(|r| r.as_str()).collect();
    let effects: Vec<&str> = EffectKind::ALL.iter().map(|e| e.as_str()).collect();

    vec![
        ToolDeclaration {
            name: "setPrompt",
            description: "Set the text prompt describing the video to generate.",
            parameters: json!({
                "type": "object",
                "properties": { "prompt": { "type": "string", "description": "What the video should show." } },
                "required": ["prompt"]
            }),
        },
        ToolDeclaration {
            name: "setAspectRatio",
            description: "Set the aspect ratio of the next generated video.",
            parameters: json!({
                "type": "object",
                "properties": { "aspectRatio": { "type": "string", "enum": aspect_ratios } },
                "required": ["aspectRatio"]
            }),
        },
        ToolDeclaration {
            name: "setDuration",
            description: "Set the length of the next generated video in seconds.",
            parameters: json!({
                "type": "object",
                "properties": { "duration": { "type": "integer", "minimum": 1 } },
                "required": ["duration"]
            }),
        },
        ToolDeclaration {
            name: "setQuality",
            description: "Set output quality: 'standard' is 720p, 'high' is 1080p.",
            parameters: json!({
                "type": "object",
                "properties": { "quality": { "type": "string", "enum": ["standard", "high"] } },
                "required": ["quality"]
            }),
        },
        ToolDeclaration {
            name: "clickGenerate",
            description: "Start generating a video from the current prompt and settings.",
            parameters: no_parameters(),
        },
        ToolDeclaration {
            name: "openEditor",
            description: "Open the editor for the current video so it can be trimmed or given effects.",
            parameters: no_parameters(),
        },
        ToolDeclaration {
            name: "closeEditor",
            description: "Close the editor, discarding any pending trim selection.",
            parameters: no_parameters(),
        },
        ToolDeclaration {
            name: "trimVideo",
            description: "Trim the current video to the given window. The editor must be open.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "startTime": { "type": "number", "description": "Start of the kept window in seconds." },
                    "endTime": { "type": "number", "description": "End of the kept window in seconds." }
                },
                "required": ["startTime", "endTime"]
            }),
        },
        ToolDeclaration {
            name: "applyEffect",
            description: "Apply a visual effect to the current video. The editor must be open.",
            parameters: json!({
                "type": "object",
                "properties": { "effectName": { "type": "string", "enum": effects } },
                "required": ["effectName"]
            }),
        },
    ]
}
