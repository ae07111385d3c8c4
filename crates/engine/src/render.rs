use crate::ops::EditOp;
use crate::video::format_seconds;

pub const INPUT_NAME: &str = "input.mp4";
pub const OUTPUT_NAME: &str = "output.mp4";
pub const CONCAT_LIST_NAME: &str = "concat.txt";
pub const FRAME_NAME: &str = "frame.jpg";

/// ffmpeg invocation for one transform, expressed against names inside a
/// staging directory.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCommand {
    pub ffmpeg_args: Vec<String>,
    /// Input file names in the order the caller must write them.
    pub inputs: Vec<String>,
    pub output_name: String,
    /// Concat demuxer list file: (name, contents).
    pub concat_list: Option<(String, String)>,
}

/// Name of the `index`th concat input.
pub fn part_name(index: usize) -> String {
    format!("part{}.mp4", index)
}

fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

/// Build the command for `op`. `source_duration` is the duration of the
/// (first) input, needed by time-dependent filters.
pub fn generate_render_commands(op: &EditOp, source_duration: f64) -> RenderCommand {
    match op {
        EditOp::Trim { start, end } => {
            let start = format_seconds(*start);
            let end = format_seconds(*end);
            RenderCommand {
                ffmpeg_args: args(&[
                    "-i", INPUT_NAME, "-ss", &start, "-to", &end, "-c", "copy", OUTPUT_NAME,
                ]),
                inputs: vec![INPUT_NAME.to_string()],
                output_name: OUTPUT_NAME.to_string(),
                concat_list: None,
            }
        }
        EditOp::Filter { effect } => {
            let expression = effect.filter_expression(source_duration);
            RenderCommand {
                ffmpeg_args: args(&["-i", INPUT_NAME, "-vf", &expression, OUTPUT_NAME]),
                inputs: vec![INPUT_NAME.to_string()],
                output_name: OUTPUT_NAME.to_string(),
                concat_list: None,
            }
        }
        EditOp::Concat { parts } => {
            let inputs: Vec<String> = (0..*parts).map(part_name).collect();
            let list = inputs
                .iter()
                .map(|name| format!("file '{}'\n", name))
                .collect::<String>();
            RenderCommand {
                ffmpeg_args: args(&[
                    "-f", "concat", "-safe", "0", "-i", CONCAT_LIST_NAME, "-c", "copy", OUTPUT_NAME,
                ]),
                inputs,
                output_name: OUTPUT_NAME.to_string(),
                concat_list: Some((CONCAT_LIST_NAME.to_string(), list)),
            }
        }
    }
}

/// Single JPEG frame at `at_seconds`.
pub fn generate_frame_command(at_seconds: f64) -> RenderCommand {
    let at = format_seconds(at_seconds.max(0.0));
    RenderCommand {
        ffmpeg_args: args(&[
            "-ss", &at, "-i", INPUT_NAME, "-frames:v", "1", "-q:v", "2", FRAME_NAME,
        ]),
        inputs: vec![INPUT_NAME.to_string()],
        output_name: FRAME_NAME.to_string(),
        concat_list: None,
    }
}
