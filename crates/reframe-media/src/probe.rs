//! FFprobe video information.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use reframe_models::Dimensions;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::command::{check_ffprobe, describe_command};
use crate::error::{MediaError, MediaResult};

/// Video file information.
///
/// `width`/`height` are display dimensions: any quarter-turn rotation
/// recorded in the container has already been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
    /// Stored (pre-rotation) width
    pub coded_width: u32,
    /// Stored (pre-rotation) height
    pub coded_height: u32,
    /// Rotation in degrees, normalized to 0..360
    pub rotation: i32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Total number of video frames
    pub frame_count: u64,
    /// Video codec
    pub codec: String,
    /// File size in bytes
    pub size: u64,
    /// Bitrate in bits/second
    pub bitrate: u64,
}

impl VideoInfo {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Frame count for planning. Fails when ffprobe found neither
    /// `nb_frames` nor a duration.
    pub fn require_frame_count(&self) -> MediaResult<u64> {
        if self.frame_count == 0 {
            return Err(MediaError::decode_failed(format!(
                "ffprobe reported no frame count or duration ({} stream)",
                if self.codec.is_empty() { "unknown" } else { self.codec.as_str() }
            )));
        }
        Ok(self.frame_count)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        path.to_string_lossy().to_string(),
    ];
    let command = describe_command("ffprobe", &args);
    debug!("Running {}", command);

    let output = Command::new("ffprobe")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(MediaError::InvalidVideo(format!(
            "{}: {} (command: {})",
            path.display(),
            if stderr.is_empty() { "ffprobe failed" } else { stderr.as_str() },
            command
        )));
    }

    parse_probe_output(&output.stdout).map_err(|e| match e {
        MediaError::JsonParse(err) => MediaError::FfprobeFailed {
            message: format!("unreadable ffprobe output: {}", err),
            command,
            stderr: None,
        },
        other => other,
    })
}

/// Build [`VideoInfo`] from ffprobe's JSON output.
pub fn parse_probe_output(json: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let coded_width = video_stream.width.unwrap_or(0);
    let coded_height = video_stream.height.unwrap_or(0);
    if coded_width == 0 || coded_height == 0 {
        return Err(MediaError::InvalidVideo(
            "Video stream has no dimensions".to_string(),
        ));
    }

    let duration = probe
        .format
        .duration
        .as_deref()
        .or(video_stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let bitrate = probe
        .format
        .bit_rate
        .as_ref()
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    let frame_count = video_stream
        .nb_frames
        .as_ref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (duration * fps).round().max(0.0) as u64);

    let rotation = stream_rotation(video_stream);
    let display = Dimensions::new(coded_width, coded_height).rotated(rotation);

    Ok(VideoInfo {
        duration,
        width: display.width,
        height: display.height,
        coded_width,
        coded_height,
        rotation,
        fps,
        frame_count,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        size,
        bitrate,
    })
}

/// Rotation from the legacy `rotate` tag, else from display-matrix side data.
fn stream_rotation(stream: &FfprobeStream) -> i32 {
    let degrees = stream
        .tags
        .get("rotate")
        .and_then(|r| r.trim().parse::<f64>().ok())
        .or_else(|| stream.side_data_list.iter().find_map(|sd| sd.rotation))
        .unwrap_or(0.0);

    (degrees.round() as i32).rem_euclid(360)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };
    (rate > 0.0 && rate.is_finite()).then_some(rate)
}
