//! FFmpeg-based rendering of crop plans.
//!
//! A fixed plan becomes a single `crop` filter. A per-frame plan keeps one
//! continuous filter graph and drives the crop offset with `sendcmd`, so the
//! output never has segment seams.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use reframe_models::CropMode;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::planner::{CropPlan, CropPositions};

/// Instance name of the crop filter targeted by `sendcmd`.
const CROP_FILTER: &str = "crop@reframe";

/// Keep output dimensions even for yuv420p.
const EVEN_SCALE: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2,setsar=1";

/// Source time span rendered for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderWindow {
    pub start_time: f64,
    pub duration: f64,
    pub fps: f64,
}

/// Result of a finished encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOutcome {
    pub output_path: PathBuf,
    pub file_size: u64,
    /// Mode actually applied by the encoder
    pub applied_mode: CropMode,
}

/// Renders a crop plan into an output file.
#[async_trait]
pub trait ClipEncoder: Send + Sync {
    /// Whether per-frame crop positions can be applied.
    fn supports_per_frame_positions(&self) -> bool;

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        plan: &CropPlan,
        window: RenderWindow,
        cancel: &CancelSignal,
    ) -> MediaResult<EncodeOutcome>;
}

/// Encoder backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    per_frame: bool,
    preset: String,
    crf: u8,
    timeout_secs: Option<u64>,
}

impl FfmpegEncoder {
    pub fn new(per_frame: bool) -> Self {
        Self {
            per_frame,
            preset: "fast".to_string(),
            crf: 20,
            timeout_secs: None,
        }
    }

    /// Build an encoder after checking whether the local FFmpeg has `sendcmd`.
    pub async fn detect() -> Self {
        let per_frame = match probe_sendcmd().await {
            Ok(found) => found,
            Err(e) => {
                warn!("Could not list FFmpeg filters: {}", e);
                false
            }
        };
        info!("FFmpeg per-frame crop support: {}", per_frame);
        Self::new(per_frame)
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn preset(&self) -> &str {
        &self.preset
    }

    pub fn crf(&self) -> u8 {
        self.crf
    }

    /// Video filter for a fixed window.
    pub fn static_filter(plan: &CropPlan, x: u32) -> String {
        format!(
            "crop={}:{}:{}:{},{}",
            plan.crop_width(),
            plan.crop_height(),
            x,
            plan.y(),
            EVEN_SCALE
        )
    }

    /// Video filter for a per-frame path driven by a sendcmd script file.
    pub fn per_frame_filter(plan: &CropPlan, initial_x: u32, script: &Path) -> String {
        format!(
            "setpts=PTS-STARTPTS,sendcmd=f='{}',{}=w={}:h={}:x={}:y={},{}",
            script.display(),
            CROP_FILTER,
            plan.crop_width(),
            plan.crop_height(),
            initial_x,
            plan.y(),
            EVEN_SCALE
        )
    }

    fn command(&self, input: &Path, output: &Path, window: RenderWindow, filter: String) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .seek(window.start_time)
            .duration(window.duration)
            .video_filter(filter)
            .video_codec("libx264")
            .preset(self.preset.clone())
            .crf(self.crf)
            .output_args(["-pix_fmt", "yuv420p"])
            .audio_codec("aac")
            .output_args(["-movflags", "+faststart"])
    }

    fn runner(&self, cancel: &CancelSignal) -> FfmpegRunner {
        let runner = FfmpegRunner::new().with_cancel(cancel.clone());
        match self.timeout_secs {
            Some(secs) => runner.with_timeout(secs),
            None => runner,
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl ClipEncoder for FfmpegEncoder {
    fn supports_per_frame_positions(&self) -> bool {
        self.per_frame
    }

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        plan: &CropPlan,
        window: RenderWindow,
        cancel: &CancelSignal,
    ) -> MediaResult<EncodeOutcome> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        if !window.duration.is_finite() || window.duration <= 0.0 {
            return Err(MediaError::invalid_request(format!(
                "render duration must be positive, got {}",
                window.duration
            )));
        }

        // Script file must outlive the FFmpeg run.
        let mut script_file = None;
        let (filter, applied_mode) = match plan.positions() {
            CropPositions::Fixed(x) => (Self::static_filter(plan, *x), CropMode::Static),
            CropPositions::PerFrame(xs) if xs.is_empty() => {
                return Err(MediaError::EmptyTrajectory(
                    "per-frame crop path is empty".to_string(),
                ));
            }
            CropPositions::PerFrame(xs) if !self.per_frame => {
                let x = mean_position(xs);
                warn!(
                    "Per-frame crop not supported by this FFmpeg, rendering fixed window at x={}",
                    x
                );
                (Self::static_filter(plan, x), CropMode::Static)
            }
            CropPositions::PerFrame(xs) => {
                let script = sendcmd_script(xs, window.fps)?;
                let file = NamedTempFile::new()?;
                tokio::fs::write(file.path(), script).await?;
                let filter = Self::per_frame_filter(plan, xs[0], file.path());
                script_file = Some(file);
                (filter, CropMode::Dynamic)
            }
        };

        let cmd = self.command(input, output, window, filter);
        debug!("Running FFmpeg crop: {}", cmd.describe());
        self.runner(cancel).run(&cmd).await?;
        drop(script_file);

        let file_size = tokio::fs::metadata(output).await?.len();
        info!(
            "Rendered {} ({} bytes, {} crop)",
            output.display(),
            file_size,
            applied_mode
        );

        Ok(EncodeOutcome {
            output_path: output.to_path_buf(),
            file_size,
            applied_mode,
        })
    }
}

/// Build a sendcmd script that moves the crop window whenever x changes.
///
/// Times are relative to the first rendered frame.
pub fn sendcmd_script(positions: &[u32], fps: f64) -> MediaResult<String> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(MediaError::invalid_request(format!(
            "frame rate must be positive, got {}",
            fps
        )));
    }

    let mut script = String::new();
    let mut last = None;
    for (i, x) in positions.iter().enumerate() {
        if last == Some(*x) {
            continue;
        }
        let t = i as f64 / fps;
        let _ = writeln!(script, "{:.4} [enter] {} x {};", t, CROP_FILTER, x);
        last = Some(*x);
    }
    Ok(script)
}

fn mean_position(positions: &[u32]) -> u32 {
    let sum: u64 = positions.iter().map(|x| *x as u64).sum();
    (sum / positions.len().max(1) as u64) as u32
}

/// Whether the local FFmpeg lists the `sendcmd` filter.
async fn probe_sendcmd() -> MediaResult<bool> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-filters"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound,
            _ => MediaError::Io(e),
        })?;

    let listing = String::from_utf8_lossy(&output.stdout);
    Ok(listing
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some("sendcmd")))
}
