//! Decoded frame access.
//!
//! Frames are delivered in stream order, each tagged with its absolute
//! index in the source. [`FfmpegFrameSource`] decodes a frame range through
//! an FFmpeg `rawvideo` pipe, applying the sampling stride inside the
//! filter graph so only sampled frames cross the pipe.

use std::path::Path;

use async_trait::async_trait;
use image::RgbImage;
use reframe_models::{Dimensions, FrameRange};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::{collect_stderr, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::probe::VideoInfo;

/// One decoded RGB24 frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Absolute frame index in the source
    pub index: u64,
    pub width: u32,
    pub height: u32,
    /// Packed RGB24 pixels, row-major
    pub data: Vec<u8>,
}

impl Frame {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Copy into an `image` buffer. `None` if the buffer size is wrong.
    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Sequential frame access.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame in stream order, `None` when the range is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Release decoder resources and report any decoder failure.
    async fn finish(&mut self) -> MediaResult<()>;
}

/// Decoder backed by an FFmpeg child process.
pub struct FfmpegFrameSource {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    command: String,
    frame_size: Dimensions,
    next_index: u64,
    stride: u64,
    remaining: u64,
    /// FFmpeg closed its output before `remaining` reached zero
    ended_early: bool,
}

impl FfmpegFrameSource {
    /// Start decoding every `stride`-th frame of `range`, scaled so the
    /// frame height is at most `analysis_height`.
    pub fn open(
        path: impl AsRef<Path>,
        info: &VideoInfo,
        range: FrameRange,
        stride: u64,
        analysis_height: u32,
    ) -> MediaResult<Self> {
        let stride = stride.max(1);
        let frame_size = analysis_size(info.dimensions(), analysis_height);
        let expected = range.sampled(stride).count() as u64;

        let filter = format!(
            "select='not(mod(n\\,{stride}))',scale={w}:{h}:flags=bilinear",
            stride = stride,
            w = frame_size.width,
            h = frame_size.height,
        );

        let mut cmd = FfmpegCommand::to_stdout(path.as_ref());
        if range.start > 0 {
            cmd = cmd.seek(range.start as f64 / info.fps);
        }
        let cmd = cmd
            .video_filter(filter)
            .output_args(["-an", "-sn", "-fps_mode", "passthrough"])
            .output_args(["-frames:v".to_string(), expected.to_string()])
            .output_args(["-pix_fmt", "rgb24", "-f", "rawvideo"]);

        let command = cmd.describe();
        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdout was not captured"))?;
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| collect_stderr(stderr, |_| {}));

        debug!(
            frames = expected,
            stride,
            size = %frame_size,
            "Opened FFmpeg frame source"
        );

        Ok(Self {
            child: Some(child),
            stdout: Some(stdout),
            stderr_task,
            command,
            frame_size,
            next_index: range.start,
            stride,
            remaining: expected,
            ended_early: false,
        })
    }

    pub fn frame_size(&self) -> Dimensions {
        self.frame_size
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let len = self.frame_size.area() as usize * 3;
        let mut data = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let read = stdout.read(&mut data[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        if filled == 0 {
            // Either the source is shorter than probed or the decoder died;
            // `finish` tells the two apart by the exit status.
            self.stdout = None;
            self.ended_early = true;
            return Ok(None);
        }
        if filled < len {
            self.stdout = None;
            self.ended_early = true;
            return Err(MediaError::decode_failed(format!(
                "truncated frame at index {}: {} of {} bytes (command: {})",
                self.next_index, filled, len, self.command
            )));
        }

        let frame = Frame {
            index: self.next_index,
            width: self.frame_size.width,
            height: self.frame_size.height,
            data,
        };
        self.next_index += self.stride;
        self.remaining -= 1;
        Ok(Some(frame))
    }

    async fn finish(&mut self) -> MediaResult<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = if self.remaining > 0 && !self.ended_early {
            // Caller stopped reading; stop the decoder instead of waiting.
            let _ = child.kill().await;
            None
        } else {
            Some(child.wait().await?)
        };

        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        match status {
            Some(status) if !status.success() => Err(MediaError::ffmpeg_failed(
                format!("frame decoder exited with {}", status),
                self.command.clone(),
                Some(stderr).filter(|s| !s.is_empty()),
                status.code(),
            )),
            _ => {
                if self.ended_early {
                    debug!(
                        missing = self.remaining,
                        "Frame decoder finished before the probed frame count"
                    );
                }
                if !stderr.is_empty() {
                    warn!("Frame decoder reported: {}", stderr);
                }
                Ok(())
            }
        }
    }
}

/// Size frames are decoded at: display aspect kept, height capped.
pub fn analysis_size(display: Dimensions, analysis_height: u32) -> Dimensions {
    if analysis_height == 0 || display.height <= analysis_height {
        return display;
    }
    let height = analysis_height;
    let width = ((display.width as f64 * height as f64 / display.height as f64).round() as u32).max(1);
    Dimensions::new(width, height)
}

/// In-memory frame source, used by tests and replay tooling.
#[derive(Debug, Default)]
pub struct VecFrameSource {
    frames: std::collections::VecDeque<Frame>,
    finished: bool,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            finished: false,
        }
    }

    /// Blank frames at the given indices.
    pub fn blank(indices: impl IntoIterator<Item = u64>, size: Dimensions) -> Self {
        let frames = indices
            .into_iter()
            .map(|index| Frame {
                index,
                width: size.width,
                height: size.height,
                data: vec![0; size.area() as usize * 3],
            })
            .collect();
        Self::new(frames)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[async_trait]
impl FrameSource for VecFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        Ok(self.frames.pop_front())
    }

    async fn finish(&mut self) -> MediaResult<()> {
        self.finished = true;
        self.frames.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_size_caps_height() {
        assert_eq!(
            analysis_size(Dimensions::new(1920, 1080), 360),
            Dimensions::new(640, 360)
        );
        assert_eq!(
            analysis_size(Dimensions::new(640, 360), 720),
            Dimensions::new(640, 360)
        );
        assert_eq!(
            analysis_size(Dimensions::new(1080, 1920), 480),
            Dimensions::new(270, 480)
        );
    }

    #[test]
    fn test_frame_to_image() {
        let frame = Frame {
            index: 0,
            width: 2,
            height: 2,
            data: vec![255; 12],
        };
        assert!(frame.to_image().is_some());

        let short = Frame {
            data: vec![0; 5],
            ..frame
        };
        assert!(short.to_image().is_none());
    }

    #[tokio::test]
    async fn test_vec_source_drains_in_order() {
        let mut source = VecFrameSource::blank([0, 5, 10], Dimensions::new(4, 2));
        let mut seen = Vec::new();
        while let Some(frame) = source.next_frame().await.unwrap() {
            assert_eq!(frame.data.len(), 24);
            seen.push(frame.index);
        }
        source.finish().await.unwrap();
        assert_eq!(seen, vec![0, 5, 10]);
        assert!(source.is_finished());
    }
}
