//! Media plumbing and subject-tracking crop planning.
//!
//! This crate provides:
//! - FFprobe inspection with display-rotation correction
//! - FFmpeg command building and supervised execution
//! - A raw-frame decoder and a crop encoder built on FFmpeg
//! - The detector capability interface
//! - The crop planner: aspect decision, subject scoring, sampling,
//!   smoothing, interpolation and render strategy selection

pub mod cancel;
pub mod command;
pub mod detector;
pub mod error;
pub mod frames;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod renderer;

pub use cancel::CancelSignal;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use detector::{CenterHeuristicDetector, SubjectDetector};
pub use error::{MediaError, MediaResult};
pub use frames::{FfmpegFrameSource, Frame, FrameSource, VecFrameSource};
pub use planner::{CropPlan, CropPlanner, CropPositions, PlannerConfig, SmootherKind};
pub use probe::{probe_video, VideoInfo};
pub use renderer::{ClipEncoder, EncodeOutcome, FfmpegEncoder, RenderWindow};
