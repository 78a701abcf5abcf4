//! Data types flowing through the planner.

use reframe_models::{CropMode, Dimensions};
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Crop dimensions chosen for a source and whether the window should
/// follow the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectDecision {
    pub crop: Dimensions,
    pub track_subject: bool,
}

/// One sampled crop-window left edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub frame: u64,
    pub x: f64,
}

/// Crop positions at sampled frames, frame indices strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseTrajectory {
    samples: Vec<TrajectorySample>,
}

impl SparseTrajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Build from samples, rejecting out-of-order frames.
    pub fn from_samples(samples: Vec<TrajectorySample>) -> MediaResult<Self> {
        let mut trajectory = Self::with_capacity(samples.len());
        for sample in samples {
            trajectory.push(sample.frame, sample.x)?;
        }
        Ok(trajectory)
    }

    /// Append a sample. The frame must be after the last one.
    pub fn push(&mut self, frame: u64, x: f64) -> MediaResult<()> {
        if let Some(last) = self.samples.last() {
            if frame <= last.frame {
                return Err(MediaError::decode_failed(format!(
                    "frame {} delivered after frame {}",
                    frame, last.frame
                )));
            }
        }
        self.samples.push(TrajectorySample { frame, x });
        Ok(())
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.x).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Same frames carrying new values, e.g. after smoothing.
    pub fn with_values(self, values: Vec<f64>) -> MediaResult<Self> {
        if values.len() != self.samples.len() {
            return Err(MediaError::internal(format!(
                "smoothed {} values for {} samples",
                values.len(),
                self.samples.len()
            )));
        }
        let samples = self
            .samples
            .into_iter()
            .zip(values)
            .map(|(sample, x)| TrajectorySample { frame: sample.frame, x })
            .collect();
        Ok(Self { samples })
    }
}

/// Crop position for every frame of a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseTrajectory {
    /// Absolute index of the first position
    pub start_frame: u64,
    pub positions: Vec<f64>,
}

impl DenseTrajectory {
    /// Same position for `len` frames.
    pub fn constant(start_frame: u64, len: usize, x: f64) -> Self {
        Self {
            start_frame,
            positions: vec![x; len],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.positions.is_empty() {
            return None;
        }
        Some(self.positions.iter().sum::<f64>() / self.positions.len() as f64)
    }
}

/// Horizontal crop placement handed to the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "x", rename_all = "snake_case")]
pub enum CropPositions {
    /// One window for the whole clip
    Fixed(u32),
    /// One left edge per output frame
    PerFrame(Vec<u32>),
}

/// Final planner output, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropPlan {
    crop: Dimensions,
    y: u32,
    track_subject: bool,
    positions: CropPositions,
    requested_mode: CropMode,
    applied_mode: CropMode,
    fallback_reason: Option<String>,
}

impl CropPlan {
    pub(crate) fn new(
        decision: AspectDecision,
        y: u32,
        positions: CropPositions,
        requested_mode: CropMode,
        applied_mode: CropMode,
        fallback_reason: Option<String>,
    ) -> Self {
        Self {
            crop: decision.crop,
            y,
            track_subject: decision.track_subject,
            positions,
            requested_mode,
            applied_mode,
            fallback_reason,
        }
    }

    pub fn crop(&self) -> Dimensions {
        self.crop
    }

    pub fn crop_width(&self) -> u32 {
        self.crop.width
    }

    pub fn crop_height(&self) -> u32 {
        self.crop.height
    }

    /// Vertical offset of the window.
    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn track_subject(&self) -> bool {
        self.track_subject
    }

    pub fn positions(&self) -> &CropPositions {
        &self.positions
    }

    pub fn requested_mode(&self) -> CropMode {
        self.requested_mode
    }

    /// Strategy actually carried by `positions`.
    pub fn applied_mode(&self) -> CropMode {
        self.applied_mode
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    /// Replace the positions with a fixed window, recording why.
    pub fn into_fixed(self, x: u32, reason: impl Into<String>) -> Self {
        Self {
            positions: CropPositions::Fixed(x),
            applied_mode: CropMode::Static,
            fallback_reason: Some(reason.into()),
            ..self
        }
    }
}
