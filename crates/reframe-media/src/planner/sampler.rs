//! Trajectory sampling.
//!
//! Frames are pulled from the decoder on demand and detection runs on up
//! to `concurrency` frames at once. `buffered` yields results in frame
//! order regardless of completion order, so the reduction step always
//! appends to the trajectory in increasing frame order. The buffer also
//! bounds how many decoded frames are held in memory.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use reframe_models::{Detection, Dimensions, FrameRange};
use tokio::time::Instant;
use tracing::{debug, info};

use super::config::ScoringWeights;
use super::models::SparseTrajectory;
use super::scorer::{crop_x_for_subject, select_subject};
use crate::cancel::CancelSignal;
use crate::detector::SubjectDetector;
use crate::error::{MediaError, MediaResult};
use crate::frames::{Frame, FrameSource};

/// How a sampling pass runs.
#[derive(Debug, Clone)]
pub struct SamplerOptions {
    /// Sample every Nth frame
    pub stride: u64,
    /// Detector calls in flight
    pub concurrency: usize,
    /// Abort after this long
    pub timeout: Option<Duration>,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            stride: 5,
            concurrency: 4,
            timeout: None,
        }
    }
}

/// Reduces detector output over a frame range to crop positions.
pub struct TrajectorySampler<'a> {
    detector: &'a dyn SubjectDetector,
    source: Dimensions,
    crop_width: u32,
    weights: ScoringWeights,
    options: SamplerOptions,
    cancel: CancelSignal,
}

impl<'a> TrajectorySampler<'a> {
    pub fn new(
        detector: &'a dyn SubjectDetector,
        source: Dimensions,
        crop_width: u32,
        weights: ScoringWeights,
        options: SamplerOptions,
    ) -> Self {
        Self {
            detector,
            source,
            crop_width,
            weights,
            options,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sample `range` from `frames`.
    ///
    /// The frame source is always finished, whether sampling succeeds,
    /// fails or is cancelled. Nothing is returned unless every sampled
    /// frame was processed.
    pub async fn sample(
        &self,
        frames: &mut dyn FrameSource,
        range: FrameRange,
    ) -> MediaResult<SparseTrajectory> {
        let started = std::time::Instant::now();
        let result = self.collect(&mut *frames, range).await;
        let finished = frames.finish().await;

        let trajectory = match (result, finished) {
            (Ok(trajectory), Ok(())) => trajectory,
            // A torn frame is a symptom; the decoder's exit carries the cause.
            (Err(MediaError::DecodeFailed(_)), Err(e @ MediaError::FfmpegFailed { .. })) => {
                return Err(e)
            }
            (Err(e), _) => return Err(e),
            (Ok(_), Err(e)) => return Err(e),
        };

        if trajectory.is_empty() {
            return Err(MediaError::decode_failed(format!(
                "decoder produced no frames in range {}..{}",
                range.start, range.end
            )));
        }

        info!(
            samples = trajectory.len(),
            detector = self.detector.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sampled subject trajectory"
        );
        Ok(trajectory)
    }

    async fn collect(
        &self,
        frames: &mut dyn FrameSource,
        range: FrameRange,
    ) -> MediaResult<SparseTrajectory> {
        self.cancel.check()?;

        let stride = self.options.stride.max(1);
        let detector = self.detector;
        let expected = range.len().div_ceil(stride) as usize;

        let decoded = stream::unfold(frames, |source| async move {
            match source.next_frame().await {
                Ok(Some(frame)) => Some((Ok(frame), source)),
                Ok(None) => None,
                Err(e) => Some((Err(e), source)),
            }
        });

        let detections = decoded
            .map(move |frame| detect_sampled(detector, frame, range, stride))
            .buffered(self.options.concurrency.max(1));
        tokio::pin!(detections);

        let deadline = self.options.timeout.map(|t| (Instant::now() + t, whole_secs(t)));
        let mut trajectory = SparseTrajectory::with_capacity(expected);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(MediaError::Cancelled),
                _ = wait_until(deadline.map(|(at, _)| at)) => {
                    let secs = deadline.map(|(_, secs)| secs).unwrap_or_default();
                    return Err(MediaError::Timeout(secs));
                }
                item = detections.next() => item,
            };

            let Some(item) = next else { break };
            let Some((index, found)) = item? else { continue };

            let x = self.reduce(index, &found)?;
            trajectory.push(index, x)?;

            if trajectory.len() % 100 == 0 {
                debug!(
                    sampled = trajectory.len(),
                    expected,
                    frame = index,
                    "Sampling progress"
                );
            }
        }

        Ok(trajectory)
    }

    /// Score one frame's detections down to a crop position.
    fn reduce(&self, index: u64, detections: &[Detection]) -> MediaResult<f64> {
        if let Some(bad) = detections.iter().find(|d| !d.is_well_formed()) {
            return Err(MediaError::detection_failed(
                self.detector.name(),
                index,
                format!("malformed detection {:?}", bad),
            ));
        }
        let subject = select_subject(detections, self.source, &self.weights);
        Ok(crop_x_for_subject(subject, self.source, self.crop_width))
    }
}

/// Seconds for error reports, rounded up so short limits never read as zero.
fn whole_secs(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

/// Run the detector on a decoded frame if it falls on the sampling grid.
async fn detect_sampled(
    detector: &dyn SubjectDetector,
    frame: MediaResult<Frame>,
    range: FrameRange,
    stride: u64,
) -> MediaResult<Option<(u64, Vec<Detection>)>> {
    let frame = frame?;
    if !range.contains(frame.index) || (frame.index - range.start) % stride != 0 {
        return Ok(None);
    }

    let found = detector.detect(&frame).await.map_err(|e| match e {
        MediaError::Cancelled | MediaError::Timeout(_) | MediaError::DetectionFailed { .. } => e,
        other => MediaError::detection_failed(detector.name(), frame.index, other.to_string()),
    })?;
    Ok(Some((frame.index, found)))
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
