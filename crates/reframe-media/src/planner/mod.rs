//! Subject-tracking crop planning.
//!
//! Turns a source video and a target aspect ratio into a [`CropPlan`]:
//!
//! ```text
//! Aspect Planner ── no tracking needed ──► centered fixed plan
//!      │
//!      ▼ tracking needed
//! Trajectory Sampler  ← decoder frames at a stride + detector + scorer
//!      │
//!      ▼
//! Signal Smoother     ← moving average or recursive filter
//!      │
//!      ▼
//! Interpolator        ← one position per frame
//!      │
//!      ▼
//! Strategy Selector   ← fixed window or per-frame path
//! ```
//!
//! Whole-video analysis and clip extraction run the same pipeline; they
//! differ only in frame range and smoothing window. A failure at any stage
//! aborts the request and no partial plan is returned.

pub mod aspect;
pub mod boundary;
pub mod config;
pub mod interpolate;
pub mod models;
pub mod sampler;
pub mod scorer;
pub mod smoother;
pub mod strategy;


pub use config::{AnalysisScope, PlannerConfig, ScoringWeights, SmootherKind};
pub use models::{
    AspectDecision, CropPlan, CropPositions, DenseTrajectory, SparseTrajectory, TrajectorySample,
};
pub use smoother::Smoother;

use reframe_models::{AspectRatio, CropDataEntry, CropMode, Dimensions, FrameRange};
use tracing::info;

use crate::cancel::CancelSignal;
use crate::detector::SubjectDetector;
use crate::error::{MediaError, MediaResult};
use crate::frames::FrameSource;

use sampler::{SamplerOptions, TrajectorySampler};
use strategy::{centered_plan, centered_x, clamp_x, select_strategy};

/// Inputs for one planning pass.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// Display dimensions of the source
    pub source: Dimensions,
    /// Frames the plan covers
    pub range: FrameRange,
    pub aspect: AspectRatio,
    pub scope: AnalysisScope,
    pub crop_mode: CropMode,
}

/// Everything a planning pass produced.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// Display dimensions of the source
    pub source: Dimensions,
    pub decision: AspectDecision,
    /// Smoothed samples, `None` when tracking was skipped
    pub smoothed: Option<SparseTrajectory>,
    pub dense: DenseTrajectory,
    pub plan: CropPlan,
}

impl PlanOutcome {
    /// Per-frame crop windows.
    pub fn crop_data(&self) -> Vec<CropDataEntry> {
        let crop = self.decision.crop;
        self.dense
            .positions
            .iter()
            .enumerate()
            .map(|(i, x)| CropDataEntry {
                frame: self.dense.start_frame + i as u64,
                x: clamp_x(*x, self.source.width, crop.width),
                y: self.plan.y(),
                width: crop.width,
                height: crop.height,
                center_x: x + crop.width as f64 / 2.0,
            })
            .collect()
    }

    /// Window centers at the sampled frames after smoothing.
    pub fn smoothed_centers(&self) -> Vec<f64> {
        let half = self.decision.crop.width as f64 / 2.0;
        self.smoothed
            .as_ref()
            .map(|s| s.samples().iter().map(|sample| sample.x + half).collect())
            .unwrap_or_default()
    }
}

/// Crop planner. Holds configuration only; every call owns its own
/// trajectories.
#[derive(Debug, Clone, Default)]
pub struct CropPlanner {
    config: PlannerConfig,
}

impl CropPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Crop dimensions and tracking decision for a source.
    pub fn decide(&self, source: Dimensions, aspect: AspectRatio) -> MediaResult<AspectDecision> {
        aspect::plan_aspect(source, aspect, self.config.aspect_tolerance)
    }

    /// Run the full pipeline for `request`.
    ///
    /// `open_frames` is called with the sampling stride only when tracking
    /// is needed, so sources that already fit never start a decoder.
    pub async fn plan<F>(
        &self,
        request: &PlanRequest,
        detector: &dyn SubjectDetector,
        open_frames: F,
        per_frame_supported: bool,
        cancel: &CancelSignal,
    ) -> MediaResult<PlanOutcome>
    where
        F: FnOnce(u64) -> MediaResult<Box<dyn FrameSource>>,
    {
        cancel.check()?;
        if request.range.is_empty() {
            return Err(MediaError::invalid_request(format!(
                "frame range {}..{} is empty",
                request.range.start, request.range.end
            )));
        }

        info!("Step 1/4: Planning crop dimensions...");
        let decision = self.decide(request.source, request.aspect)?;
        info!(
            "  {} -> {} (track_subject: {})",
            request.source, decision.crop, decision.track_subject
        );

        if !decision.track_subject {
            info!("  Tracking not needed, using centered window");
            let x = centered_x(request.source.width, decision.crop.width);
            let dense = DenseTrajectory::constant(
                request.range.start,
                request.range.len() as usize,
                x as f64,
            );
            let plan = centered_plan(decision, request.source, request.crop_mode);
            return Ok(PlanOutcome {
                source: request.source,
                decision,
                smoothed: None,
                dense,
                plan,
            });
        }

        let stride = self.config.stride();
        info!(
            "Step 2/4: Sampling frames {}..{} every {} frames...",
            request.range.start, request.range.end, stride
        );
        let mut frames = open_frames(stride)?;
        let sampler = TrajectorySampler::new(
            detector,
            request.source,
            decision.crop.width,
            self.config.scoring,
            SamplerOptions {
                stride,
                concurrency: self.config.detect_concurrency,
                timeout: self.config.sampling_timeout,
            },
        )
        .with_cancel(cancel.clone());
        let sparse = sampler.sample(frames.as_mut(), request.range).await?;
        drop(frames);

        let smoother = Smoother::from_config(&self.config, request.scope);
        info!("Step 3/4: Smoothing {} samples ({:?})...", sparse.len(), smoother);
        let values = smoother.apply(&sparse.values());
        let smoothed = sparse.with_values(values)?;
        let dense = interpolate::interpolate(&smoothed, request.range)?;

        cancel.check()?;
        info!("Step 4/4: Selecting render strategy...");
        let plan = select_strategy(
            decision,
            request.source,
            &dense,
            request.crop_mode,
            per_frame_supported,
        )?;

        Ok(PlanOutcome {
            source: request.source,
            decision,
            smoothed: Some(smoothed),
            dense,
            plan,
        })
    }
}
