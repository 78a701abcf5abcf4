//! Render strategy selection.

use reframe_models::{CropDataEntry, CropMode, Dimensions, FrameRange};
use tracing::{info, warn};

use super::aspect::centered_y;
use super::interpolate::interpolate;
use super::models::{
    AspectDecision, CropPlan, CropPositions, DenseTrajectory, SparseTrajectory, TrajectorySample,
};
use crate::error::{MediaError, MediaResult};

/// Reason recorded when a per-frame path is collapsed for the encoder.
pub const PER_FRAME_UNSUPPORTED: &str = "encoder cannot apply per-frame crop positions";

/// Reason recorded when the source needs no subject tracking.
pub const TRACKING_NOT_NEEDED: &str = "source framing does not require subject tracking";

/// Reason recorded when a supplied crop path never moves.
pub const CONSTANT_PATH: &str = "crop path does not move";

/// Floor a position and clamp it into `[0, source_width - crop_width]`.
pub fn clamp_x(x: f64, source_width: u32, crop_width: u32) -> u32 {
    let max_x = source_width.saturating_sub(crop_width);
    if !x.is_finite() || x <= 0.0 {
        return 0;
    }
    (x.floor() as u64).min(max_x as u64) as u32
}

/// Horizontally centered window position.
pub fn centered_x(source_width: u32, crop_width: u32) -> u32 {
    source_width.saturating_sub(crop_width) / 2
}

/// Turn a dense trajectory into a crop plan.
///
/// `static` collapses the trajectory to its mean. `dynamic` keeps one
/// position per frame when the encoder can apply them; otherwise it falls
/// back to the mean and records the fallback on the plan.
pub fn select_strategy(
    decision: AspectDecision,
    source: Dimensions,
    dense: &DenseTrajectory,
    requested: CropMode,
    per_frame_supported: bool,
) -> MediaResult<CropPlan> {
    let mean = dense.mean().ok_or_else(|| {
        MediaError::EmptyTrajectory("no crop positions to render".to_string())
    })?;

    let crop_width = decision.crop.width;
    let y = centered_y(source.height, decision.crop.height);
    let fixed_x = clamp_x(mean, source.width, crop_width);

    let plan = match requested {
        CropMode::Static => CropPlan::new(
            decision,
            y,
            CropPositions::Fixed(fixed_x),
            requested,
            CropMode::Static,
            None,
        ),
        CropMode::Dynamic if per_frame_supported => {
            let path = dense
                .positions
                .iter()
                .map(|x| clamp_x(*x, source.width, crop_width))
                .collect();
            CropPlan::new(
                decision,
                y,
                CropPositions::PerFrame(path),
                requested,
                CropMode::Dynamic,
                None,
            )
        }
        CropMode::Dynamic => {
            warn!(
                x = fixed_x,
                "Per-frame positions unsupported, rendering a fixed window"
            );
            CropPlan::new(
                decision,
                y,
                CropPositions::Fixed(fixed_x),
                requested,
                CropMode::Static,
                Some(PER_FRAME_UNSUPPORTED.to_string()),
            )
        }
    };

    info!(
        requested = %plan.requested_mode(),
        applied = %plan.applied_mode(),
        crop = %plan.crop(),
        y,
        "Selected render strategy"
    );
    Ok(plan)
}

/// Fixed, centered plan for sources that need no tracking.
pub fn centered_plan(decision: AspectDecision, source: Dimensions, requested: CropMode) -> CropPlan {
    let reason = match requested {
        CropMode::Dynamic => Some(TRACKING_NOT_NEEDED.to_string()),
        CropMode::Static => None,
    };
    CropPlan::new(
        decision,
        centered_y(source.height, decision.crop.height),
        CropPositions::Fixed(centered_x(source.width, decision.crop.width)),
        requested,
        CropMode::Static,
        reason,
    )
}

/// Rebuild a plan from previously produced per-frame crop windows.
///
/// Gaps between listed frames are filled by interpolation. A path that never
/// moves renders as a fixed window. Returns the plan and the frames it covers.
pub fn plan_from_crop_data(
    entries: &[CropDataEntry],
    source: Dimensions,
    requested: CropMode,
    per_frame_supported: bool,
) -> MediaResult<(CropPlan, FrameRange)> {
    let (first, last) = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(MediaError::EmptyTrajectory(
                "crop_data has no entries".to_string(),
            ))
        }
    };

    let crop = Dimensions::new(first.width, first.height);
    if crop.width > source.width || first.y as u64 + crop.height as u64 > source.height as u64 {
        return Err(MediaError::invalid_request(format!(
            "crop window {} at y={} does not fit source {}",
            crop, first.y, source
        )));
    }

    let sparse = SparseTrajectory::from_samples(
        entries
            .iter()
            .map(|e| TrajectorySample {
                frame: e.frame,
                x: e.x as f64,
            })
            .collect(),
    )?;
    let range = FrameRange::new(first.frame, last.frame + 1);
    let dense = interpolate(&sparse, range)?;

    let decision = AspectDecision {
        crop,
        track_subject: true,
    };
    let selected = select_strategy(decision, source, &dense, requested, per_frame_supported)?;

    let plan = if entries.iter().all(|e| e.x == first.x) {
        let reason = match requested {
            CropMode::Dynamic => Some(CONSTANT_PATH.to_string()),
            CropMode::Static => None,
        };
        CropPlan::new(
            decision,
            first.y,
            CropPositions::Fixed(clamp_x(first.x as f64, source.width, crop.width)),
            requested,
            CropMode::Static,
            reason,
        )
    } else {
        CropPlan::new(
            decision,
            first.y,
            selected.positions().clone(),
            requested,
            selected.applied_mode(),
            selected.fallback_reason().map(str::to_string),
        )
    };

    Ok((plan, range))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: Dimensions = Dimensions {
        width: 1920,
        height: 1080,
    };

    fn tracking() -> AspectDecision {
        AspectDecision {
            crop: Dimensions::new(607, 1080),
            track_subject: true,
        }
    }

    fn dense(values: &[f64]) -> DenseTrajectory {
        DenseTrajectory {
            start_frame: 0,
            positions: values.to_vec(),
        }
    }

    #[test]
    fn test_static_uses_mean() {
        let trajectory = dense(&[500.0, 520.0, 610.5, 700.0]);
        let plan = select_strategy(tracking(), SOURCE, &trajectory, CropMode::Static, true).unwrap();
        let CropPositions::Fixed(x) = plan.positions() else {
            panic!("expected fixed window");
        };
        assert!((*x as f64 - trajectory.mean().unwrap()).abs() < 1.0);
        assert_eq!(plan.applied_mode(), CropMode::Static);
        assert!(plan.fallback_reason().is_none());
    }

    #[test]
    fn test_dynamic_keeps_path_when_supported() {
        let trajectory = dense(&[0.0, 100.4, 1400.0, -3.0]);
        let plan = select_strategy(tracking(), SOURCE, &trajectory, CropMode::Dynamic, true).unwrap();
        assert_eq!(plan.applied_mode(), CropMode::Dynamic);
        assert_eq!(
            plan.positions(),
            &CropPositions::PerFrame(vec![0, 100, 1313, 0])
        );
    }

    #[test]
    fn test_dynamic_fallback_is_reported() {
        let trajectory = dense(&[600.0, 620.0]);
        let plan = select_strategy(tracking(), SOURCE, &trajectory, CropMode::Dynamic, false).unwrap();
        assert_eq!(plan.requested_mode(), CropMode::Dynamic);
        assert_eq!(plan.applied_mode(), CropMode::Static);
        assert_eq!(plan.positions(), &CropPositions::Fixed(610));
        assert_eq!(plan.fallback_reason(), Some(PER_FRAME_UNSUPPORTED));
    }

    #[test]
    fn test_vertical_offset_centered() {
        let decision = AspectDecision {
            crop: Dimensions::new(1080, 607),
            track_subject: false,
        };
        let source = Dimensions::new(1080, 1920);
        let plan = centered_plan(decision, source, CropMode::Static);
        assert_eq!(plan.y(), 656);
        assert_eq!(plan.positions(), &CropPositions::Fixed(0));
    }

    #[test]
    fn test_centered_plan_reports_skip() {
        let decision = AspectDecision {
            crop: Dimensions::new(1080, 1920),
            track_subject: false,
        };
        let plan = centered_plan(decision, Dimensions::new(1080, 1920), CropMode::Dynamic);
        assert_eq!(plan.applied_mode(), CropMode::Static);
        assert_eq!(plan.fallback_reason(), Some(TRACKING_NOT_NEEDED));
        assert_eq!(plan.y(), 0);
    }

    #[test]
    fn test_empty_trajectory_rejected() {
        let err = select_strategy(tracking(), SOURCE, &dense(&[]), CropMode::Static, true).unwrap_err();
        assert!(matches!(err, MediaError::EmptyTrajectory(_)));
    }

    #[test]
    fn test_clamp_x() {
        assert_eq!(clamp_x(561.9, 1920, 607), 561);
        assert_eq!(clamp_x(2000.0, 1920, 607), 1313);
        assert_eq!(clamp_x(-5.0, 1920, 607), 0);
        assert_eq!(clamp_x(f64::NAN, 1920, 607), 0);
        assert_eq!(clamp_x(10.0, 607, 607), 0);
    }

    fn entry(frame: u64, x: u32) -> CropDataEntry {
        CropDataEntry {
            frame,
            x,
            y: 0,
            width: 607,
            height: 1080,
            center_x: x as f64 + 303.5,
        }
    }

    #[test]
    fn test_crop_data_constant_path_is_fixed() {
        let entries: Vec<_> = (0..10).map(|f| entry(f, 561)).collect();
        let (plan, range) =
            plan_from_crop_data(&entries, SOURCE, CropMode::Dynamic, true).unwrap();
        assert_eq!(range, FrameRange::new(0, 10));
        assert_eq!(plan.positions(), &CropPositions::Fixed(561));
        assert_eq!(plan.applied_mode(), CropMode::Static);
        assert_eq!(plan.fallback_reason(), Some(CONSTANT_PATH));
    }

    #[test]
    fn test_crop_data_moving_path_fills_gaps() {
        let entries = vec![entry(10, 100), entry(12, 104)];
        let (plan, range) =
            plan_from_crop_data(&entries, SOURCE, CropMode::Dynamic, true).unwrap();
        assert_eq!(range, FrameRange::new(10, 13));
        assert_eq!(plan.positions(), &CropPositions::PerFrame(vec![100, 102, 104]));
        assert_eq!(plan.applied_mode(), CropMode::Dynamic);
    }

    #[test]
    fn test_crop_data_static_uses_mean() {
        let entries = vec![entry(0, 100), entry(1, 200)];
        let (plan, _) = plan_from_crop_data(&entries, SOURCE, CropMode::Static, true).unwrap();
        assert_eq!(plan.positions(), &CropPositions::Fixed(150));
        assert_eq!(plan.fallback_reason(), None);
    }

    #[test]
    fn test_crop_data_rejects_oversized_window() {
        let mut oversized = entry(0, 0);
        oversized.height = 2000;
        let err = plan_from_crop_data(&[oversized], SOURCE, CropMode::Static, true).unwrap_err();
        assert_eq!(err.kind(), reframe_models::ErrorKind::InvalidRequest);

        let err = plan_from_crop_data(&[], SOURCE, CropMode::Static, true).unwrap_err();
        assert!(matches!(err, MediaError::EmptyTrajectory(_)));
    }
}
