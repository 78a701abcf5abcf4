//! Crop dimension planning.

use reframe_models::{AspectRatio, Dimensions};
use tracing::debug;

use super::models::AspectDecision;
use crate::error::{MediaError, MediaResult};

/// Decide crop dimensions for `source` at `target`.
///
/// Branches are checked in order, so exact matches, near matches and
/// sources already narrower than the target return before any detection
/// work is scheduled:
/// 1. exact match: source unchanged
/// 2. within `tolerance`: trim to the ideal size that fits the frame
/// 3. narrower than target: full width, reduced height
/// 4. otherwise: full height, reduced width, follow the subject
pub fn plan_aspect(
    source: Dimensions,
    target: AspectRatio,
    tolerance: f64,
) -> MediaResult<AspectDecision> {
    if source.is_empty() {
        return Err(MediaError::InvalidVideo(format!(
            "source has no pixels ({})",
            source
        )));
    }
    if target.width == 0 || target.height == 0 {
        return Err(MediaError::invalid_request(format!(
            "aspect ratio {} has a zero component",
            target
        )));
    }

    let (w, h) = (source.width as u64, source.height as u64);
    let (num, den) = (target.width as u64, target.height as u64);

    let ideal_width = (h * num / den).max(1);
    let ideal_height = (w * den / num).max(1);

    if w == ideal_width && h == ideal_height {
        debug!("Source {} already matches {}", source, target);
        return Ok(AspectDecision {
            crop: source,
            track_subject: false,
        });
    }

    let source_aspect = source.aspect();
    let target_aspect = target.as_f64();
    let diff = (source_aspect - target_aspect).abs() / target_aspect;

    let (crop_w, crop_h, track_subject) = if diff <= tolerance {
        if ideal_width <= w {
            (ideal_width, h, false)
        } else {
            (w, ideal_height.min(h), false)
        }
    } else if source_aspect < target_aspect {
        (w, (w * den / num).clamp(1, h), false)
    } else {
        ((h * num / den).clamp(1, w), h, true)
    };

    let decision = AspectDecision {
        crop: Dimensions::new(crop_w as u32, crop_h as u32),
        track_subject,
    };
    debug!(
        source = %source,
        target = %target,
        crop = %decision.crop,
        track_subject,
        "Aspect decision"
    );
    Ok(decision)
}

/// Human-readable source format, used in request logs.
pub fn classify_format(source: Dimensions) -> &'static str {
    let aspect = source.aspect();
    if (aspect - 9.0 / 16.0).abs() < 0.01 {
        "9:16 portrait"
    } else if (aspect - 16.0 / 9.0).abs() < 0.01 {
        "16:9 landscape"
    } else if (aspect - 1.0).abs() < 0.01 {
        "square"
    } else if aspect < 0.8 {
        "vertical portrait"
    } else if aspect > 1.2 {
        "horizontal landscape"
    } else {
        "square-ish"
    }
}

/// Vertical offset centering a window of `crop_height` in `source_height`.
pub fn centered_y(source_height: u32, crop_height: u32) -> u32 {
    source_height.saturating_sub(crop_height) / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(w: u32, h: u32, ratio: AspectRatio) -> AspectDecision {
        plan_aspect(Dimensions::new(w, h), ratio, 0.15).unwrap()
    }

    #[test]
    fn test_landscape_to_portrait_tracks() {
        let decision = plan(1920, 1080, AspectRatio::PORTRAIT);
        assert_eq!(decision.crop, Dimensions::new(607, 1080));
        assert!(decision.track_subject);
    }

    #[test]
    fn test_exact_match_unchanged() {
        let decision = plan(1080, 1920, AspectRatio::PORTRAIT);
        assert_eq!(decision.crop, Dimensions::new(1080, 1920));
        assert!(!decision.track_subject);
    }

    #[test]
    fn test_near_match_trims_width() {
        let decision = plan(1000, 1700, AspectRatio::PORTRAIT);
        assert_eq!(decision.crop, Dimensions::new(956, 1700));
        assert!(!decision.track_subject);
    }

    #[test]
    fn test_near_match_trims_height() {
        // 0.54 is within tolerance of 0.5625 but narrower, so width is kept.
        let decision = plan(1080, 2000, AspectRatio::PORTRAIT);
        assert_eq!(decision.crop, Dimensions::new(1080, 1920));
        assert!(!decision.track_subject);
    }

    #[test]
    fn test_narrow_source_crops_height_only() {
        let decision = plan(800, 2000, AspectRatio::PORTRAIT);
        assert_eq!(decision.crop, Dimensions::new(800, 1422));
        assert!(!decision.track_subject);

        let decision = plan(1080, 1920, AspectRatio::LANDSCAPE);
        assert_eq!(decision.crop, Dimensions::new(1080, 607));
        assert!(!decision.track_subject);
    }

    #[test]
    fn test_square_from_landscape_tracks() {
        let decision = plan(1920, 1080, AspectRatio::SQUARE);
        assert_eq!(decision.crop, Dimensions::new(1080, 1080));
        assert!(decision.track_subject);
    }

    #[test]
    fn test_crop_never_exceeds_source() {
        for &(w, h) in &[(1920, 1080), (1280, 720), (720, 1280), (640, 640), (3, 2), (2, 3)] {
            for ratio in [
                AspectRatio::PORTRAIT,
                AspectRatio::SQUARE,
                AspectRatio::FEED_PORTRAIT,
                AspectRatio::LANDSCAPE,
            ] {
                let decision = plan(w, h, ratio);
                assert!(decision.crop.width >= 1 && decision.crop.width <= w);
                assert!(decision.crop.height >= 1 && decision.crop.height <= h);
            }
        }
    }

    #[test]
    fn test_empty_source_rejected() {
        assert!(plan_aspect(Dimensions::new(0, 1080), AspectRatio::PORTRAIT, 0.15).is_err());
    }

    #[test]
    fn test_classify_format() {
        assert_eq!(classify_format(Dimensions::new(1920, 1080)), "16:9 landscape");
        assert_eq!(classify_format(Dimensions::new(1080, 1920)), "9:16 portrait");
        assert_eq!(classify_format(Dimensions::new(720, 720)), "square");
        assert_eq!(classify_format(Dimensions::new(1000, 1100)), "square-ish");
        assert_eq!(classify_format(Dimensions::new(2560, 1080)), "horizontal landscape");
    }

    #[test]
    fn test_centered_y() {
        assert_eq!(centered_y(1920, 1080), 420);
        assert_eq!(centered_y(1080, 1080), 0);
        assert_eq!(centered_y(1000, 1200), 0);
    }
}
