//! Subject selection among one frame's detections.

use reframe_models::{Detection, Dimensions};

use super::config::ScoringWeights;

/// Weighted score of one detection in a frame of `frame` pixels.
///
/// `size` is box area over frame area, `center` is one minus the distance
/// of the box center from the frame center divided by the center-to-corner
/// distance, both measured in pixels.
pub fn score_detection(detection: &Detection, frame: Dimensions, weights: &ScoringWeights) -> f64 {
    let (w, h) = (frame.width as f64, frame.height as f64);

    let size_score = detection.area();

    let dx = (detection.center_x() - 0.5) * w;
    let dy = (detection.center_y() - 0.5) * h;
    let half_diagonal = (w * w + h * h).sqrt() / 2.0;
    let center_score = if half_diagonal > 0.0 {
        1.0 - (dx * dx + dy * dy).sqrt() / half_diagonal
    } else {
        0.0
    };

    weights.size * size_score + weights.center * center_score + weights.confidence * detection.confidence
}

/// Pick the subject among `detections`.
///
/// Returns `None` when there are no detections. A single detection is
/// returned without scoring. Otherwise the highest score wins and ties go
/// to the earliest detection.
pub fn select_subject<'a>(
    detections: &'a [Detection],
    frame: Dimensions,
    weights: &ScoringWeights,
) -> Option<&'a Detection> {
    match detections {
        [] => None,
        [only] => Some(only),
        [first, rest @ ..] => {
            let mut best = first;
            let mut best_score = score_detection(first, frame, weights);
            for candidate in rest {
                let score = score_detection(candidate, frame, weights);
                if score > best_score {
                    best = candidate;
                    best_score = score;
                }
            }
            Some(best)
        }
    }
}

/// Crop-window left edge that centers the window on `subject`.
///
/// The subject center is truncated to whole pixels and half the crop width
/// subtracted, then clamped into `[0, width - crop_width]`. Without a
/// subject the window is centered in the frame.
pub fn crop_x_for_subject(subject: Option<&Detection>, source: Dimensions, crop_width: u32) -> f64 {
    let max_x = source.width.saturating_sub(crop_width) as i64;
    match subject {
        Some(detection) => {
            let center_px = (detection.center_x() * source.width as f64) as i64;
            let x = center_px - (crop_width / 2) as i64;
            x.clamp(0, max_x) as f64
        }
        None => (max_x / 2) as f64,
    }
}
