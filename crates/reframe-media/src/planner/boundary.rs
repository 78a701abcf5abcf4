//! Time range to frame range mapping.

use reframe_models::{FrameRange, TimeRange};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Map a clip interval onto frame indices `[round(start*fps), round(end*fps))`.
///
/// `total_frames` of zero means the frame count is unknown. A range that
/// starts at or beyond the last frame is rejected; an end past the last
/// frame is trimmed to it.
pub fn frame_range(range: TimeRange, fps: f64, total_frames: u64) -> MediaResult<FrameRange> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(MediaError::InvalidVideo(format!("invalid frame rate {}", fps)));
    }

    let start = (range.start_time * fps).round() as u64;
    let mut end = (range.end_time * fps).round() as u64;

    if total_frames > 0 {
        if start >= total_frames {
            return Err(MediaError::invalid_request(format!(
                "clip starts at {:.3}s (frame {}) but the video has {} frames",
                range.start_time, start, total_frames
            )));
        }
        if end > total_frames {
            debug!(end, total_frames, "Trimming clip end to last frame");
            end = total_frames;
        }
    }

    if end <= start {
        return Err(MediaError::invalid_request(format!(
            "clip {:.3}s-{:.3}s is shorter than one frame at {:.3} fps",
            range.start_time, range.end_time, fps
        )));
    }

    Ok(FrameRange::new(start, end))
}

/// Presentation time of a frame offset within a clip.
pub fn frame_time(offset: u64, fps: f64) -> f64 {
    if fps <= 0.0 {
        return 0.0;
    }
    offset as f64 / fps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: f64, end: f64) -> TimeRange {
        TimeRange::new(start, end).unwrap()
    }

    #[test]
    fn test_rounds_to_nearest_frame() {
        let frames = frame_range(range(1.0, 3.5), 30.0, 900).unwrap();
        assert_eq!(frames, FrameRange::new(30, 105));

        let frames = frame_range(range(0.49, 1.01), 29.97, 0).unwrap();
        assert_eq!(frames, FrameRange::new(15, 30));
    }

    #[test]
    fn test_end_trimmed_to_frame_count() {
        let frames = frame_range(range(9.0, 12.0), 30.0, 300).unwrap();
        assert_eq!(frames, FrameRange::new(270, 300));
    }

    #[test]
    fn test_start_beyond_video_rejected() {
        let err = frame_range(range(20.0, 25.0), 30.0, 300).unwrap_err();
        assert!(matches!(err, MediaError::InvalidRequest(_)));
    }

    #[test]
    fn test_sub_frame_clip_rejected() {
        let err = frame_range(range(1.0, 1.01), 30.0, 300).unwrap_err();
        assert!(matches!(err, MediaError::InvalidRequest(_)));
    }

    #[test]
    fn test_invalid_fps() {
        assert!(frame_range(range(0.0, 1.0), 0.0, 10).is_err());
        assert!(frame_range(range(0.0, 1.0), f64::NAN, 10).is_err());
    }

    #[test]
    fn test_frame_time() {
        assert!((frame_time(45, 30.0) - 1.5).abs() < 1e-12);
    }
}
