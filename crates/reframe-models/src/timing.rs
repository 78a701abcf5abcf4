//! Time and frame ranges.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Requested clip interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    pub start_time: f64,
    pub end_time: f64,
}

impl TimeRange {
    /// Validate a start/end pair.
    ///
    /// Checks:
    /// - Both values are finite
    /// - Start is not negative
    /// - Start is before end
    pub fn new(start_time: f64, end_time: f64) -> Result<Self, TimeRangeError> {
        if !start_time.is_finite() || !end_time.is_finite() {
            return Err(TimeRangeError::NotFinite);
        }
        if start_time < 0.0 {
            return Err(TimeRangeError::NegativeStart(start_time));
        }
        if start_time >= end_time {
            return Err(TimeRangeError::StartNotBeforeEnd {
                start_time,
                end_time,
            });
        }
        Ok(Self {
            start_time,
            end_time,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeRangeError {
    #[error("Start and end times must be finite numbers")]
    NotFinite,
    #[error("Start time cannot be negative (got {0})")]
    NegativeStart(f64),
    #[error("Start time ({start_time}) must be before end time ({end_time})")]
    StartNotBeforeEnd { start_time: f64, end_time: f64 },
}

/// Half-open range of frame indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FrameRange {
    pub start: u64,
    pub end: u64,
}

impl FrameRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Range covering a whole video.
    pub fn whole(total_frames: u64) -> Self {
        Self {
            start: 0,
            end: total_frames,
        }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.start && frame < self.end
    }

    /// Absolute frame indices visited when sampling every `stride` frames.
    pub fn sampled(&self, stride: u64) -> impl Iterator<Item = u64> {
        (self.start..self.end).step_by(stride.max(1) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_validation() {
        assert!(TimeRange::new(0.0, 10.0).is_ok());
        assert_eq!(
            TimeRange::new(-1.0, 10.0),
            Err(TimeRangeError::NegativeStart(-1.0))
        );
        assert!(matches!(
            TimeRange::new(5.0, 5.0),
            Err(TimeRangeError::StartNotBeforeEnd { .. })
        ));
        assert_eq!(TimeRange::new(0.0, f64::NAN), Err(TimeRangeError::NotFinite));
        assert!((TimeRange::new(1.5, 4.0).unwrap().duration() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_frame_range_sampling() {
        let range = FrameRange::new(10, 22);
        assert_eq!(range.len(), 12);
        assert_eq!(range.sampled(5).collect::<Vec<_>>(), vec![10, 15, 20]);
        assert!(range.contains(21));
        assert!(!range.contains(22));
        assert!(FrameRange::new(7, 7).is_empty());
    }
}
