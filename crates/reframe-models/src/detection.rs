//! Subject detections reported by a detector.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One candidate subject region in one frame.
///
/// Box coordinates are fractions of the frame size (0.0 - 1.0);
/// `confidence` is the detector's score in the same range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    pub x_min: f64,
    pub y_min: f64,
    pub box_w: f64,
    pub box_h: f64,
    pub confidence: f64,
}

impl Detection {
    pub fn new(x_min: f64, y_min: f64, box_w: f64, box_h: f64, confidence: f64) -> Self {
        Self {
            x_min,
            y_min,
            box_w,
            box_h,
            confidence,
        }
    }

    /// Horizontal center as a fraction of frame width.
    pub fn center_x(&self) -> f64 {
        self.x_min + self.box_w / 2.0
    }

    /// Vertical center as a fraction of frame height.
    pub fn center_y(&self) -> f64 {
        self.y_min + self.box_h / 2.0
    }

    /// Box area as a fraction of frame area.
    pub fn area(&self) -> f64 {
        self.box_w * self.box_h
    }

    /// Whether every field is finite and the box has positive extent.
    pub fn is_well_formed(&self) -> bool {
        [self.x_min, self.y_min, self.box_w, self.box_h, self.confidence]
            .iter()
            .all(|v| v.is_finite())
            && self.box_w > 0.0
            && self.box_h > 0.0
    }
}
