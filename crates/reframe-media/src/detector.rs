//! Subject detector capability.
//!
//! A detector turns one decoded frame into zero or more candidate subject
//! boxes in normalized coordinates. Implementations are chosen once when
//! the processing context is built and shared across requests, so they
//! must be stateless or synchronize internally.

use async_trait::async_trait;
use reframe_models::Detection;

use crate::error::MediaResult;
use crate::frames::Frame;

#[async_trait]
pub trait SubjectDetector: Send + Sync {
    /// Short identifier used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Detect candidate subjects in one frame.
    async fn detect(&self, frame: &Frame) -> MediaResult<Vec<Detection>>;

    /// Release held resources. Called once when the owning context shuts down.
    async fn shutdown(&self) -> MediaResult<()> {
        Ok(())
    }
}

/// Detector that assumes a single talking head.
///
/// Places one face-sized box centered horizontally with its center at 35%
/// of frame height, which matches the usual talking-head composition. Used
/// when no detection service is configured.
#[derive(Debug, Clone)]
pub struct CenterHeuristicDetector {
    /// Face height as a fraction of frame height
    face_height: f64,
    confidence: f64,
}

impl Default for CenterHeuristicDetector {
    fn default() -> Self {
        Self {
            face_height: 0.30,
            confidence: 0.7,
        }
    }
}

impl CenterHeuristicDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubjectDetector for CenterHeuristicDetector {
    fn name(&self) -> &'static str {
        "center_heuristic"
    }

    async fn detect(&self, frame: &Frame) -> MediaResult<Vec<Detection>> {
        if frame.width == 0 || frame.height == 0 {
            return Ok(Vec::new());
        }

        let box_h = self.face_height;
        // Face boxes are roughly 4:5 in pixels.
        let box_w = (box_h * 0.8 * frame.height as f64 / frame.width as f64).min(1.0);

        Ok(vec![Detection::new(
            0.5 - box_w / 2.0,
            0.35 - box_h / 2.0,
            box_w,
            box_h,
            self.confidence,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heuristic_box_is_centered() {
        let frame = Frame {
            index: 0,
            width: 640,
            height: 360,
            data: vec![0; 640 * 360 * 3],
        };
        let detections = CenterHeuristicDetector::new().detect(&frame).await.unwrap();
        assert_eq!(detections.len(), 1);

        let det = detections[0];
        assert!((det.center_x() - 0.5).abs() < 1e-9);
        assert!((det.center_y() - 0.35).abs() < 1e-9);
        assert!(det.is_well_formed());
    }
}
