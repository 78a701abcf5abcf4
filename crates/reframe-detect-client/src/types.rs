//! Detection service request/response types.

use reframe_models::Detection;
use serde::{Deserialize, Serialize};

/// One frame submitted for detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectRequest {
    /// Base64 JPEG
    pub image_base64: String,
    pub width: u32,
    pub height: u32,
    /// Detections below this confidence are dropped by the service
    pub min_confidence: f64,
}

/// Detections for one frame, normalized to [0, 1].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
