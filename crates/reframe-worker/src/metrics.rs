//! Request metrics.
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the
//! embedding process installs a recorder.

use metrics::{counter, histogram};
use reframe_models::CropMode;

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "reframe_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "reframe_request_duration_seconds";
    pub const SAMPLED_FRAMES_TOTAL: &str = "reframe_sampled_frames_total";
    pub const STRATEGY_FALLBACKS_TOTAL: &str = "reframe_strategy_fallbacks_total";
}

/// Record one finished request.
pub fn record_request(operation: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("operation", operation.to_string()),
        ("outcome", outcome.to_string()),
    ];

    counter!(names::REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record frames sent to the detector.
pub fn record_sampled_frames(operation: &str, count: usize) {
    let labels = [("operation", operation.to_string())];
    counter!(names::SAMPLED_FRAMES_TOTAL, &labels).increment(count as u64);
}

/// Record a crop mode that was applied differently than requested.
pub fn record_strategy_fallback(requested: CropMode, applied: CropMode) {
    let labels = [
        ("requested", requested.as_str().to_string()),
        ("applied", applied.as_str().to_string()),
    ];
    counter!(names::STRATEGY_FALLBACKS_TOTAL, &labels).increment(1);
}
