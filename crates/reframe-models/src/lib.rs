//! Shared data models for the reframe crop planner.
//!
//! This crate provides Serde-serializable types for:
//! - Target aspect ratios and the allowed preset enumeration
//! - Crop modes, dimensions and normalized subject detections
//! - Analysis, clip and render request/response contracts
//! - Stable error kinds reported across every surface

pub mod aspect;
pub mod detection;
pub mod error_kind;
pub mod geometry;
pub mod request;
pub mod response;
pub mod timing;

// Re-export common types
pub use aspect::{AspectPreset, AspectRatio, AspectRatioParseError};
pub use detection::Detection;
pub use error_kind::ErrorKind;
pub use geometry::{CropMode, CropModeParseError, Dimensions};
pub use request::{
    AnalyzeRequest, ClipRequest, ProcessRequest, RenderRequest, RequestError, ValidatedAnalyze,
    ValidatedClip, ValidatedRender,
};
pub use response::{
    AnalysisMetadata, AnalysisResponse, ClipResponse, CropDataEntry, CropDimensions,
    ProcessResponse, RenderResponse,
};
pub use timing::{FrameRange, TimeRange, TimeRangeError};
