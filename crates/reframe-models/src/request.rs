//! Request contracts and fail-fast validation.
//!
//! Wire requests carry raw tokens so that an unknown aspect ratio or crop
//! mode surfaces as a validation error rather than a deserialization
//! failure. Each request has a `validated()` method producing the typed
//! form the pipeline consumes.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::aspect::{AspectPreset, AspectRatioParseError};
use crate::error_kind::ErrorKind;
use crate::geometry::{CropMode, CropModeParseError};
use crate::response::CropDataEntry;
use crate::timing::{TimeRange, TimeRangeError};

/// Whole-video analysis request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct AnalyzeRequest {
    #[validate(length(min = 1, message = "video_path is required"))]
    pub video_path: String,
    /// Target ratio token, defaults to 9:16
    #[serde(default)]
    pub aspect_ratio: Option<String>,
}

/// Typed analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAnalyze {
    pub video_path: PathBuf,
    pub aspect: AspectPreset,
}

impl AnalyzeRequest {
    pub fn validated(&self) -> Result<ValidatedAnalyze, RequestError> {
        self.validate()?;
        Ok(ValidatedAnalyze {
            video_path: PathBuf::from(&self.video_path),
            aspect: parse_aspect(self.aspect_ratio.as_deref())?,
        })
    }
}

/// Clip extraction request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ClipRequest {
    #[validate(length(min = 1, message = "video_path is required"))]
    pub video_path: String,
    pub start_time: f64,
    pub end_time: f64,
    /// "static" or "dynamic", defaults to dynamic
    #[serde(default)]
    pub crop_mode: Option<String>,
    /// Target ratio token, defaults to 9:16
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    /// Output file, derived from the source name when absent
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Typed clip request.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedClip {
    pub video_path: PathBuf,
    pub time_range: TimeRange,
    pub crop_mode: CropMode,
    pub aspect: AspectPreset,
    pub output_path: Option<PathBuf>,
}

impl ClipRequest {
    pub fn validated(&self) -> Result<ValidatedClip, RequestError> {
        self.validate()?;
        Ok(ValidatedClip {
            video_path: PathBuf::from(&self.video_path),
            time_range: TimeRange::new(self.start_time, self.end_time)?,
            crop_mode: parse_crop_mode(self.crop_mode.as_deref(), CropMode::Dynamic)?,
            aspect: parse_aspect(self.aspect_ratio.as_deref())?,
            output_path: self.output_path.as_ref().map(PathBuf::from),
        })
    }
}

/// Render a previously produced per-frame crop list.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct RenderRequest {
    #[validate(length(min = 1, message = "video_path is required"))]
    pub video_path: String,
    #[validate(length(min = 1, message = "crop_data cannot be empty"))]
    pub crop_data: Vec<CropDataEntry>,
    /// "static" or "dynamic", defaults to static
    #[serde(default)]
    pub crop_mode: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Typed render request.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRender {
    pub video_path: PathBuf,
    pub crop_data: Vec<CropDataEntry>,
    pub crop_mode: CropMode,
    pub output_path: Option<PathBuf>,
}

impl RenderRequest {
    pub fn validated(&self) -> Result<ValidatedRender, RequestError> {
        self.validate()?;

        let first = &self.crop_data[0];
        if first.width == 0 || first.height == 0 {
            return Err(RequestError::invalid("crop_data window has zero extent"));
        }
        if self
            .crop_data
            .iter()
            .any(|e| e.width != first.width || e.height != first.height)
        {
            return Err(RequestError::invalid(
                "crop_data entries must share one window size",
            ));
        }
        if self.crop_data.windows(2).any(|w| w[1].frame <= w[0].frame) {
            return Err(RequestError::invalid(
                "crop_data frames must be strictly increasing",
            ));
        }

        Ok(ValidatedRender {
            video_path: PathBuf::from(&self.video_path),
            crop_data: self.crop_data.clone(),
            crop_mode: parse_crop_mode(self.crop_mode.as_deref(), CropMode::Static)?,
            output_path: self.output_path.as_ref().map(PathBuf::from),
        })
    }
}

/// Analyze then render in one request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ProcessRequest {
    #[validate(length(min = 1, message = "video_path is required"))]
    pub video_path: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    /// "static" or "dynamic", defaults to static
    #[serde(default)]
    pub crop_mode: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl ProcessRequest {
    /// Split into the analysis half and the render settings.
    pub fn validated(&self) -> Result<(ValidatedAnalyze, CropMode, Option<PathBuf>), RequestError> {
        self.validate()?;
        let analyze = ValidatedAnalyze {
            video_path: PathBuf::from(&self.video_path),
            aspect: parse_aspect(self.aspect_ratio.as_deref())?,
        };
        let crop_mode = parse_crop_mode(self.crop_mode.as_deref(), CropMode::Static)?;
        Ok((analyze, crop_mode, self.output_path.as_ref().map(PathBuf::from)))
    }
}

fn parse_aspect(token: Option<&str>) -> Result<AspectPreset, RequestError> {
    match token {
        Some(token) => Ok(token.parse()?),
        None => Ok(AspectPreset::default()),
    }
}

fn parse_crop_mode(token: Option<&str>, default: CropMode) -> Result<CropMode, RequestError> {
    match token {
        Some(token) => Ok(token.parse()?),
        None => Ok(default),
    }
}

/// Request validation failure. Always an invalid-request kind.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    Fields(#[from] validator::ValidationErrors),

    #[error(transparent)]
    AspectRatio(#[from] AspectRatioParseError),

    #[error(transparent)]
    CropMode(#[from] CropModeParseError),

    #[error(transparent)]
    TimeRange(#[from] TimeRangeError),

    #[error("{0}")]
    Invalid(String),
}

impl RequestError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidRequest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(start: f64, end: f64) -> ClipRequest {
        ClipRequest {
            video_path: "/videos/talk.mp4".to_string(),
            start_time: start,
            end_time: end,
            crop_mode: None,
            aspect_ratio: None,
            output_path: None,
        }
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
    fn test_clip_defaults() {
        let validated = clip(1.0, 4.0).validated().unwrap();
        assert_eq!(validated.crop_mode, CropMode::Dynamic);
        assert_eq!(validated.aspect, AspectPreset::Portrait);
        assert!(validated.output_path.is_none());
    }

    #[test]
    fn test_clip_rejects_bad_time_range() {
        assert!(matches!(
            clip(5.0, 5.0).validated(),
            Err(RequestError::TimeRange(_))
        ));
        assert!(matches!(
            clip(-0.5, 2.0).validated(),
            Err(RequestError::TimeRange(TimeRangeError::NegativeStart(_)))
        ));
    }

    #[test]
    fn test_clip_rejects_unknown_tokens() {
        let mut request = clip(0.0, 3.0);
        request.aspect_ratio = Some("21:9".to_string());
        let err = request.validated().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(matches!(err, RequestError::AspectRatio(_)));

        let mut request = clip(0.0, 3.0);
        request.crop_mode = Some("smart".to_string());
        assert!(matches!(request.validated(), Err(RequestError::CropMode(_))));
    }

    #[test]
    fn test_missing_path_rejected() {
        let mut request = clip(0.0, 3.0);
        request.video_path.clear();
        let err = request.validated().unwrap_err();
        assert!(matches!(err, RequestError::Fields(_)));
        assert!(err.to_string().contains("video_path"));
    }

    #[test]
    fn test_render_request_checks_crop_data() {
        let mut request = RenderRequest {
            video_path: "in.mp4".to_string(),
            crop_data: vec![],
            crop_mode: None,
            output_path: None,
        };
        assert!(request.validated().is_err());

        request.crop_data = vec![entry(0, 10), entry(1, 12)];
        let validated = request.validated().unwrap();
        assert_eq!(validated.crop_mode, CropMode::Static);

        request.crop_data = vec![entry(1, 10), entry(1, 12)];
        assert!(request.validated().is_err());

        let mut odd = entry(2, 5);
        odd.width = 600;
        request.crop_data = vec![entry(0, 10), odd];
        assert!(request.validated().is_err());
    }

    #[test]
    fn test_deserialize_clip_request() {
        let request: ClipRequest = serde_json::from_str(
            r#"{"video_path":"a.mp4","start_time":2,"end_time":8.5,"crop_mode":"static","aspect_ratio":"1:1"}"#,
        )
        .unwrap();
        let validated = request.validated().unwrap();
        assert_eq!(validated.crop_mode, CropMode::Static);
        assert_eq!(validated.aspect, AspectPreset::Square);
        assert!((validated.time_range.duration() - 6.5).abs() < 1e-12);
    }
}
