//! Frame geometry and crop modes.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pixel extents of a source frame or crop window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width / height.
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Apply a display rotation (degrees). Quarter turns swap the axes.
    pub fn rotated(self, degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 | 270 => Self {
                width: self.height,
                height: self.width,
            },
            _ => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the crop window moves over the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// One fixed window for the whole clip
    Static,
    /// Per-frame panning window
    #[default]
    Dynamic,
}

impl CropMode {
    pub const ALL: &'static [CropMode] = &[CropMode::Static, CropMode::Dynamic];

    pub fn as_str(&self) -> &'static str {
        match self {
            CropMode::Static => "static",
            CropMode::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for CropMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CropMode {
    type Err = CropModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(CropMode::Static),
            "dynamic" => Ok(CropMode::Dynamic),
            _ => Err(CropModeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Unknown crop mode: {0}, expected 'static' or 'dynamic'")]
pub struct CropModeParseError(String);
