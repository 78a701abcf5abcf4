//! Target aspect ratios.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aspect ratio expressed as `width:height` (numerator:denominator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Vertical short-form video (9:16)
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1,
        height: 1,
    };

    /// Feed portrait (4:5)
    pub const FEED_PORTRAIT: AspectRatio = AspectRatio {
        width: 4,
        height: 5,
    };

    /// Widescreen landscape (16:9)
    pub const LANDSCAPE: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };

    /// Create a ratio, rejecting zero components.
    pub fn new(width: u32, height: u32) -> Result<Self, AspectRatioParseError> {
        if width == 0 || height == 0 {
            return Err(AspectRatioParseError::ZeroValue);
        }
        Ok(Self { width, height })
    }

    /// Ratio as a float (width / height).
    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::PORTRAIT
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| AspectRatioParseError::InvalidFormat(s.to_string()))?;

        let width = width
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(width.to_string()))?;
        let height = height
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(height.to_string()))?;

        Self::new(width, height)
    }
}

/// The fixed set of target ratios a request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectPreset {
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    FeedPortrait,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectPreset {
    pub const ALL: &'static [AspectPreset] = &[
        AspectPreset::Portrait,
        AspectPreset::Square,
        AspectPreset::FeedPortrait,
        AspectPreset::Landscape,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectPreset::Portrait => "9:16",
            AspectPreset::Square => "1:1",
            AspectPreset::FeedPortrait => "4:5",
            AspectPreset::Landscape => "16:9",
        }
    }

    pub fn ratio(&self) -> AspectRatio {
        match self {
            AspectPreset::Portrait => AspectRatio::PORTRAIT,
            AspectPreset::Square => AspectRatio::SQUARE,
            AspectPreset::FeedPortrait => AspectRatio::FEED_PORTRAIT,
            AspectPreset::Landscape => AspectRatio::LANDSCAPE,
        }
    }

    /// Comma-separated list of accepted tokens, for error messages.
    pub fn allowed_tokens() -> String {
        Self::ALL
            .iter()
            .map(AspectPreset::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for AspectPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectPreset {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|preset| preset.as_str() == token)
            .ok_or_else(|| AspectRatioParseError::NotAllowed {
                token: s.to_string(),
                allowed: Self::allowed_tokens(),
            })
    }
}

impl From<AspectPreset> for AspectRatio {
    fn from(preset: AspectPreset) -> Self {
        preset.ratio()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H'")]
    InvalidFormat(String),
    #[error("Invalid number in aspect ratio: {0}")]
    InvalidNumber(String),
    #[error("Aspect ratio values must be non-zero")]
    ZeroValue,
    #[error("Unsupported aspect ratio '{token}', allowed: {allowed}")]
    NotAllowed { token: String, allowed: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::PORTRAIT);
        assert_eq!(" 4:5 ".parse::<AspectRatio>().unwrap(), AspectRatio::FEED_PORTRAIT);
        assert!("invalid".parse::<AspectRatio>().is_err());
        assert_eq!(
            "0:16".parse::<AspectRatio>(),
            Err(AspectRatioParseError::ZeroValue)
        );
    }

    #[test]
    fn test_preset_tokens_round_trip() {
        for preset in AspectPreset::ALL {
            assert_eq!(preset.as_str().parse::<AspectPreset>().unwrap(), *preset);
            assert_eq!(preset.to_string(), preset.ratio().to_string());
        }
    }

    #[test]
    fn test_preset_rejects_unlisted_ratio() {
        let err = "21:9".parse::<AspectPreset>().unwrap_err();
        assert!(matches!(err, AspectRatioParseError::NotAllowed { .. }));
        assert!(err.to_string().contains("9:16, 1:1, 4:5, 16:9"));
    }

    #[test]
    fn test_preset_serde_uses_token() {
        let json = serde_json::to_string(&AspectPreset::Square).unwrap();
        assert_eq!(json, "\"1:1\"");
        let preset: AspectPreset = serde_json::from_str("\"16:9\"").unwrap();
        assert_eq!(preset, AspectPreset::Landscape);
    }
}
