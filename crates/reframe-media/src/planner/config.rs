//! Configuration for the crop planning pipeline.
//!
//! The scoring weights and tolerances here are tuning policy chosen for
//! talking-head footage. They are not derived values.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Weights for ranking candidate subjects in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight of box area relative to frame area (default: 0.5)
    pub size: f64,
    /// Weight of closeness to frame center (default: 0.3)
    pub center: f64,
    /// Weight of detector confidence (default: 0.2)
    pub confidence: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            size: 0.5,
            center: 0.3,
            confidence: 0.2,
        }
    }
}

/// Smoothing strategy applied to sampled positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SmootherKind {
    /// Centered moving average with edge correction
    #[default]
    MovingAverage,
    /// Causal single-state recursive filter
    Recursive,
}

impl SmootherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmootherKind::MovingAverage => "moving_average",
            SmootherKind::Recursive => "recursive",
        }
    }
}

impl fmt::Display for SmootherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SmootherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "moving_average" | "moving-average" | "average" => Ok(SmootherKind::MovingAverage),
            "recursive" | "kalman" => Ok(SmootherKind::Recursive),
            other => Err(format!("Unknown smoother: {}", other)),
        }
    }
}

/// Whether a request covers a whole file or a sub-clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisScope {
    WholeVideo,
    Clip,
}

/// Configuration for the crop planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    // === Aspect ===
    /// Relative aspect deviation treated as already matching (default: 0.15)
    pub aspect_tolerance: f64,

    // === Sampling ===
    /// Run detection on every Nth frame (default: 5)
    pub sample_rate: u64,

    /// Maximum detector calls in flight per request (default: 4)
    pub detect_concurrency: usize,

    /// Height frames are decoded at for detection (default: 360)
    pub analysis_height: u32,

    /// Abort sampling after this long (default: none)
    #[serde(with = "optional_secs")]
    pub sampling_timeout: Option<Duration>,

    // === Scoring ===
    pub scoring: ScoringWeights,

    // === Smoothing ===
    pub smoother: SmootherKind,

    /// Moving-average window for whole-video analysis (default: 15)
    pub analysis_window: usize,

    /// Moving-average window for clip extraction (default: 30)
    pub clip_window: usize,

    /// Recursive filter process variance (default: 1e-5)
    pub process_variance: f64,

    /// Recursive filter measurement variance (default: 1e-1)
    pub measurement_variance: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            aspect_tolerance: 0.15,
            sample_rate: 5,
            detect_concurrency: 4,
            analysis_height: 360,
            sampling_timeout: None,
            scoring: ScoringWeights::default(),
            smoother: SmootherKind::MovingAverage,
            analysis_window: 15,
            clip_window: 30,
            process_variance: 1e-5,
            measurement_variance: 1e-1,
        }
    }
}

impl PlannerConfig {
    /// Moving-average window for a request scope.
    pub fn window_for(&self, scope: AnalysisScope) -> usize {
        match scope {
            AnalysisScope::WholeVideo => self.analysis_window,
            AnalysisScope::Clip => self.clip_window,
        }
    }

    /// Sampling stride, never zero.
    pub fn stride(&self) -> u64 {
        self.sample_rate.max(1)
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs.filter(|s| *s > 0.0).map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.sample_rate, 5);
        assert_eq!(config.window_for(AnalysisScope::WholeVideo), 15);
        assert_eq!(config.window_for(AnalysisScope::Clip), 30);
        assert_eq!(config.scoring, ScoringWeights::default());
        assert!((config.aspect_tolerance - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_zero_sample_rate_clamped() {
        let config = PlannerConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert_eq!(config.stride(), 1);
    }

    #[test]
    fn test_smoother_kind_parse() {
        assert_eq!(
            "recursive".parse::<SmootherKind>().unwrap(),
            SmootherKind::Recursive
        );
        assert_eq!(
            "moving_average".parse::<SmootherKind>().unwrap(),
            SmootherKind::MovingAverage
        );
        assert!("median".parse::<SmootherKind>().is_err());
    }

    #[test]
    fn test_config_serde_timeout() {
        let config = PlannerConfig {
            sampling_timeout: Some(Duration::from_secs(90)),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: PlannerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sampling_timeout, Some(Duration::from_secs(90)));
    }
}
