//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reframe_media::{FfmpegEncoder, PlannerConfig, SmootherKind};

/// Which subject detector the context constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorKind {
    /// HTTP detection service
    Service,
    /// Built-in single-subject heuristic
    #[default]
    Heuristic,
}

impl FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "service" | "http" => Ok(DetectorKind::Service),
            "heuristic" | "center" => Ok(DetectorKind::Heuristic),
            other => Err(format!("Unknown detector: {}", other)),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory for outputs without an explicit path
    pub output_dir: PathBuf,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// Requests processed at once
    pub max_concurrent_requests: usize,
    pub detector: DetectorKind,
    /// x264 preset for rendered clips
    pub encode_preset: String,
    /// x264 constant rate factor
    pub encode_crf: u8,
    /// Planner tunables
    pub planner: PlannerConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            request_timeout: Duration::from_secs(3600), // 1 hour
            max_concurrent_requests: 2,
            detector: DetectorKind::default(),
            encode_preset: "fast".to_string(),
            encode_crf: 20,
            planner: PlannerConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let planner = PlannerConfig {
            sample_rate: env_parse("REFRAME_SAMPLE_RATE").unwrap_or(defaults.planner.sample_rate),
            analysis_window: env_parse("REFRAME_ANALYSIS_WINDOW")
                .unwrap_or(defaults.planner.analysis_window),
            clip_window: env_parse("REFRAME_CLIP_WINDOW").unwrap_or(defaults.planner.clip_window),
            smoother: env_parse::<SmootherKind>("REFRAME_SMOOTHER")
                .unwrap_or(defaults.planner.smoother),
            process_variance: env_parse("REFRAME_PROCESS_VARIANCE")
                .unwrap_or(defaults.planner.process_variance),
            measurement_variance: env_parse("REFRAME_MEASUREMENT_VARIANCE")
                .unwrap_or(defaults.planner.measurement_variance),
            detect_concurrency: env_parse("REFRAME_DETECT_CONCURRENCY")
                .unwrap_or(defaults.planner.detect_concurrency),
            analysis_height: env_parse("REFRAME_ANALYSIS_HEIGHT")
                .unwrap_or(defaults.planner.analysis_height),
            ..defaults.planner
        };

        Self {
            output_dir: std::env::var("REFRAME_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            request_timeout: env_parse("REFRAME_REQUEST_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_concurrent_requests: env_parse::<usize>("REFRAME_MAX_CONCURRENT_REQUESTS")
                .unwrap_or(defaults.max_concurrent_requests)
                .max(1),
            detector: env_parse("REFRAME_DETECTOR").unwrap_or(defaults.detector),
            encode_preset: std::env::var("REFRAME_ENCODE_PRESET").unwrap_or(defaults.encode_preset),
            encode_crf: env_parse::<u8>("REFRAME_ENCODE_CRF")
                .unwrap_or(defaults.encode_crf)
                .min(51),
            planner,
        }
    }

    /// Planner config with sampling bounded by the request timeout.
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            sampling_timeout: Some(self.request_timeout),
            ..self.planner.clone()
        }
    }

    /// Apply encoding settings and the request timeout to `encoder`.
    pub fn tune_encoder(&self, encoder: FfmpegEncoder) -> FfmpegEncoder {
        encoder
            .with_preset(self.encode_preset.clone())
            .with_crf(self.encode_crf)
            .with_timeout(self.request_timeout.as_secs())
    }
}
