//! Detection service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use reframe_media::{Frame, MediaError, MediaResult, SubjectDetector};
use reframe_models::Detection;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{DetectClientError, DetectClientResult};
use crate::types::{DetectRequest, DetectResponse, HealthResponse};

/// JPEG quality for submitted frames.
const JPEG_QUALITY: u8 = 85;

/// Configuration for the detection client.
#[derive(Debug, Clone)]
pub struct DetectionClientConfig {
    /// Base URL of the detection service
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// Detections below this confidence are discarded
    pub min_confidence: f64,
}

impl Default for DetectionClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            min_confidence: 0.5,
        }
    }
}

impl DetectionClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("DETECT_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("DETECT_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("DETECT_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            min_confidence: std::env::var("REFRAME_MIN_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_confidence),
        }
    }
}

/// Client for the detection service.
pub struct DetectionClient {
    http: Client,
    config: DetectionClientConfig,
}

impl DetectionClient {
    pub fn new(config: DetectionClientConfig) -> DetectClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectClientError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DetectClientResult<Self> {
        Self::new(DetectionClientConfig::from_env())
    }

    pub fn config(&self) -> &DetectionClientConfig {
        &self.config
    }

    /// Check if the detection service is healthy.
    pub async fn health_check(&self) -> DetectClientResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Detection service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Detection service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Detect subjects in one frame.
    pub async fn detect_frame(&self, frame: &Frame) -> DetectClientResult<Vec<Detection>> {
        let request = DetectRequest {
            image_base64: encode_frame(frame)?,
            width: frame.width,
            height: frame.height,
            min_confidence: self.config.min_confidence,
        };
        let url = format!("{}/detect", self.config.base_url);
        let (url, request) = (url.as_str(), &request);

        let response = self
            .with_retry(|| async move {
                let response = self.http.post(url).json(request).send().await?;
                match response.status() {
                    StatusCode::SERVICE_UNAVAILABLE | StatusCode::TOO_MANY_REQUESTS => {
                        Err(DetectClientError::ServiceUnavailable(format!(
                            "detection service returned {}",
                            response.status()
                        )))
                    }
                    _ => Ok(response),
                }
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectClientError::RequestFailed(format!(
                "detection service returned {}: {}",
                status, body
            )));
        }

        let body = response.bytes().await?;
        let parsed: DetectResponse = serde_json::from_slice(&body)
            .map_err(|e| DetectClientError::InvalidResponse(e.to_string()))?;

        let min_confidence = self.config.min_confidence;
        Ok(parsed
            .detections
            .into_iter()
            .filter(|d| d.confidence >= min_confidence)
            .collect())
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> DetectClientResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = DetectClientResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(200 * 2u64.pow(attempt));
                    warn!(
                        "Detection request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl SubjectDetector for DetectionClient {
    fn name(&self) -> &'static str {
        "detect-service"
    }

    async fn detect(&self, frame: &Frame) -> MediaResult<Vec<Detection>> {
        let detections = self
            .detect_frame(frame)
            .await
            .map_err(|e| MediaError::detection_failed(self.name(), frame.index, e.to_string()))?;
        debug!("Frame {}: {} detections", frame.index, detections.len());
        Ok(detections)
    }
}

/// JPEG-encode an RGB frame as base64.
fn encode_frame(frame: &Frame) -> DetectClientResult<String> {
    let image = frame.to_image().ok_or_else(|| {
        DetectClientError::Encode(format!(
            "frame {} has {} bytes for {}x{}",
            frame.index,
            frame.data.len(),
            frame.width,
            frame.height
        ))
    })?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .map_err(|e| DetectClientError::Encode(e.to_string()))?;

    Ok(STANDARD.encode(jpeg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn frame(index: u64) -> Frame {
        Frame {
            index,
            width: 8,
            height: 4,
            data: vec![128; 8 * 4 * 3],
        }
    }

    fn client(server: &MockServer) -> DetectionClient {
        DetectionClient::new(DetectionClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
            min_confidence: 0.5,
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = DetectionClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.min_confidence, 0.5);
    }

    #[test]
    fn test_encode_frame_rejects_short_buffer() {
        let mut bad = frame(3);
        bad.data.truncate(10);
        assert!(matches!(
            encode_frame(&bad),
            Err(DetectClientError::Encode(_))
        ));
    }

    #[test]
    fn test_encode_frame_jpeg() {
        let encoded = encode_frame(&frame(0)).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_detect_filters_low_confidence() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "detections": [
                    {"x_min": 0.4, "y_min": 0.2, "box_w": 0.1, "box_h": 0.2, "confidence": 0.9},
                    {"x_min": 0.1, "y_min": 0.2, "box_w": 0.1, "box_h": 0.2, "confidence": 0.3}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let detections = client(&server).detect(&frame(5)).await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].x_min, 0.4);
    }

    #[tokio::test]
    async fn test_detect_server_error_is_detection_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let err = client(&server).detect(&frame(12)).await.unwrap_err();
        match err {
            MediaError::DetectionFailed { frame, message, .. } => {
                assert_eq!(frame, 12);
                assert!(message.contains("model crashed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detect_retries_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server).detect_frame(&frame(0)).await.unwrap_err();
        assert!(matches!(err, DetectClientError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_detect_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).detect_frame(&frame(0)).await.unwrap_err();
        assert!(matches!(err, DetectClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})),
            )
            .mount(&server)
            .await;

        assert!(client(&server).health_check().await.unwrap());
    }
}
