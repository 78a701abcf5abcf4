//! Processing context shared by every request.
//!
//! Built once at startup and torn down explicitly. Requests borrow the
//! detector through a [`RequestLease`], which also holds a concurrency
//! permit until the request finishes.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

use reframe_detect_client::{DetectionClient, DetectionClientConfig};
use reframe_media::{
    check_ffmpeg, check_ffprobe, CenterHeuristicDetector, ClipEncoder, CropPlanner,
    FfmpegEncoder, SubjectDetector,
};

use crate::config::{DetectorKind, WorkerConfig};
use crate::error::{WorkerError, WorkerResult};

/// Long-lived collaborators for request handlers.
pub struct ProcessingContext {
    pub config: WorkerConfig,
    pub planner: CropPlanner,
    detector: Arc<dyn SubjectDetector>,
    encoder: Arc<dyn ClipEncoder>,
    request_semaphore: Arc<Semaphore>,
}

impl ProcessingContext {
    /// Check tools and construct the configured detector and encoder.
    pub async fn initialize(config: WorkerConfig) -> WorkerResult<Self> {
        let ffmpeg = check_ffmpeg()?;
        let ffprobe = check_ffprobe()?;
        info!("Using {} and {}", ffmpeg.display(), ffprobe.display());

        let detector: Arc<dyn SubjectDetector> = match config.detector {
            DetectorKind::Service => {
                let client = DetectionClient::new(DetectionClientConfig::from_env())?;
                if !client.health_check().await? {
                    warn!(
                        "Detection service at {} is not healthy yet",
                        client.config().base_url
                    );
                }
                Arc::new(client)
            }
            DetectorKind::Heuristic => Arc::new(CenterHeuristicDetector::new()),
        };

        let encoder = config.tune_encoder(FfmpegEncoder::detect().await);
        info!(
            preset = encoder.preset(),
            crf = encoder.crf(),
            "Encoder configured"
        );

        Ok(Self::with_components(config, detector, Arc::new(encoder)))
    }

    /// Assemble a context from already constructed collaborators.
    pub fn with_components(
        config: WorkerConfig,
        detector: Arc<dyn SubjectDetector>,
        encoder: Arc<dyn ClipEncoder>,
    ) -> Self {
        info!(
            detector = detector.name(),
            per_frame = encoder.supports_per_frame_positions(),
            max_requests = config.max_concurrent_requests,
            "Processing context ready"
        );

        Self {
            planner: CropPlanner::new(config.planner_config()),
            request_semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            config,
            detector,
            encoder,
        }
    }

    pub fn encoder(&self) -> &dyn ClipEncoder {
        self.encoder.as_ref()
    }

    /// Wait for a request slot. Fails once the context is shut down.
    pub async fn lease(&self) -> WorkerResult<RequestLease> {
        let permit = self
            .request_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::ShuttingDown)?;

        Ok(RequestLease {
            detector: Arc::clone(&self.detector),
            _permit: permit,
        })
    }

    /// Requests currently allowed to start.
    pub fn available_slots(&self) -> usize {
        self.request_semaphore.available_permits()
    }

    /// Refuse new requests and release the detector.
    pub async fn shutdown(&self) -> WorkerResult<()> {
        self.request_semaphore.close();
        self.detector.shutdown().await?;
        info!("Processing context shut down");
        Ok(())
    }
}

/// Scoped access to the detector for one request.
pub struct RequestLease {
    detector: Arc<dyn SubjectDetector>,
    _permit: OwnedSemaphorePermit,
}

impl RequestLease {
    pub fn detector(&self) -> &dyn SubjectDetector {
        self.detector.as_ref()
    }
}
