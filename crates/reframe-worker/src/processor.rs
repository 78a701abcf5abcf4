//! Request handlers.
//!
//! Every request is validated before any probing or decoding starts, runs
//! under a [`RequestLease`], and is bounded by the configured request
//! timeout. Failures become responses carrying a stable error kind.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use reframe_media::planner::aspect::classify_format;
use reframe_media::planner::{boundary, strategy, AnalysisScope, PlanOutcome, PlanRequest};
use reframe_media::{
    probe_video, CancelSignal, CropPlan, EncodeOutcome, FfmpegFrameSource, FrameSource,
    MediaResult, RenderWindow, VideoInfo,
};
use reframe_models::{
    AnalysisMetadata, AnalysisResponse, AnalyzeRequest, AspectPreset, ClipRequest, ClipResponse,
    CropMode, ErrorKind, FrameRange, ProcessRequest, ProcessResponse, RenderRequest,
    RenderResponse,
};

use crate::context::{ProcessingContext, RequestLease};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RequestLogger;
use crate::metrics;

/// A request as read by the worker binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum WorkerRequest {
    Analyze(AnalyzeRequest),
    Clip(ClipRequest),
    Render(RenderRequest),
    Process(ProcessRequest),
}

/// Operation named by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Analyze,
    Clip,
    Render,
    Process,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Analyze => "analyze",
            Operation::Clip => "clip",
            Operation::Render => "render",
            Operation::Process => "process",
        }
    }
}

impl WorkerRequest {
    pub fn operation(&self) -> Operation {
        match self {
            WorkerRequest::Analyze(_) => Operation::Analyze,
            WorkerRequest::Clip(_) => Operation::Clip,
            WorkerRequest::Render(_) => Operation::Render,
            WorkerRequest::Process(_) => Operation::Process,
        }
    }
}

/// Failure of an operation whose success response has no status field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
    pub error_kind: ErrorKind,
}

/// Response written by the worker binary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkerResponse {
    Analysis(AnalysisResponse),
    Clip(ClipResponse),
    Render(RenderResponse),
    Process(ProcessResponse),
    Failure(FailureResponse),
}

impl WorkerResponse {
    /// Failure response shaped for `operation`.
    pub fn failure(operation: Operation, kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match operation {
            Operation::Analyze => WorkerResponse::Failure(FailureResponse {
                success: false,
                error: message,
                error_kind: kind,
            }),
            Operation::Clip => WorkerResponse::Clip(ClipResponse::failure(kind, message)),
            Operation::Render => WorkerResponse::Render(RenderResponse::failure(kind, message)),
            Operation::Process => WorkerResponse::Process(ProcessResponse::failure(kind, message)),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            WorkerResponse::Analysis(_) => true,
            WorkerResponse::Clip(r) => r.success,
            WorkerResponse::Render(r) => r.success,
            WorkerResponse::Process(r) => r.success,
            WorkerResponse::Failure(_) => false,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            WorkerResponse::Analysis(_) => None,
            WorkerResponse::Clip(r) => r.error_kind,
            WorkerResponse::Render(r) => r.error_kind,
            WorkerResponse::Process(r) => r.error_kind,
            WorkerResponse::Failure(r) => Some(r.error_kind),
        }
    }
}

/// Default output for a clip: `{stem}_clip_{start}s.mp4`.
pub fn default_clip_path(output_dir: &Path, video: &Path, start_time: f64) -> PathBuf {
    output_dir.join(format!("{}_clip_{}s.mp4", file_stem(video), start_time as u64))
}

/// Default output for a full render: `{stem}_cropped.mp4`.
pub fn default_render_path(output_dir: &Path, video: &Path) -> PathBuf {
    output_dir.join(format!("{}_cropped.mp4", file_stem(video)))
}

fn file_stem(video: &Path) -> String {
    video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string())
}

/// Span of source time covered by a frame range.
pub fn render_window(range: FrameRange, fps: f64) -> RenderWindow {
    RenderWindow {
        start_time: boundary::frame_time(range.start, fps),
        duration: boundary::frame_time(range.len(), fps),
        fps,
    }
}

/// Mode the output really has, and why it differs from the request.
fn applied_mode(plan: &CropPlan, encoded: &EncodeOutcome) -> (CropMode, Option<String>) {
    if plan.applied_mode() == CropMode::Dynamic && encoded.applied_mode == CropMode::Static {
        return (
            CropMode::Static,
            Some(strategy::PER_FRAME_UNSUPPORTED.to_string()),
        );
    }
    (
        encoded.applied_mode,
        plan.fallback_reason().map(str::to_string),
    )
}

async fn ensure_parent(path: &Path) -> WorkerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Runs requests against a shared [`ProcessingContext`].
#[derive(Clone)]
pub struct RequestProcessor {
    ctx: Arc<ProcessingContext>,
}

impl RequestProcessor {
    pub fn new(ctx: Arc<ProcessingContext>) -> Self {
        Self { ctx }
    }

    /// Run one request to completion. Never panics on bad input; every
    /// failure is folded into the response.
    pub async fn handle(&self, request: WorkerRequest, cancel: CancelSignal) -> WorkerResponse {
        let operation = request.operation();
        let logger = RequestLogger::new(operation.as_str());
        let span = logger.create_span();
        let started = Instant::now();
        let timeout = self.ctx.config.request_timeout;

        let response = async {
            match tokio::time::timeout(timeout, self.dispatch(request, &cancel, &logger)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    logger.log_error(&e.to_string());
                    WorkerResponse::failure(operation, e.kind(), e.to_string())
                }
                Err(_) => {
                    let e = WorkerError::Timeout(timeout.as_secs());
                    logger.log_error(&e.to_string());
                    WorkerResponse::failure(operation, e.kind(), e.to_string())
                }
            }
        }
        .instrument(span)
        .await;

        let outcome = match response.error_kind() {
            None => "success",
            Some(kind) => kind.as_str(),
        };
        metrics::record_request(
            operation.as_str(),
            outcome,
            started.elapsed().as_secs_f64(),
        );
        response
    }

    async fn dispatch(
        &self,
        request: WorkerRequest,
        cancel: &CancelSignal,
        logger: &RequestLogger,
    ) -> WorkerResult<WorkerResponse> {
        Ok(match request {
            WorkerRequest::Analyze(r) => {
                WorkerResponse::Analysis(self.analyze(&r, cancel, logger).await?)
            }
            WorkerRequest::Clip(r) => WorkerResponse::Clip(self.clip(&r, cancel, logger).await?),
            WorkerRequest::Render(r) => {
                WorkerResponse::Render(self.render(&r, cancel, logger).await?)
            }
            WorkerRequest::Process(r) => {
                WorkerResponse::Process(self.process(&r, cancel, logger).await?)
            }
        })
    }

    /// Whole-video analysis.
    pub async fn analyze(
        &self,
        request: &AnalyzeRequest,
        cancel: &CancelSignal,
        logger: &RequestLogger,
    ) -> WorkerResult<AnalysisResponse> {
        let request = request.validated()?;
        logger.log_start(&format!(
            "{} -> {}",
            request.video_path.display(),
            request.aspect
        ));

        let info = probe_video(&request.video_path).await?;
        let range = FrameRange::whole(info.require_frame_count()?);
        let lease = self.ctx.lease().await?;
        let outcome = self
            .plan(
                &lease,
                &request.video_path,
                &info,
                range,
                request.aspect,
                AnalysisScope::WholeVideo,
                CropMode::Static,
                cancel,
                logger,
            )
            .await?;
        drop(lease);

        let response = AnalysisResponse {
            video_metadata: metadata(&info, &outcome, request.aspect),
            crop_data: outcome.crop_data(),
            smoothed_centers: outcome.smoothed_centers(),
        };
        logger.log_completion(&format!("{} crop windows", response.crop_data.len()));
        Ok(response)
    }

    /// Clip extraction with planning and rendering.
    pub async fn clip(
        &self,
        request: &ClipRequest,
        cancel: &CancelSignal,
        logger: &RequestLogger,
    ) -> WorkerResult<ClipResponse> {
        let request = request.validated()?;
        logger.log_start(&format!(
            "{} [{:.2}s-{:.2}s] {} {}",
            request.video_path.display(),
            request.time_range.start_time,
            request.time_range.end_time,
            request.aspect,
            request.crop_mode
        ));

        let info = probe_video(&request.video_path).await?;
        let source = info.dimensions();
        logger.log_progress(&format!(
            "Source {} ({}), {:.2} fps, {} frames",
            source,
            classify_format(source),
            info.fps,
            info.frame_count
        ));

        let total_frames = info.require_frame_count()?;
        let range = boundary::frame_range(request.time_range, info.fps, total_frames)?;
        let output = request.output_path.clone().unwrap_or_else(|| {
            default_clip_path(
                &self.ctx.config.output_dir,
                &request.video_path,
                request.time_range.start_time,
            )
        });
        ensure_parent(&output).await?;

        let lease = self.ctx.lease().await?;
        let outcome = self
            .plan(
                &lease,
                &request.video_path,
                &info,
                range,
                request.aspect,
                AnalysisScope::Clip,
                request.crop_mode,
                cancel,
                logger,
            )
            .await?;

        let window = render_window(range, info.fps);
        let encoded = self
            .ctx
            .encoder()
            .encode(&request.video_path, &output, &outcome.plan, window, cancel)
            .await?;
        drop(lease);

        let (crop_mode, fallback_reason) = applied_mode(&outcome.plan, &encoded);
        logger.log_completion(&format!(
            "{} ({} bytes, {})",
            encoded.output_path.display(),
            encoded.file_size,
            crop_mode
        ));

        Ok(ClipResponse {
            success: true,
            output_path: Some(encoded.output_path.display().to_string()),
            crop_mode: Some(crop_mode),
            requested_crop_mode: Some(request.crop_mode),
            fallback_reason,
            duration: Some(window.duration),
            crop_dimensions: Some(outcome.plan.crop().into()),
            file_size: Some(encoded.file_size),
            start_time: Some(window.start_time),
            end_time: Some(window.start_time + window.duration),
            error: None,
            error_kind: None,
        })
    }

    /// Render a previously produced crop list.
    pub async fn render(
        &self,
        request: &RenderRequest,
        cancel: &CancelSignal,
        logger: &RequestLogger,
    ) -> WorkerResult<RenderResponse> {
        let request = request.validated()?;
        logger.log_start(&format!(
            "{} ({} crop windows, {})",
            request.video_path.display(),
            request.crop_data.len(),
            request.crop_mode
        ));

        let info = probe_video(&request.video_path).await?;
        let (plan, range) = strategy::plan_from_crop_data(
            &request.crop_data,
            info.dimensions(),
            request.crop_mode,
            self.ctx.encoder().supports_per_frame_positions(),
        )?;
        self.report_strategy(&plan, logger);

        let output = request
            .output_path
            .clone()
            .unwrap_or_else(|| default_render_path(&self.ctx.config.output_dir, &request.video_path));
        ensure_parent(&output).await?;

        let lease = self.ctx.lease().await?;
        let encoded = self
            .ctx
            .encoder()
            .encode(
                &request.video_path,
                &output,
                &plan,
                render_window(range, info.fps),
                cancel,
            )
            .await?;
        drop(lease);

        logger.log_completion(&encoded.output_path.display().to_string());
        Ok(render_response(&plan, &encoded, request.crop_mode))
    }

    /// Whole-video analysis followed by a render of the resulting plan.
    pub async fn process(
        &self,
        request: &ProcessRequest,
        cancel: &CancelSignal,
        logger: &RequestLogger,
    ) -> WorkerResult<ProcessResponse> {
        let (analyze, crop_mode, output) = request.validated()?;
        logger.log_start(&format!(
            "{} -> {} {}",
            analyze.video_path.display(),
            analyze.aspect,
            crop_mode
        ));

        let info = probe_video(&analyze.video_path).await?;
        let range = FrameRange::whole(info.require_frame_count()?);
        let output = output
            .unwrap_or_else(|| default_render_path(&self.ctx.config.output_dir, &analyze.video_path));
        ensure_parent(&output).await?;

        let lease = self.ctx.lease().await?;
        let outcome = self
            .plan(
                &lease,
                &analyze.video_path,
                &info,
                range,
                analyze.aspect,
                AnalysisScope::WholeVideo,
                crop_mode,
                cancel,
                logger,
            )
            .await?;

        logger.log_progress("Rendering planned crop");
        let encoded = self
            .ctx
            .encoder()
            .encode(
                &analyze.video_path,
                &output,
                &outcome.plan,
                render_window(range, info.fps),
                cancel,
            )
            .await?;
        drop(lease);

        logger.log_completion(&encoded.output_path.display().to_string());
        Ok(ProcessResponse {
            success: true,
            video_metadata: Some(metadata(&info, &outcome, analyze.aspect)),
            render: Some(render_response(&outcome.plan, &encoded, crop_mode)),
            error: None,
            error_kind: None,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn plan(
        &self,
        lease: &RequestLease,
        video_path: &Path,
        info: &VideoInfo,
        range: FrameRange,
        aspect: AspectPreset,
        scope: AnalysisScope,
        crop_mode: CropMode,
        cancel: &CancelSignal,
        logger: &RequestLogger,
    ) -> WorkerResult<PlanOutcome> {
        let request = PlanRequest {
            source: info.dimensions(),
            range,
            aspect: aspect.ratio(),
            scope,
            crop_mode,
        };
        let analysis_height = self.ctx.planner.config().analysis_height;
        let open_frames = |stride: u64| -> MediaResult<Box<dyn FrameSource>> {
            let source = FfmpegFrameSource::open(video_path, info, range, stride, analysis_height)?;
            Ok(Box::new(source) as Box<dyn FrameSource>)
        };

        let outcome = self
            .ctx
            .planner
            .plan(
                &request,
                lease.detector(),
                open_frames,
                self.ctx.encoder().supports_per_frame_positions(),
                cancel,
            )
            .await?;

        if let Some(smoothed) = &outcome.smoothed {
            metrics::record_sampled_frames(logger.operation(), smoothed.len());
        }
        self.report_strategy(&outcome.plan, logger);
        Ok(outcome)
    }

    fn report_strategy(&self, plan: &CropPlan, logger: &RequestLogger) {
        if plan.requested_mode() != plan.applied_mode() {
            metrics::record_strategy_fallback(plan.requested_mode(), plan.applied_mode());
        }
        if let Some(reason) = plan.fallback_reason() {
            logger.log_warning(&format!(
                "requested {} crop, applying {}: {}",
                plan.requested_mode(),
                plan.applied_mode(),
                reason
            ));
        }
    }
}

fn metadata(info: &VideoInfo, outcome: &PlanOutcome, aspect: AspectPreset) -> AnalysisMetadata {
    AnalysisMetadata {
        width: outcome.source.width,
        height: outcome.source.height,
        fps: info.fps,
        total_frames: info.frame_count,
        duration: info.duration,
        crop_width: outcome.decision.crop.width,
        crop_height: outcome.decision.crop.height,
        track_subject: outcome.decision.track_subject,
        aspect_ratio: aspect.as_str().to_string(),
    }
}

fn render_response(plan: &CropPlan, encoded: &EncodeOutcome, requested: CropMode) -> RenderResponse {
    let (crop_mode, fallback_reason) = applied_mode(plan, encoded);
    RenderResponse {
        success: true,
        output_path: Some(encoded.output_path.display().to_string()),
        crop_mode: Some(crop_mode),
        requested_crop_mode: Some(requested),
        fallback_reason,
        crop_dimensions: Some(plan.crop().into()),
        file_size: Some(encoded.file_size),
        error: None,
        error_kind: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use reframe_media::{CenterHeuristicDetector, FfmpegEncoder};
    use reframe_models::CropDataEntry;

    fn processor() -> RequestProcessor {
        let ctx = ProcessingContext::with_components(
            WorkerConfig::default(),
            Arc::new(CenterHeuristicDetector::new()),
            Arc::new(FfmpegEncoder::new(false)),
        );
        RequestProcessor::new(Arc::new(ctx))
    }

    fn parse(json: &str) -> WorkerRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_request_tagged_by_operation() {
        let request = parse(
            r#"{"operation": "clip", "video_path": "/v/talk.mp4", "start_time": 1.5, "end_time": 4.0, "crop_mode": "dynamic"}"#,
        );
        assert_eq!(request.operation(), Operation::Clip);
        match request {
            WorkerRequest::Clip(clip) => {
                assert_eq!(clip.start_time, 1.5);
                assert_eq!(clip.crop_mode.as_deref(), Some("dynamic"));
            }
            other => panic!("unexpected request: {:?}", other),
        }

        assert!(serde_json::from_str::<WorkerRequest>(r#"{"operation": "transcribe"}"#).is_err());
    }

    #[test]
    fn test_default_output_paths() {
        let dir = Path::new("/out");
        assert_eq!(
            default_clip_path(dir, Path::new("/videos/talk.mp4"), 12.9),
            PathBuf::from("/out/talk_clip_12s.mp4")
        );
        assert_eq!(
            default_render_path(dir, Path::new("/videos/talk.mp4")),
            PathBuf::from("/out/talk_cropped.mp4")
        );
    }

    #[test]
    fn test_render_window() {
        let window = render_window(FrameRange::new(30, 120), 30.0);
        assert_eq!(window.start_time, 1.0);
        assert_eq!(window.duration, 3.0);
    }

    #[test]
    fn test_failure_shapes() {
        let analyze = WorkerResponse::failure(Operation::Analyze, ErrorKind::NotFound, "missing");
        let json = serde_json::to_value(&analyze).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_kind"], "not_found");

        let clip = WorkerResponse::failure(Operation::Clip, ErrorKind::Timeout, "slow");
        assert!(!clip.is_success());
        assert_eq!(clip.error_kind(), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_invalid_aspect_fails_fast() {
        let response = processor()
            .handle(
                parse(
                    r#"{"operation": "clip", "video_path": "/nonexistent/talk.mp4", "start_time": 0, "end_time": 5, "aspect_ratio": "3:2"}"#,
                ),
                CancelSignal::never(),
            )
            .await;

        // The path does not exist, so a not-found kind would mean the
        // source was touched before validation.
        assert_eq!(response.error_kind(), Some(ErrorKind::InvalidRequest));
    }

    #[tokio::test]
    async fn test_bad_time_range_rejected() {
        let response = processor()
            .handle(
                parse(
                    r#"{"operation": "clip", "video_path": "/nonexistent/talk.mp4", "start_time": 8, "end_time": 5}"#,
                ),
                CancelSignal::never(),
            )
            .await;
        assert_eq!(response.error_kind(), Some(ErrorKind::InvalidRequest));
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let response = processor()
            .handle(
                parse(r#"{"operation": "analyze", "video_path": "/nonexistent/talk.mp4"}"#),
                CancelSignal::never(),
            )
            .await;
        assert!(matches!(response, WorkerResponse::Failure(_)));
        assert_eq!(response.error_kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_empty_crop_data_rejected() {
        let response = processor()
            .handle(
                parse(r#"{"operation": "render", "video_path": "/nonexistent/talk.mp4", "crop_data": []}"#),
                CancelSignal::never(),
            )
            .await;
        assert!(matches!(response, WorkerResponse::Render(_)));
        assert_eq!(response.error_kind(), Some(ErrorKind::InvalidRequest));
    }

    #[test]
    fn test_applied_mode_reports_encoder_collapse() {
        let entries: Vec<CropDataEntry> = [(0, 100), (1, 110)]
            .iter()
            .map(|&(frame, x)| CropDataEntry {
                frame,
                x,
                y: 0,
                width: 607,
                height: 1080,
                center_x: x as f64 + 303.5,
            })
            .collect();
        let (plan, _) = strategy::plan_from_crop_data(
            &entries,
            reframe_models::Dimensions::new(1920, 1080),
            CropMode::Dynamic,
            true,
        )
        .unwrap();
        assert_eq!(plan.applied_mode(), CropMode::Dynamic);

        let encoded = EncodeOutcome {
            output_path: PathBuf::from("/out/x.mp4"),
            file_size: 10,
            applied_mode: CropMode::Static,
        };
        let (mode, reason) = applied_mode(&plan, &encoded);
        assert_eq!(mode, CropMode::Static);
        assert_eq!(reason.as_deref(), Some(strategy::PER_FRAME_UNSUPPORTED));
    }
}
