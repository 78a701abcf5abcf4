//! Frame decoder exit handling, driven by a stand-in `ffmpeg` script.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Mutex;

use reframe_media::planner::{AnalysisScope, PlanRequest};
use reframe_media::{
    CancelSignal, CenterHeuristicDetector, CropPlanner, FfmpegFrameSource, FrameSource,
    MediaError, VideoInfo,
};
use reframe_models::{AspectRatio, CropMode, Dimensions, ErrorKind, FrameRange};
use tempfile::TempDir;

/// PATH is process-wide; decoders are spawned one at a time.
static PATH_LOCK: Mutex<()> = Mutex::new(());

/// One 64x36 rgb24 frame.
const ONE_FRAME: &str = "head -c 6912 /dev/zero";

fn info() -> VideoInfo {
    VideoInfo {
        duration: 4.0,
        width: 64,
        height: 36,
        coded_width: 64,
        coded_height: 36,
        rotation: 0,
        fps: 25.0,
        frame_count: 100,
        codec: "h264".to_string(),
        size: 1024,
        bitrate: 0,
    }
}

/// Open a decoder whose `ffmpeg` is a shell script with the given body.
fn open_scripted(body: &str, range: FrameRange, stride: u64) -> (FfmpegFrameSource, TempDir) {
    let _guard = PATH_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("ffmpeg");
    std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let original = std::env::var_os("PATH").unwrap_or_default();
    let mut paths = vec![dir.path().to_path_buf()];
    paths.extend(std::env::split_paths(&original));
    std::env::set_var("PATH", std::env::join_paths(paths).unwrap());

    let source = FfmpegFrameSource::open(Path::new("input.mp4"), &info(), range, stride, 360);
    std::env::set_var("PATH", original);

    (source.unwrap(), dir)
}

async fn plan_with(source: FfmpegFrameSource, range: FrameRange) -> Result<usize, MediaError> {
    let request = PlanRequest {
        source: Dimensions::new(1920, 1080),
        range,
        aspect: AspectRatio::PORTRAIT,
        scope: AnalysisScope::Clip,
        crop_mode: CropMode::Static,
    };
    CropPlanner::default()
        .plan(
            &request,
            &CenterHeuristicDetector::new(),
            move |_| Ok(Box::new(source) as Box<dyn FrameSource>),
            false,
            &CancelSignal::never(),
        )
        .await
        .map(|outcome| outcome.dense.len())
}

#[tokio::test]
async fn test_decoder_crash_mid_range_fails_plan() {
    let range = FrameRange::new(0, 100);
    let stride = CropPlanner::default().config().stride();
    let (source, _dir) = open_scripted(
        &format!(
            "{}\necho 'Error while decoding stream #0:0' >&2\nexit 1",
            ONE_FRAME
        ),
        range,
        stride,
    );

    let err = plan_with(source, range).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
    match err {
        MediaError::FfmpegFailed {
            command,
            stderr,
            exit_code,
            ..
        } => {
            assert!(command.starts_with("ffmpeg "));
            assert_eq!(exit_code, Some(1));
            assert!(stderr.unwrap_or_default().contains("Error while decoding"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_decoder_failing_before_first_frame_keeps_stderr() {
    let range = FrameRange::new(0, 100);
    let stride = CropPlanner::default().config().stride();
    let (source, _dir) = open_scripted(
        "echo 'input.mp4: Invalid data found when processing input' >&2\nexit 1",
        range,
        stride,
    );

    let err = plan_with(source, range).await.unwrap_err();
    assert!(matches!(err, MediaError::FfmpegFailed { .. }));
    assert!(err.stderr().unwrap_or_default().contains("Invalid data"));
}

#[tokio::test]
async fn test_short_source_with_clean_exit_is_accepted() {
    let range = FrameRange::new(0, 100);
    let (mut source, _dir) = open_scripted(&format!("{}\nexit 0", ONE_FRAME), range, 5);

    let first = source.next_frame().await.unwrap().unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(first.dimensions(), Dimensions::new(64, 36));
    assert!(source.next_frame().await.unwrap().is_none());
    source.finish().await.unwrap();
}
