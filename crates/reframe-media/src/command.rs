//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Number of stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 30;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    /// Output path, or `pipe:1` for stdout
    output: String,
    /// Arguments placed before -i
    input_args: Vec<String>,
    /// Arguments placed after -i
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
    /// Emit `-progress pipe:2`
    progress: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to a file.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_string_lossy().to_string(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
            progress: true,
        }
    }

    /// Create a command whose output is written to stdout.
    pub fn to_stdout(input: impl AsRef<Path>) -> Self {
        Self {
            output: "pipe:1".to_string(),
            progress: false,
            ..Self::new(input, "")
        }
    }

    /// Add one argument before -i.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add one argument after -i.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add several arguments after -i.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Input seek position.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.6}", seconds))
    }

    /// Output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.6}", seconds))
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        if self.progress {
            args.push("-progress".to_string());
            args.push("pipe:2".to_string());
        }

        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.clone());

        args
    }

    /// Shell-like rendering for logs and error reports.
    pub fn describe(&self) -> String {
        describe_command("ffmpeg", &self.build_args())
    }

    /// Spawn the process with piped stdout/stderr. The child is killed
    /// when its handle is dropped.
    pub fn spawn(&self) -> MediaResult<tokio::process::Child> {
        check_ffmpeg()?;
        let args = self.build_args();
        debug!("Spawning {}", describe_command("ffmpeg", &args));

        Ok(Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?)
    }
}

/// Join a program and its arguments, quoting arguments containing spaces.
pub fn describe_command(program: &str, args: &[String]) -> String {
    let mut out = program.to_string();
    for arg in args {
        out.push(' ');
        if arg.contains(' ') || arg.is_empty() {
            out.push('\'');
            out.push_str(arg);
            out.push('\'');
        } else {
            out.push_str(arg);
        }
    }
    out
}

/// Drain a child's stderr, forwarding progress snapshots and keeping the
/// last diagnostic lines.
pub(crate) fn collect_stderr<R, F>(stderr: R, on_progress: F) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
    F: Fn(FfmpegProgress) + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr).lines();
        let mut progress = FfmpegProgress::default();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        while let Ok(Some(line)) = reader.next_line().await {
            if FfmpegProgress::is_progress_line(&line) {
                if let Some(snapshot) = progress.update(&line) {
                    on_progress(snapshot);
                }
                continue;
            }
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        tail.into_iter().collect::<Vec<_>>().join("\n")
    })
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut(u64),
}

/// Runner for FFmpeg commands with cancellation and timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    cancel: CancelSignal,
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        self.cancel.check()?;

        let command = cmd.describe();
        let mut child = cmd.spawn()?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr was not captured"))?;
        let stderr_task = collect_stderr(stderr, progress_callback);

        let timeout = async {
            match self.timeout_secs {
                Some(secs) => {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    secs
                }
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = self.cancel.cancelled() => Outcome::Cancelled,
            secs = timeout => Outcome::TimedOut(secs),
        };

        match outcome {
            Outcome::Exited(status) => {
                let status = status?;
                let stderr = stderr_task.await.unwrap_or_default();
                if status.success() {
                    Ok(())
                } else {
                    Err(MediaError::ffmpeg_failed(
                        format!("FFmpeg exited with {}", status),
                        command,
                        Some(stderr).filter(|s| !s.is_empty()),
                        status.code(),
                    ))
                }
            }
            Outcome::Cancelled => {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                stderr_task.abort();
                Err(MediaError::Cancelled)
            }
            Outcome::TimedOut(secs) => {
                warn!("FFmpeg timed out after {} seconds, killing process", secs);
                let _ = child.kill().await;
                stderr_task.abort();
                Err(MediaError::Timeout(secs))
            }
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .duration(30.0)
            .video_codec("libx264")
            .crf(18);

        let args = cmd.build_args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert!(ss < input && input < t);
        assert_eq!(args[ss + 1], "10.000000");
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "output.mp4");
        assert!(args.contains(&"-progress".to_string()));
    }

    #[test]
    fn test_stdout_command_has_no_progress() {
        let args = FfmpegCommand::to_stdout("input.mp4")
            .output_args(["-f", "rawvideo"])
            .build_args();
        assert_eq!(args.last().unwrap(), "pipe:1");
        assert!(!args.contains(&"-progress".to_string()));
    }

    #[test]
    fn test_describe_quotes_spaces() {
        let text = describe_command(
            "ffmpeg",
            &["-i".to_string(), "my clip.mp4".to_string()],
        );
        assert_eq!(text, "ffmpeg -i 'my clip.mp4'");
    }

    #[tokio::test]
    async fn test_stderr_tail_skips_progress() {
        let input: &[u8] = b"frame=1\nprogress=continue\nError opening input\nprogress=end\n";
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = seen.clone();
        let tail = collect_stderr(input, move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert_eq!(tail, "Error opening input");
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
