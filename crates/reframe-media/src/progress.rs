//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Completed fraction of a clip of the given length, 0.0 - 1.0.
    pub fn fraction_of(&self, total_secs: f64) -> f64 {
        if total_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / 1000.0 / total_secs).clamp(0.0, 1.0)
    }

    /// Feed one stderr line. Returns a snapshot at each `progress=` marker,
    /// `None` for other lines.
    pub fn update(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                self.is_complete = value == "end";
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }

    /// Whether a stderr line belongs to the `-progress` key/value stream.
    pub fn is_progress_line(line: &str) -> bool {
        line.split_once('=')
            .map(|(key, _)| {
                !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_updates() {
        let mut progress = FfmpegProgress::default();
        assert!(progress.update("frame=120").is_none());
        assert!(progress.update("out_time_us=5000000").is_none());
        assert!(progress.update("speed=1.5x").is_none());

        let snapshot = progress.update("progress=continue").unwrap();
        assert_eq!(snapshot.frame, 120);
        assert!((snapshot.fraction_of(10.0) - 0.5).abs() < 1e-9);
        assert!((snapshot.speed - 1.5).abs() < 1e-9);
        assert!(!snapshot.is_complete);

        assert!(progress.update("progress=end").unwrap().is_complete);
    }

    #[test]
    fn test_progress_line_detection() {
        assert!(FfmpegProgress::is_progress_line("bitrate=N/A"));
        assert!(!FfmpegProgress::is_progress_line(
            "[libx264 @ 0x5] Error: width not divisible by 2 (607x1080)"
        ));
    }
}
