//! Sparse to dense trajectory expansion.

use reframe_models::FrameRange;

use super::models::{DenseTrajectory, SparseTrajectory};
use crate::error::{MediaError, MediaResult};

/// Linearly interpolate `sparse` at every frame of `range`.
///
/// Frames before the first sample take the first value and frames after
/// the last sample take the last value. Sample frames are strictly
/// increasing, so one forward pass suffices.
pub fn interpolate(sparse: &SparseTrajectory, range: FrameRange) -> MediaResult<DenseTrajectory> {
    let samples = sparse.samples();
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Err(MediaError::EmptyTrajectory(format!(
            "no samples to interpolate over frames {}..{}",
            range.start, range.end
        )));
    };
    if range.is_empty() {
        return Err(MediaError::invalid_request(format!(
            "empty frame range {}..{}",
            range.start, range.end
        )));
    }

    let mut positions = Vec::with_capacity(range.len() as usize);
    let mut segment = 0;

    for frame in range.start..range.end {
        let x = if frame <= first.frame {
            first.x
        } else if frame >= last.frame {
            last.x
        } else {
            while samples[segment + 1].frame < frame {
                segment += 1;
            }
            let (a, b) = (samples[segment], samples[segment + 1]);
            let t = (frame - a.frame) as f64 / (b.frame - a.frame) as f64;
            a.x + (b.x - a.x) * t
        };
        positions.push(x);
    }

    Ok(DenseTrajectory {
        start_frame: range.start,
        positions,
    })
}
