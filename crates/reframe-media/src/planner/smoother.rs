//! Position smoothing.
//!
//! Both strategies return exactly one output per input value:
//! - [`moving_average`]: centered window, edges averaged over the samples
//!   actually available instead of zero-padded
//! - [`RecursiveFilter`]: causal single-state estimator seeded by the first
//!   measurement

use serde::{Deserialize, Serialize};

use super::config::{AnalysisScope, PlannerConfig, SmootherKind};

/// A configured smoothing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Smoother {
    MovingAverage {
        window: usize,
    },
    Recursive {
        process_variance: f64,
        measurement_variance: f64,
    },
}

impl Smoother {
    /// Strategy configured for a request scope.
    pub fn from_config(config: &PlannerConfig, scope: AnalysisScope) -> Self {
        match config.smoother {
            SmootherKind::MovingAverage => Smoother::MovingAverage {
                window: config.window_for(scope),
            },
            SmootherKind::Recursive => Smoother::Recursive {
                process_variance: config.process_variance,
                measurement_variance: config.measurement_variance,
            },
        }
    }

    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        match *self {
            Smoother::MovingAverage { window } => moving_average(values, window),
            Smoother::Recursive {
                process_variance,
                measurement_variance,
            } => recursive_smooth(values, process_variance, measurement_variance),
        }
    }
}

/// Window actually used for `count` samples: the configured window, or
/// `max(3, count / 2)` when there are fewer samples than that.
pub fn effective_window(count: usize, window: usize) -> usize {
    if count < window {
        (count / 2).max(3)
    } else {
        window.max(1)
    }
}

/// Centered moving average with edge correction.
///
/// With `half = w / 2`, index `j` averages:
/// - `values[0..=j + half]` when `j < half`
/// - `values[j - half..]` when `j >= n - half`
/// - `values[j - half..=j + (w - 1) / 2]` otherwise
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if n <= 1 {
        return values.to_vec();
    }

    let w = effective_window(n, window);
    let half = w / 2;
    let right = (w - 1) / 2;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for v in values {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v);
    }
    let mean = |lo: usize, hi: usize| (prefix[hi] - prefix[lo]) / (hi - lo) as f64;

    (0..n)
        .map(|j| {
            if j < half {
                mean(0, (j + half).min(n - 1) + 1)
            } else if j >= n - half.min(n) {
                mean(j - half, n)
            } else {
                mean(j - half, j + right + 1)
            }
        })
        .collect()
}

/// Single-state recursive estimator with process and measurement variance.
#[derive(Debug, Clone)]
pub struct RecursiveFilter {
    process_variance: f64,
    measurement_variance: f64,
    estimate: Option<f64>,
    error: f64,
}

impl RecursiveFilter {
    pub fn new(process_variance: f64, measurement_variance: f64) -> Self {
        Self {
            process_variance,
            measurement_variance,
            estimate: None,
            error: 1.0,
        }
    }

    /// Fold one measurement in and return the new estimate.
    pub fn update(&mut self, measurement: f64) -> f64 {
        let Some(estimate) = self.estimate else {
            self.estimate = Some(measurement);
            return measurement;
        };

        let predicted_error = self.error + self.process_variance;
        let gain = predicted_error / (predicted_error + self.measurement_variance);
        let next = estimate + gain * (measurement - estimate);

        self.error = (1.0 - gain) * predicted_error;
        self.estimate = Some(next);
        next
    }
}

/// Run a fresh [`RecursiveFilter`] over `values`.
pub fn recursive_smooth(values: &[f64], process_variance: f64, measurement_variance: f64) -> Vec<f64> {
    let mut filter = RecursiveFilter::new(process_variance, measurement_variance);
    values.iter().map(|v| filter.update(*v)).collect()
}
