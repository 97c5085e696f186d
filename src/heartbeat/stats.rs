//! Running latency statistics.

use std::time::Duration;

use serde::Serialize;

/// Mean and standard deviation of the session-listing latency, updated in
/// constant space with Welford's method.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeartbeatStats {
    count: u64,
    mean: f64,
    m2: f64,
}

/// Snapshot of [`HeartbeatStats`] for logging.
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct StatsSummary {
    /// Number of completed ticks.
    pub num_calls: u64,
    /// Mean session-listing latency in seconds.
    pub avg_time: f64,
    /// Population standard deviation of that latency in seconds.
    pub std_dev: f64,
}

impl HeartbeatStats {
    /// Adds one latency sample.
    #[expect(
        clippy::float_arithmetic,
        reason = "running mean and variance are inherently floating point"
    )]
    #[expect(
        clippy::cast_precision_loss,
        reason = "tick counts stay far below 2^52"
    )]
    pub fn record(&mut self, elapsed: Duration) {
        let sample = elapsed.as_secs_f64();
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (sample - self.mean);
    }

    /// Number of recorded samples.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Current summary; zeros before the first sample.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "variance is derived from the running sum of squares"
    )]
    #[expect(
        clippy::cast_precision_loss,
        reason = "tick counts stay far below 2^52"
    )]
    pub fn summary(&self) -> StatsSummary {
        let std_dev = if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        };
        StatsSummary {
            num_calls: self.count,
            avg_time: self.mean,
            std_dev,
        }
    }
}
