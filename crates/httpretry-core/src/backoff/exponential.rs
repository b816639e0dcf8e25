//! Randomized exponential backoff with an elapsed-time budget.

use super::Backoff;
use rand::Rng;
use std::time::{Duration, Instant};

/// Exponential backoff: each wait is the current interval randomized by
/// `randomization_factor`, after which the interval grows by `multiplier`
/// up to `max_interval`. Stops once `max_elapsed_time` has passed since the
/// last reset.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// First interval after a reset.
    pub initial_interval: Duration,
    /// Jitter applied to each wait: `interval * [1 - f, 1 + f]`.
    pub randomization_factor: f64,
    /// Growth factor applied after each wait.
    pub multiplier: f64,
    /// Upper bound on the (unrandomized) interval.
    pub max_interval: Duration,
    /// Total budget since the last reset; `None` never stops.
    pub max_elapsed_time: Option<Duration>,
    current_interval: Duration,
    start: Instant,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(500),
            1.5,
            Duration::from_secs(60),
            Some(Duration::from_secs(15 * 60)),
        )
    }
}

impl ExponentialBackoff {
    /// Backoff with the default randomization factor (0.5).
    pub fn new(
        initial_interval: Duration,
        multiplier: f64,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
    ) -> Self {
        Self {
            initial_interval,
            randomization_factor: 0.5,
            multiplier,
            max_interval,
            max_elapsed_time,
            current_interval: initial_interval,
            start: Instant::now(),
        }
    }

    /// Same policy with a different randomization factor (0 disables jitter).
    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Time since the last reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Interval the next wait is derived from.
    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    fn randomized(&self) -> Duration {
        let base = self.current_interval.as_secs_f64();
        if self.randomization_factor <= 0.0 || base == 0.0 {
            return self.current_interval;
        }
        let delta = base * self.randomization_factor;
        let secs = rand::thread_rng().gen_range((base - delta)..=(base + delta));
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn grow(&mut self) {
        let next = self.current_interval.as_secs_f64() * self.multiplier;
        if next >= self.max_interval.as_secs_f64() {
            self.current_interval = self.max_interval;
        } else {
            self.current_interval = Duration::from_secs_f64(next);
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_elapsed_time {
            if self.elapsed() > max {
                return None;
            }
        }
        let wait = self.randomized();
        self.grow();
        Some(wait)
    }

    fn reset(&mut self) {
        self.current_interval = self.initial_interval;
        self.start = Instant::now();
    }
}
