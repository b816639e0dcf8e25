//! Fixed policies, mostly useful for tests and tight loops.

use super::Backoff;
use std::time::Duration;

/// Retry immediately, forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroBackoff;

impl Backoff for ZeroBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    fn reset(&mut self) {}
}

/// Same wait every time, forever.
#[derive(Debug, Clone, Copy)]
pub struct ConstantBackoff(pub Duration);

impl Backoff for ConstantBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        Some(self.0)
    }

    fn reset(&mut self) {}
}

/// Never retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopBackoff;

impl Backoff for StopBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}

/// Caps another policy at `max_retries` waits per reset.
#[derive(Debug, Clone)]
pub struct WithMaxRetries<B> {
    inner: B,
    max_retries: u32,
    used: u32,
}

impl<B: Backoff> WithMaxRetries<B> {
    pub fn new(inner: B, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            used: 0,
        }
    }
}

impl<B: Backoff> Backoff for WithMaxRetries<B> {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.used >= self.max_retries {
            return None;
        }
        self.used += 1;
        self.inner.next_backoff()
    }

    fn reset(&mut self) {
        self.used = 0;
        self.inner.reset();
    }
}
