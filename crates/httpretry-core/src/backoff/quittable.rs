//! Backoff wrapper with a one-way "done" latch.

use super::Backoff;
use std::time::Duration;

/// What to do before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextWait {
    /// Sleep for the duration, then try again.
    Wait(Duration),
    /// No further attempts.
    Stop,
}

/// Wraps a [`Backoff`] and adds a latch that disables further waits.
///
/// Once [`mark_done`](Self::mark_done) is called, [`next_wait`](Self::next_wait)
/// returns [`NextWait::Stop`] until [`reset`](Self::reset), whatever the inner
/// policy would say.
pub struct QuittableBackoff {
    inner: Box<dyn Backoff>,
    done: bool,
}

impl QuittableBackoff {
    pub fn new<B: Backoff + 'static>(inner: B) -> Self {
        Self {
            inner: Box::new(inner),
            done: false,
        }
    }

    pub fn from_boxed(inner: Box<dyn Backoff>) -> Self {
        Self { inner, done: false }
    }

    pub fn next_wait(&mut self) -> NextWait {
        if self.done {
            return NextWait::Stop;
        }
        match self.inner.next_backoff() {
            Some(d) => NextWait::Wait(d),
            None => NextWait::Stop,
        }
    }

    /// Set the latch. Irreversible until [`reset`](Self::reset).
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Clear the latch and restart the inner policy.
    pub fn reset(&mut self) {
        self.done = false;
        self.inner.reset();
    }

    /// Restart the inner policy, leaving the latch as it is.
    pub(crate) fn restart(&mut self) {
        self.inner.reset();
    }
}

impl std::fmt::Debug for QuittableBackoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuittableBackoff")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
