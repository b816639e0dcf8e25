//! Backoff policies that pace retry attempts.
//!
//! A [`Backoff`] produces the wait before the next attempt or says stop.
//! [`QuittableBackoff`] wraps one with a latch that permanently disables
//! further waits, which is how the getter turns an error into a terminal one.

mod exponential;
mod quittable;
mod simple;

use std::time::Duration;

pub use exponential::ExponentialBackoff;
pub use quittable::{NextWait, QuittableBackoff};
pub use simple::{ConstantBackoff, StopBackoff, WithMaxRetries, ZeroBackoff};

/// A generator of waits between attempts.
pub trait Backoff: Send {
    /// Wait before the next attempt, or `None` to stop retrying.
    fn next_backoff(&mut self) -> Option<Duration>;

    /// Restore the initial state.
    fn reset(&mut self);
}

impl<B: Backoff + ?Sized> Backoff for Box<B> {
    fn next_backoff(&mut self) -> Option<Duration> {
        (**self).next_backoff()
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}
