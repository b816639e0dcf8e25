//! Resumable, retrying HTTP downloads.
//!
//! [`getter::HttpGetter`] turns one logical GET into a continuous byte stream,
//! reconnecting with `Range` requests whenever a transfer drops or the server
//! answers with a retryable error.

pub mod config;
pub mod logging;

pub mod backoff;
pub mod checksum;
pub mod digest;
pub mod getter;
pub mod http;

pub use backoff::{Backoff, ExponentialBackoff, NextWait, QuittableBackoff};
pub use getter::{GetterError, GetterState, HttpGetter};
pub use http::{client_with_timeout, client_with_timeouts, CurlTransport, Header, Request, Transport};
