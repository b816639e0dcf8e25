//! Transport trait and the response it yields.

use super::{Header, Request};
use std::io::{self, Read};

/// Streaming response body.
pub type Body = Box<dyn Read + Send>;

/// Status and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub header: Header,
}

pub struct Response {
    pub head: ResponseHead,
    pub body: Body,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// Failure before any response head was received.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("transfer worker exited before a response arrived")]
    WorkerGone,
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Curl(e) => e.is_operation_timedout(),
            TransportError::Io(e) => e.kind() == io::ErrorKind::TimedOut,
            TransportError::WorkerGone => false,
        }
    }
}

/// Executes requests. Implementations are shared between getters, so they
/// must be usable from several threads at once.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &Request) -> Result<Response, TransportError>;
}

/// Read `body` to its end and drop it. Bodies are always drained before
/// being discarded so the underlying connection can be reused.
pub fn drain(mut body: Body) -> io::Result<u64> {
    io::copy(&mut body, &mut io::sink())
}
