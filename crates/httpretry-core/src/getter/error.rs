//! Attempt errors and their retry classification.

use crate::http::TransportError;

/// Why an attempt (or the whole download) failed.
#[derive(Debug, thiserror::Error)]
pub enum GetterError {
    /// Retries are disabled (closed getter, terminal status, missing
    /// `Accept-Ranges`, or exhausted backoff). No request was sent.
    #[error("retries exhausted; no further attempts will be made")]
    Exhausted,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("received response with status code 0")]
    EmptyResponse,
    #[error("expected status code {expected}, got {got}")]
    UnexpectedStatus { expected: u16, got: u16 },
}

/// Retry classification of a [`GetterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response at all (refused, reset, DNS, timeout).
    Transport,
    /// Response with status code 0.
    EmptyResponse,
    /// 5xx.
    Server(u16),
    /// Any other status that did not match what the attempt expected.
    Unexpected(u16),
    /// The latch was set before the attempt.
    Exhausted,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Transport | ErrorKind::EmptyResponse | ErrorKind::Server(_)
        )
    }
}

impl GetterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GetterError::Exhausted => ErrorKind::Exhausted,
            GetterError::Transport(_) => ErrorKind::Transport,
            GetterError::EmptyResponse => ErrorKind::EmptyResponse,
            GetterError::UnexpectedStatus { got, .. } => classify_status(*got),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Classify a status that did not match the expected one.
pub fn classify_status(code: u16) -> ErrorKind {
    match code {
        0 => ErrorKind::EmptyResponse,
        500..=599 => ErrorKind::Server(code),
        _ => ErrorKind::Unexpected(code),
    }
}
