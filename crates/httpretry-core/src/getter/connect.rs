//! One physical attempt and the rules that classify its outcome.

use super::{classify_status, GetterError, GetterState, HttpGetter};
use crate::http::{drain, Body, Response, ResponseHead};

const ACCEPT_RANGES: &str = "Accept-Ranges";
const CONTENT_LENGTH: &str = "Content-Length";
const RANGE: &str = "Range";

const STATUS_OK: u16 = 200;
const STATUS_PARTIAL: u16 = 206;

impl HttpGetter {
    /// Makes one request for whatever has not been delivered yet.
    ///
    /// `Ok` leaves a matching body open. A retryable failure (transport
    /// error, status 0, 5xx) is returned for the caller's backoff to pace.
    /// Any other mismatch sets the backoff latch before returning; a
    /// terminal first response keeps its body open so it can be read.
    /// Discarded bodies are drained first.
    pub(super) fn connect(&mut self) -> Result<(), GetterError> {
        if self.backoff.is_done() {
            return Err(GetterError::Exhausted);
        }

        let expected = if self.first_contact && self.bytes_read > 0 {
            let range = range_value(self.bytes_read, self.content_length);
            tracing::debug!(url = %self.request.url, range = %range, "resuming");
            self.request.header.set(RANGE, range);
            STATUS_PARTIAL
        } else {
            STATUS_OK
        };

        self.state = GetterState::Connecting;
        let result = self.transport.execute(&self.request);
        self.attempts += 1;
        (self.on_response)(result.as_ref().map(|res| &res.head));

        let Response { head, body } = match result {
            Ok(res) => res,
            Err(e) => {
                tracing::warn!(url = %self.request.url, attempt = self.attempts, error = %e, "request failed");
                self.state = GetterState::RetryWait;
                return Err(e.into());
            }
        };
        tracing::debug!(
            method = self.request.method.as_str(),
            url = %self.request.url,
            attempt = self.attempts,
            status = head.status,
            expected,
            "response"
        );

        if head.status == 0 {
            self.state = GetterState::RetryWait;
            return Err(GetterError::EmptyResponse);
        }

        if head.status == expected {
            self.record_first_contact(head);
            self.body = Some(body);
            self.state = GetterState::Streaming;
            return Ok(());
        }

        let got = head.status;
        let err = GetterError::UnexpectedStatus { expected, got };
        // Nothing in a mismatching resume answer is usable; close it rather
        // than pull a possibly complete entity through.
        let body = if expected == STATUS_PARTIAL {
            drop(body);
            None
        } else {
            Some(body)
        };

        if classify_status(got).is_retryable() {
            if let Some(body) = body {
                discard(body);
            }
            tracing::warn!(url = %self.request.url, attempt = self.attempts, status = got, "server error, will retry");
            self.state = GetterState::RetryWait;
            return Err(err);
        }

        match body {
            Some(body) if self.head.is_none() => {
                self.head = Some(head);
                self.body = Some(body);
                self.state = GetterState::Streaming;
            }
            Some(body) => {
                discard(body);
                self.state = GetterState::Failed;
            }
            None => self.state = GetterState::Failed,
        }
        tracing::warn!(url = %self.request.url, status = got, expected, "unexpected status, retries disabled");
        self.backoff.mark_done();
        Err(err)
    }

    /// Latches status, headers and length from the first matching response.
    fn record_first_contact(&mut self, head: ResponseHead) {
        if self.head.is_some() {
            return;
        }
        self.content_length = head
            .header
            .get(CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        let ranges = head
            .header
            .get(ACCEPT_RANGES)
            .map(|v| v.trim().eq_ignore_ascii_case("bytes"))
            .unwrap_or(false);
        if !ranges {
            tracing::info!(url = %self.request.url, "server does not accept byte ranges, retries disabled");
            self.backoff.mark_done();
        }
        self.first_contact = true;
        self.head = Some(head);
    }
}

/// `bytes=<start>-<end>` for a known length, open-ended otherwise.
fn range_value(start: u64, content_length: u64) -> String {
    if content_length > 0 {
        format!("bytes={}-{}", start, content_length - 1)
    } else {
        format!("bytes={}-", start)
    }
}

fn discard(body: Body) {
    if let Err(e) = drain(body) {
        tracing::debug!(error = %e, "failed to drain discarded body");
    }
}
