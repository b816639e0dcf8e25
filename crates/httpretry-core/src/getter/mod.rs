//! Retrying getter: one logical download across many physical attempts.
//!
//! The first response that matches the expected 200 defines the resource:
//! its status, headers and `Content-Length` are recorded once. Every later
//! attempt asks for the remaining bytes with `Range` and must answer 206.
//! Dropped transfers, empty responses and 5xx answers are retried with the
//! configured backoff; anything else sets the backoff latch and ends the
//! download.
//!
//! ```no_run
//! use httpretry_core::{HttpGetter, Request};
//! use std::io;
//!
//! # fn main() -> anyhow::Result<()> {
//! let req = Request::get("https://example.com/big.iso")?;
//! let mut getter = HttpGetter::new(req);
//! let status = getter.start().map(|head| head.status)?;
//! let mut out = std::fs::File::create("big.iso")?;
//! io::copy(&mut getter, &mut out)?;
//! getter.close();
//! println!("{} sha256={}", status, getter.hex_digest());
//! # Ok(())
//! # }
//! ```

mod connect;
mod error;


use crate::backoff::{Backoff, ExponentialBackoff, NextWait, QuittableBackoff};
use crate::digest::ContentHasher;
use crate::http::{Body, CurlTransport, Header, Request, ResponseHead, Transport, TransportError};
use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::sync::Arc;
use std::thread;

pub use error::{classify_status, ErrorKind, GetterError};

/// Called once per physical attempt with the response head or the transport error.
pub type ResponseCallback = Box<dyn FnMut(Result<&ResponseHead, &TransportError>) + Send>;
/// Called once, when the getter is first closed.
pub type CloseCallback = Box<dyn FnOnce(&HttpGetter) + Send>;

/// Where the getter is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetterState {
    /// No attempt made yet.
    Idle,
    /// A request is in flight.
    Connecting,
    /// A body is open.
    Streaming,
    /// The last attempt or read failed; the next read reconnects.
    RetryWait,
    /// End of stream reached.
    Finished,
    /// Retries are exhausted.
    Failed,
}

/// Configures an [`HttpGetter`]. Anything left unset gets its default in
/// [`build`](Self::build): [`ExponentialBackoff::default`], a
/// [`CurlTransport::default`] (stall guard only), SHA-256, and no-op observers.
pub struct GetterBuilder {
    request: Request,
    backoff: Option<Box<dyn Backoff>>,
    transport: Option<Arc<dyn Transport>>,
    hasher: Option<Box<dyn ContentHasher>>,
    on_response: Option<ResponseCallback>,
    on_close: Option<CloseCallback>,
}

impl GetterBuilder {
    pub fn backoff<B: Backoff + 'static>(mut self, backoff: B) -> Self {
        self.backoff = Some(Box::new(backoff));
        self
    }

    /// Transport shared with other getters.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn hasher<H: ContentHasher + 'static>(mut self, hasher: H) -> Self {
        self.hasher = Some(Box::new(hasher));
        self
    }

    pub fn on_response<F>(mut self, f: F) -> Self
    where
        F: FnMut(Result<&ResponseHead, &TransportError>) + Send + 'static,
    {
        self.on_response = Some(Box::new(f));
        self
    }

    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&HttpGetter) + Send + 'static,
    {
        self.on_close = Some(Box::new(f));
        self
    }

    pub fn build(self) -> HttpGetter {
        let backoff = self
            .backoff
            .unwrap_or_else(|| Box::new(ExponentialBackoff::default()));
        HttpGetter {
            request: self.request,
            body: None,
            attempts: 0,
            content_length: 0,
            bytes_read: 0,
            head: None,
            first_contact: false,
            closed: false,
            finished: false,
            state: GetterState::Idle,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(CurlTransport::default())),
            hasher: self.hasher.unwrap_or_else(|| Box::new(Sha256::new())),
            backoff: QuittableBackoff::from_boxed(backoff),
            on_response: self
                .on_response
                .unwrap_or_else(|| Box::new(ignore_response)),
            on_close: self.on_close,
        }
    }
}

/// Blocking reader over a download that survives dropped connections.
///
/// Call [`start`](Self::start) first, then read until `Ok(0)`. A read that
/// needs to reconnect returns [`io::ErrorKind::Interrupted`]; `io::copy` and
/// `read_to_end` retry those on their own. Close the getter when done.
pub struct HttpGetter {
    request: Request,
    body: Option<Body>,
    attempts: u32,
    content_length: u64,
    bytes_read: u64,
    head: Option<ResponseHead>,
    /// A response matched the initial 200; later attempts resume with Range.
    first_contact: bool,
    closed: bool,
    finished: bool,
    state: GetterState,
    transport: Arc<dyn Transport>,
    hasher: Box<dyn ContentHasher>,
    backoff: QuittableBackoff,
    on_response: ResponseCallback,
    on_close: Option<CloseCallback>,
}

impl HttpGetter {
    pub fn builder(request: Request) -> GetterBuilder {
        GetterBuilder {
            request,
            backoff: None,
            transport: None,
            hasher: None,
            on_response: None,
            on_close: None,
        }
    }

    /// Getter with every default installed.
    pub fn new(request: Request) -> Self {
        Self::builder(request).build()
    }

    /// Runs attempts until one succeeds or the backoff says stop.
    ///
    /// Returns the head of the first contact. A terminal first response
    /// (e.g. 403) is returned too, with retries disabled; its body stays
    /// readable. `Err` means no response was ever recorded.
    pub fn start(&mut self) -> Result<&ResponseHead, GetterError> {
        if self.attempts == 0 || self.head.is_none() {
            self.backoff.restart();
            let outcome = loop {
                match self.connect() {
                    Ok(()) => break Ok(()),
                    Err(e) => match self.backoff.next_wait() {
                        NextWait::Stop => break Err(e),
                        NextWait::Wait(wait) => {
                            tracing::debug!(error = %e, wait_ms = wait.as_millis() as u64, "attempt failed, backing off");
                            self.state = GetterState::RetryWait;
                            thread::sleep(wait);
                        }
                    },
                }
            };
            if self.head.is_none() {
                self.state = GetterState::Failed;
                let err = outcome.err().unwrap_or(GetterError::Exhausted);
                tracing::warn!(url = %self.request.url, attempts = self.attempts, error = %err, "download could not be started");
                return Err(err);
            }
        }
        self.head.as_ref().ok_or(GetterError::Exhausted)
    }

    /// Sets the backoff latch, runs the close observer the first time, and
    /// releases any open body.
    pub fn close(&mut self) {
        self.backoff.mark_done();
        if self.state != GetterState::Finished {
            self.state = GetterState::Failed;
        }
        if !self.closed {
            self.closed = true;
            if let Some(on_close) = self.on_close.take() {
                on_close(self);
            }
        }
        self.body = None;
    }

    /// Hex digest of every byte delivered so far.
    pub fn hex_digest(&self) -> String {
        self.hasher.hex_digest()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Physical attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// `Content-Length` of the first contact, 0 when absent or unparsable.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    pub fn status(&self) -> Option<u16> {
        self.head.as_ref().map(|h| h.status)
    }

    pub fn header(&self) -> Option<&Header> {
        self.head.as_ref().map(|h| &h.header)
    }

    pub fn state(&self) -> GetterState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True once retries are permanently disabled.
    pub fn is_backoff_done(&self) -> bool {
        self.backoff.is_done()
    }

    fn finish(&mut self) {
        self.body = None;
        self.finished = true;
        self.state = GetterState::Finished;
        tracing::debug!(url = %self.request.url, bytes = self.bytes_read, attempts = self.attempts, "download finished");
    }

    /// Every byte of a known length has been delivered.
    fn is_complete(&self) -> bool {
        self.first_contact && self.content_length > 0 && self.bytes_read >= self.content_length
    }
}

impl Read for HttpGetter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.finished {
            return Ok(0);
        }

        if self.body.is_none() {
            if self.is_complete() {
                self.finish();
                return Ok(0);
            }
            match self.connect() {
                Ok(()) => {
                    if !self.backoff.is_done() {
                        self.backoff.reset();
                    }
                }
                // Terminal response whose payload is still readable.
                Err(_) if self.body.is_some() => {}
                Err(e) => {
                    return match self.backoff.next_wait() {
                        NextWait::Stop => {
                            self.state = GetterState::Failed;
                            Err(io::Error::new(io::ErrorKind::Other, e))
                        }
                        NextWait::Wait(wait) => {
                            self.state = GetterState::RetryWait;
                            thread::sleep(wait);
                            Err(retry_read())
                        }
                    };
                }
            }
        }

        let Some(body) = self.body.as_mut() else {
            return Err(retry_read());
        };
        match body.read(buf) {
            Ok(0) => {
                self.finish();
                Ok(0)
            }
            Ok(n) => {
                self.bytes_read += n as u64;
                self.hasher.update(&buf[..n]);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                tracing::info!(
                    url = %self.request.url,
                    bytes_read = self.bytes_read,
                    error = %e,
                    "transfer dropped, will resume"
                );
                self.body = None;
                self.state = GetterState::RetryWait;
                Err(retry_read())
            }
        }
    }
}

fn ignore_response(_: Result<&ResponseHead, &TransportError>) {}

fn retry_read() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "reconnecting; retry the read")
}

impl std::fmt::Debug for HttpGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGetter")
            .field("url", &self.request.url.as_str())
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("bytes_read", &self.bytes_read)
            .field("content_length", &self.content_length)
            .field("status", &self.status())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
