//! libcurl transport with dial, keep-alive and inactivity timeouts.
//!
//! Each request runs an `Easy2` handle on a worker thread. Header lines are
//! collected until the blank line that ends the block, then handed back as
//! the response head; a head cut off before that is a transport error. Body
//! chunks follow over a bounded channel, so a reader that stops reading
//! stalls the transfer. Dropping the body raises a cancel flag that the
//! progress callback checks, which aborts the transfer even while the
//! server is silent.

use super::{parse_status_line, Body, Header, Method, Request, Response, ResponseHead};
use super::{Transport, TransportError};
use ::curl::easy::{Easy2, Handler, List, WriteError};
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const MAX_REDIRECTIONS: u32 = 10;
/// Body chunks buffered between the worker and the reader.
const CHANNEL_DEPTH: usize = 16;
/// Stall guard of [`CurlTransport::default`].
pub const DEFAULT_INACTIVITY: Duration = Duration::from_secs(60);

/// Per-connection deadlines. `None` leaves the libcurl default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    /// Limit on establishing the TCP/TLS connection.
    pub dial: Option<Duration>,
    /// TCP keep-alive idle time and probe interval.
    pub keep_alive: Option<Duration>,
    /// Abort once no byte has moved for this long, including while waiting
    /// for response headers. Resolution is one second.
    pub inactivity: Option<Duration>,
}

/// Blocking [`Transport`] backed by libcurl.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    timeouts: Timeouts,
}

/// No dial or keep-alive limits; transfers stalled for
/// [`DEFAULT_INACTIVITY`] are aborted.
impl Default for CurlTransport {
    fn default() -> Self {
        Self::new(Timeouts {
            inactivity: Some(DEFAULT_INACTIVITY),
            ..Timeouts::default()
        })
    }
}

impl CurlTransport {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    fn prepare(&self, request: &Request, collector: Collector) -> Result<Easy2<Collector>, ::curl::Error> {
        let mut easy = Easy2::new(collector);
        easy.url(request.url.as_str())?;
        match request.method {
            Method::Get => easy.get(true)?,
            Method::Head => easy.nobody(true)?,
        }
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTIONS)?;
        // Drives Collector::progress, which aborts once the body is dropped.
        easy.progress(true)?;

        if let Some(dial) = self.timeouts.dial {
            easy.connect_timeout(dial)?;
        }
        if let Some(idle) = self.timeouts.keep_alive {
            easy.tcp_keepalive(true)?;
            easy.tcp_keepidle(idle)?;
            easy.tcp_keepintvl(idle)?;
        }
        if let Some(inactivity) = self.timeouts.inactivity {
            // Less than 1 byte/s for the whole window counts as stalled.
            easy.low_speed_limit(1)?;
            easy.low_speed_time(inactivity.max(Duration::from_secs(1)))?;
        }

        let mut list = List::new();
        for (name, value) in request.header.iter() {
            list.append(&format!("{}: {}", name.trim(), value.trim()))?;
        }
        if !request.header.is_empty() {
            easy.http_headers(list)?;
        }
        Ok(easy)
    }
}

impl Transport for CurlTransport {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        let cancelled = Arc::new(AtomicBool::new(false));
        let easy = self.prepare(request, Collector::new(tx, Arc::clone(&cancelled)))?;
        thread::Builder::new()
            .name("httpretry-curl".to_string())
            .spawn(move || run_transfer(easy))?;

        match rx.recv() {
            Ok(Event::Head(lines)) => {
                let status = lines
                    .first()
                    .and_then(|line| parse_status_line(line))
                    .unwrap_or(0);
                let head = ResponseHead {
                    status,
                    header: Header::from_lines(&lines),
                };
                let body: Body = Box::new(ChannelBody::new(rx, cancelled));
                Ok(Response { head, body })
            }
            Ok(Event::Done(Err(e))) => Err(TransportError::Curl(e)),
            Ok(Event::Done(Ok(()))) | Ok(Event::Data(_)) | Err(_) => Err(TransportError::WorkerGone),
        }
    }
}

/// Transport whose connections time out after `timeout` of dialing,
/// keep-alive idleness, or inactivity.
pub fn client_with_timeout(timeout: Duration) -> CurlTransport {
    client_with_timeouts(timeout, timeout, timeout)
}

/// Transport with separate dial, keep-alive and inactivity timeouts, meant
/// for long-running transfers.
pub fn client_with_timeouts(dial: Duration, keep_alive: Duration, inactivity: Duration) -> CurlTransport {
    CurlTransport::new(Timeouts {
        dial: Some(dial),
        keep_alive: Some(keep_alive),
        inactivity: Some(inactivity),
    })
}

fn run_transfer(mut easy: Easy2<Collector>) {
    let result = easy.perform();
    if let Err(e) = &result {
        tracing::debug!(error = %e, "curl transfer ended with error");
    }
    let collector = easy.get_mut();
    if collector.head_complete {
        collector.send_head();
    }
    let _ = collector.tx.send(Event::Done(result));
}

enum Event {
    Head(Vec<String>),
    Data(Vec<u8>),
    Done(Result<(), ::curl::Error>),
}

/// Easy2 handler: buffers header lines, forwards body chunks.
struct Collector {
    tx: SyncSender<Event>,
    lines: Vec<String>,
    /// The current header block reached its terminating blank line.
    head_complete: bool,
    head_sent: bool,
    /// Set when the reader drops the body.
    cancelled: Arc<AtomicBool>,
}

impl Collector {
    fn new(tx: SyncSender<Event>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            lines: Vec::new(),
            head_complete: false,
            head_sent: false,
            cancelled,
        }
    }

    /// Sends the collected head once. False when the reader is gone.
    fn send_head(&mut self) -> bool {
        if self.head_sent {
            return true;
        }
        self.head_sent = true;
        self.tx.send(Event::Head(std::mem::take(&mut self.lines))).is_ok()
    }
}

impl Handler for Collector {
    fn header(&mut self, data: &[u8]) -> bool {
        let raw = String::from_utf8_lossy(data);
        let line = raw.trim_end();
        if line.starts_with("HTTP/") {
            // A new block after a redirect or 100 Continue.
            self.lines.clear();
            self.head_complete = false;
        }
        if line.is_empty() {
            self.head_complete = !self.lines.is_empty();
        } else {
            self.lines.push(line.to_string());
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if !self.send_head() {
            return Ok(0);
        }
        match self.tx.send(Event::Data(data.to_vec())) {
            Ok(()) => Ok(data.len()),
            Err(_) => Ok(0),
        }
    }

    fn progress(&mut self, _dltotal: f64, _dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        !self.cancelled.load(Ordering::Relaxed)
    }
}

/// Reader end of a running transfer.
struct ChannelBody {
    rx: Receiver<Event>,
    chunk: Vec<u8>,
    pos: usize,
    finished: bool,
    cancelled: Arc<AtomicBool>,
}

impl ChannelBody {
    fn new(rx: Receiver<Event>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
            finished: false,
            cancelled,
        }
    }
}

impl Drop for ChannelBody {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl Read for ChannelBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.chunk.len() {
            if self.finished {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Event::Data(data)) => {
                    self.chunk = data;
                    self.pos = 0;
                }
                Ok(Event::Head(_)) => {}
                Ok(Event::Done(Ok(()))) => self.finished = true,
                Ok(Event::Done(Err(e))) => {
                    self.finished = true;
                    let kind = if e.is_operation_timedout() {
                        io::ErrorKind::TimedOut
                    } else {
                        io::ErrorKind::Other
                    };
                    return Err(io::Error::new(kind, e));
                }
                Err(_) => {
                    self.finished = true;
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "transfer worker exited mid-body",
                    ));
                }
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> (Collector, Receiver<Event>) {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        (Collector::new(tx, Arc::new(AtomicBool::new(false))), rx)
    }

    fn channel_body(rx: Receiver<Event>) -> ChannelBody {
        ChannelBody::new(rx, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn head_is_complete_only_after_blank_line() {
        let (mut c, _rx) = collector();
        c.header(b"HTTP/1.1 200 OK\r\n");
        c.header(b"Content-Type: text/pl");
        assert!(!c.head_complete);
        c.header(b"\r\n");
        assert!(c.head_complete);
        c.header(b"HTTP/1.1 200 OK\r\n");
        assert!(!c.head_complete);
    }

    #[test]
    fn blank_line_without_block_is_not_a_head() {
        let (mut c, _rx) = collector();
        c.header(b"\r\n");
        assert!(!c.head_complete);
    }

    #[test]
    fn non_utf8_header_line_is_kept() {
        let (mut c, _rx) = collector();
        c.header(b"HTTP/1.1 200 OK\r\n");
        c.header(b"X-Name: caf\xe9\r\n");
        c.header(b"Content-Length: 5\r\n");
        c.header(b"Accept-Ranges: bytes\r\n");
        let h = Header::from_lines(&c.lines);
        assert_eq!(h.len(), 3);
        assert!(h.contains("x-name"));
        assert_eq!(h.get("content-length"), Some("5"));
        assert_eq!(h.get("accept-ranges"), Some("bytes"));
    }

    #[test]
    fn dropping_body_cancels_transfer() {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut c = Collector::new(tx, Arc::clone(&cancelled));
        assert!(c.progress(0.0, 0.0, 0.0, 0.0));
        drop(ChannelBody::new(rx, cancelled));
        assert!(!c.progress(0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn header_lines_reset_on_new_status_line() {
        let (mut c, _rx) = collector();
        c.header(b"HTTP/1.1 302 Found\r\n");
        c.header(b"Location: http://other/\r\n");
        c.header(b"\r\n");
        assert_eq!(c.lines.len(), 2);
        c.header(b"HTTP/1.1 206 Partial Content\r\n");
        c.header(b"Content-Range: bytes 2-4/5\r\n");
        assert_eq!(c.lines.len(), 2);
        assert!(c.lines[0].contains("206"));
    }

    #[test]
    fn first_write_sends_head_then_data() {
        let (mut c, rx) = collector();
        c.header(b"HTTP/1.1 200 OK\r\n");
        c.header(b"Content-Length: 4\r\n");
        assert_eq!(c.write(b"ab").unwrap(), 2);
        assert_eq!(c.write(b"cd").unwrap(), 2);
        match rx.recv().unwrap() {
            Event::Head(lines) => assert_eq!(lines.len(), 2),
            _ => panic!("expected head first"),
        }
        assert!(matches!(rx.recv().unwrap(), Event::Data(d) if d == b"ab"));
        assert!(matches!(rx.recv().unwrap(), Event::Data(d) if d == b"cd"));
    }

    #[test]
    fn write_aborts_when_reader_dropped() {
        let (mut c, rx) = collector();
        c.header(b"HTTP/1.1 200 OK\r\n");
        drop(rx);
        assert_eq!(c.write(b"data").unwrap(), 0);
    }

    #[test]
    fn body_reads_chunks_until_done() {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        tx.send(Event::Data(b"hello ".to_vec())).unwrap();
        tx.send(Event::Data(b"world".to_vec())).unwrap();
        tx.send(Event::Done(Ok(()))).unwrap();
        let mut body = channel_body(rx);
        let mut out = String::new();
        body.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world");
        assert_eq!(body.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn body_reports_transfer_error() {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        tx.send(Event::Data(b"a".to_vec())).unwrap();
        // CURLE_OPERATION_TIMEDOUT
        tx.send(Event::Done(Err(::curl::Error::new(28)))).unwrap();
        let mut body = channel_body(rx);
        let mut buf = [0u8; 8];
        assert_eq!(body.read(&mut buf).unwrap(), 1);
        let err = body.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn body_errors_when_worker_vanishes() {
        let (tx, rx) = mpsc::sync_channel::<Event>(CHANNEL_DEPTH);
        drop(tx);
        let mut body = channel_body(rx);
        let err = body.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn factory_sets_all_timeouts() {
        let t = client_with_timeout(Duration::from_secs(3)).timeouts();
        assert_eq!(t.dial, Some(Duration::from_secs(3)));
        assert_eq!(t.keep_alive, Some(Duration::from_secs(3)));
        assert_eq!(t.inactivity, Some(Duration::from_secs(3)));
        let d = CurlTransport::default().timeouts();
        assert_eq!(d.inactivity, Some(DEFAULT_INACTIVITY));
        assert_eq!(d.dial, None);
    }
}
