//! Minimal HTTP/1.1 server for integration tests.
//!
//! Every connection carries one request. The handler sees the parsed request
//! and the 1-based request number, and writes whatever it likes to the
//! socket, including truncated bodies and stalls.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ParsedRequest {
    pub method: String,
    /// Start offset of a `Range: bytes=N-...` header.
    pub range_start: Option<u64>,
    pub range: Option<String>,
}

pub struct Server {
    pub url: String,
    requests: Arc<AtomicUsize>,
}

impl Server {
    /// Number of requests served so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start<F>(handler: F) -> Server
where
    F: Fn(&ParsedRequest, usize, &mut TcpStream) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);
    let handler = Arc::new(handler);
    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            let handler = Arc::clone(&handler);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
                let Some(req) = read_request(&mut stream) else {
                    return;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                handler(&req, n, &mut stream);
                let _ = stream.flush();
            });
        }
    });
    Server {
        url: format!("http://127.0.0.1:{}/", port),
        requests,
    }
}

/// Writes a status line and headers. `Connection: close` is always added.
pub fn write_head(stream: &mut TcpStream, status: u16, headers: &[(&str, String)]) {
    let mut head = format!("HTTP/1.1 {} {}\r\n", status, reason(status));
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("Connection: close\r\n\r\n");
    let _ = stream.write_all(head.as_bytes());
}

/// Complete response with `Accept-Ranges: bytes` and `Content-Type: text/plain`.
pub fn write_text(stream: &mut TcpStream, status: u16, body: &[u8]) {
    write_head(
        stream,
        status,
        &[
            ("Accept-Ranges", "bytes".to_string()),
            ("Content-Type", "text/plain".to_string()),
            ("Content-Length", body.len().to_string()),
        ],
    );
    let _ = stream.write_all(body);
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        400..=499 => "Client Error",
        500..=599 => "Server Error",
        _ => "Unknown",
    }
}

fn read_request(stream: &mut TcpStream) -> Option<ParsedRequest> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    let text = String::from_utf8_lossy(&data);
    let mut req = ParsedRequest::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if req.method.is_empty() {
            req.method = line.split_whitespace().next().unwrap_or("").to_string();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                req.range = Some(value.to_string());
                req.range_start = value
                    .strip_prefix("bytes=")
                    .and_then(|v| v.split('-').next())
                    .and_then(|v| v.trim().parse().ok());
            }
        }
    }
    Some(req)
}
