//! Get command: stream a URL to a file or stdout through the retrying getter.

use anyhow::{Context, Result};
use httpretry_core::checksum;
use httpretry_core::config::HttpRetryConfig;
use httpretry_core::http::{ResponseHead, TransportError};
use httpretry_core::{client_with_timeout, HttpGetter, Request};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub url: String,
    pub output: Option<PathBuf>,
    pub headers: Vec<String>,
    pub timeout: Option<u64>,
    pub sha256: Option<String>,
}

/// Splits `Name: value`. The name must be non-empty.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("header {:?} is not in 'Name: value' form", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("header {:?} has an empty name", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub fn run_get(cfg: &HttpRetryConfig, opts: GetOptions) -> Result<()> {
    let mut request = Request::get(&opts.url).with_context(|| format!("invalid url {}", opts.url))?;
    for raw in &opts.headers {
        let (name, value) = parse_header(raw)?;
        request = request.with_header(&name, &value);
    }

    let transport = match opts.timeout {
        Some(secs) => client_with_timeout(Duration::from_secs(secs)),
        None => cfg.timeouts.transport(),
    };

    let url = opts.url.clone();
    let mut getter = HttpGetter::builder(request)
        .backoff(cfg.backoff.build())
        .transport(Arc::new(transport))
        .on_response(move |res: Result<&ResponseHead, &TransportError>| match res {
            Ok(head) => tracing::debug!(url = %url, status = head.status, "attempt answered"),
            Err(e) => tracing::debug!(url = %url, error = %e, "attempt failed"),
        })
        .build();

    let status = getter.start()?.status;
    if !(200..300).contains(&status) {
        getter.close();
        anyhow::bail!("server answered {} for {}", status, opts.url);
    }

    let written = match &opts.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            let n = io::copy(&mut getter, &mut out).context("download failed")?;
            out.flush()?;
            n
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let n = io::copy(&mut getter, &mut out).context("download failed")?;
            out.flush()?;
            n
        }
    };

    let digest = getter.hex_digest();
    eprintln!(
        "status {}  bytes {}  attempts {}  sha256 {}",
        status,
        written,
        getter.attempts(),
        digest
    );
    tracing::info!(url = %opts.url, bytes = written, attempts = getter.attempts(), "download finished");
    getter.close();

    if let Some(expected) = &opts.sha256 {
        checksum::verify_hex(expected, &digest)?;
    }
    Ok(())
}
