//! Immutable description of the request a getter replays.

use super::Header;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
        }
    }
}

/// Method, URL and headers. The getter rewrites `Range` on resume attempts.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub header: Header,
}

impl Request {
    pub fn new(method: Method, url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            method,
            url: Url::parse(url)?,
            header: Header::new(),
        })
    }

    pub fn get(url: &str) -> Result<Self, url::ParseError> {
        Self::new(Method::Get, url)
    }

    /// Builder-style header setter.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.header.set(name, value);
        self
    }
}
