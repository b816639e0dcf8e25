//! HTTP seam: request/response types, the [`Transport`] trait, and the
//! libcurl-backed transport with connection timeouts.

mod curl_transport;
mod header;
mod request;
mod transport;

pub use curl_transport::{client_with_timeout, client_with_timeouts, CurlTransport, Timeouts, DEFAULT_INACTIVITY};
pub use header::{parse_status_line, Header};
pub use request::{Method, Request};
pub use transport::{drain, Body, Response, ResponseHead, Transport, TransportError};
