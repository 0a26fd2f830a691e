//! Error types for the fetch engine.
//!
//! # Design
//! One variant per way a fetch can fail, so callers can tell "the URL was
//! never valid" apart from "the host refused us" apart from "the server
//! answered with something we cannot frame". The C boundary collapses these
//! back into booleans and sentinel lengths; Rust callers keep the detail.

use std::io;

/// Errors returned by `FetchClient` operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The URL has no recognized scheme prefix, no host, or a bad port.
    #[error("malformed URL {url:?}: {reason}")]
    MalformedUrl { url: String, reason: &'static str },

    /// The transport refused to open a connection to `host:port`.
    #[error("connection to {host}:{port} failed")]
    ConnectFailed { host: String, port: u16 },

    /// The transport accepted fewer request bytes than were written.
    #[error("failed to send request")]
    RequestSendFailed,

    /// The status line was missing or carried an unsupported HTTP version.
    #[error("invalid status line")]
    InvalidStatusLine,

    /// The server answered with a status other than 200.
    #[error("HTTP {0}")]
    NonSuccessStatus(i32),

    /// The `\r\n\r\n` header terminator never arrived.
    #[error("invalid response: header terminator not found")]
    InvalidResponseFraming,

    /// No usable Content-Length and the configuration requires one.
    #[error("response has no usable Content-Length")]
    UnknownLength,

    /// Content-Length was zero, or a close-delimited body carried nothing.
    #[error("response body is empty")]
    EmptyBody,

    /// The body is larger than the configured `max_body_bytes`.
    #[error("response body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },

    /// The connection closed before the advertised body length arrived.
    #[error("connection closed after {received} of {expected} bytes")]
    PrematureClose { expected: usize, received: usize },

    /// The caller's sink rejected a write.
    #[error("sink write failed: {0}")]
    Sink(#[from] io::Error),
}

impl FetchError {
    pub(crate) fn malformed(url: &str, reason: &'static str) -> Self {
        FetchError::MalformedUrl {
            url: url.to_string(),
            reason,
        }
    }
}
