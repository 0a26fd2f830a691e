//! Minimal HTTP/1.0 resource fetcher.
//!
//! # Overview
//! Fetches a single resource with `GET` over a caller-supplied `Transport`
//! and delivers the body either to a `std::io::Write` sink in fixed-size
//! chunks or into one buffer sized from `Content-Length`.
//!
//! # Design
//! - The engine never owns a socket. Anything that implements `Transport`
//!   works: `TcpTransport` for std networking, `ScriptedTransport` for tests,
//!   or a callback table supplied over the C ABI.
//! - `FetchClient` is stateless apart from its `FetchConfig`. The legacy
//!   file and image fetchers are the `FetchConfig::file()` and
//!   `FetchConfig::image()` presets rather than separate types.
//! - Only status 200 with a `\r\n\r\n`-terminated head is accepted. No
//!   redirects, no chunked decoding, one request per connection.

pub mod client;
pub mod config;
pub mod copier;
pub mod error;
pub mod http;
pub mod scripted;
pub mod tcp;
pub mod transport;
pub mod types;
pub mod url;

pub use client::FetchClient;
pub use config::{FetchConfig, SchemePolicy};
pub use copier::{BufferSink, CHUNK_SIZE};
pub use error::FetchError;
pub use scripted::ScriptedTransport;
pub use tcp::TcpTransport;
pub use transport::{FindOutcome, Transport};
pub use types::{ContentLength, FetchOutcome, FetchRequest, FetchedBuffer, ResponseStatus};
pub use url::{ParsedUrl, Scheme};
