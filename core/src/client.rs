//! Fetch orchestration: URL → request → response head → body.
//!
//! # Design
//! `FetchClient` holds only its `FetchConfig` and carries no state between
//! calls. Each fetch borrows a transport, wraps it in a guard that closes it
//! on every exit path, and runs the same sequence for both sinks: parse the
//! URL, send the GET, require status 200, read Content-Length, skip the rest
//! of the head, then copy the body.

use std::io::Write;

use uuid::Uuid;

use crate::config::FetchConfig;
use crate::copier::{copy_body, BufferSink};
use crate::error::FetchError;
use crate::http::{read_content_length, read_status, skip_headers, skip_non_json_prefix, GetRequest};
use crate::transport::{CloseGuard, Transport};
use crate::types::{ContentLength, FetchOutcome, FetchRequest, FetchedBuffer, ResponseStatus};
use crate::url::ParsedUrl;

/// Synchronous HTTP/1.0 GET client over a caller-supplied `Transport`.
#[derive(Debug, Clone, Default)]
pub struct FetchClient {
    config: FetchConfig,
}

impl FetchClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FetchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Connect to `host:port`, send a GET for `path`, and parse the status
    /// line.
    ///
    /// The transport is left open and positioned just after the status code
    /// so the caller can keep reading the response.
    pub fn make_get_request<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        port: u16,
        path: &str,
        authorization: Option<&str>,
        accept: Option<&str>,
        host: &str,
    ) -> Result<ResponseStatus, FetchError> {
        let request = GetRequest {
            path,
            host,
            accept,
            authorization,
            user_agent: self.config.user_agent.as_deref(),
        };
        self.send(transport, host, port, &request)
    }

    /// Fetch `request` and stream its body into `sink`.
    ///
    /// Succeeds once a usable length was seen and the copy loop ended; check
    /// `FetchOutcome::is_complete` to tell a full body from one cut short by
    /// the peer.
    pub fn fetch_to_stream<T, W>(
        &self,
        transport: &mut T,
        request: impl Into<FetchRequest>,
        sink: &mut W,
    ) -> Result<FetchOutcome, FetchError>
    where
        T: Transport + ?Sized,
        W: Write + ?Sized,
    {
        let request = request.into();
        let span = tracing::debug_span!("fetch", id = %Uuid::new_v4(), url = %request.url);
        let _enter = span.enter();

        let mut transport = CloseGuard::new(transport);
        let length = self.open_body(&mut *transport, &request)?;
        let outcome = copy_body(&mut *transport, sink, length)?;
        tracing::debug!(received = outcome.received, "finished getting file");
        check_received(outcome)
    }

    /// Fetch `request` into a newly allocated buffer.
    ///
    /// With a known length the buffer is reserved at exactly that size and
    /// is returned even when the peer closed early; `FetchedBuffer::is_complete`
    /// reports whether every byte arrived.
    pub fn fetch_to_buffer<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        request: impl Into<FetchRequest>,
    ) -> Result<FetchedBuffer, FetchError> {
        let request = request.into();
        let span = tracing::debug_span!("fetch", id = %Uuid::new_v4(), url = %request.url);
        let _enter = span.enter();

        let mut transport = CloseGuard::new(transport);
        let length = self.open_body(&mut *transport, &request)?;
        let limit = self.config.max_body_bytes;
        let mut sink = BufferSink::for_length(length, limit)?;
        let outcome = match (copy_body(&mut *transport, &mut sink, length), limit) {
            (Err(FetchError::Sink(_)), Some(limit)) if sink.overflowed() => {
                tracing::warn!(limit, "body exceeds limit");
                return Err(FetchError::BodyTooLarge { limit });
            }
            (result, _) => result?,
        };
        tracing::debug!(received = outcome.received, "finished getting file");
        check_received(outcome)?;
        Ok(FetchedBuffer {
            data: sink.into_inner(),
            content_length: length,
        })
    }

    /// Run everything up to the first body byte and return the body length.
    fn open_body<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        request: &FetchRequest,
    ) -> Result<ContentLength, FetchError> {
        let url = ParsedUrl::parse(&request.url, &self.config).inspect_err(|e| {
            tracing::warn!(error = %e, "URL not in expected format");
        })?;
        tracing::debug!(
            scheme = url.scheme.as_str(),
            host = %url.host,
            path = %url.path,
            port = url.port,
            "parsed URL"
        );

        let authority = url.authority();
        let get = GetRequest {
            path: &url.path,
            host: &authority,
            accept: request.accept.as_deref().or(self.config.accept.as_deref()),
            authorization: request.authorization.as_deref(),
            user_agent: self.config.user_agent.as_deref(),
        };
        let status = self.send(transport, &url.host, url.port, &get)?;
        if !status.http_version_valid || status.status_code == -1 {
            return Err(FetchError::InvalidStatusLine);
        }
        if !status.is_ok() {
            return Err(FetchError::NonSuccessStatus(status.status_code));
        }

        let scan = read_content_length(transport);
        let length = match scan.length {
            ContentLength::Known(0) => return Err(FetchError::EmptyBody),
            ContentLength::Unknown if self.config.require_content_length => {
                return Err(FetchError::UnknownLength)
            }
            length => length,
        };

        if !scan.headers_consumed {
            skip_headers(transport)?;
        }
        if self.config.skip_non_json_prefix {
            skip_non_json_prefix(transport);
        }
        Ok(length)
    }

    fn send<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        host: &str,
        port: u16,
        request: &GetRequest<'_>,
    ) -> Result<ResponseStatus, FetchError> {
        transport.flush();
        transport.set_read_timeout(self.config.read_timeout());
        if !transport.connect(host, port) {
            tracing::warn!(host, port, "connection failed");
            return Err(FetchError::ConnectFailed {
                host: host.to_string(),
                port,
            });
        }

        request.write_to(transport).inspect_err(|_| {
            tracing::warn!("failed to send request");
        })?;

        Ok(read_status(transport))
    }
}

/// A close-delimited body that delivered nothing is not a successful fetch.
fn check_received(outcome: FetchOutcome) -> Result<FetchOutcome, FetchError> {
    if outcome.content_length == ContentLength::Unknown && outcome.received == 0 {
        return Err(FetchError::EmptyBody);
    }
    Ok(outcome)
}
