//! HTTP/1.0 request serialization and response-head parsing.
//!
//! # Design
//! Both halves work directly against a `Transport`: the request is written
//! line by line, and the response head is consumed in place so that whatever
//! is left in the transport afterwards is body. Nothing here buffers more
//! than the fixed 32-byte status line.

use crate::error::FetchError;
use crate::transport::{FindOutcome, Transport};
use crate::types::{ContentLength, ResponseStatus};

/// Capacity of the status-line buffer. Longer lines are truncated.
pub const STATUS_LINE_CAPACITY: usize = 32;

const CONTENT_LENGTH_TOKEN: &[u8] = b"Content-Length:";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const SUPPORTED_VERSIONS: [&[u8]; 2] = [b"HTTP/1.0", b"HTTP/1.1"];

/// A GET request described as the header values that go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest<'a> {
    pub path: &'a str,
    pub host: &'a str,
    pub accept: Option<&'a str>,
    pub authorization: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

impl GetRequest<'_> {
    /// Request lines in wire order, without line endings. The final empty
    /// line is the header terminator.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("GET {} HTTP/1.0", self.path),
            format!("Host: {}", self.host),
        ];
        if let Some(accept) = self.accept {
            lines.push(format!("Accept: {accept}"));
        }
        if let Some(authorization) = self.authorization {
            lines.push(format!("Authorization: {authorization}"));
        }
        if let Some(user_agent) = self.user_agent {
            lines.push(format!("User-Agent: {user_agent}"));
        }
        lines.push("Cache-Control: no-cache".to_string());
        lines.push(String::new());
        lines
    }

    /// Write every line, CRLF-terminated. Any short write fails the send.
    pub fn write_to<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<(), FetchError> {
        for line in self.lines() {
            let line = format!("{line}\r\n");
            if transport.write(line.as_bytes()) < line.len() {
                return Err(FetchError::RequestSendFailed);
            }
        }
        Ok(())
    }
}

/// Read the status line and parse it.
pub fn read_status<T: Transport + ?Sized>(transport: &mut T) -> ResponseStatus {
    let mut line = [0u8; STATUS_LINE_CAPACITY];
    let len = transport.read_until(b'\r', &mut line);
    let status = parse_status_line(&line[..len]);
    tracing::debug!(
        line = %String::from_utf8_lossy(&line[..len]),
        status = status.status_code,
        "status line"
    );
    status
}

/// Parse `HTTP/1.x <code> ...`. Runs of spaces separate tokens.
pub fn parse_status_line(line: &[u8]) -> ResponseStatus {
    let mut tokens = line.split(|b| *b == b' ').filter(|t| !t.is_empty());

    let version_ok = tokens
        .next()
        .is_some_and(|version| SUPPORTED_VERSIONS.iter().any(|v| *v == version));
    if !version_ok {
        return ResponseStatus::INVALID;
    }

    match tokens.next() {
        Some(code) => ResponseStatus {
            http_version_valid: true,
            status_code: parse_leading_int(code),
        },
        None => ResponseStatus {
            http_version_valid: true,
            status_code: -1,
        },
    }
}

/// C `atoi`: optional whitespace and sign, then digits up to the first
/// non-digit. No digits yields `0`; overflow saturates.
pub fn parse_leading_int(bytes: &[u8]) -> i32 {
    let mut rest = bytes;
    while let [b, tail @ ..] = rest {
        if b.is_ascii_whitespace() {
            rest = tail;
        } else {
            break;
        }
    }
    let negative = match rest {
        [b'-', tail @ ..] => {
            rest = tail;
            true
        }
        [b'+', tail @ ..] => {
            rest = tail;
            false
        }
        _ => false,
    };
    let mut value: i64 = 0;
    for b in rest.iter().take_while(|b| b.is_ascii_digit()) {
        value = (value * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    let value = if negative { -value } else { value };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Result of scanning the header block for `Content-Length:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthScan {
    pub length: ContentLength,
    /// The header terminator was consumed during the scan.
    pub headers_consumed: bool,
}

/// Search the remaining header bytes for `Content-Length:` and parse the
/// value after it. The search stops at the header terminator, so a response
/// without the header does not lose its body.
pub fn read_content_length<T: Transport + ?Sized>(transport: &mut T) -> LengthScan {
    match transport.find_until(CONTENT_LENGTH_TOKEN, HEADER_TERMINATOR) {
        FindOutcome::Found => {
            let length = match scan_length(transport) {
                Some(n) => ContentLength::Known(n),
                None => ContentLength::Unknown,
            };
            tracing::debug!(content_length = length.as_i64(), "content length");
            LengthScan {
                length,
                headers_consumed: false,
            }
        }
        FindOutcome::Terminated => LengthScan {
            length: ContentLength::Unknown,
            headers_consumed: true,
        },
        FindOutcome::Exhausted => LengthScan {
            length: ContentLength::Unknown,
            headers_consumed: false,
        },
    }
}

/// Skip spaces and tabs, then read decimal digits. A sign, a missing number
/// or a value that does not fit in `usize` makes the length unusable.
fn scan_length<T: Transport + ?Sized>(transport: &mut T) -> Option<usize> {
    while matches!(transport.peek(), Some(b' ' | b'\t')) {
        transport.read_byte();
    }
    let mut digits = 0usize;
    let mut value: Option<usize> = Some(0);
    while let Some(b @ b'0'..=b'9') = transport.peek() {
        transport.read_byte();
        digits += 1;
        value = value
            .and_then(|v| v.checked_mul(10))
            .and_then(|v| v.checked_add(usize::from(b - b'0')));
    }
    if digits > 0 && value.is_none() {
        tracing::warn!("Content-Length value overflows");
    }
    value.filter(|_| digits > 0)
}

/// Consume through the `\r\n\r\n` header terminator.
pub fn skip_headers<T: Transport + ?Sized>(transport: &mut T) -> Result<(), FetchError> {
    if transport.find(HEADER_TERMINATOR) {
        Ok(())
    } else {
        tracing::warn!("invalid response: header terminator not found");
        Err(FetchError::InvalidResponseFraming)
    }
}

/// Drop bytes ahead of the first `{` that are already available. Some
/// servers emit stray bytes between the headers and a JSON body.
pub fn skip_non_json_prefix<T: Transport + ?Sized>(transport: &mut T) -> usize {
    let mut tossed = 0;
    while transport.available() > 0 {
        match transport.peek() {
            Some(b'{') | None => break,
            Some(b) => {
                transport.read_byte();
                tossed += 1;
                tracing::debug!(byte = b, "tossing unexpected byte before JSON body");
            }
        }
    }
    tossed
}
