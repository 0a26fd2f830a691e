//! Values passed into and returned from a fetch.

use serde::de::DeserializeOwned;

use crate::error::FetchError;

/// One resource to fetch. Header values left as `None` fall back to the
/// client's configuration (`accept`) or are omitted (`authorization`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub authorization: Option<String>,
    pub accept: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            authorization: None,
            accept: None,
        }
    }

    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    pub fn accept(mut self, value: impl Into<String>) -> Self {
        self.accept = Some(value.into());
        self
    }
}

impl From<&str> for FetchRequest {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for FetchRequest {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// Parsed status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseStatus {
    pub http_version_valid: bool,
    /// `-1` when the line is missing, malformed, or not HTTP/1.0 or 1.1.
    /// A non-numeric code token parses as `0`.
    pub status_code: i32,
}

impl ResponseStatus {
    pub const INVALID: ResponseStatus = ResponseStatus {
        http_version_valid: false,
        status_code: -1,
    };

    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }
}

/// Body length advertised by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentLength {
    Known(usize),
    /// No usable header: the body ends when the connection closes.
    Unknown,
}

impl ContentLength {
    pub fn known(&self) -> Option<usize> {
        match self {
            ContentLength::Known(n) => Some(*n),
            ContentLength::Unknown => None,
        }
    }

    /// Legacy integer form: the length, or `-1` when unknown. Lengths past
    /// `i64::MAX` saturate.
    pub fn as_i64(&self) -> i64 {
        match self {
            ContentLength::Known(n) => i64::try_from(*n).unwrap_or(i64::MAX),
            ContentLength::Unknown => -1,
        }
    }
}

/// Summary of a body copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    pub content_length: ContentLength,
    /// Body bytes delivered to the sink.
    pub received: usize,
}

impl FetchOutcome {
    /// `false` when the connection closed before the advertised length.
    pub fn is_complete(&self) -> bool {
        match self.content_length {
            ContentLength::Known(n) => self.received >= n,
            ContentLength::Unknown => true,
        }
    }

    pub fn ensure_complete(self) -> Result<Self, FetchError> {
        match self.content_length {
            ContentLength::Known(expected) if self.received < expected => {
                Err(FetchError::PrematureClose {
                    expected,
                    received: self.received,
                })
            }
            _ => Ok(self),
        }
    }
}

/// Body fetched into memory.
///
/// With a known length the buffer is allocated up front at exactly that
/// size; `data` holds only the bytes that actually arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBuffer {
    pub data: Vec<u8>,
    pub content_length: ContentLength,
}

impl FetchedBuffer {
    pub fn outcome(&self) -> FetchOutcome {
        FetchOutcome {
            content_length: self.content_length,
            received: self.data.len(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome().is_complete()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_headers() {
        let req = FetchRequest::new("https://example.com/a")
            .accept("image/png")
            .authorization("Bearer abc");
        assert_eq!(req.url, "https://example.com/a");
        assert_eq!(req.accept.as_deref(), Some("image/png"));
        assert_eq!(req.authorization.as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn short_outcome_is_premature_close() {
        let outcome = FetchOutcome {
            content_length: ContentLength::Known(10),
            received: 4,
        };
        assert!(!outcome.is_complete());
        assert!(matches!(
            outcome.ensure_complete(),
            Err(FetchError::PrematureClose {
                expected: 10,
                received: 4
            })
        ));
    }

    #[test]
    fn unknown_length_is_always_complete() {
        let outcome = FetchOutcome {
            content_length: ContentLength::Unknown,
            received: 0,
        };
        assert!(outcome.ensure_complete().is_ok());
        assert_eq!(ContentLength::Unknown.as_i64(), -1);
    }

    #[test]
    fn huge_known_length_never_reads_as_unknown() {
        assert_eq!(ContentLength::Known(usize::MAX).as_i64(), i64::MAX);
        assert_eq!(ContentLength::Known(1234).as_i64(), 1234);
    }

    #[test]
    fn buffer_parses_json() {
        let buf = FetchedBuffer {
            data: br#"{"name":"logo","size":3}"#.to_vec(),
            content_length: ContentLength::Known(24),
        };
        let value: serde_json::Value = buf.json().unwrap();
        assert_eq!(value["name"], "logo");
        assert_eq!(value["size"], 3);
    }
}
