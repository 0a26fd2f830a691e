//! Engine configuration.
//!
//! # Design
//! The two legacy fetchers (generic files and images) differed only in a few
//! knobs. `FetchConfig` carries those knobs so a single `FetchClient` covers
//! both; `FetchConfig::file()` and `FetchConfig::image()` reproduce them.
//! Every field has a serde default so partial JSON documents load cleanly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Read timeout applied to the transport before every request.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 2000;

/// `Accept` value sent by the file preset.
pub const FILE_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,file/webp,*/*;q=0.8";

/// `Accept` value sent by the image preset.
pub const IMAGE_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// What to do with a URL whose scheme prefix is not recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemePolicy {
    /// Accept `http://` and `https://`; anything else is malformed.
    #[default]
    Strict,
    /// Accept only `https://`.
    HttpsOnly,
    /// Accept `http://` and `https://`; treat anything else as a bare
    /// `host/path` reached over plain HTTP.
    FallbackToHttp,
}

/// Configuration shared by every fetch a `FetchClient` performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub default_http_port: u16,
    pub default_https_port: u16,
    pub scheme_policy: SchemePolicy,
    /// Discard bytes between the header terminator and the first `{`.
    pub skip_non_json_prefix: bool,
    /// `None` omits the `User-Agent` header entirely.
    pub user_agent: Option<String>,
    /// Sent when the request itself carries no `Accept` value.
    pub accept: Option<String>,
    pub read_timeout_ms: u64,
    /// Treat a 200 without Content-Length as a failure.
    pub require_content_length: bool,
    /// Largest body `fetch_to_buffer` will hold. `None` means no limit.
    pub max_body_bytes: Option<usize>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_http_port: 80,
            default_https_port: 443,
            scheme_policy: SchemePolicy::Strict,
            skip_non_json_prefix: false,
            user_agent: Some(concat!("fetcher/", env!("CARGO_PKG_VERSION")).to_string()),
            accept: None,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            require_content_length: true,
            max_body_bytes: None,
        }
    }
}

impl FetchConfig {
    /// Settings of the legacy generic file fetcher: lenient scheme handling,
    /// a browser-like `Accept` and an `Arduino` user agent.
    pub fn file() -> Self {
        Self {
            scheme_policy: SchemePolicy::FallbackToHttp,
            user_agent: Some("Arduino".to_string()),
            accept: Some(FILE_ACCEPT.to_string()),
            ..Self::default()
        }
    }

    /// Settings of the legacy image fetcher: HTTPS only and no user agent.
    pub fn image() -> Self {
        Self {
            scheme_policy: SchemePolicy::HttpsOnly,
            user_agent: None,
            accept: Some(IMAGE_ACCEPT.to_string()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
