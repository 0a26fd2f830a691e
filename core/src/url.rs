//! URL decomposition into scheme, host, port and path.

use crate::config::{FetchConfig, SchemePolicy};
use crate::error::FetchError;

const HTTPS_PREFIX: &str = "https://";
const HTTP_PREFIX: &str = "http://";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A URL split into the pieces a request needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Always starts with `/`.
    pub path: String,
    /// Port written in the URL, if any. Kept so the `Host` header can echo it.
    pub explicit_port: Option<u16>,
}

impl ParsedUrl {
    /// Split `url` according to the scheme policy and default ports in `config`.
    pub fn parse(url: &str, config: &FetchConfig) -> Result<Self, FetchError> {
        let (scheme, rest) = if let Some(rest) = url.strip_prefix(HTTPS_PREFIX) {
            (Scheme::Https, rest)
        } else if let Some(rest) = url.strip_prefix(HTTP_PREFIX) {
            if config.scheme_policy == SchemePolicy::HttpsOnly {
                return Err(FetchError::malformed(url, "expected https://"));
            }
            (Scheme::Http, rest)
        } else {
            match config.scheme_policy {
                SchemePolicy::FallbackToHttp => {
                    tracing::warn!(url, "URL has no scheme prefix, assuming http");
                    (Scheme::Http, url)
                }
                SchemePolicy::HttpsOnly => {
                    return Err(FetchError::malformed(url, "expected https://"))
                }
                SchemePolicy::Strict => {
                    return Err(FetchError::malformed(url, "expected http:// or https://"))
                }
            }
        };

        if rest.is_empty() {
            return Err(FetchError::malformed(url, "nothing after scheme"));
        }

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };

        let (host, explicit_port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| FetchError::malformed(url, "invalid port"))?;
                (host, Some(port))
            }
            None => (authority, None),
        };

        if host.is_empty() {
            return Err(FetchError::malformed(url, "empty host"));
        }

        let default_port = match scheme {
            Scheme::Http => config.default_http_port,
            Scheme::Https => config.default_https_port,
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port: explicit_port.unwrap_or(default_port),
            path: path.to_string(),
            explicit_port,
        })
    }

    /// Value for the `Host` header: the host, plus the port when one was written.
    pub fn authority(&self) -> String {
        match self.explicit_port {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> Result<ParsedUrl, FetchError> {
        ParsedUrl::parse(url, &FetchConfig::default())
    }

    #[test]
    fn scheme_names() {
        assert_eq!(Scheme::Http.as_str(), "http");
        assert_eq!(Scheme::Https.as_str(), "https");
    }

    #[test]
    fn https_url_uses_443() {
        let url = parse("https://host/path").unwrap();
        assert_eq!(url.scheme, Scheme::Https);
        assert_eq!(url.host, "host");
        assert_eq!(url.path, "/path");
        assert_eq!(url.port, 443);
    }

    #[test]
    fn http_url_uses_80() {
        let url = parse("http://host/path/to/file.jpg").unwrap();
        assert_eq!(url.scheme, Scheme::Http);
        assert_eq!(url.host, "host");
        assert_eq!(url.path, "/path/to/file.jpg");
        assert_eq!(url.port, 80);
    }

    #[test]
    fn missing_path_becomes_root() {
        let url = parse("https://host").unwrap();
        assert_eq!(url.host, "host");
        assert_eq!(url.path, "/");
    }

    #[test]
    fn query_stays_in_path() {
        let url = parse("http://host/a?b=c").unwrap();
        assert_eq!(url.path, "/a?b=c");
    }

    #[test]
    fn explicit_port_overrides_default() {
        let url = parse("http://127.0.0.1:8080/x").unwrap();
        assert_eq!(url.host, "127.0.0.1");
        assert_eq!(url.port, 8080);
        assert_eq!(url.authority(), "127.0.0.1:8080");
    }

    #[test]
    fn authority_without_port_is_bare_host() {
        assert_eq!(parse("https://example.com/a").unwrap().authority(), "example.com");
    }

    #[test]
    fn scheme_prefix_is_case_sensitive() {
        assert!(matches!(
            parse("HTTPS://host/path"),
            Err(FetchError::MalformedUrl { .. })
        ));
    }

    #[test]
    fn unrecognized_prefix_is_malformed() {
        assert!(matches!(
            parse("ftp://host/file"),
            Err(FetchError::MalformedUrl { .. })
        ));
        assert!(matches!(parse("host/file"), Err(FetchError::MalformedUrl { .. })));
    }

    #[test]
    fn prefix_without_content_is_malformed() {
        assert!(matches!(parse("https://"), Err(FetchError::MalformedUrl { .. })));
        assert!(matches!(parse("http:///path"), Err(FetchError::MalformedUrl { .. })));
    }

    #[test]
    fn bad_port_is_malformed() {
        assert!(matches!(
            parse("http://host:http/x"),
            Err(FetchError::MalformedUrl { .. })
        ));
        assert!(matches!(
            parse("http://host:70000/x"),
            Err(FetchError::MalformedUrl { .. })
        ));
    }

    #[test]
    fn https_only_policy_rejects_http() {
        let config = FetchConfig::image();
        assert!(ParsedUrl::parse("http://host/a", &config).is_err());
        assert!(ParsedUrl::parse("https://host/a", &config).is_ok());
    }

    #[test]
    fn fallback_policy_treats_bare_host_as_http() {
        let config = FetchConfig::file();
        let url = ParsedUrl::parse("example.com/logo.png", &config).unwrap();
        assert_eq!(url.scheme, Scheme::Http);
        assert_eq!(url.host, "example.com");
        assert_eq!(url.path, "/logo.png");
        assert_eq!(url.port, 80);
    }

    #[test]
    fn configured_default_ports_apply() {
        let config = FetchConfig {
            default_https_port: 8443,
            ..FetchConfig::default()
        };
        assert_eq!(ParsedUrl::parse("https://h/p", &config).unwrap().port, 8443);
    }
}
