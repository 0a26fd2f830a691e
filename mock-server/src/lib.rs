//! Fixture HTTP server for exercising the fetcher against real sockets.
//!
//! Two flavours:
//! - `app()` / `run()`: a well-behaved axum server with a few fixture files,
//!   an authorization-protected route and a header echo.
//! - `serve_raw()`: a bare TCP responder that replays canned bytes, for
//!   responses axum would never produce (missing Content-Length, broken
//!   framing, junk ahead of a JSON body, bodies longer than advertised).

use std::{collections::BTreeMap, time::Duration};

use axum::{
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Token accepted by `/private/{name}`.
pub const AUTH_TOKEN: &str = "Bearer fetcher-test-token";

/// A file the server can hand out.
pub struct Fixture {
    pub name: &'static str,
    pub content_type: &'static str,
    pub body: fn() -> Vec<u8>,
}

pub const FIXTURES: &[Fixture] = &[
    Fixture {
        name: "hello.txt",
        content_type: "text/plain",
        body: || b"HELLO".to_vec(),
    },
    Fixture {
        name: "blob.bin",
        content_type: "application/octet-stream",
        body: || pattern(300),
    },
    Fixture {
        name: "large.bin",
        content_type: "application/octet-stream",
        body: || pattern(64 * 1024 + 17),
    },
    Fixture {
        name: "album.json",
        content_type: "application/json",
        body: || br#"{"name":"Blue Train","tracks":5,"cover":"/files/cover.webp"}"#.to_vec(),
    },
    Fixture {
        name: "cover.webp",
        content_type: "image/webp",
        body: || pattern(1500),
    },
];

/// Deterministic byte pattern so tests can rebuild expected bodies.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn fixture(name: &str) -> Option<&'static Fixture> {
    FIXTURES.iter().find(|f| f.name == name)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub content_type: String,
    pub size: usize,
}

pub fn app() -> Router {
    Router::new()
        .route("/files/{name}", get(get_file))
        .route("/private/{name}", get(get_private_file))
        .route("/manifest", get(manifest))
        .route("/echo-headers", get(echo_headers))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn file_response(name: &str) -> Response {
    match fixture(name) {
        Some(f) => {
            tracing::debug!(name, "serving fixture");
            ([(header::CONTENT_TYPE, f.content_type)], (f.body)()).into_response()
        }
        None => {
            tracing::debug!(name, "no such fixture");
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
    }
}

async fn get_file(Path(name): Path<String>) -> Response {
    file_response(&name)
}

async fn get_private_file(headers: HeaderMap, Path(name): Path<String>) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .is_some_and(|v| v.as_bytes() == AUTH_TOKEN.as_bytes());
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }
    file_response(&name)
}

async fn manifest() -> Json<Vec<ManifestEntry>> {
    Json(
        FIXTURES
            .iter()
            .map(|f| ManifestEntry {
                name: f.name.to_string(),
                content_type: f.content_type.to_string(),
                size: (f.body)().len(),
            })
            .collect(),
    )
}

/// Request headers as a JSON object, lower-cased names.
async fn echo_headers(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    Json(
        headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect(),
    )
}

// ------------------------------------------------------------------
// Raw responder
// ------------------------------------------------------------------

/// Canned bytes for `serve_raw`, written in `parts` with `pause` between
/// consecutive writes.
#[derive(Clone, Debug, Default)]
pub struct RawResponse {
    pub parts: Vec<Vec<u8>>,
    pub pause: Duration,
}

impl RawResponse {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            parts: vec![bytes.into()],
            pause: Duration::ZERO,
        }
    }

    pub fn then(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.parts.push(bytes.into());
        self
    }

    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

/// Answer every connection on `listener` with `response`, then close it.
/// The request head is read and discarded first.
pub async fn serve_raw(listener: TcpListener, response: RawResponse) -> Result<(), std::io::Error> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let response = response.clone();
        tokio::spawn(async move {
            if let Err(e) = answer_raw(stream, &response).await {
                tracing::debug!(%peer, error = %e, "raw responder connection failed");
            }
        });
    }
}

async fn answer_raw(mut stream: TcpStream, response: &RawResponse) -> Result<(), std::io::Error> {
    let mut head = Vec::new();
    let mut buf = [0u8; 512];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        head.extend_from_slice(&buf[..n]);
    }

    for (i, part) in response.parts.iter().enumerate() {
        if i > 0 && !response.pause.is_zero() {
            tokio::time::sleep(response.pause).await;
        }
        stream.write_all(part).await?;
        stream.flush().await?;
    }
    stream.shutdown().await
}
