//! C-ABI wrapper around `fetcher-core`.
//!
//! # Overview
//! Exposes the fetch engine through `extern "C"` functions. The caller
//! supplies the connection as an `FfiTransport` callback table (or lets the
//! library open a plain TCP socket with `fetcher_fetch_to_buffer_tcp`).
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Stream mode reports a plain `bool`; buffer mode returns an
//!   `FfiFetchResult` envelope carrying the bytes or an error code.
//! - The C caller owns all returned pointers and must call the matching
//!   `fetcher_*_free` / `fetcher_free_*` function to release them.

pub mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::catch_unwind;

use fetcher_core::{FetchConfig, FetchError, FetchRequest, TcpTransport};

use types::*;

/// Path of the C header generated at build time, if cbindgen succeeded.
pub const GENERATED_HEADER: Option<&str> = option_env!("FETCHER_HEADER");

/// Returned by `fetcher_make_get_request` when an argument is null.
pub const FETCHER_NULL_ARG: i32 = -3;

/// Borrow a nullable C string as an owned Rust string.
fn opt_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

fn fetch_request(
    url: *const c_char,
    authorization: *const c_char,
    accept: *const c_char,
) -> Option<FetchRequest> {
    let mut request = FetchRequest::new(opt_string(url)?);
    request.authorization = opt_string(authorization);
    request.accept = opt_string(accept);
    Some(request)
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a fetch client.
///
/// `config_json` may be null for defaults, or a JSON object with any subset
/// of the `FetchConfig` fields. Returns null if the JSON does not parse.
/// The caller must free the returned pointer with `fetcher_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn fetcher_client_new(config_json: *const c_char) -> *mut FfiFetchClient {
    catch_unwind(|| {
        let config = match opt_string(config_json) {
            None => FetchConfig::default(),
            Some(json) => match FetchConfig::from_json(&json) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(error = %e, "invalid fetcher config");
                    return std::ptr::null_mut();
                }
            },
        };
        Box::into_raw(Box::new(FfiFetchClient {
            inner: fetcher_core::FetchClient::with_config(config),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a client with the legacy file-fetcher settings.
#[unsafe(no_mangle)]
pub extern "C" fn fetcher_client_new_file() -> *mut FfiFetchClient {
    catch_unwind(|| {
        Box::into_raw(Box::new(FfiFetchClient {
            inner: fetcher_core::FetchClient::with_config(FetchConfig::file()),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a client with the legacy image-fetcher settings.
#[unsafe(no_mangle)]
pub extern "C" fn fetcher_client_new_image() -> *mut FfiFetchClient {
    catch_unwind(|| {
        Box::into_raw(Box::new(FfiFetchClient {
            inner: fetcher_core::FetchClient::with_config(FetchConfig::image()),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `fetcher_client_new*`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn fetcher_client_free(client: *mut FfiFetchClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

// ---------------------------------------------------------------------------
// Fetch operations
// ---------------------------------------------------------------------------

/// Fetch `url` and stream the body into `sink` in chunks of at most 128
/// bytes. `authorization` and `accept` may be null.
///
/// Returns `true` once the body copy finished, including when the peer
/// closed before the advertised length. Returns `false` on any error or null
/// argument; in that case `sink` received nothing unless the failure
/// happened mid-body.
#[unsafe(no_mangle)]
pub extern "C" fn fetcher_fetch_to_stream(
    client: *const FfiFetchClient,
    transport: *const FfiTransport,
    url: *const c_char,
    authorization: *const c_char,
    accept: *const c_char,
    sink: *const FfiSink,
) -> bool {
    catch_unwind(|| {
        if client.is_null() || transport.is_null() || sink.is_null() {
            return false;
        }
        let Some(request) = fetch_request(url, authorization, accept) else {
            return false;
        };
        let client = unsafe { &*client };
        let table = unsafe { &*transport };
        if let Some(name) = table.missing_callback() {
            tracing::warn!(callback = name, "transport callback missing");
            return false;
        }
        let mut transport = CallbackTransport::new(table);
        let mut sink = CallbackSink::new(unsafe { &*sink });
        client
            .inner
            .fetch_to_stream(&mut transport, request, &mut sink)
            .is_ok()
    })
    .unwrap_or(false)
}

/// Fetch `url` into a newly allocated buffer over the caller's transport.
///
/// Never returns null. The caller must free the result with
/// `fetcher_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn fetcher_fetch_to_buffer(
    client: *const FfiFetchClient,
    transport: *const FfiTransport,
    url: *const c_char,
    authorization: *const c_char,
    accept: *const c_char,
) -> *mut FfiFetchResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiFetchResult::null_arg("client");
        }
        if transport.is_null() {
            return FfiFetchResult::null_arg("transport");
        }
        let Some(request) = fetch_request(url, authorization, accept) else {
            return FfiFetchResult::null_arg("url");
        };
        let table = unsafe { &*transport };
        if let Some(name) = table.missing_callback() {
            return FfiFetchResult::null_arg(name);
        }
        let client = unsafe { &*client };
        buffer_result(client.inner.fetch_to_buffer(&mut CallbackTransport::new(table), request))
    })
    .unwrap_or_else(|_| FfiFetchResult::panic("panic in fetcher_fetch_to_buffer"))
}

/// Like `fetcher_fetch_to_buffer`, but over a plain TCP connection opened by
/// the library. `https://` URLs are fetched without TLS.
#[unsafe(no_mangle)]
pub extern "C" fn fetcher_fetch_to_buffer_tcp(
    client: *const FfiFetchClient,
    url: *const c_char,
    authorization: *const c_char,
    accept: *const c_char,
) -> *mut FfiFetchResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiFetchResult::null_arg("client");
        }
        let Some(request) = fetch_request(url, authorization, accept) else {
            return FfiFetchResult::null_arg("url");
        };
        let client = unsafe { &*client };
        buffer_result(client.inner.fetch_to_buffer(&mut TcpTransport::new(), request))
    })
    .unwrap_or_else(|_| FfiFetchResult::panic("panic in fetcher_fetch_to_buffer_tcp"))
}

fn buffer_result(result: Result<fetcher_core::FetchedBuffer, FetchError>) -> *mut FfiFetchResult {
    match result {
        Ok(buffer) => FfiFetchResult::ok_buffer(buffer),
        Err(e) => FfiFetchResult::from_error(&e),
    }
}

/// Connect to `host:port`, send a GET for `path` and return the status code.
///
/// Returns `-1` if the connection failed, `-2` if the request could not be
/// sent and `FETCHER_NULL_ARG` for a null required argument. A reply without
/// a valid HTTP/1.x status line also yields `-1`. The connection stays open
/// so the caller can keep reading the response through its transport.
#[unsafe(no_mangle)]
pub extern "C" fn fetcher_make_get_request(
    client: *const FfiFetchClient,
    transport: *const FfiTransport,
    port: u16,
    path: *const c_char,
    authorization: *const c_char,
    accept: *const c_char,
    host: *const c_char,
) -> i32 {
    catch_unwind(|| {
        if client.is_null() || transport.is_null() {
            return FETCHER_NULL_ARG;
        }
        let (Some(path), Some(host)) = (opt_string(path), opt_string(host)) else {
            return FETCHER_NULL_ARG;
        };
        let table = unsafe { &*transport };
        if table.missing_callback().is_some() {
            return FETCHER_NULL_ARG;
        }
        let client = unsafe { &*client };
        let authorization = opt_string(authorization);
        let accept = opt_string(accept);
        let mut transport = CallbackTransport::new(table);
        match client.inner.make_get_request(
            &mut transport,
            port,
            &path,
            authorization.as_deref(),
            accept.as_deref(),
            &host,
        ) {
            Ok(status) => status.status_code,
            Err(FetchError::RequestSendFailed) => -2,
            Err(_) => -1,
        }
    })
    .unwrap_or(-1)
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiFetchResult`, its buffer and its error message. Safe to call
/// with null.
#[unsafe(no_mangle)]
pub extern "C" fn fetcher_free_result(result: *mut FfiFetchResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { std::ffi::CString::from_raw(result.error_message) });
        }
        if !result.data.is_null() {
            let len = usize::try_from(result.length).unwrap_or(0);
            let slice = std::ptr::slice_from_raw_parts_mut(result.data, len);
            drop(unsafe { Box::from_raw(slice) });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{c_void, CString};
    use std::ptr;

    use fetcher_core::{ScriptedTransport, Transport};

    // Callback table that forwards to a `ScriptedTransport` behind `ctx`.

    fn scripted(ctx: *mut c_void) -> &'static mut ScriptedTransport {
        unsafe { &mut *(ctx as *mut ScriptedTransport) }
    }

    extern "C" fn cb_connect(ctx: *mut c_void, host: *const c_char, port: u16) -> bool {
        let host = unsafe { CStr::from_ptr(host) }.to_str().unwrap();
        scripted(ctx).connect(host, port)
    }
    extern "C" fn cb_flush(ctx: *mut c_void) {
        scripted(ctx).flush();
    }
    extern "C" fn cb_set_timeout(ctx: *mut c_void, ms: u32) {
        scripted(ctx).set_read_timeout(std::time::Duration::from_millis(u64::from(ms)));
    }
    extern "C" fn cb_write(ctx: *mut c_void, data: *const u8, len: usize) -> usize {
        scripted(ctx).write(unsafe { std::slice::from_raw_parts(data, len) })
    }
    extern "C" fn cb_available(ctx: *mut c_void) -> usize {
        scripted(ctx).available()
    }
    extern "C" fn cb_read(ctx: *mut c_void, buf: *mut u8, len: usize) -> usize {
        scripted(ctx).read(unsafe { std::slice::from_raw_parts_mut(buf, len) })
    }
    extern "C" fn cb_read_byte(ctx: *mut c_void) -> i32 {
        scripted(ctx).read_byte().map_or(-1, i32::from)
    }
    extern "C" fn cb_peek(ctx: *mut c_void) -> i32 {
        scripted(ctx).peek().map_or(-1, i32::from)
    }
    extern "C" fn cb_connected(ctx: *mut c_void) -> bool {
        scripted(ctx).is_connected()
    }
    extern "C" fn cb_stop(ctx: *mut c_void) {
        scripted(ctx).close();
    }
    extern "C" fn cb_idle(ctx: *mut c_void) {
        scripted(ctx).idle();
    }

    fn table(script: &mut ScriptedTransport) -> FfiTransport {
        FfiTransport {
            ctx: script as *mut ScriptedTransport as *mut c_void,
            connect: Some(cb_connect),
            flush: Some(cb_flush),
            set_timeout: Some(cb_set_timeout),
            write: Some(cb_write),
            available: Some(cb_available),
            read: Some(cb_read),
            read_byte: Some(cb_read_byte),
            peek: Some(cb_peek),
            connected: Some(cb_connected),
            stop: Some(cb_stop),
            idle: Some(cb_idle),
        }
    }

    extern "C" fn sink_write(ctx: *mut c_void, data: *const u8, len: usize) -> usize {
        let out = unsafe { &mut *(ctx as *mut Vec<u8>) };
        out.extend_from_slice(unsafe { std::slice::from_raw_parts(data, len) });
        len
    }

    fn sink(out: &mut Vec<u8>) -> FfiSink {
        FfiSink {
            ctx: out as *mut Vec<u8> as *mut c_void,
            write: Some(sink_write),
        }
    }

    const HELLO: &str = "HTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nHELLO";

    #[test]
    fn client_new_and_free() {
        let client = fetcher_client_new(ptr::null());
        assert!(!client.is_null());
        fetcher_client_free(client);
    }

    #[test]
    fn client_new_with_json_config() {
        let json = CString::new(r#"{"scheme_policy":"https_only","read_timeout_ms":500}"#).unwrap();
        let client = fetcher_client_new(json.as_ptr());
        assert!(!client.is_null());
        let config = unsafe { (*client).inner.config().clone() };
        assert_eq!(config.scheme_policy, fetcher_core::SchemePolicy::HttpsOnly);
        assert_eq!(config.read_timeout_ms, 500);
        fetcher_client_free(client);
    }

    #[test]
    fn client_new_rejects_bad_json() {
        let json = CString::new("{not json").unwrap();
        assert!(fetcher_client_new(json.as_ptr()).is_null());
    }

    #[test]
    fn generated_header_declares_entry_points() {
        let Some(path) = GENERATED_HEADER else {
            return;
        };
        let header = std::fs::read_to_string(path).unwrap();
        assert!(header.contains("fetcher_fetch_to_buffer"));
        assert!(header.contains("fetcher_free_result"));
    }

    #[test]
    fn client_free_null_is_safe() {
        fetcher_client_free(ptr::null_mut());
        fetcher_free_result(ptr::null_mut());
    }

    #[test]
    fn buffer_fetch_over_callbacks() {
        let client = fetcher_client_new(ptr::null());
        let mut script = ScriptedTransport::new().respond(HELLO);
        let transport = table(&mut script);
        let url = CString::new("https://example.com/hello.txt").unwrap();

        let result = fetcher_fetch_to_buffer(client, &transport, url.as_ptr(), ptr::null(), ptr::null());
        let r = unsafe { &*result };
        assert!(r.success);
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.length, 5);
        assert_eq!(r.received, 5);
        assert_eq!(unsafe { std::slice::from_raw_parts(r.data, 5) }, b"HELLO");

        fetcher_free_result(result);
        fetcher_client_free(client);
        assert_eq!(script.close_count(), 1);
        assert_eq!(script.read_timeout(), Some(std::time::Duration::from_millis(2000)));
    }

    #[test]
    fn partial_buffer_is_full_length_and_zero_filled() {
        let client = fetcher_client_new(ptr::null());
        let mut script =
            ScriptedTransport::new().respond("HTTP/1.0 200 OK\r\nContent-Length: 8\r\n\r\nabc");
        let transport = table(&mut script);
        let url = CString::new("https://example.com/a").unwrap();

        let result = fetcher_fetch_to_buffer(client, &transport, url.as_ptr(), ptr::null(), ptr::null());
        let r = unsafe { &*result };
        assert!(r.success);
        assert_eq!(r.length, 8);
        assert_eq!(r.received, 3);
        assert_eq!(unsafe { std::slice::from_raw_parts(r.data, 8) }, b"abc\0\0\0\0\0");

        fetcher_free_result(result);
        fetcher_client_free(client);
    }

    #[test]
    fn not_found_result_carries_status() {
        let client = fetcher_client_new(ptr::null());
        let mut script = ScriptedTransport::new().respond("HTTP/1.1 404 Not Found\r\n\r\n");
        let transport = table(&mut script);
        let url = CString::new("https://example.com/missing").unwrap();

        let result = fetcher_fetch_to_buffer(client, &transport, url.as_ptr(), ptr::null(), ptr::null());
        let r = unsafe { &*result };
        assert!(!r.success);
        assert_eq!(r.error_code, FfiErrorCode::HttpStatus);
        assert_eq!(r.http_status, 404);
        assert_eq!(r.length, -1);
        assert!(r.data.is_null());
        let msg = unsafe { CStr::from_ptr(r.error_message) }.to_str().unwrap();
        assert_eq!(msg, "HTTP 404");

        fetcher_free_result(result);
        fetcher_client_free(client);
    }

    #[test]
    fn stream_fetch_over_callbacks() {
        let client = fetcher_client_new(ptr::null());
        let mut script = ScriptedTransport::new().respond(HELLO);
        let transport = table(&mut script);
        let mut out = Vec::new();
        let sink = sink(&mut out);
        let url = CString::new("http://example.com/hello.txt").unwrap();

        let ok = fetcher_fetch_to_stream(client, &transport, url.as_ptr(), ptr::null(), ptr::null(), &sink);
        assert!(ok);
        assert_eq!(out, b"HELLO");
        fetcher_client_free(client);
    }

    #[test]
    fn refused_connect_streams_nothing() {
        let client = fetcher_client_new(ptr::null());
        let mut script = ScriptedTransport::new().refuse_connect();
        let transport = table(&mut script);
        let mut out = Vec::new();
        let sink = sink(&mut out);
        let url = CString::new("https://example.com/a").unwrap();

        let ok = fetcher_fetch_to_stream(client, &transport, url.as_ptr(), ptr::null(), ptr::null(), &sink);
        assert!(!ok);
        assert!(out.is_empty());
        assert_eq!(script.write_calls(), 0);
        fetcher_client_free(client);
    }

    #[test]
    fn missing_callback_is_null_arg() {
        let client = fetcher_client_new(ptr::null());
        let mut script = ScriptedTransport::new().respond(HELLO);
        let mut transport = table(&mut script);
        transport.peek = None;
        let url = CString::new("https://example.com/a").unwrap();

        let result = fetcher_fetch_to_buffer(client, &transport, url.as_ptr(), ptr::null(), ptr::null());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::NullArg);
        let msg = unsafe { CStr::from_ptr(r.error_message) }.to_str().unwrap();
        assert_eq!(msg, "null argument: peek");
        fetcher_free_result(result);
        fetcher_client_free(client);
    }

    #[test]
    fn null_url_is_null_arg() {
        let client = fetcher_client_new(ptr::null());
        let mut script = ScriptedTransport::new();
        let transport = table(&mut script);
        let result = fetcher_fetch_to_buffer(client, &transport, ptr::null(), ptr::null(), ptr::null());
        assert_eq!(unsafe { (*result).error_code }, FfiErrorCode::NullArg);
        fetcher_free_result(result);
        fetcher_client_free(client);
    }

    #[test]
    fn make_get_request_status_and_sentinels() {
        let client = fetcher_client_new(ptr::null());
        let path = CString::new("/a").unwrap();
        let host = CString::new("example.com").unwrap();

        let mut script = ScriptedTransport::new().respond("HTTP/1.1 204 No Content\r\n\r\n");
        let transport = table(&mut script);
        let status = fetcher_make_get_request(
            client,
            &transport,
            80,
            path.as_ptr(),
            ptr::null(),
            ptr::null(),
            host.as_ptr(),
        );
        assert_eq!(status, 204);
        assert!(script.is_connected());

        let mut refused = ScriptedTransport::new().refuse_connect();
        let transport = table(&mut refused);
        let status = fetcher_make_get_request(
            client,
            &transport,
            80,
            path.as_ptr(),
            ptr::null(),
            ptr::null(),
            host.as_ptr(),
        );
        assert_eq!(status, -1);

        let mut short = ScriptedTransport::new().accept_writes(4).respond("HTTP/1.1 200 OK\r\n");
        let transport = table(&mut short);
        let status = fetcher_make_get_request(
            client,
            &transport,
            80,
            path.as_ptr(),
            ptr::null(),
            ptr::null(),
            host.as_ptr(),
        );
        assert_eq!(status, -2);

        let status = fetcher_make_get_request(
            client,
            &transport,
            80,
            ptr::null(),
            ptr::null(),
            ptr::null(),
            host.as_ptr(),
        );
        assert_eq!(status, FETCHER_NULL_ARG);
        fetcher_client_free(client);
    }

    #[test]
    fn image_client_rejects_plain_http() {
        let client = fetcher_client_new_image();
        assert!(!client.is_null());
        let mut script = ScriptedTransport::new().respond(HELLO);
        let transport = table(&mut script);
        let url = CString::new("http://i.example.com/cover.webp").unwrap();

        let result = fetcher_fetch_to_buffer(client, &transport, url.as_ptr(), ptr::null(), ptr::null());
        let r = unsafe { &*result };
        assert!(!r.success);
        assert_eq!(r.error_code, FfiErrorCode::MalformedUrl);
        assert!(script.connects().is_empty());

        fetcher_free_result(result);
        fetcher_client_free(client);
    }

    #[test]
    fn file_client_sends_legacy_headers() {
        let client = fetcher_client_new_file();
        assert!(!client.is_null());
        let mut script = ScriptedTransport::new().respond(HELLO);
        let transport = table(&mut script);
        let url = CString::new("example.com/hello.txt").unwrap();

        let result = fetcher_fetch_to_buffer(client, &transport, url.as_ptr(), ptr::null(), ptr::null());
        assert!(unsafe { (*result).success });
        let written = script.written_str();
        assert!(written.contains("User-Agent: Arduino\r\n"));
        assert!(written.contains(&format!("Accept: {}\r\n", fetcher_core::config::FILE_ACCEPT)));
        assert_eq!(script.connects(), &[("example.com".to_string(), 80)]);

        fetcher_free_result(result);
        fetcher_client_free(client);
    }

    #[test]
    fn body_limit_maps_to_error_code() {
        let json = CString::new(r#"{"max_body_bytes":2}"#).unwrap();
        let client = fetcher_client_new(json.as_ptr());
        let mut script = ScriptedTransport::new().respond(HELLO);
        let transport = table(&mut script);
        let url = CString::new("https://example.com/hello.txt").unwrap();

        let result = fetcher_fetch_to_buffer(client, &transport, url.as_ptr(), ptr::null(), ptr::null());
        assert_eq!(unsafe { (*result).error_code }, FfiErrorCode::BodyTooLarge);

        fetcher_free_result(result);
        fetcher_client_free(client);
    }

    #[test]
    fn tcp_buffer_fetch_against_raw_server() {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::serve_raw(listener, mock_server::RawResponse::new(HELLO)).await
            })
            .unwrap();
        });

        let client = fetcher_client_new(ptr::null());
        let url = CString::new(format!("http://{addr}/hello.txt")).unwrap();
        let result = fetcher_fetch_to_buffer_tcp(client, url.as_ptr(), ptr::null(), ptr::null());
        let r = unsafe { &*result };
        assert!(r.success, "{:?}", r.error_code);
        assert_eq!(unsafe { std::slice::from_raw_parts(r.data, 5) }, b"HELLO");
        fetcher_free_result(result);
        fetcher_client_free(client);
    }
}
