//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! C callers hand the engine two callback tables: `FfiTransport` for the
//! connection and `FfiSink` for streamed body bytes. Both carry an opaque
//! `ctx` pointer passed back on every call. `CallbackTransport` and
//! `CallbackSink` adapt the tables to the core `Transport` and
//! `std::io::Write` traits. Buffer-mode results come back in a heap-allocated
//! `FfiFetchResult` that the caller releases with `fetcher_free_result`.

use std::ffi::{c_void, CString};
use std::io;
use std::os::raw::c_char;
use std::time::Duration;

use fetcher_core::{ContentLength, FetchError, FetchedBuffer, Transport};

/// Opaque handle to a `FetchClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiFetchClient {
    pub(crate) inner: fetcher_core::FetchClient,
}

// ---------------------------------------------------------------------------
// Transport callbacks
// ---------------------------------------------------------------------------

/// Connection callbacks supplied by the caller.
///
/// `flush`, `set_timeout` and `idle` may be null; every other callback is
/// required. `read_byte` and `peek` return the byte value or `-1` on timeout.
#[repr(C)]
pub struct FfiTransport {
    pub ctx: *mut c_void,
    pub connect: Option<extern "C" fn(ctx: *mut c_void, host: *const c_char, port: u16) -> bool>,
    pub flush: Option<extern "C" fn(ctx: *mut c_void)>,
    pub set_timeout: Option<extern "C" fn(ctx: *mut c_void, timeout_ms: u32)>,
    pub write: Option<extern "C" fn(ctx: *mut c_void, data: *const u8, len: usize) -> usize>,
    pub available: Option<extern "C" fn(ctx: *mut c_void) -> usize>,
    pub read: Option<extern "C" fn(ctx: *mut c_void, buf: *mut u8, len: usize) -> usize>,
    pub read_byte: Option<extern "C" fn(ctx: *mut c_void) -> i32>,
    pub peek: Option<extern "C" fn(ctx: *mut c_void) -> i32>,
    pub connected: Option<extern "C" fn(ctx: *mut c_void) -> bool>,
    pub stop: Option<extern "C" fn(ctx: *mut c_void)>,
    pub idle: Option<extern "C" fn(ctx: *mut c_void)>,
}

impl FfiTransport {
    /// Name of the first required callback that is null.
    pub(crate) fn missing_callback(&self) -> Option<&'static str> {
        [
            ("connect", self.connect.is_none()),
            ("write", self.write.is_none()),
            ("available", self.available.is_none()),
            ("read", self.read.is_none()),
            ("read_byte", self.read_byte.is_none()),
            ("peek", self.peek.is_none()),
            ("connected", self.connected.is_none()),
            ("stop", self.stop.is_none()),
        ]
        .into_iter()
        .find_map(|(name, missing)| missing.then_some(name))
    }
}

/// `Transport` backed by an `FfiTransport` table. Only built after
/// `missing_callback` returned `None`; a null required callback still
/// degrades to "nothing happened" rather than a crash.
pub(crate) struct CallbackTransport<'a> {
    table: &'a FfiTransport,
}

impl<'a> CallbackTransport<'a> {
    pub(crate) fn new(table: &'a FfiTransport) -> Self {
        Self { table }
    }
}

fn byte_from_c(value: i32) -> Option<u8> {
    u8::try_from(value).ok()
}

impl Transport for CallbackTransport<'_> {
    fn connect(&mut self, host: &str, port: u16) -> bool {
        let (Some(connect), Ok(host)) = (self.table.connect, CString::new(host)) else {
            return false;
        };
        connect(self.table.ctx, host.as_ptr(), port)
    }

    fn flush(&mut self) {
        if let Some(flush) = self.table.flush {
            flush(self.table.ctx);
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        if let Some(set_timeout) = self.table.set_timeout {
            let ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
            set_timeout(self.table.ctx, ms);
        }
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        self.table
            .write
            .map_or(0, |write| write(self.table.ctx, bytes.as_ptr(), bytes.len()).min(bytes.len()))
    }

    fn available(&mut self) -> usize {
        self.table.available.map_or(0, |available| available(self.table.ctx))
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.table
            .read
            .map_or(0, |read| read(self.table.ctx, buf.as_mut_ptr(), buf.len()).min(buf.len()))
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.table
            .read_byte
            .and_then(|read_byte| byte_from_c(read_byte(self.table.ctx)))
    }

    fn peek(&mut self) -> Option<u8> {
        self.table
            .peek
            .and_then(|peek| byte_from_c(peek(self.table.ctx)))
    }

    fn is_connected(&mut self) -> bool {
        self.table
            .connected
            .is_some_and(|connected| connected(self.table.ctx))
    }

    fn close(&mut self) {
        if let Some(stop) = self.table.stop {
            stop(self.table.ctx);
        }
    }

    fn idle(&mut self) {
        match self.table.idle {
            Some(idle) => idle(self.table.ctx),
            None => std::thread::yield_now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sink callback
// ---------------------------------------------------------------------------

/// Destination for streamed body bytes. `write` returns how many bytes it
/// accepted; returning fewer than `len` aborts the fetch.
#[repr(C)]
pub struct FfiSink {
    pub ctx: *mut c_void,
    pub write: Option<extern "C" fn(ctx: *mut c_void, data: *const u8, len: usize) -> usize>,
}

pub(crate) struct CallbackSink<'a> {
    sink: &'a FfiSink,
}

impl<'a> CallbackSink<'a> {
    pub(crate) fn new(sink: &'a FfiSink) -> Self {
        Self { sink }
    }
}

impl io::Write for CallbackSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(write) = self.sink.write else {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "sink has no write callback"));
        };
        Ok(write(self.sink.ctx, buf.as_ptr(), buf.len()).min(buf.len()))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiFetchResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    MalformedUrl = 1,
    ConnectFailed = 2,
    SendFailed = 3,
    InvalidStatusLine = 4,
    HttpStatus = 5,
    InvalidFraming = 6,
    UnknownLength = 7,
    EmptyBody = 8,
    PrematureClose = 9,
    Sink = 10,
    Panic = 11,
    NullArg = 12,
    BodyTooLarge = 13,
}

impl From<&FetchError> for FfiErrorCode {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::MalformedUrl { .. } => FfiErrorCode::MalformedUrl,
            FetchError::ConnectFailed { .. } => FfiErrorCode::ConnectFailed,
            FetchError::RequestSendFailed => FfiErrorCode::SendFailed,
            FetchError::InvalidStatusLine => FfiErrorCode::InvalidStatusLine,
            FetchError::NonSuccessStatus(_) => FfiErrorCode::HttpStatus,
            FetchError::InvalidResponseFraming => FfiErrorCode::InvalidFraming,
            FetchError::UnknownLength => FfiErrorCode::UnknownLength,
            FetchError::EmptyBody => FfiErrorCode::EmptyBody,
            FetchError::BodyTooLarge { .. } => FfiErrorCode::BodyTooLarge,
            FetchError::PrematureClose { .. } => FfiErrorCode::PrematureClose,
            FetchError::Sink(_) => FfiErrorCode::Sink,
        }
    }
}

/// Result envelope for buffer-mode fetches.
///
/// On success `data` points to `length` bytes. With a known Content-Length
/// the buffer is exactly that long even if the peer closed early; `received`
/// says how many leading bytes are real and the rest are zero. On failure
/// `data` is null, `length` is `-1` and `error_message` describes the error.
#[repr(C)]
pub struct FfiFetchResult {
    pub success: bool,
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: i32,
    pub data: *mut u8,
    pub length: i64,
    pub received: usize,
}

impl FfiFetchResult {
    pub(crate) fn ok_buffer(buffer: FetchedBuffer) -> *mut Self {
        let received = buffer.data.len();
        let mut data = buffer.data;
        if let ContentLength::Known(n) = buffer.content_length {
            data.resize(n, 0);
        }
        let length = data.len();
        let data = if data.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(data.into_boxed_slice()) as *mut u8
        };
        Box::into_raw(Box::new(FfiFetchResult {
            success: true,
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 200,
            data,
            length: i64::try_from(length).unwrap_or(i64::MAX),
            received,
        }))
    }

    pub(crate) fn from_error(err: &FetchError) -> *mut Self {
        let http_status = match err {
            FetchError::NonSuccessStatus(code) => *code,
            _ => 0,
        };
        Self::failure(err.into(), &err.to_string(), http_status)
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, &format!("null argument: {name}"), 0)
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, msg, 0)
    }

    fn failure(error_code: FfiErrorCode, msg: &str, http_status: i32) -> *mut Self {
        Box::into_raw(Box::new(FfiFetchResult {
            success: false,
            error_code,
            error_message: CString::new(msg).unwrap_or_default().into_raw(),
            http_status,
            data: std::ptr::null_mut(),
            length: -1,
            received: 0,
        }))
    }
}
