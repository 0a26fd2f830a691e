//! Streaming body copy from a transport into a sink.
//!
//! # Design
//! The copy loop polls `available()` and moves at most one 128-byte chunk per
//! iteration, so memory use is fixed no matter how large the body is. With a
//! known length a read never asks for more than what is still outstanding,
//! which means bytes a server sends beyond its Content-Length are left
//! unread. With an unknown length the loop runs until the peer closes; the
//! sink then holds whatever arrived, which may be more or less than the
//! caller hoped for. HTTP/1.0 bodies delimited by connection close cannot do
//! better.

use std::io::{self, Write};

use crate::error::FetchError;
use crate::transport::Transport;
use crate::types::{ContentLength, FetchOutcome};

/// Largest read the copier issues.
pub const CHUNK_SIZE: usize = 128;

/// Move body bytes from `transport` into `sink` until `length` bytes have
/// arrived or the connection closes.
pub fn copy_body<T, W>(
    transport: &mut T,
    sink: &mut W,
    length: ContentLength,
) -> Result<FetchOutcome, FetchError>
where
    T: Transport + ?Sized,
    W: Write + ?Sized,
{
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut remaining = length.known();
    let mut received = 0usize;

    while transport.is_connected() && remaining != Some(0) {
        let available = transport.available();
        if available == 0 {
            transport.idle();
            continue;
        }

        let want = remaining.map_or(available, |r| available.min(r)).min(CHUNK_SIZE);
        let n = transport.read(&mut chunk[..want]);
        if n == 0 {
            transport.idle();
            continue;
        }

        sink.write_all(&chunk[..n])?;
        received += n;
        if let Some(r) = remaining.as_mut() {
            *r -= n;
        }
    }

    if let Some(r) = remaining.filter(|r| *r > 0) {
        tracing::debug!(received, missing = r, "connection closed before body completed");
    }

    Ok(FetchOutcome {
        content_length: length,
        received,
    })
}

/// In-memory sink with an optional hard capacity.
///
/// For a known length the storage is reserved once, up front, and writes
/// past the end are refused instead of growing the allocation. For an
/// unknown length the buffer grows, up to `limit` when one is set.
#[derive(Debug, Default)]
pub struct BufferSink {
    data: Vec<u8>,
    capacity: Option<usize>,
    overflowed: bool,
}

impl BufferSink {
    /// A sink for `length`, refusing bodies larger than `limit`.
    pub fn for_length(length: ContentLength, limit: Option<usize>) -> Result<Self, FetchError> {
        match length {
            ContentLength::Known(n) => {
                if let Some(limit) = limit.filter(|limit| n > *limit) {
                    tracing::warn!(content_length = n, limit, "body exceeds limit");
                    return Err(FetchError::BodyTooLarge { limit });
                }
                let mut data = Vec::new();
                data.try_reserve_exact(n).map_err(|_| {
                    FetchError::Sink(io::Error::new(
                        io::ErrorKind::OutOfMemory,
                        format!("cannot allocate {n} byte body"),
                    ))
                })?;
                Ok(Self {
                    data,
                    capacity: Some(n),
                    overflowed: false,
                })
            }
            ContentLength::Unknown => Ok(Self {
                capacity: limit,
                ..Self::default()
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A write was refused because the sink was full.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Write for BufferSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = match self.capacity {
            Some(cap) => cap - self.data.len(),
            None => buf.len(),
        };
        if room == 0 && !buf.is_empty() {
            self.overflowed = true;
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "body exceeds buffer capacity",
            ));
        }
        let n = buf.len().min(room);
        self.data.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
