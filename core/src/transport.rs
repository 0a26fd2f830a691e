//! The connection abstraction the engine talks to.
//!
//! # Design
//! `Transport` follows the shape of a microcontroller network client: a
//! non-blocking `available()` count, bounded `read`, and timed single-byte
//! reads that give up after the configured read timeout. The search helpers
//! (`read_until`, `find`, `find_until`) are provided on top of `read_byte`,
//! so an implementation only supplies the primitives.

use std::time::Duration;

/// Result of `Transport::find_until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindOutcome {
    /// The target was consumed.
    Found,
    /// The terminator was consumed before the target appeared.
    Terminated,
    /// The stream ended or timed out first.
    Exhausted,
}

/// A bidirectional byte stream to one origin server.
///
/// The engine borrows a transport for the duration of one fetch and always
/// calls `close` before returning.
pub trait Transport {
    /// Open a connection. Returns `false` if the peer is unreachable.
    fn connect(&mut self, host: &str, port: u16) -> bool;

    /// Flush pending output and drop stale input from a previous use.
    fn flush(&mut self);

    /// Bound for every timed read (`read_byte`, `peek`, blocking `read`).
    fn set_read_timeout(&mut self, timeout: Duration);

    /// Write `bytes`, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Bytes that can be read right now without blocking.
    fn available(&mut self) -> usize;

    /// Read up to `buf.len()` bytes, returning how many were read.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Timed single-byte read. `None` on timeout or end of stream.
    fn read_byte(&mut self) -> Option<u8>;

    /// Timed look at the next byte without consuming it.
    fn peek(&mut self) -> Option<u8>;

    /// `true` while the peer is connected or unread bytes remain.
    fn is_connected(&mut self) -> bool;

    /// Close the connection. Calling it twice is harmless.
    fn close(&mut self);

    /// Called by the body copier when nothing is available.
    fn idle(&mut self) {
        std::thread::yield_now();
    }

    /// Read bytes into `buf` until `delimiter`, end of stream, or `buf` is
    /// full. The delimiter is consumed but not stored. Returns bytes stored.
    fn read_until(&mut self, delimiter: u8, buf: &mut [u8]) -> usize {
        let mut len = 0;
        while len < buf.len() {
            match self.read_byte() {
                Some(b) if b == delimiter => break,
                Some(b) => {
                    buf[len] = b;
                    len += 1;
                }
                None => break,
            }
        }
        len
    }

    /// Consume bytes up to and including `target`. Returns `false` if the
    /// stream ran out first.
    fn find(&mut self, target: &[u8]) -> bool {
        self.find_until(target, &[]) == FindOutcome::Found
    }

    /// Like `find`, but stop early once `terminator` has been consumed.
    /// An empty terminator never matches.
    fn find_until(&mut self, target: &[u8], terminator: &[u8]) -> FindOutcome {
        if target.is_empty() {
            return FindOutcome::Found;
        }
        let keep = target.len().max(terminator.len());
        let mut window: Vec<u8> = Vec::with_capacity(keep + 1);
        while let Some(b) = self.read_byte() {
            if window.len() == keep {
                window.remove(0);
            }
            window.push(b);
            if window.ends_with(target) {
                return FindOutcome::Found;
            }
            if !terminator.is_empty() && window.ends_with(terminator) {
                return FindOutcome::Terminated;
            }
        }
        FindOutcome::Exhausted
    }
}

/// Closes the wrapped transport when dropped, so every exit path of a fetch
/// releases the connection.
pub(crate) struct CloseGuard<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> CloseGuard<'a, T> {
    pub(crate) fn new(transport: &'a mut T) -> Self {
        Self { transport }
    }
}

impl<T: Transport + ?Sized> std::ops::Deref for CloseGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.transport
    }
}

impl<T: Transport + ?Sized> std::ops::DerefMut for CloseGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.transport
    }
}

impl<T: Transport + ?Sized> Drop for CloseGuard<'_, T> {
    fn drop(&mut self) {
        if self.transport.is_connected() {
            tracing::debug!("closing transport");
        }
        self.transport.close();
    }
}
