//! In-memory transport that replays a scripted response.
//!
//! # Design
//! The response is queued as a list of chunks. `available()` only ever
//! reports the chunk at the front of the queue, so a script of
//! `[128, 128, 44]` bytes is delivered in exactly those three slices, the way
//! a network peer delivers segments. An empty chunk is an idle tick:
//! `available()` reports zero until the copier calls `idle()`. Once the queue
//! drains the peer is treated as having closed the connection, unless
//! `stay_open` was set, in which case the next `idle()` behaves like a read
//! timeout and drops the connection.
//!
//! Everything the engine writes is recorded so tests can assert on the exact
//! request bytes.

use std::collections::VecDeque;
use std::time::Duration;

use crate::transport::Transport;

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    refuse_connect: bool,
    stay_open: bool,
    write_limit: Option<usize>,
    chunks: VecDeque<Vec<u8>>,
    connected: bool,
    written: Vec<u8>,
    write_calls: usize,
    connects: Vec<(String, u16)>,
    read_timeout: Option<Duration>,
    flush_count: usize,
    close_count: usize,
    idle_count: usize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connect` fail.
    pub fn refuse_connect(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    /// Queue one chunk of response bytes.
    pub fn respond(mut self, chunk: impl AsRef<[u8]>) -> Self {
        let chunk = chunk.as_ref();
        if !chunk.is_empty() {
            self.chunks.push_back(chunk.to_vec());
        }
        self
    }

    /// Queue `bytes` split into chunks of at most `size` bytes.
    pub fn respond_in_chunks(mut self, bytes: impl AsRef<[u8]>, size: usize) -> Self {
        for chunk in bytes.as_ref().chunks(size.max(1)) {
            self.chunks.push_back(chunk.to_vec());
        }
        self
    }

    /// Queue a moment where nothing is available.
    pub fn idle_tick(mut self) -> Self {
        self.chunks.push_back(Vec::new());
        self
    }

    /// Keep the connection open after the script drains.
    pub fn stay_open(mut self) -> Self {
        self.stay_open = true;
        self
    }

    /// Accept only `limit` bytes in total; later writes come up short.
    pub fn accept_writes(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn written_str(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    pub fn connects(&self) -> &[(String, u16)] {
        &self.connects
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    pub fn close_count(&self) -> usize {
        self.close_count
    }

    pub fn idle_count(&self) -> usize {
        self.idle_count
    }

    /// Unread scripted bytes, idle ticks excluded.
    pub fn remaining(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    fn skip_idle_ticks(&mut self) {
        while self.chunks.front().is_some_and(Vec::is_empty) {
            self.chunks.pop_front();
        }
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, host: &str, port: u16) -> bool {
        self.connects.push((host.to_string(), port));
        self.connected = !self.refuse_connect;
        self.connected
    }

    fn flush(&mut self) {
        self.flush_count += 1;
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = Some(timeout);
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        self.write_calls += 1;
        if !self.connected {
            return 0;
        }
        let accepted = match self.write_limit {
            Some(limit) => bytes.len().min(limit.saturating_sub(self.written.len())),
            None => bytes.len(),
        };
        self.written.extend_from_slice(&bytes[..accepted]);
        accepted
    }

    fn available(&mut self) -> usize {
        if !self.connected {
            return 0;
        }
        self.chunks.front().map_or(0, Vec::len)
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.connected {
            return 0;
        }
        let Some(front) = self.chunks.front_mut() else {
            return 0;
        };
        let n = buf.len().min(front.len());
        buf[..n].copy_from_slice(&front[..n]);
        front.drain(..n);
        if front.is_empty() && n > 0 {
            self.chunks.pop_front();
        }
        n
    }

    fn read_byte(&mut self) -> Option<u8> {
        if !self.connected {
            return None;
        }
        self.skip_idle_ticks();
        let front = self.chunks.front_mut()?;
        let b = front.remove(0);
        if front.is_empty() {
            self.chunks.pop_front();
        }
        Some(b)
    }

    fn peek(&mut self) -> Option<u8> {
        if !self.connected {
            return None;
        }
        self.skip_idle_ticks();
        self.chunks.front().map(|c| c[0])
    }

    fn is_connected(&mut self) -> bool {
        self.connected && (self.stay_open || !self.chunks.is_empty())
    }

    fn close(&mut self) {
        self.connected = false;
        self.chunks.clear();
        self.close_count += 1;
    }

    fn idle(&mut self) {
        self.idle_count += 1;
        if self.chunks.front().is_some_and(Vec::is_empty) {
            self.chunks.pop_front();
        } else if self.chunks.is_empty() && self.stay_open {
            // Read timeout with a silent peer.
            self.connected = false;
        }
    }
}
