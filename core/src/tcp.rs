//! Plain TCP transport over `std::net::TcpStream`.
//!
//! # Design
//! Incoming bytes are staged in a local queue. `available()` tops the queue
//! up with a non-blocking read; timed reads and `idle()` block on the socket
//! for at most the read timeout. A timeout inside `idle()` marks the peer as
//! gone, so a stalled server ends the body copy instead of hanging it. The
//! same timeout bounds `connect` and every write.
//!
//! No TLS: an `https://` URL reaches port 443 in the clear. Callers that need
//! TLS provide their own `Transport`.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::DEFAULT_READ_TIMEOUT_MS;
use crate::transport::Transport;

const FILL_SIZE: usize = 1024;

#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    incoming: VecDeque<u8>,
    eof: bool,
    read_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            stream: None,
            incoming: VecDeque::new(),
            eof: false,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }

    /// Pull whatever the socket has into `incoming`. Returns `false` when the
    /// read timed out without data.
    fn fill(&mut self, blocking: bool) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            self.eof = true;
            return true;
        };
        if stream.set_nonblocking(!blocking).is_err() {
            self.eof = true;
            return true;
        }
        let mut buf = [0u8; FILL_SIZE];
        let result = loop {
            match stream.read(&mut buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        if !blocking {
            let _ = stream.set_nonblocking(false);
        }
        match result {
            Ok(0) => {
                self.eof = true;
                true
            }
            Ok(n) => {
                self.incoming.extend(&buf[..n]);
                true
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "socket read failed");
                self.eof = true;
                true
            }
        }
    }

    fn wait_for_byte(&mut self) -> bool {
        if self.incoming.is_empty() && !self.eof {
            self.fill(true);
        }
        !self.incoming.is_empty()
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> bool {
        self.close();
        let addrs = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::debug!(host, port, error = %e, "address resolution failed");
                return false;
            }
        };
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.read_timeout) {
                Ok(stream) => {
                    if let Err(e) = stream.set_read_timeout(Some(self.read_timeout)) {
                        tracing::debug!(error = %e, "could not set read timeout");
                    }
                    if let Err(e) = stream.set_write_timeout(Some(self.read_timeout)) {
                        tracing::debug!(error = %e, "could not set write timeout");
                    }
                    let _ = stream.set_nodelay(true);
                    self.stream = Some(stream);
                    self.eof = false;
                    return true;
                }
                Err(e) => tracing::debug!(%addr, error = %e, "tcp connect failed"),
            }
        }
        false
    }

    fn flush(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            let _ = stream.flush();
        }
        self.incoming.clear();
    }

    /// Also bounds `connect` and every socket write.
    fn set_read_timeout(&mut self, timeout: Duration) {
        // A zero duration is rejected by connect_timeout and means "no
        // timeout" to the socket.
        self.read_timeout = timeout.max(Duration::from_millis(1));
        if let Some(stream) = self.stream.as_ref() {
            let _ = stream.set_read_timeout(Some(self.read_timeout));
            let _ = stream.set_write_timeout(Some(self.read_timeout));
        }
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        match self.stream.as_mut() {
            Some(stream) => match stream.write_all(bytes) {
                Ok(()) => bytes.len(),
                Err(e) => {
                    tracing::debug!(error = %e, "socket write failed");
                    0
                }
            },
            None => 0,
        }
    }

    fn available(&mut self) -> usize {
        if self.incoming.is_empty() && !self.eof {
            self.fill(false);
        }
        self.incoming.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.wait_for_byte() {
            return 0;
        }
        let n = buf.len().min(self.incoming.len());
        for (slot, b) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = b;
        }
        n
    }

    fn read_byte(&mut self) -> Option<u8> {
        if !self.wait_for_byte() {
            return None;
        }
        self.incoming.pop_front()
    }

    fn peek(&mut self) -> Option<u8> {
        if !self.wait_for_byte() {
            return None;
        }
        self.incoming.front().copied()
    }

    fn is_connected(&mut self) -> bool {
        self.stream.is_some() && (!self.eof || !self.incoming.is_empty())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.incoming.clear();
        self.eof = false;
    }

    fn idle(&mut self) {
        if self.incoming.is_empty() && !self.eof && !self.fill(true) {
            tracing::debug!(timeout = ?self.read_timeout, "peer silent, treating as closed");
            self.eof = true;
        }
    }
}
