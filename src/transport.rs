//! Byte-stream transport boundary.
//!
//! The transport guarantees in-order, gap-free delivery and retains every
//! received byte until the stream marks it consumed. Offsets are absolute
//! stream offsets starting at 0 in each direction.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

/// Reliable ordered byte stream as seen by one request stream.
pub trait StreamTransport {
    /// The contiguous readable bytes starting at absolute `offset`, if
    /// any are buffered there. Does not consume.
    fn peek_readable(&self, offset: u64) -> Option<Bytes>;

    /// Release the next `n` received bytes back to the transport.
    fn mark_consumed(&mut self, n: u64);

    /// Total received bytes marked consumed so far.
    fn bytes_consumed(&self) -> u64;

    /// Whether the peer has finished its side of the stream.
    fn fin_received(&self) -> bool;

    /// Final length of the receive direction, once known.
    fn fin_offset(&self) -> Option<u64>;

    /// Fin received and every byte up to it consumed.
    fn is_read_closed(&self) -> bool;

    /// Append bytes to the send buffer, optionally finishing the stream.
    fn write(&mut self, data: Bytes, fin: bool) -> Result<()>;

    /// Next send-side offset (total bytes ever written).
    fn send_offset(&self) -> u64;

    /// Bytes written but not yet handed to the network.
    fn bytes_buffered_for_write(&self) -> u64;

    /// Whether the send buffer has room for `len` more bytes.
    fn can_write(&self, len: u64) -> bool;
}

/// In-memory transport for tests and local drivers.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    /// Received chunks not yet consumed, starting at `recv_base`.
    recv: VecDeque<Bytes>,
    recv_base: u64,
    recv_len: u64,
    fin_offset: Option<u64>,

    sent: BytesMut,
    send_offset: u64,
    fin_sent: bool,
    /// Send-buffer cap for backpressure tests; unlimited when `None`.
    send_capacity: Option<u64>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_send_capacity(capacity: u64) -> Self {
        Self {
            send_capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Deliver bytes from the peer.
    pub fn deliver(&mut self, data: impl AsRef<[u8]>) {
        let data = data.as_ref();
        if !data.is_empty() {
            self.recv_len += data.len() as u64;
            self.recv.push_back(Bytes::copy_from_slice(data));
        }
    }

    /// Deliver the peer's fin at the current end of received data.
    pub fn deliver_fin(&mut self) {
        self.fin_offset = Some(self.recv_base + self.recv_len);
    }

    /// Everything written so far.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn fin_sent(&self) -> bool {
        self.fin_sent
    }

    /// Drain the send buffer, as the network layer would.
    pub fn take_sent(&mut self) -> Bytes {
        self.sent.split().freeze()
    }
}

impl StreamTransport for MemoryTransport {
    fn peek_readable(&self, offset: u64) -> Option<Bytes> {
        if offset < self.recv_base {
            return None;
        }
        let mut skip = offset - self.recv_base;
        for chunk in &self.recv {
            let len = chunk.len() as u64;
            if skip < len {
                return Some(chunk.slice(skip as usize..));
            }
            skip -= len;
        }
        None
    }

    fn mark_consumed(&mut self, mut n: u64) {
        debug_assert!(n <= self.recv_len);
        self.recv_base += n;
        self.recv_len -= n.min(self.recv_len);
        while n > 0 {
            let front = match self.recv.front_mut() {
                Some(f) => f,
                None => break,
            };
            let len = front.len() as u64;
            if n >= len {
                self.recv.pop_front();
                n -= len;
            } else {
                *front = front.slice(n as usize..);
                n = 0;
            }
        }
    }

    fn bytes_consumed(&self) -> u64 {
        self.recv_base
    }

    fn fin_received(&self) -> bool {
        self.fin_offset.is_some()
    }

    fn fin_offset(&self) -> Option<u64> {
        self.fin_offset
    }

    fn is_read_closed(&self) -> bool {
        self.fin_offset == Some(self.recv_base)
    }

    fn write(&mut self, data: Bytes, fin: bool) -> Result<()> {
        if self.fin_sent {
            return Err(Error::usage("write after fin"));
        }
        if !self.can_write(data.len() as u64) {
            return Err(Error::usage("send buffer full"));
        }
        self.send_offset += data.len() as u64;
        self.sent.extend_from_slice(&data);
        if fin {
            self.fin_sent = true;
        }
        Ok(())
    }

    fn send_offset(&self) -> u64 {
        self.send_offset
    }

    fn bytes_buffered_for_write(&self) -> u64 {
        self.sent.len() as u64
    }

    fn can_write(&self, len: u64) -> bool {
        match self.send_capacity {
            Some(cap) => self.sent.len() as u64 + len <= cap,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_and_consume() {
        let mut t = MemoryTransport::new();
        t.deliver(b"abc");
        t.deliver(b"def");

        assert_eq!(t.peek_readable(0).unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(t.peek_readable(1).unwrap(), Bytes::from_static(b"bc"));
        assert_eq!(t.peek_readable(4).unwrap(), Bytes::from_static(b"ef"));
        assert!(t.peek_readable(6).is_none());

        t.mark_consumed(4);
        assert_eq!(t.bytes_consumed(), 4);
        assert!(t.peek_readable(3).is_none());
        assert_eq!(t.peek_readable(4).unwrap(), Bytes::from_static(b"ef"));
    }

    #[test]
    fn test_fin_and_read_closed() {
        let mut t = MemoryTransport::new();
        t.deliver(b"xy");
        t.deliver_fin();

        assert!(t.fin_received());
        assert_eq!(t.fin_offset(), Some(2));
        assert!(!t.is_read_closed());
        t.mark_consumed(2);
        assert!(t.is_read_closed());
    }

    #[test]
    fn test_write_and_fin() {
        let mut t = MemoryTransport::new();
        t.write(Bytes::from_static(b"hi"), false).unwrap();
        t.write(Bytes::from_static(b"!"), true).unwrap();

        assert_eq!(t.sent(), b"hi!");
        assert_eq!(t.send_offset(), 3);
        assert!(t.fin_sent());
        assert!(matches!(
            t.write(Bytes::from_static(b"no"), false),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn test_send_capacity() {
        let mut t = MemoryTransport::with_send_capacity(4);
        assert!(t.can_write(4));
        assert!(!t.can_write(5));
        assert!(matches!(
            t.write(Bytes::from_static(b"quint"), false),
            Err(Error::Usage(_))
        ));
        t.write(Bytes::from_static(b"abc"), false).unwrap();
        assert!(t.can_write(1));
        assert!(!t.can_write(2));

        t.take_sent();
        assert!(t.can_write(4));
    }

    #[test]
    fn test_empty_write_carries_fin() {
        let mut t = MemoryTransport::new();
        t.write(Bytes::new(), true).unwrap();
        assert!(t.fin_sent());
        assert_eq!(t.send_offset(), 0);
    }
}
