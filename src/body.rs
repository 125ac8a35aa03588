//! Buffered body bytes and deferred consumption accounting.
//!
//! The transport retains every received byte until it is explicitly marked
//! consumed. Body bytes cannot be marked consumed until the application
//! reads them, and framing bytes that arrive after unread body (a DATA
//! frame header, a trailing HEADERS block) cannot be marked consumed ahead
//! of that body without creating a gap. The manager queues body fragments
//! and folds each stretch of trailing non-body bytes into the fragment it
//! follows, so a single consume call releases both at once.

use std::collections::VecDeque;

use bytes::{Buf, Bytes};

#[derive(Debug)]
struct Fragment {
    body: Bytes,
    /// Non-body bytes immediately following this fragment on the wire,
    /// released together with the fragment's final body byte.
    trailing_non_body: u64,
}

/// Queue of unread body fragments with interleaved non-body counts.
#[derive(Debug, Default)]
pub struct BodyManager {
    fragments: VecDeque<Fragment>,
    /// Lifetime total of body bytes received, for diagnostics. Unaffected
    /// by `clear`.
    total_body_bytes_received: u64,
}

impl BodyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `len` non-body bytes (frame headers, header payloads).
    ///
    /// Returns the number of bytes the caller must mark consumed now:
    /// `len` if no unread body is queued ahead of them, otherwise 0 and
    /// the count is deferred onto the last fragment.
    pub fn record_non_body(&mut self, len: u64) -> u64 {
        match self.fragments.back_mut() {
            Some(fragment) => {
                fragment.trailing_non_body += len;
                0
            }
            None => len,
        }
    }

    /// Queue a body fragment. `body` must be non-empty and the underlying
    /// bytes must stay valid until consumed.
    pub fn record_body(&mut self, body: Bytes) {
        debug_assert!(!body.is_empty());
        self.total_body_bytes_received += body.len() as u64;
        self.fragments.push_back(Fragment {
            body,
            trailing_non_body: 0,
        });
    }

    /// Mark `n` body bytes as read by the application. `n` may be 0.
    ///
    /// Returns the total number of stream bytes to mark consumed on the
    /// transport: the body bytes plus every trailing non-body count of
    /// each fully read fragment.
    pub fn consume(&mut self, mut n: u64) -> u64 {
        debug_assert!(n <= self.readable_bytes());
        let mut total = 0u64;
        while n > 0 {
            let fragment = match self.fragments.front_mut() {
                Some(f) => f,
                None => break,
            };
            let len = fragment.body.len() as u64;
            if n >= len {
                total += len + fragment.trailing_non_body;
                n -= len;
                self.fragments.pop_front();
            } else {
                fragment.body.advance(n as usize);
                total += n;
                n = 0;
            }
        }
        total
    }

    /// Expose up to `max` unread fragments without consuming them.
    pub fn peek(&self, max: usize) -> Vec<Bytes> {
        self.fragments
            .iter()
            .take(max)
            .map(|f| f.body.clone())
            .collect()
    }

    /// Copy body bytes into `buffers`, consuming as it goes.
    ///
    /// Returns `(bytes_to_mark_consumed, body_bytes_read)`.
    pub fn read_into(&mut self, buffers: &mut [&mut [u8]]) -> (u64, u64) {
        let mut body_read = 0u64;
        {
            let mut fragments = self.fragments.iter();
            let mut current = fragments.next();
            let mut offset = 0usize;
            'outer: for buf in buffers.iter_mut() {
                let mut filled = 0usize;
                while filled < buf.len() {
                    let fragment = match current {
                        Some(f) => f,
                        None => break 'outer,
                    };
                    let avail = &fragment.body[offset..];
                    if avail.is_empty() {
                        current = fragments.next();
                        offset = 0;
                        continue;
                    }
                    let take = avail.len().min(buf.len() - filled);
                    buf[filled..filled + take].copy_from_slice(&avail[..take]);
                    filled += take;
                    offset += take;
                    body_read += take as u64;
                }
            }
        }
        let to_mark = self.consume(body_read);
        (to_mark, body_read)
    }

    pub fn has_bytes_to_read(&self) -> bool {
        !self.fragments.is_empty()
    }

    /// Total unread body bytes currently buffered.
    pub fn readable_bytes(&self) -> u64 {
        self.fragments.iter().map(|f| f.body.len() as u64).sum()
    }

    pub fn total_body_bytes_received(&self) -> u64 {
        self.total_body_bytes_received
    }

    /// Drop all fragment references without consuming. Used when the
    /// transport discards unread data on reset.
    pub fn clear(&mut self) {
        self.fragments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_body_with_empty_queue_is_immediate() {
        let mut mgr = BodyManager::new();
        assert_eq!(mgr.record_non_body(3), 3);
        assert_eq!(mgr.record_non_body(0), 0);
    }

    #[test]
    fn test_non_body_after_body_is_deferred() {
        let mut mgr = BodyManager::new();
        assert_eq!(mgr.record_non_body(2), 2);
        mgr.record_body(Bytes::from_static(b"ab"));
        assert_eq!(mgr.record_non_body(5), 0);
        // Reading both body bytes releases the deferred 5 as well.
        assert_eq!(mgr.consume(2), 2 + 5);
        assert!(!mgr.has_bytes_to_read());
    }

    #[test]
    fn test_consume_zero_on_empty_manager() {
        let mut mgr = BodyManager::new();
        assert_eq!(mgr.consume(0), 0);
    }

    #[test]
    fn test_consume_spanning_fragments() {
        let mut mgr = BodyManager::new();
        mgr.record_body(Bytes::from_static(b"ab"));
        assert_eq!(mgr.record_non_body(2), 0);
        mgr.record_body(Bytes::from_static(b"cde"));
        assert_eq!(mgr.record_non_body(1), 0);

        assert_eq!(mgr.readable_bytes(), 5);
        // 2 body + 2 trailing + 3 body + 1 trailing
        assert_eq!(mgr.consume(5), 8);
    }

    #[test]
    fn test_partial_consume_leaves_trailing_deferred() {
        let mut mgr = BodyManager::new();
        mgr.record_body(Bytes::from_static(b"abcd"));
        assert_eq!(mgr.record_non_body(3), 0);

        assert_eq!(mgr.consume(2), 2);
        assert_eq!(mgr.readable_bytes(), 2);
        assert_eq!(mgr.consume(2), 2 + 3);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut mgr = BodyManager::new();
        mgr.record_body(Bytes::from_static(b"ab"));
        mgr.record_body(Bytes::from_static(b"cd"));

        let peeked = mgr.peek(10);
        assert_eq!(peeked.len(), 2);
        assert_eq!(&peeked[0][..], b"ab");
        assert_eq!(&peeked[1][..], b"cd");
        assert_eq!(mgr.readable_bytes(), 4);

        assert_eq!(mgr.peek(1).len(), 1);
    }

    #[test]
    fn test_read_into() {
        let mut mgr = BodyManager::new();
        mgr.record_body(Bytes::from_static(b"ab"));
        assert_eq!(mgr.record_non_body(2), 0);
        mgr.record_body(Bytes::from_static(b"cd"));

        let mut buf = [0u8; 8];
        let (to_mark, read) = mgr.read_into(&mut [&mut buf[..]]);
        assert_eq!(read, 4);
        assert_eq!(&buf[..4], b"abcd");
        // 4 body bytes + the 2 deferred frame-header bytes
        assert_eq!(to_mark, 6);
        assert!(!mgr.has_bytes_to_read());
    }

    #[test]
    fn test_read_into_small_buffers() {
        let mut mgr = BodyManager::new();
        mgr.record_body(Bytes::from_static(b"abcde"));

        let mut b1 = [0u8; 2];
        let mut b2 = [0u8; 2];
        let (to_mark, read) = mgr.read_into(&mut [&mut b1[..], &mut b2[..]]);
        assert_eq!(read, 4);
        assert_eq!(to_mark, 4);
        assert_eq!(&b1, b"ab");
        assert_eq!(&b2, b"cd");
        assert_eq!(mgr.readable_bytes(), 1);
    }

    #[test]
    fn test_clear_keeps_lifetime_total() {
        let mut mgr = BodyManager::new();
        mgr.record_body(Bytes::from_static(b"abc"));
        mgr.clear();
        assert!(!mgr.has_bytes_to_read());
        assert_eq!(mgr.total_body_bytes_received(), 3);
    }

    #[test]
    fn test_conservation_law() {
        let mut mgr = BodyManager::new();
        let mut input_total = 0u64;
        let mut released = 0u64;

        released += mgr.record_non_body(4);
        input_total += 4;
        mgr.record_body(Bytes::from_static(b"hello"));
        input_total += 5;
        released += mgr.record_non_body(2);
        input_total += 2;
        mgr.record_body(Bytes::from_static(b"world!"));
        input_total += 6;
        released += mgr.record_non_body(3);
        input_total += 3;

        released += mgr.consume(0);
        released += mgr.consume(5);
        released += mgr.consume(6);
        assert_eq!(released, input_total);
    }
}
