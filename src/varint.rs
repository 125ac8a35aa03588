//! Variable-length integer encoding per RFC 9000 Section 16.
//!
//! HTTP/3 inherits QUIC's variable-length integer encoding for frame types,
//! frame lengths, session identifiers, and capsule headers. The two most
//! significant bits of the first byte give the encoded length (1, 2, 4, or
//! 8 bytes).

use bytes::{Buf, BufMut};

use crate::error::{Error, ErrorCode, Result};

/// Maximum value that can be encoded (2^62 - 1).
pub const MAX: u64 = (1u64 << 62) - 1;

/// Calculate the encoded length of a varint without encoding it.
pub const fn encoded_len(value: u64) -> usize {
    if value < 64 {
        1
    } else if value < 16384 {
        2
    } else if value < 1073741824 {
        4
    } else {
        8
    }
}

/// Decode a variable-length integer from a byte slice.
///
/// Returns the decoded value and the number of bytes consumed.
///
/// # Errors
///
/// Returns `FrameError` if the buffer does not hold a complete varint.
pub fn decode(data: &[u8]) -> Result<(u64, usize)> {
    if data.is_empty() {
        return Err(Error::protocol(ErrorCode::FrameError, "empty varint buffer"));
    }

    let first = data[0];
    let len = 1usize << (first >> 6);
    if data.len() < len {
        return Err(Error::protocol(
            ErrorCode::FrameError,
            format!("incomplete {}-byte varint", len),
        ));
    }

    let mut value = (first & 0x3f) as u64;
    for &b in &data[1..len] {
        value = (value << 8) | (b as u64);
    }
    Ok((value, len))
}

/// Encode a variable-length integer into a byte buffer.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns error if the value exceeds [`MAX`] or the buffer is too small.
pub fn encode(value: u64, buf: &mut [u8]) -> Result<usize> {
    if value > MAX {
        return Err(Error::protocol(
            ErrorCode::InternalError,
            "varint value exceeds maximum",
        ));
    }

    let len = encoded_len(value);
    if buf.len() < len {
        return Err(Error::protocol(
            ErrorCode::InternalError,
            "buffer too small for varint",
        ));
    }

    match len {
        1 => buf[0] = value as u8,
        2 => {
            buf[0] = 0x40 | ((value >> 8) as u8);
            buf[1] = value as u8;
        }
        4 => {
            buf[0] = 0x80 | ((value >> 24) as u8);
            buf[1] = (value >> 16) as u8;
            buf[2] = (value >> 8) as u8;
            buf[3] = value as u8;
        }
        _ => {
            buf[0] = 0xc0 | ((value >> 56) as u8);
            buf[1] = (value >> 48) as u8;
            buf[2] = (value >> 40) as u8;
            buf[3] = (value >> 32) as u8;
            buf[4] = (value >> 24) as u8;
            buf[5] = (value >> 16) as u8;
            buf[6] = (value >> 8) as u8;
            buf[7] = value as u8;
        }
    }
    Ok(len)
}

/// Decode a variable-length integer from a buffer that implements `Buf`,
/// advancing it by the number of bytes consumed.
///
/// # Errors
///
/// Returns `FrameError` if the buffer doesn't contain a complete varint.
pub fn decode_buf<B: Buf>(buf: &mut B) -> Result<u64> {
    if !buf.has_remaining() {
        return Err(Error::protocol(
            ErrorCode::FrameError,
            "incomplete varint: empty buffer",
        ));
    }

    let first = buf.chunk()[0];
    let len = 1usize << (first >> 6);
    if buf.remaining() < len {
        return Err(Error::protocol(
            ErrorCode::FrameError,
            format!(
                "incomplete varint: need {} bytes, have {}",
                len,
                buf.remaining()
            ),
        ));
    }

    // The varint may straddle chunk boundaries, so collect byte by byte.
    let mut value = (buf.get_u8() & 0x3f) as u64;
    for _ in 1..len {
        value = (value << 8) | (buf.get_u8() as u64);
    }
    Ok(value)
}

/// Encode a variable-length integer into a buffer that implements `BufMut`.
///
/// # Errors
///
/// Returns error if the value exceeds [`MAX`] or space is insufficient.
pub fn encode_buf<B: BufMut>(value: u64, buf: &mut B) -> Result<usize> {
    let required = encoded_len(value);
    if buf.remaining_mut() < required {
        return Err(Error::protocol(
            ErrorCode::InternalError,
            format!(
                "insufficient buffer space: need {} bytes, have {}",
                required,
                buf.remaining_mut()
            ),
        ));
    }

    let mut temp = [0u8; 8];
    let written = encode(value, &mut temp)?;
    buf.put_slice(&temp[..written]);
    Ok(written)
}

/// Incremental decoder for a single varint fed one byte at a time.
///
/// Frame headers can arrive split across arbitrarily small transport
/// chunks, so the frame decoder keeps one of these per header field and
/// resumes where it left off.
#[derive(Debug, Clone, Default)]
pub struct VarintDecoder {
    value: u64,
    expected_len: usize,
    consumed: usize,
}

impl VarintDecoder {
    pub const fn new() -> Self {
        Self {
            value: 0,
            expected_len: 0,
            consumed: 0,
        }
    }

    /// Feed the next byte. Returns `Some((value, total_len))` once the
    /// varint is complete, `None` while more bytes are needed.
    pub fn feed(&mut self, byte: u8) -> Option<(u64, usize)> {
        if self.consumed == 0 {
            self.expected_len = 1usize << (byte >> 6);
            self.value = (byte & 0x3f) as u64;
        } else {
            self.value = (self.value << 8) | (byte as u64);
        }
        self.consumed += 1;
        if self.consumed == self.expected_len {
            Some((self.value, self.consumed))
        } else {
            None
        }
    }

    /// Whether no bytes have been fed yet.
    pub const fn is_fresh(&self) -> bool {
        self.consumed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_encode_decode_roundtrip() {
        let test_values = vec![0, 1, 63, 64, 16383, 16384, 1073741823, 1073741824, MAX];

        for value in test_values {
            let mut buf = BytesMut::new();
            encode_buf(value, &mut buf).unwrap();

            let mut read_buf = buf.clone();
            let decoded = decode_buf(&mut read_buf).unwrap();

            assert_eq!(value, decoded, "roundtrip failed for {}", value);
            assert_eq!(read_buf.remaining(), 0, "buffer not fully consumed");
        }
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(0), 1);
        assert_eq!(encoded_len(63), 1);
        assert_eq!(encoded_len(64), 2);
        assert_eq!(encoded_len(16383), 2);
        assert_eq!(encoded_len(16384), 4);
        assert_eq!(encoded_len(1073741823), 4);
        assert_eq!(encoded_len(1073741824), 8);
        assert_eq!(encoded_len(MAX), 8);
    }

    #[test]
    fn test_rfc_vectors() {
        // RFC 9000 Appendix A.1
        let (v, n) = decode(&[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]).unwrap();
        assert_eq!((v, n), (151_288_809_941_952_652, 8));

        let (v, n) = decode(&[0x9d, 0x7f, 0x3e, 0x7d]).unwrap();
        assert_eq!((v, n), (494_878_333, 4));

        let (v, n) = decode(&[0x7b, 0xbd]).unwrap();
        assert_eq!((v, n), (15293, 2));

        let (v, n) = decode(&[0x25]).unwrap();
        assert_eq!((v, n), (37, 1));
    }

    #[test]
    fn test_incomplete_varint() {
        assert!(decode(&[]).is_err());
        assert!(decode(&[0x40]).is_err());

        let mut buf = BytesMut::from(&[0x40][..]);
        assert!(decode_buf(&mut buf).is_err());
    }

    #[test]
    fn test_value_too_large() {
        assert!(encode(MAX + 1, &mut [0u8; 8]).is_err());
    }

    #[test]
    fn test_incremental_decoder() {
        let mut buf = [0u8; 8];
        let n = encode(16384, &mut buf).unwrap();

        let mut dec = VarintDecoder::new();
        assert!(dec.is_fresh());
        for &b in &buf[..n - 1] {
            assert!(dec.feed(b).is_none());
        }
        assert!(!dec.is_fresh());
        assert_eq!(dec.feed(buf[n - 1]), Some((16384, n)));
    }
}
