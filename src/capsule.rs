//! Capsule sub-protocol carried inside tunnel-mode streams (RFC 9297).
//!
//! Each capsule is a self-delimiting unit: varint type, varint length,
//! payload. Datagram and session-signal capsules come from RFC 9297 and
//! the WebTransport drafts; address capsules from RFC 9484. Reserved
//! capsule types of the grease pattern are skipped; any other unknown
//! type fails the stream.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, ErrorCode, Result};
use crate::varint;

pub const CAPSULE_TYPE_DATAGRAM: u64 = 0x00;
pub const CAPSULE_TYPE_ADDRESS_ASSIGN: u64 = 0x01;
pub const CAPSULE_TYPE_ADDRESS_REQUEST: u64 = 0x02;
pub const CAPSULE_TYPE_ROUTE_ADVERTISEMENT: u64 = 0x03;
pub const CAPSULE_TYPE_CLOSE_SESSION: u64 = 0x2843;
pub const CAPSULE_TYPE_DRAIN_SESSION: u64 = 0x78ae;

/// Close reasons longer than this are refused on encode and truncation
/// is not attempted on decode.
pub const MAX_CLOSE_MESSAGE_LEN: usize = 1024;

/// Reserved capsule types of the form `0x1f * N + 0x21`, ignored when
/// received (RFC 9297 Section 3.2).
pub fn is_grease_capsule_type(capsule_type: u64) -> bool {
    capsule_type >= 0x21 && (capsule_type - 0x21) % 0x1f == 0
}

/// A parsed capsule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capsule {
    Datagram(Bytes),
    CloseSession { error_code: u32, message: String },
    DrainSession,
    AddressAssign(Bytes),
    AddressRequest(Bytes),
    RouteAdvertisement(Bytes),
}

impl Capsule {
    pub fn capsule_type(&self) -> u64 {
        match self {
            Capsule::Datagram(_) => CAPSULE_TYPE_DATAGRAM,
            Capsule::CloseSession { .. } => CAPSULE_TYPE_CLOSE_SESSION,
            Capsule::DrainSession => CAPSULE_TYPE_DRAIN_SESSION,
            Capsule::AddressAssign(_) => CAPSULE_TYPE_ADDRESS_ASSIGN,
            Capsule::AddressRequest(_) => CAPSULE_TYPE_ADDRESS_REQUEST,
            Capsule::RouteAdvertisement(_) => CAPSULE_TYPE_ROUTE_ADVERTISEMENT,
        }
    }

    /// Serialize this capsule into `buf`. Returns the encoded length.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<u64> {
        let payload: Bytes = match self {
            Capsule::Datagram(p)
            | Capsule::AddressAssign(p)
            | Capsule::AddressRequest(p)
            | Capsule::RouteAdvertisement(p) => p.clone(),
            Capsule::CloseSession {
                error_code,
                message,
            } => {
                if message.len() > MAX_CLOSE_MESSAGE_LEN {
                    return Err(Error::usage("close session message too long"));
                }
                let mut p = BytesMut::with_capacity(4 + message.len());
                p.put_u32(*error_code);
                p.put_slice(message.as_bytes());
                p.freeze()
            }
            Capsule::DrainSession => Bytes::new(),
        };

        let mut written = varint::encode_buf(self.capsule_type(), buf)?;
        written += varint::encode_buf(payload.len() as u64, buf)?;
        buf.put_slice(&payload);
        Ok(written as u64 + payload.len() as u64)
    }

    fn decode(capsule_type: u64, mut payload: Bytes) -> Result<Option<Capsule>> {
        match capsule_type {
            CAPSULE_TYPE_DATAGRAM => Ok(Some(Capsule::Datagram(payload))),
            CAPSULE_TYPE_ADDRESS_ASSIGN => Ok(Some(Capsule::AddressAssign(payload))),
            CAPSULE_TYPE_ADDRESS_REQUEST => Ok(Some(Capsule::AddressRequest(payload))),
            CAPSULE_TYPE_ROUTE_ADVERTISEMENT => Ok(Some(Capsule::RouteAdvertisement(payload))),
            CAPSULE_TYPE_DRAIN_SESSION => {
                if !payload.is_empty() {
                    return Err(Error::reset(
                        ErrorCode::MessageError,
                        "drain session capsule with payload",
                    ));
                }
                Ok(Some(Capsule::DrainSession))
            }
            CAPSULE_TYPE_CLOSE_SESSION => {
                if payload.len() < 4 {
                    return Err(Error::reset(
                        ErrorCode::MessageError,
                        "close session capsule too short",
                    ));
                }
                if payload.len() - 4 > MAX_CLOSE_MESSAGE_LEN {
                    return Err(Error::reset(
                        ErrorCode::MessageError,
                        "close session message too long",
                    ));
                }
                let error_code = payload.get_u32();
                let message = String::from_utf8(payload.to_vec()).map_err(|_| {
                    Error::reset(
                        ErrorCode::MessageError,
                        "close session message is not valid UTF-8",
                    )
                })?;
                Ok(Some(Capsule::CloseSession {
                    error_code,
                    message,
                }))
            }
            t if is_grease_capsule_type(t) => Ok(None),
            t => Err(Error::reset(
                ErrorCode::MessageError,
                format!("unknown capsule type {:#x}", t),
            )),
        }
    }
}

/// Incremental capsule parser.
///
/// Bytes are buffered internally until a whole capsule is available, so
/// callers can feed arbitrary transport chunks. A partial capsule left in
/// the buffer when the stream ends is a protocol violation the stream
/// checks via [`CapsuleParser::has_buffered_data`].
#[derive(Debug, Default)]
pub struct CapsuleParser {
    buf: BytesMut,
}

impl CapsuleParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every capsule completed by them. Grease
    /// capsules are skipped and do not appear in the output.
    pub fn ingest(&mut self, data: &[u8]) -> Result<Vec<Capsule>> {
        self.buf.extend_from_slice(data);
        let mut capsules = Vec::new();

        loop {
            let (capsule_type, type_len) = match varint::decode(&self.buf) {
                Ok(v) => v,
                Err(_) => break,
            };
            let (payload_len, len_len) = match varint::decode(&self.buf[type_len..]) {
                Ok(v) => v,
                Err(_) => break,
            };
            let header_len = type_len + len_len;
            let total = header_len as u64 + payload_len;
            if (self.buf.len() as u64) < total {
                break;
            }

            self.buf.advance(header_len);
            let payload = self.buf.split_to(payload_len as usize).freeze();
            if let Some(capsule) = Capsule::decode(capsule_type, payload)? {
                capsules.push(capsule);
            }
        }
        Ok(capsules)
    }

    /// Whether a partial capsule is buffered.
    pub fn has_buffered_data(&self) -> bool {
        !self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(capsule: &Capsule) -> BytesMut {
        let mut buf = BytesMut::new();
        capsule.encode(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_datagram_roundtrip() {
        let capsule = Capsule::Datagram(Bytes::from_static(b"ping"));
        let buf = encoded(&capsule);

        let mut parser = CapsuleParser::new();
        let capsules = parser.ingest(&buf).unwrap();
        assert_eq!(capsules, vec![capsule]);
        assert!(!parser.has_buffered_data());
    }

    #[test]
    fn test_close_session_roundtrip() {
        let capsule = Capsule::CloseSession {
            error_code: 7,
            message: "going away".to_string(),
        };
        let buf = encoded(&capsule);

        let mut parser = CapsuleParser::new();
        let capsules = parser.ingest(&buf).unwrap();
        assert_eq!(capsules, vec![capsule]);
    }

    #[test]
    fn test_chunked_ingest() {
        let capsule = Capsule::Datagram(Bytes::from_static(b"hello"));
        let buf = encoded(&capsule);

        let mut parser = CapsuleParser::new();
        for chunk in buf.chunks(2) {
            let capsules = parser.ingest(chunk).unwrap();
            if !capsules.is_empty() {
                assert_eq!(capsules, vec![capsule.clone()]);
            }
        }
        assert!(!parser.has_buffered_data());
    }

    #[test]
    fn test_partial_capsule_stays_buffered() {
        let capsule = Capsule::Datagram(Bytes::from_static(b"hello"));
        let buf = encoded(&capsule);

        let mut parser = CapsuleParser::new();
        let capsules = parser.ingest(&buf[..buf.len() - 1]).unwrap();
        assert!(capsules.is_empty());
        assert!(parser.has_buffered_data());
    }

    #[test]
    fn test_grease_capsule_skipped() {
        let mut buf = BytesMut::new();
        varint::encode_buf(0x21, &mut buf).unwrap();
        varint::encode_buf(3, &mut buf).unwrap();
        buf.put_slice(b"xyz");
        Capsule::DrainSession.encode(&mut buf).unwrap();

        let mut parser = CapsuleParser::new();
        let capsules = parser.ingest(&buf).unwrap();
        assert_eq!(capsules, vec![Capsule::DrainSession]);
    }

    #[test]
    fn test_unknown_capsule_is_error() {
        let mut buf = BytesMut::new();
        varint::encode_buf(0x22, &mut buf).unwrap();
        varint::encode_buf(0, &mut buf).unwrap();

        let mut parser = CapsuleParser::new();
        assert!(parser.ingest(&buf).is_err());
    }

    #[test]
    fn test_close_session_malformed() {
        // Payload shorter than the error code field.
        let mut buf = BytesMut::new();
        varint::encode_buf(CAPSULE_TYPE_CLOSE_SESSION, &mut buf).unwrap();
        varint::encode_buf(2, &mut buf).unwrap();
        buf.put_slice(&[0, 0]);

        let mut parser = CapsuleParser::new();
        assert!(parser.ingest(&buf).is_err());
    }

    #[test]
    fn test_multiple_capsules_in_one_chunk() {
        let mut buf = BytesMut::new();
        Capsule::Datagram(Bytes::from_static(b"a")).encode(&mut buf).unwrap();
        Capsule::Datagram(Bytes::from_static(b"b")).encode(&mut buf).unwrap();

        let mut parser = CapsuleParser::new();
        let capsules = parser.ingest(&buf).unwrap();
        assert_eq!(capsules.len(), 2);
    }
}
