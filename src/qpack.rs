//! Field-section compression boundary.
//!
//! The stream never sees the compression engine's internals; it feeds
//! encoded bytes in, finalizes the block, and either gets the decoded
//! field list synchronously or a `Blocked` signal that suspends that one
//! stream until the engine's completion callback fires.

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, ErrorCode, Result};
use crate::field::FieldLine;
use crate::varint;

/// Result of finalizing an encoded field section.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// Decoding finished synchronously.
    ///
    /// `size_limit_exceeded` is the only signal for an oversized list; an
    /// empty `fields` means zero fields were sent, nothing else.
    Done {
        fields: Vec<FieldLine>,
        size_limit_exceeded: bool,
    },
    /// Decoding is stalled on state that has not arrived yet. The stream
    /// suspends and resumes via its decoded-headers callback.
    Blocked,
}

/// Compression engine seam used by the stream.
///
/// `stream_id` keys per-stream decode state so one codec instance can
/// serve a whole connection.
pub trait HeaderCodec {
    /// Encode a field section for sending. Returns the encoded block and
    /// the number of bytes the engine sent on its own instruction channel
    /// while encoding it; those bytes are never part of the block.
    fn encode_field_section(
        &mut self,
        stream_id: u64,
        fields: &[FieldLine],
    ) -> Result<(Bytes, u64)>;

    /// Begin decoding a field section of `payload_len` encoded bytes.
    fn decode_start(&mut self, stream_id: u64, payload_len: u64);

    /// Feed encoded bytes of the current section.
    fn decode_feed(&mut self, stream_id: u64, chunk: &[u8]) -> Result<()>;

    /// Finalize the current section.
    fn decode_end(&mut self, stream_id: u64) -> Result<DecodeOutcome>;

    /// Drop any decode state for a stream that was reset.
    fn on_stream_reset(&mut self, stream_id: u64);
}

/// Dynamic-table-free codec: each field is encoded as varint-prefixed
/// name and value literals. Never blocks.
///
/// `max_field_section_size` bounds the decoded list using the RFC 9204
/// accounting (name + value + 32 per field); fields beyond the limit are
/// dropped and the overflow is reported through `size_limit_exceeded`.
pub struct LiteralCodec {
    max_field_section_size: u64,
    pending: HashMap<u64, BytesMut>,
}

impl LiteralCodec {
    pub fn new(max_field_section_size: u64) -> Self {
        Self {
            max_field_section_size,
            pending: HashMap::new(),
        }
    }
}

impl HeaderCodec for LiteralCodec {
    fn encode_field_section(
        &mut self,
        _stream_id: u64,
        fields: &[FieldLine],
    ) -> Result<(Bytes, u64)> {
        let mut buf = BytesMut::new();
        for field in fields {
            varint::encode_buf(field.name.len() as u64, &mut buf)?;
            buf.put_slice(&field.name);
            varint::encode_buf(field.value.len() as u64, &mut buf)?;
            buf.put_slice(&field.value);
        }
        // No dynamic table, so the instruction channel stays silent.
        Ok((buf.freeze(), 0))
    }

    fn decode_start(&mut self, stream_id: u64, payload_len: u64) {
        let buf = self.pending.entry(stream_id).or_default();
        buf.clear();
        buf.reserve(payload_len as usize);
    }

    fn decode_feed(&mut self, stream_id: u64, chunk: &[u8]) -> Result<()> {
        self.pending.entry(stream_id).or_default().extend_from_slice(chunk);
        Ok(())
    }

    fn decode_end(&mut self, stream_id: u64) -> Result<DecodeOutcome> {
        let mut buf = self.pending.remove(&stream_id).unwrap_or_default().freeze();
        let mut fields = Vec::new();
        let mut section_size = 0u64;
        let mut size_limit_exceeded = false;

        while buf.has_remaining() {
            let name = read_literal(&mut buf)?;
            let value = read_literal(&mut buf)?;
            let field = FieldLine { name, value };
            section_size += field.size();
            if self.max_field_section_size > 0 && section_size > self.max_field_section_size {
                size_limit_exceeded = true;
                continue;
            }
            fields.push(field);
        }

        Ok(DecodeOutcome::Done {
            fields,
            size_limit_exceeded,
        })
    }

    fn on_stream_reset(&mut self, stream_id: u64) {
        self.pending.remove(&stream_id);
    }
}

fn read_literal(buf: &mut Bytes) -> Result<Bytes> {
    let len = varint::decode_buf(buf).map_err(|_| {
        Error::protocol(
            ErrorCode::QpackDecompressionFailed,
            "truncated literal length",
        )
    })?;
    if (buf.remaining() as u64) < len {
        return Err(Error::protocol(
            ErrorCode::QpackDecompressionFailed,
            "truncated literal",
        ));
    }
    Ok(buf.split_to(len as usize))
}
