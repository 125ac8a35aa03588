//! HTTP/3 frame layer for request streams (RFC 9114 Section 7).
//!
//! The decoder is an incremental state machine fed whatever contiguous
//! bytes the transport has buffered. It reports how many bytes it consumed
//! and at most one [`FrameEvent`] per call, so the stream's read loop stays
//! a plain resumable iteration: feed, dispatch, repeat, stop on `(0, None)`.
//!
//! Frame legality is not decided here. The decoder classifies types and
//! the stream enforces ordering rules, so illegal frames still produce a
//! well-formed `FrameStart` the stream can reject with a precise error.

use bytes::{Bytes, BytesMut};

use crate::error::Result;
use crate::varint::{self, VarintDecoder};

pub const FRAME_TYPE_DATA: u64 = 0x00;
pub const FRAME_TYPE_HEADERS: u64 = 0x01;
pub const FRAME_TYPE_CANCEL_PUSH: u64 = 0x03;
pub const FRAME_TYPE_SETTINGS: u64 = 0x04;
pub const FRAME_TYPE_PUSH_PROMISE: u64 = 0x05;
pub const FRAME_TYPE_GOAWAY: u64 = 0x07;
pub const FRAME_TYPE_MAX_PUSH_ID: u64 = 0x0d;
pub const FRAME_TYPE_PRIORITY_UPDATE: u64 = 0xf0700;
/// Converts the rest of the stream into a raw tunnel (WebTransport).
pub const FRAME_TYPE_WEBTRANSPORT_STREAM: u64 = 0x41;

/// Reserved frame types of the form `0x1f * N + 0x21` (RFC 9114
/// Section 7.2.8) exist to be ignored.
pub fn is_grease_frame_type(frame_type: u64) -> bool {
    frame_type >= 0x21 && (frame_type - 0x21) % 0x1f == 0
}

/// Classification of a frame type as seen on a request stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Data,
    Headers,
    /// A frame type only valid on the control stream. Always illegal here.
    Control(u64),
    /// Extension or reserved frame type; payload is opaque.
    Unknown(u64),
}

impl FrameKind {
    pub fn classify(frame_type: u64) -> FrameKind {
        match frame_type {
            FRAME_TYPE_DATA => FrameKind::Data,
            FRAME_TYPE_HEADERS => FrameKind::Headers,
            FRAME_TYPE_CANCEL_PUSH
            | FRAME_TYPE_SETTINGS
            | FRAME_TYPE_PUSH_PROMISE
            | FRAME_TYPE_GOAWAY
            | FRAME_TYPE_MAX_PUSH_ID
            | FRAME_TYPE_PRIORITY_UPDATE => FrameKind::Control(frame_type),
            other => FrameKind::Unknown(other),
        }
    }
}

/// Name of a control-stream-only frame type, for error messages.
pub fn control_frame_name(frame_type: u64) -> &'static str {
    match frame_type {
        FRAME_TYPE_CANCEL_PUSH => "CANCEL_PUSH",
        FRAME_TYPE_SETTINGS => "SETTINGS",
        FRAME_TYPE_PUSH_PROMISE => "PUSH_PROMISE",
        FRAME_TYPE_GOAWAY => "GOAWAY",
        FRAME_TYPE_MAX_PUSH_ID => "MAX_PUSH_ID",
        FRAME_TYPE_PRIORITY_UPDATE => "PRIORITY_UPDATE",
        _ => "unknown",
    }
}

/// One step of decoder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A frame header (type + length varints) has been fully read.
    /// `header_len` counts the header bytes even if they arrived split
    /// across earlier calls.
    FrameStart {
        kind: FrameKind,
        header_len: u64,
        payload_len: u64,
    },
    /// A contiguous chunk of the current frame's payload. Never empty.
    FramePayload { kind: FrameKind, chunk: Bytes },
    /// The current frame's payload is complete.
    FrameEnd { kind: FrameKind },
    /// A tunnel-conversion header (type + session id) has been read.
    /// The decoder consumes nothing further after this.
    TunnelStart { header_len: u64, session_id: u64 },
}

enum State {
    /// Reading the frame type varint.
    FrameType { decoder: VarintDecoder },
    /// Reading the payload length varint.
    FrameLength {
        frame_type: u64,
        type_len: usize,
        decoder: VarintDecoder,
    },
    /// Reading the session id varint of a tunnel-conversion header.
    SessionId {
        type_len: usize,
        decoder: VarintDecoder,
    },
    /// Passing through `remaining` payload bytes.
    Payload { kind: FrameKind, remaining: u64 },
    /// Payload done; emit `FrameEnd` on the next call.
    FrameDone { kind: FrameKind },
    /// The stream has been converted; framing no longer applies.
    Tunneled,
}

/// Incremental HTTP/3 frame decoder for one request stream.
pub struct FrameDecoder {
    state: State,
    allow_tunnel: bool,
}

impl FrameDecoder {
    /// `allow_tunnel` controls whether the tunnel-conversion frame type is
    /// recognized; when false it decodes as an ordinary unknown frame.
    pub fn new(allow_tunnel: bool) -> Self {
        Self {
            state: State::FrameType {
                decoder: VarintDecoder::new(),
            },
            allow_tunnel,
        }
    }

    /// Whether a stream ending here would not truncate a frame. A frame
    /// whose payload is complete but whose `FrameEnd` has not been
    /// emitted yet counts as a boundary.
    pub fn is_at_frame_boundary(&self) -> bool {
        match &self.state {
            State::FrameType { decoder } => decoder.is_fresh(),
            State::FrameDone { .. } => true,
            State::Tunneled => true,
            _ => false,
        }
    }

    /// Feed bytes and produce at most one event.
    ///
    /// Returns `(bytes_consumed_from_input, event)`. `(0, None)` means the
    /// decoder needs more input (or is tunneled) and the loop should stop.
    /// `FrameEnd` is emitted with zero additional consumption.
    pub fn next_event(&mut self, input: &Bytes) -> Result<(usize, Option<FrameEvent>)> {
        let mut consumed = 0usize;
        loop {
            match &mut self.state {
                State::FrameType { decoder } => {
                    let mut complete = None;
                    while consumed < input.len() {
                        let fed = decoder.feed(input[consumed]);
                        consumed += 1;
                        if fed.is_some() {
                            complete = fed;
                            break;
                        }
                    }
                    let (frame_type, type_len) = match complete {
                        Some(v) => v,
                        None => return Ok((consumed, None)),
                    };
                    if frame_type == FRAME_TYPE_WEBTRANSPORT_STREAM && self.allow_tunnel {
                        self.state = State::SessionId {
                            type_len,
                            decoder: VarintDecoder::new(),
                        };
                    } else {
                        self.state = State::FrameLength {
                            frame_type,
                            type_len,
                            decoder: VarintDecoder::new(),
                        };
                    }
                }
                State::FrameLength {
                    frame_type,
                    type_len,
                    decoder,
                } => {
                    let mut complete = None;
                    while consumed < input.len() {
                        let fed = decoder.feed(input[consumed]);
                        consumed += 1;
                        if fed.is_some() {
                            complete = fed;
                            break;
                        }
                    }
                    let (payload_len, len_len) = match complete {
                        Some(v) => v,
                        None => return Ok((consumed, None)),
                    };
                    let kind = FrameKind::classify(*frame_type);
                    let header_len = (*type_len + len_len) as u64;
                    self.state = if payload_len == 0 {
                        State::FrameDone { kind }
                    } else {
                        State::Payload {
                            kind,
                            remaining: payload_len,
                        }
                    };
                    return Ok((
                        consumed,
                        Some(FrameEvent::FrameStart {
                            kind,
                            header_len,
                            payload_len,
                        }),
                    ));
                }
                State::SessionId { type_len, decoder } => {
                    let mut complete = None;
                    while consumed < input.len() {
                        let fed = decoder.feed(input[consumed]);
                        consumed += 1;
                        if fed.is_some() {
                            complete = fed;
                            break;
                        }
                    }
                    let (session_id, sid_len) = match complete {
                        Some(v) => v,
                        None => return Ok((consumed, None)),
                    };
                    let header_len = (*type_len + sid_len) as u64;
                    self.state = State::Tunneled;
                    return Ok((
                        consumed,
                        Some(FrameEvent::TunnelStart {
                            header_len,
                            session_id,
                        }),
                    ));
                }
                State::Payload { kind, remaining } => {
                    if consumed >= input.len() {
                        return Ok((consumed, None));
                    }
                    let take = ((input.len() - consumed) as u64).min(*remaining) as usize;
                    let chunk = input.slice(consumed..consumed + take);
                    consumed += take;
                    *remaining -= take as u64;
                    let kind = *kind;
                    if *remaining == 0 {
                        self.state = State::FrameDone { kind };
                    }
                    return Ok((consumed, Some(FrameEvent::FramePayload { kind, chunk })));
                }
                State::FrameDone { kind } => {
                    let kind = *kind;
                    self.state = State::FrameType {
                        decoder: VarintDecoder::new(),
                    };
                    return Ok((consumed, Some(FrameEvent::FrameEnd { kind })));
                }
                State::Tunneled => return Ok((consumed, None)),
            }
        }
    }
}

/// Serialize a DATA frame header for a payload of `payload_len` bytes.
/// Returns the header length.
pub fn data_frame_header(payload_len: u64, buf: &mut BytesMut) -> Result<u64> {
    let mut written = varint::encode_buf(FRAME_TYPE_DATA, buf)?;
    written += varint::encode_buf(payload_len, buf)?;
    Ok(written as u64)
}

/// Serialize a HEADERS frame header for a payload of `payload_len` bytes.
/// Returns the header length.
pub fn headers_frame_header(payload_len: u64, buf: &mut BytesMut) -> Result<u64> {
    let mut written = varint::encode_buf(FRAME_TYPE_HEADERS, buf)?;
    written += varint::encode_buf(payload_len, buf)?;
    Ok(written as u64)
}

/// Serialize the tunnel-conversion header. Returns the header length.
pub fn tunnel_frame_header(session_id: u64, buf: &mut BytesMut) -> Result<u64> {
    let mut written = varint::encode_buf(FRAME_TYPE_WEBTRANSPORT_STREAM, buf)?;
    written += varint::encode_buf(session_id, buf)?;
    Ok(written as u64)
}

/// Size of a DATA frame header for a payload of `payload_len` bytes.
pub fn data_frame_header_len(payload_len: u64) -> u64 {
    (varint::encoded_len(FRAME_TYPE_DATA) + varint::encoded_len(payload_len)) as u64
}
