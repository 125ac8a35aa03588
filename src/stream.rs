//! Request-stream orchestrator.
//!
//! Turns one ordered byte stream into typed protocol events (headers,
//! body, trailers, unknown frames, capsules) and turns application writes
//! back into correctly framed bytes. Sans-IO: the owner feeds transport
//! bytes via [`RequestStream::process_readable`] and drains
//! [`StreamEvent`]s via [`RequestStream::poll_event`].
//!
//! A stream is either framed (HTTP/3 frames) or tunneled (raw capsule
//! bytes after the conversion frame); the mode is a sum type so frame
//! decoding cannot happen on a tunneled stream. The only suspension point
//! is a header block blocked on decompression state, resumed through
//! [`RequestStream::on_headers_decoded`]; other streams are unaffected.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::body::BodyManager;
use crate::capsule::{Capsule, CapsuleParser};
use crate::config::StreamConfig;
use crate::error::{Error, ErrorCode, Result};
use crate::field::{validate_field_section, FieldLine};
use crate::frame::{self, FrameDecoder, FrameEvent, FrameKind};
use crate::interval::IntervalSet;
use crate::qpack::{DecodeOutcome, HeaderCodec};
use crate::transport::StreamTransport;

/// Read-side event surfaced to the owning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A decoded header list is ready in [`RequestStream::take_header_list`].
    HeadersReady,
    /// Unread body bytes are available.
    BodyReady,
    /// A decoded trailer list is ready in [`RequestStream::take_trailers`].
    TrailersReady,
    /// Everything on the read side has been received and consumed.
    Finished,
    /// An extension frame's payload chunk, forwarded opaquely.
    UnknownFrame { frame_type: u64, payload: Bytes },
    /// The stream converted to tunnel mode.
    TunnelOpened { session_id: u64 },
    /// The peer closed the tunnel session.
    SessionClosed { error_code: u32, message: String },
    /// The peer asked the tunnel session to drain.
    SessionDrain,
}

/// Receiver for datagram capsules on a tunneled stream.
pub trait DatagramVisitor {
    fn on_datagram(&mut self, payload: Bytes);
}

/// Receiver for address-management capsules on a tunneled stream.
pub trait AddressVisitor {
    fn on_address_assign(&mut self, payload: Bytes);
    fn on_address_request(&mut self, payload: Bytes);
    fn on_route_advertisement(&mut self, payload: Bytes);
}

enum Mode {
    Framed(FrameDecoder),
    Tunnel {
        session_id: u64,
        parser: CapsuleParser,
    },
}

/// One HTTP/3 request stream.
pub struct RequestStream<T: StreamTransport, C: HeaderCodec> {
    config: StreamConfig,
    transport: T,
    codec: C,
    mode: Mode,
    body: BodyManager,
    events: VecDeque<StreamEvent>,

    /// Next receive offset to feed to the decoder or capsule parser.
    decode_offset: u64,

    headers_decompressed: bool,
    header_list: Vec<FieldLine>,
    header_list_consumed: bool,
    headers_payload_length: u64,
    header_list_size_limit_exceeded: bool,

    trailers_decompressed: bool,
    trailers: Vec<FieldLine>,
    trailers_consumed: bool,

    blocked_on_decoding_headers: bool,
    body_ready_announced: bool,
    finished_announced: bool,
    reset_received: bool,
    fin_sent: bool,

    /// Send-side byte ranges holding frame headers rather than body.
    unacked_frame_headers: IntervalSet,

    datagram_visitor: Option<Box<dyn DatagramVisitor>>,
    address_visitor: Option<Box<dyn AddressVisitor>>,
}

impl<T: StreamTransport, C: HeaderCodec> RequestStream<T, C> {
    pub fn new(config: StreamConfig, transport: T, codec: C) -> Result<Self> {
        config.validate().map_err(Error::usage)?;
        let mode = Mode::Framed(FrameDecoder::new(config.supports_tunneling));
        Ok(Self {
            config,
            transport,
            codec,
            mode,
            body: BodyManager::new(),
            events: VecDeque::new(),
            decode_offset: 0,
            headers_decompressed: false,
            header_list: Vec::new(),
            header_list_consumed: false,
            headers_payload_length: 0,
            header_list_size_limit_exceeded: false,
            trailers_decompressed: false,
            trailers: Vec::new(),
            trailers_consumed: false,
            blocked_on_decoding_headers: false,
            body_ready_announced: false,
            finished_announced: false,
            reset_received: false,
            fin_sent: false,
            unacked_frame_headers: IntervalSet::new(),
            datagram_visitor: None,
            address_visitor: None,
        })
    }

    pub fn id(&self) -> u64 {
        self.config.stream_id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Session id of the tunnel, once converted.
    pub fn tunnel_session_id(&self) -> Option<u64> {
        match &self.mode {
            Mode::Tunnel { session_id, .. } => Some(*session_id),
            Mode::Framed(_) => None,
        }
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Drive the read loop over whatever the transport has buffered.
    ///
    /// Stops when input is exhausted, the stream is blocked on header
    /// decoding, or an error fails the stream. Call again after
    /// delivering more transport bytes.
    pub fn process_readable(&mut self) -> Result<()> {
        if self.reset_received {
            return Ok(());
        }
        loop {
            if self.blocked_on_decoding_headers {
                break;
            }
            match &self.mode {
                Mode::Framed(_) => {
                    if !self.process_framed_step()? {
                        break;
                    }
                }
                Mode::Tunnel { .. } => {
                    self.process_tunnel()?;
                    break;
                }
            }
        }
        self.check_fin()?;
        self.update_read_events();
        Ok(())
    }

    /// One decoder step. Returns whether the loop should continue.
    fn process_framed_step(&mut self) -> Result<bool> {
        // An empty chunk still goes to the decoder: a frame that ended
        // flush with the buffered data has a FrameEnd pending.
        let chunk = self
            .transport
            .peek_readable(self.decode_offset)
            .unwrap_or_else(Bytes::new);
        let (consumed, event) = match &mut self.mode {
            Mode::Framed(decoder) => decoder.next_event(&chunk)?,
            Mode::Tunnel { .. } => return Ok(true),
        };
        self.decode_offset += consumed as u64;
        match event {
            Some(event) => {
                self.on_frame_event(event)?;
                Ok(true)
            }
            // The decoder drained this chunk mid-header; the next chunk
            // (if buffered) resumes it.
            None => Ok(consumed > 0),
        }
    }

    fn on_frame_event(&mut self, event: FrameEvent) -> Result<()> {
        match event {
            FrameEvent::FrameStart {
                kind,
                header_len,
                payload_len,
            } => {
                trace!(
                    stream_id = self.config.stream_id,
                    ?kind,
                    payload_len,
                    "frame start"
                );
                match kind {
                    FrameKind::Data => {
                        if !self.headers_decompressed || self.trailers_decompressed {
                            return Err(Error::protocol(
                                ErrorCode::FrameUnexpected,
                                "unexpected DATA frame received",
                            ));
                        }
                        self.mark_non_body(header_len);
                    }
                    FrameKind::Headers => {
                        if self.trailers_decompressed {
                            return Err(Error::protocol(
                                ErrorCode::FrameUnexpected,
                                "HEADERS frame received after trailing HEADERS",
                            ));
                        }
                        self.headers_payload_length = payload_len;
                        self.codec.decode_start(self.config.stream_id, payload_len);
                        self.mark_non_body(header_len);
                    }
                    FrameKind::Control(frame_type) => {
                        return Err(Error::protocol(
                            ErrorCode::FrameUnexpected,
                            format!(
                                "{} frame received on request stream",
                                frame::control_frame_name(frame_type)
                            ),
                        ));
                    }
                    FrameKind::Unknown(_) => {
                        self.mark_non_body(header_len);
                    }
                }
            }
            FrameEvent::FramePayload { kind, chunk } => match kind {
                FrameKind::Data => {
                    self.body.record_body(chunk);
                    self.body_ready_announced = false;
                }
                FrameKind::Headers => {
                    let on_trailers = self.headers_decompressed;
                    let len = chunk.len() as u64;
                    self.codec
                        .decode_feed(self.config.stream_id, &chunk)
                        .map_err(|e| Error::decompression(on_trailers, e.to_string()))?;
                    self.mark_non_body(len);
                }
                FrameKind::Unknown(frame_type) => {
                    self.mark_non_body(chunk.len() as u64);
                    if !frame::is_grease_frame_type(frame_type) {
                        self.events.push_back(StreamEvent::UnknownFrame {
                            frame_type,
                            payload: chunk,
                        });
                    }
                }
                // A control frame's start already failed the stream.
                FrameKind::Control(_) => {}
            },
            FrameEvent::FrameEnd { kind } => {
                if kind == FrameKind::Headers {
                    let on_trailers = self.headers_decompressed;
                    let outcome = self
                        .codec
                        .decode_end(self.config.stream_id)
                        .map_err(|e| Error::decompression(on_trailers, e.to_string()))?;
                    match outcome {
                        DecodeOutcome::Done {
                            fields,
                            size_limit_exceeded,
                        } => self.on_field_section_decoded(fields, size_limit_exceeded)?,
                        DecodeOutcome::Blocked => {
                            debug!(
                                stream_id = self.config.stream_id,
                                "blocked on decoding headers"
                            );
                            self.blocked_on_decoding_headers = true;
                        }
                    }
                }
            }
            FrameEvent::TunnelStart {
                header_len,
                session_id,
            } => {
                if self.headers_payload_length > 0 || self.headers_decompressed {
                    return Err(Error::protocol(
                        ErrorCode::FrameUnexpected,
                        "tunnel conversion on a stream that already carries HTTP frames",
                    ));
                }
                if self.config.locally_initiated {
                    return Err(Error::protocol(
                        ErrorCode::FrameUnexpected,
                        "tunnel conversion received from the non-initiator",
                    ));
                }
                self.mark_non_body(header_len);
                self.mode = Mode::Tunnel {
                    session_id,
                    parser: CapsuleParser::new(),
                };
                debug!(
                    stream_id = self.config.stream_id,
                    session_id, "stream converted to tunnel mode"
                );
                self.events
                    .push_back(StreamEvent::TunnelOpened { session_id });
            }
        }
        Ok(())
    }

    fn process_tunnel(&mut self) -> Result<()> {
        loop {
            let chunk = match self.transport.peek_readable(self.decode_offset) {
                Some(c) => c,
                None => break,
            };
            self.decode_offset += chunk.len() as u64;
            let capsules = match &mut self.mode {
                Mode::Tunnel { parser, .. } => parser.ingest(&chunk)?,
                Mode::Framed(_) => return Ok(()),
            };
            // The parser buffers partial capsules itself, so tunnel bytes
            // are released to the transport once they parse cleanly.
            self.transport.mark_consumed(chunk.len() as u64);
            for capsule in capsules {
                self.dispatch_capsule(capsule)?;
            }
        }
        Ok(())
    }

    fn dispatch_capsule(&mut self, capsule: Capsule) -> Result<()> {
        trace!(
            stream_id = self.config.stream_id,
            capsule_type = capsule.capsule_type(),
            "capsule received"
        );
        match capsule {
            Capsule::Datagram(payload) => match &mut self.datagram_visitor {
                Some(visitor) => {
                    visitor.on_datagram(payload);
                    Ok(())
                }
                None => Err(Error::reset(
                    ErrorCode::MessageError,
                    "datagram capsule with no registered visitor",
                )),
            },
            Capsule::CloseSession {
                error_code,
                message,
            } => {
                self.events.push_back(StreamEvent::SessionClosed {
                    error_code,
                    message,
                });
                Ok(())
            }
            Capsule::DrainSession => {
                self.events.push_back(StreamEvent::SessionDrain);
                Ok(())
            }
            Capsule::AddressAssign(payload) => match &mut self.address_visitor {
                Some(visitor) => {
                    visitor.on_address_assign(payload);
                    Ok(())
                }
                None => Err(Error::reset(
                    ErrorCode::MessageError,
                    "address capsule with no registered visitor",
                )),
            },
            Capsule::AddressRequest(payload) => match &mut self.address_visitor {
                Some(visitor) => {
                    visitor.on_address_request(payload);
                    Ok(())
                }
                None => Err(Error::reset(
                    ErrorCode::MessageError,
                    "address capsule with no registered visitor",
                )),
            },
            Capsule::RouteAdvertisement(payload) => match &mut self.address_visitor {
                Some(visitor) => {
                    visitor.on_route_advertisement(payload);
                    Ok(())
                }
                None => Err(Error::reset(
                    ErrorCode::MessageError,
                    "route capsule with no registered visitor",
                )),
            },
        }
    }

    /// Completion callback for a header block that was blocked on
    /// decompression state. Resumes the read loop.
    pub fn on_headers_decoded(
        &mut self,
        fields: Vec<FieldLine>,
        size_limit_exceeded: bool,
    ) -> Result<()> {
        if !self.blocked_on_decoding_headers {
            return Err(Error::usage("no header block awaiting decoding"));
        }
        self.blocked_on_decoding_headers = false;
        self.on_field_section_decoded(fields, size_limit_exceeded)?;
        self.process_readable()
    }

    fn on_field_section_decoded(
        &mut self,
        fields: Vec<FieldLine>,
        size_limit_exceeded: bool,
    ) -> Result<()> {
        if size_limit_exceeded {
            self.header_list_size_limit_exceeded = true;
            return Err(Error::reset(
                ErrorCode::ExcessiveLoad,
                "header list too large",
            ));
        }
        validate_field_section(&fields)?;
        if !self.headers_decompressed {
            self.headers_decompressed = true;
            self.header_list = fields;
            self.header_list_consumed = false;
            self.events.push_back(StreamEvent::HeadersReady);
        } else {
            self.trailers_decompressed = true;
            self.trailers = fields;
            self.trailers_consumed = false;
            self.events.push_back(StreamEvent::TrailersReady);
        }
        Ok(())
    }

    fn mark_non_body(&mut self, len: u64) {
        let release = self.body.record_non_body(len);
        if release > 0 {
            self.transport.mark_consumed(release);
        }
    }

    fn check_fin(&mut self) -> Result<()> {
        let fin_offset = match self.transport.fin_offset() {
            Some(offset) => offset,
            None => return Ok(()),
        };
        if self.decode_offset < fin_offset {
            // Not everything has been fed yet.
            return Ok(());
        }
        match &self.mode {
            Mode::Framed(decoder) => {
                if !decoder.is_at_frame_boundary() {
                    return Err(Error::protocol(
                        ErrorCode::FrameError,
                        "stream ended in the middle of a frame",
                    ));
                }
                if !self.headers_decompressed && !self.blocked_on_decoding_headers {
                    return Err(Error::protocol(
                        ErrorCode::RequestIncomplete,
                        "stream ended before a complete HEADERS frame",
                    ));
                }
            }
            Mode::Tunnel { parser, .. } => {
                if parser.has_buffered_data() {
                    return Err(Error::reset(
                        ErrorCode::MessageError,
                        "stream ended with a partial capsule",
                    ));
                }
            }
        }
        Ok(())
    }

    fn update_read_events(&mut self) {
        if !self.finished_reading_headers() {
            return;
        }
        if self.body.has_bytes_to_read() && !self.body_ready_announced {
            self.body_ready_announced = true;
            self.events.push_back(StreamEvent::BodyReady);
        }
        if self.is_done_reading() && !self.finished_announced {
            self.finished_announced = true;
            self.events.push_back(StreamEvent::Finished);
        }
    }

    fn finished_reading_headers(&self) -> bool {
        self.headers_decompressed && self.header_list_consumed
    }

    fn finished_reading_trailers(&self) -> bool {
        !self.trailers_decompressed || self.trailers_consumed
    }

    /// Headers, body, and any trailers all received and consumed.
    pub fn is_done_reading(&self) -> bool {
        self.finished_reading_headers()
            && !self.body.has_bytes_to_read()
            && self.finished_reading_trailers()
            && self.transport.is_read_closed()
    }

    /// Next stream event, if any.
    pub fn poll_event(&mut self) -> Option<StreamEvent> {
        self.events.pop_front()
    }

    /// Take the decoded header list. Cleared after this call.
    pub fn take_header_list(&mut self) -> Vec<FieldLine> {
        self.header_list_consumed = true;
        let fields = std::mem::take(&mut self.header_list);
        self.update_read_events();
        fields
    }

    /// Take the decoded trailer list. Cleared after this call.
    pub fn take_trailers(&mut self) -> Vec<FieldLine> {
        self.trailers_consumed = true;
        let fields = std::mem::take(&mut self.trailers);
        self.update_read_events();
        fields
    }

    pub fn has_bytes_to_read(&self) -> bool {
        self.body.has_bytes_to_read()
    }

    pub fn readable_body_bytes(&self) -> u64 {
        self.body.readable_bytes()
    }

    /// Unread body fragments, zero-copy, without consuming.
    pub fn peek_body(&self, max: usize) -> Vec<Bytes> {
        self.body.peek(max)
    }

    /// Copy body bytes into `buf`, consuming them and releasing the
    /// corresponding stream bytes to the transport. Returns the number of
    /// body bytes read.
    pub fn read_body(&mut self, buf: &mut [u8]) -> u64 {
        let (to_mark, read) = self.body.read_into(&mut [buf]);
        if to_mark > 0 {
            self.transport.mark_consumed(to_mark);
        }
        if read > 0 {
            self.body_ready_announced = false;
        }
        self.update_read_events();
        read
    }

    /// Consume `n` peeked body bytes. Returns the total stream bytes
    /// released to the transport (body plus deferred framing).
    pub fn consume_body(&mut self, n: u64) -> u64 {
        let to_mark = self.body.consume(n);
        if to_mark > 0 {
            self.transport.mark_consumed(to_mark);
        }
        self.update_read_events();
        to_mark
    }

    pub fn total_body_bytes_received(&self) -> u64 {
        self.body.total_body_bytes_received()
    }

    pub fn header_list_size_limit_exceeded(&self) -> bool {
        self.header_list_size_limit_exceeded
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Encode and write a HEADERS frame. Returns the bytes written to
    /// this stream (frame header plus encoded block) and the bytes the
    /// compression engine sent on its own instruction channel, which
    /// are accounted separately from stream bytes.
    pub fn write_headers(&mut self, fields: &[FieldLine], fin: bool) -> Result<(usize, u64)> {
        if self.fin_sent {
            return Err(Error::usage("write_headers after final write"));
        }
        if matches!(self.mode, Mode::Tunnel { .. }) {
            return Err(Error::usage("write_headers on a tunneled stream"));
        }
        let (block, encoder_channel_bytes) = self
            .codec
            .encode_field_section(self.config.stream_id, fields)?;

        let mut buf = BytesMut::with_capacity(16 + block.len());
        let header_len = frame::headers_frame_header(block.len() as u64, &mut buf)?;
        let offset = self.transport.send_offset();
        self.unacked_frame_headers
            .insert(offset..offset + header_len);
        buf.extend_from_slice(&block);
        let total = buf.len();
        self.transport.write(buf.freeze(), fin)?;
        if fin {
            self.fin_sent = true;
        }
        debug!(
            stream_id = self.config.stream_id,
            bytes = total,
            encoder_channel_bytes,
            fin,
            "headers written"
        );
        Ok((total, encoder_channel_bytes))
    }

    /// Write a DATA frame if the send buffer has room for its header;
    /// otherwise write nothing and return 0. Returns body bytes written.
    pub fn write_body(&mut self, data: Bytes, fin: bool) -> Result<u64> {
        self.write_body_inner(data, fin, false)
    }

    /// Write a DATA frame unconditionally (or raw bytes in tunnel mode).
    /// An empty `data` forwards only `fin`, without emitting a frame.
    pub fn write_or_buffer_body(&mut self, data: Bytes, fin: bool) -> Result<u64> {
        self.write_body_inner(data, fin, true)
    }

    fn write_body_inner(&mut self, data: Bytes, fin: bool, force: bool) -> Result<u64> {
        if self.fin_sent {
            return Err(Error::usage("body write after final write"));
        }
        if data.is_empty() {
            if fin {
                self.transport.write(Bytes::new(), true)?;
                self.fin_sent = true;
            }
            return Ok(0);
        }
        let len = data.len() as u64;

        if matches!(self.mode, Mode::Tunnel { .. }) {
            self.transport.write(data, fin)?;
            if fin {
                self.fin_sent = true;
            }
            return Ok(len);
        }

        let header_len = frame::data_frame_header_len(len);
        if !force && !self.transport.can_write(header_len) {
            trace!(
                stream_id = self.config.stream_id,
                "deferring body write, no room for frame header"
            );
            return Ok(0);
        }

        let mut buf = BytesMut::with_capacity(header_len as usize);
        frame::data_frame_header(len, &mut buf)?;
        let offset = self.transport.send_offset();
        self.unacked_frame_headers
            .insert(offset..offset + header_len);
        self.transport.write(buf.freeze(), false)?;
        self.transport.write(data, fin)?;
        if fin {
            self.fin_sent = true;
        }
        Ok(len)
    }

    /// Write a trailing header block, forcing fin.
    ///
    /// Refused as a usage error once a final write has happened; nothing
    /// is written in that case.
    pub fn write_trailers(&mut self, fields: &[FieldLine]) -> Result<(usize, u64)> {
        if self.fin_sent {
            warn!(
                stream_id = self.config.stream_id,
                "write_trailers after fin refused"
            );
            return Err(Error::usage("write_trailers after final write"));
        }
        self.write_headers(fields, true)
    }

    /// Convert this stream into a raw tunnel for `session_id`.
    ///
    /// Only valid before any byte has been written and before any HTTP
    /// frame has been received, and only on a locally initiated stream.
    pub fn convert_to_tunnel_mode(&mut self, session_id: u64) -> Result<()> {
        if !self.config.supports_tunneling {
            return Err(Error::usage("tunneling was not negotiated"));
        }
        if !self.config.locally_initiated {
            return Err(Error::usage("only the stream initiator may convert it"));
        }
        if self.transport.send_offset() != 0 {
            return Err(Error::usage(
                "tunnel conversion after bytes were already written",
            ));
        }
        if self.headers_decompressed || self.headers_payload_length > 0 {
            return Err(Error::usage(
                "tunnel conversion after HTTP frames were received",
            ));
        }

        let mut buf = BytesMut::new();
        let header_len = frame::tunnel_frame_header(session_id, &mut buf)?;
        self.unacked_frame_headers.insert(0..header_len);
        self.transport.write(buf.freeze(), false)?;
        self.mode = Mode::Tunnel {
            session_id,
            parser: CapsuleParser::new(),
        };
        debug!(
            stream_id = self.config.stream_id,
            session_id, "converted to tunnel mode"
        );
        Ok(())
    }

    /// Serialize and write a capsule. Tunnel mode only.
    pub fn write_capsule(&mut self, capsule: &Capsule) -> Result<u64> {
        if !matches!(self.mode, Mode::Tunnel { .. }) {
            return Err(Error::usage("capsules require tunnel mode"));
        }
        if self.fin_sent {
            return Err(Error::usage("capsule write after final write"));
        }
        let mut buf = BytesMut::new();
        let len = capsule.encode(&mut buf)?;
        self.transport.write(buf.freeze(), false)?;
        Ok(len)
    }

    // ------------------------------------------------------------------
    // Accounting and lifecycle
    // ------------------------------------------------------------------

    /// Split a newly acknowledged send-side range into
    /// `(body_bytes, framing_bytes)` and prune the acked framing ranges.
    pub fn on_frame_acked(&mut self, offset: u64, len: u64, fin_acked: bool) -> (u64, u64) {
        let framing = self
            .unacked_frame_headers
            .intersection_len(offset..offset + len);
        self.unacked_frame_headers.remove(offset..offset + len);
        trace!(
            stream_id = self.config.stream_id,
            offset,
            len,
            fin_acked,
            framing,
            "frame acked"
        );
        (len - framing, framing)
    }

    /// Split a retransmitted send-side range into
    /// `(body_bytes, framing_bytes)` without changing the set.
    pub fn on_frame_retransmitted(&mut self, offset: u64, len: u64) -> (u64, u64) {
        let framing = self
            .unacked_frame_headers
            .intersection_len(offset..offset + len);
        (len - framing, framing)
    }

    /// Number of still-unacked frame headers inside `[offset, offset+len)`.
    pub fn frame_headers_in_interval(&self, offset: u64, len: u64) -> usize {
        self.unacked_frame_headers
            .count_contained(offset..offset + len)
    }

    pub fn register_datagram_visitor(&mut self, visitor: Box<dyn DatagramVisitor>) -> Result<()> {
        if self.datagram_visitor.is_some() {
            return Err(Error::usage("datagram visitor already registered"));
        }
        self.datagram_visitor = Some(visitor);
        Ok(())
    }

    pub fn register_address_visitor(&mut self, visitor: Box<dyn AddressVisitor>) -> Result<()> {
        if self.address_visitor.is_some() {
            return Err(Error::usage("address visitor already registered"));
        }
        self.address_visitor = Some(visitor);
        Ok(())
    }

    /// The peer reset the stream: discard unread body without consuming,
    /// detach capsule handling, stop all further processing.
    pub fn on_stream_reset(&mut self) {
        debug!(stream_id = self.config.stream_id, "stream reset");
        self.reset_received = true;
        self.body.clear();
        self.datagram_visitor = None;
        self.address_visitor = None;
        self.events.clear();
        self.codec.on_stream_reset(self.config.stream_id);
    }
}
