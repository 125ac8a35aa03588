//! HTTP/3 request-stream layer.
//!
//! This crate turns a single ordered, reliable byte stream into a sequence
//! of typed protocol events (headers, body, trailers, extension frames,
//! and the capsule sub-protocol of tunneled streams), and turns
//! application writes back into correctly framed bytes. It is sans-IO:
//! the owning session feeds transport bytes in, polls events out, and
//! performs all network IO itself.
//!
//! The main entry point is [`RequestStream`], which owns the frame
//! decoder, the body accounting, the header-decompression boundary, and
//! (once converted) the capsule parser for tunnel mode.

pub mod body;
pub mod capsule;
pub mod config;
pub mod error;
pub mod field;
pub mod frame;
pub mod interval;
pub mod qpack;
pub mod stream;
pub mod transport;
pub mod varint;

pub use body::BodyManager;
pub use capsule::{Capsule, CapsuleParser};
pub use config::StreamConfig;
pub use error::{Error, ErrorCode, Result};
pub use field::FieldLine;
pub use frame::{FrameDecoder, FrameEvent, FrameKind};
pub use qpack::{DecodeOutcome, HeaderCodec, LiteralCodec};
pub use stream::{AddressVisitor, DatagramVisitor, RequestStream, StreamEvent};
pub use transport::{MemoryTransport, StreamTransport};
