//! Error taxonomy for the request-stream layer.
//!
//! Four classes of failure, per RFC 9114 Section 8:
//! - protocol violations: fatal to the stream, surfaced to the session
//! - stream resets: malformed application payload, the stream is reset
//!   but the connection survives
//! - usage errors: caller bugs, the operation is refused without side
//!   effects and the stream is left intact
//! - decompression errors: a malformed encoded field section, reported
//!   with whether headers or trailers were being decoded

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// HTTP/3 error codes per RFC 9114 Section 8.1, plus the QPACK
/// decompression code from RFC 9204.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ErrorCode {
    NoError = 0x100,
    GeneralProtocolError = 0x101,
    InternalError = 0x102,
    StreamCreationError = 0x103,
    ClosedCriticalStream = 0x104,
    FrameUnexpected = 0x105,
    FrameError = 0x106,
    ExcessiveLoad = 0x107,
    IdError = 0x108,
    SettingsError = 0x109,
    MissingSettings = 0x10a,
    RequestRejected = 0x10b,
    RequestCancelled = 0x10c,
    RequestIncomplete = 0x10d,
    MessageError = 0x10e,
    ConnectError = 0x10f,
    VersionFallback = 0x110,
    QpackDecompressionFailed = 0x200,
}

impl ErrorCode {
    /// Wire value of this error code.
    pub fn code(self) -> u64 {
        self as u64
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Illegal frame sequence or malformed framing. Fatal to the stream.
    #[error("protocol error ({code:?}): {reason}")]
    Protocol { code: ErrorCode, reason: String },

    /// Malformed application payload. The stream is reset with `code`.
    #[error("stream reset ({code:?}): {reason}")]
    StreamReset { code: ErrorCode, reason: String },

    /// Caller bug. The operation was refused and no bytes were written.
    #[error("usage error: {0}")]
    Usage(String),

    /// Field-section decompression failed.
    #[error("error decoding {} on stream: {reason}", section_name(.on_trailers))]
    Decompression { on_trailers: bool, reason: String },
}

fn section_name(on_trailers: &bool) -> &'static str {
    if *on_trailers {
        "trailers"
    } else {
        "headers"
    }
}

impl Error {
    pub fn protocol(code: ErrorCode, reason: impl Into<String>) -> Self {
        Error::Protocol {
            code,
            reason: reason.into(),
        }
    }

    pub fn reset(code: ErrorCode, reason: impl Into<String>) -> Self {
        Error::StreamReset {
            code,
            reason: reason.into(),
        }
    }

    pub fn usage(reason: impl Into<String>) -> Self {
        Error::Usage(reason.into())
    }

    pub fn decompression(on_trailers: bool, reason: impl Into<String>) -> Self {
        Error::Decompression {
            on_trailers,
            reason: reason.into(),
        }
    }

    /// The HTTP/3 error code to surface on the wire, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Protocol { code, .. } | Error::StreamReset { code, .. } => Some(*code),
            Error::Usage(_) => None,
            Error::Decompression { .. } => Some(ErrorCode::QpackDecompressionFailed),
        }
    }

    /// Whether this error must tear down the stream (usage errors do not).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Usage(_))
    }
}
