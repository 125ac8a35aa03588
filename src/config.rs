//! Per-stream configuration.

/// Configuration for one request stream.
///
/// Defaults suit a server-side stream opened by the peer with tunneling
/// negotiated off.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Stream identifier, used to key codec state and for logging.
    pub stream_id: u64,

    /// Whether this endpoint opened the stream. Only the initiator may
    /// convert a stream to tunnel mode; receiving a conversion frame on
    /// a locally initiated stream is a protocol violation.
    pub locally_initiated: bool,

    /// Whether the tunnel-conversion frame type was negotiated for this
    /// connection. When false it decodes as an ordinary unknown frame.
    pub supports_tunneling: bool,

    /// Maximum decoded field section size in RFC 9204 accounting
    /// (name + value + 32 per field). 0 means unlimited.
    pub max_field_section_size: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stream_id: 0,
            locally_initiated: false,
            supports_tunneling: false,
            max_field_section_size: 64 * 1024,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_field_section_size != 0 && self.max_field_section_size < 32 {
            return Err("max_field_section_size below minimum field overhead".into());
        }
        Ok(())
    }
}
