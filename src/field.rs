//! HTTP field lines and received-header validation.
//!
//! Field names and values are kept as raw bytes; HTTP/3 field names are
//! lowercase on the wire and values are opaque octets minus the control
//! characters RFC 9114 Section 4.2 forbids.

use bytes::Bytes;

use crate::error::{Error, ErrorCode, Result};

/// A single (name, value) header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLine {
    pub name: Bytes,
    pub value: Bytes,
}

impl FieldLine {
    pub fn new(name: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Self {
        Self {
            name: Bytes::copy_from_slice(name.as_ref()),
            value: Bytes::copy_from_slice(value.as_ref()),
        }
    }

    /// Size of this field for field-section-size accounting
    /// (RFC 9204 Section 4.1.1: name + value + 32).
    pub fn size(&self) -> u64 {
        self.name.len() as u64 + self.value.len() as u64 + 32
    }

    /// Whether this is a pseudo-header field (`:method`, `:path`, ...).
    pub fn is_pseudo_header(&self) -> bool {
        self.name.first() == Some(&b':')
    }
}

/// Validate a decoded field section before it is surfaced to the
/// application.
///
/// Rejects field values containing NUL, CR, or LF, and field names that
/// are empty, contain uppercase ASCII, or contain non-token characters
/// (after an optional leading `:` for pseudo-headers).
///
/// # Errors
///
/// Returns a `MessageError` stream reset; an invalid section must never
/// reach the application.
pub fn validate_field_section(fields: &[FieldLine]) -> Result<()> {
    for field in fields {
        if !is_valid_name(&field.name) {
            return Err(Error::reset(
                ErrorCode::MessageError,
                format!("invalid field name: {:?}", field.name),
            ));
        }
        if !is_valid_value(&field.value) {
            return Err(Error::reset(
                ErrorCode::MessageError,
                format!("invalid value for field: {:?}", field.name),
            ));
        }
    }
    Ok(())
}

fn is_valid_name(name: &[u8]) -> bool {
    let token = match name.split_first() {
        Some((b':', rest)) => rest,
        _ => name,
    };
    !token.is_empty() && token.iter().all(|&b| is_token_char(b))
}

fn is_valid_value(value: &[u8]) -> bool {
    !value.iter().any(|&b| b == 0 || b == b'\r' || b == b'\n')
}

// RFC 9110 token characters, restricted to lowercase alphabetics.
fn is_token_char(b: u8) -> bool {
    matches!(b,
        b'a'..=b'z'
        | b'0'..=b'9'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*'
        | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_fields() {
        let fields = vec![
            FieldLine::new(":method", "GET"),
            FieldLine::new(":path", "/index.html"),
            FieldLine::new("content-type", "text/plain"),
            FieldLine::new("x-custom", ""),
        ];
        assert!(validate_field_section(&fields).is_ok());
    }

    #[test]
    fn test_control_characters_in_value_rejected() {
        for bad in ["a\0b", "a\rb", "a\nb"] {
            let fields = vec![FieldLine::new("x", bad)];
            assert!(validate_field_section(&fields).is_err());
        }
    }

    #[test]
    fn test_bad_names_rejected() {
        for bad in &["", ":", "Content-Type", "sp ace", "semi;colon"] {
            let fields = vec![FieldLine::new(*bad, "v")];
            assert!(validate_field_section(&fields).is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_field_size_accounting() {
        let f = FieldLine::new("abc", "de");
        assert_eq!(f.size(), 3 + 2 + 32);
    }

    #[test]
    fn test_pseudo_header_detection() {
        assert!(FieldLine::new(":status", "200").is_pseudo_header());
        assert!(!FieldLine::new("status", "200").is_pseudo_header());
    }
}
