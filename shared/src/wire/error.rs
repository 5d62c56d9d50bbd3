use thiserror::Error;

use super::WireType;

/// Errors raised by the type table and the payload codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Type tag outside the closed type table
    #[error("Unsupported wire type tag {tag}. The supported types are: d, f, t, s, h, A40_c, l (and ul)")]
    UnsupportedType { tag: i16 },

    /// Type code outside the closed type table
    #[error("Unsupported wire type code '{code}'. The supported types are: d, f, t, s, h, A40_c, l (and ul)")]
    UnsupportedCode { code: String },

    /// Payload length does not match the element count
    #[error("{wire_type} payload of {actual} bytes does not hold {count} elements (expected {expected} bytes)")]
    PayloadSize {
        wire_type: WireType,
        count: usize,
        expected: usize,
        actual: usize,
    },

    /// Text does not fit the fixed-length buffer
    #[error("Text of {len} bytes does not fit the {max} byte string buffer")]
    TextTooLong { len: usize, max: usize },

    /// Text contains an interior NUL or is not valid UTF-8
    #[error("Text value is not representable: {reason}")]
    InvalidText { reason: &'static str },

    /// A scalar was requested from an empty payload
    #[error("Expected a single {wire_type} element but the payload is empty")]
    EmptyPayload { wire_type: WireType },
}
