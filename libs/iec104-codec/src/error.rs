//! Codec error types
//!
//! Pure decode/encode errors. The codec never performs I/O and never
//! aborts; every failure is a recoverable value the caller inspects.

use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors produced while decoding or encoding an APDU
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// First byte was not the 0x68 start byte
    #[error("bad start byte: expected 0x68, got {0:#04x}")]
    BadStart(u8),

    /// Buffer does not contain a complete frame for the declared length
    #[error("short frame: need {needed} bytes, have {have}")]
    ShortFrame { needed: usize, have: usize },

    /// Information object type identifier has no decoder
    #[error("unknown ASDU type identifier: {0}")]
    UnknownTypeId(u8),

    /// A length field did not match the bytes actually available
    #[error("length mismatch: header declared {declared}, buffer has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Buffer ended mid-field
    #[error("truncated {field}: need {needed} more bytes")]
    Truncated { field: &'static str, needed: usize },
}

impl CodecError {
    pub fn truncated(field: &'static str, needed: usize) -> Self {
        CodecError::Truncated { field, needed }
    }
}
