//! Error types for RFID reader frame parsing and encoding

use thiserror::Error;

/// Errors that can occur while parsing reader frames
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer is incomplete - need more data
    #[error("incomplete data: need {needed} more bytes")]
    Incomplete { needed: usize },

    /// Invalid frame structure
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Header bytes that no reader of this family emits
    #[error("unexpected header: type 0x{kind:02X}, command 0x{command:02X}")]
    UnexpectedHeader { kind: u8, command: u8 },

    /// Declared length is outside what the family allows
    #[error("declared length {declared} out of range (max {max})")]
    LengthOutOfRange { declared: usize, max: usize },

    /// Trailing byte is not the end marker of the active flavor
    #[error("bad end marker: expected 0x{expected:02X}, got 0x{actual:02X}")]
    BadEndMarker { expected: u8, actual: u8 },

    /// Additive checksum mismatch
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// CRC-16 mismatch
    #[error("CRC mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// Payload too short or otherwise malformed for its command
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl ParseError {
    /// Whether the frame was structurally complete but failed its integrity check
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::BadEndMarker { .. } | Self::ChecksumMismatch { .. } | Self::CrcMismatch { .. }
        )
    }
}

/// Higher-level protocol errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Parse error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Command parameters cannot be encoded
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Command not supported by this reader family
    #[error("command not supported by {family}: {command}")]
    Unsupported { family: String, command: String },
}
