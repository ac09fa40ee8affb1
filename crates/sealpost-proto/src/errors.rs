//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding wire payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Wire type code is not one this implementation understands
    #[error("unknown wire type: {0}")]
    UnknownWireType(u8),

    /// Prekey bundle envelope carries a version we cannot parse
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// Identity key is not exactly 32 bytes
    #[error("invalid identity key length: expected 32, got {0}")]
    InvalidKeyLength(usize),

    /// CBOR serialization failed
    #[error("encode error: {0}")]
    Encode(String),

    /// CBOR deserialization failed
    #[error("decode error: {0}")]
    Decode(String),
}
