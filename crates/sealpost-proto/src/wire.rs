//! Outer wire envelope exchanged with the push network.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    identity::RelayId,
};

/// Message type carried in the outer envelope.
///
/// Codes match the push server's numbering, so they are not contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Encrypted with an established standard session
    Ciphertext = 1,
    /// Ciphertext wrapped in a [`crate::PreKeyBundleEnvelope`]
    PreKeyBundle = 3,
    /// Unencrypted [`crate::MessageContent`]
    Plaintext = 4,
}

impl WireType {
    /// Numeric code on the wire.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire code. `None` for codes this implementation does not
    /// support.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Ciphertext),
            3 => Some(Self::PreKeyBundle),
            4 => Some(Self::Plaintext),
            _ => None,
        }
    }
}

impl TryFrom<u8> for WireType {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(code).ok_or(ProtocolError::UnknownWireType(code))
    }
}

/// Encrypted (or plaintext) message as exchanged with the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Raw type code. See [`WireType`].
    pub kind: u8,
    /// Type-specific body.
    pub body: Vec<u8>,
    /// Federation relay the message travelled through, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub relay: Option<RelayId>,
    /// Sender timestamp in Unix milliseconds.
    pub timestamp_ms: u64,
}

impl WireMessage {
    /// Build a message with a known type.
    pub fn new(kind: WireType, body: Vec<u8>, relay: Option<RelayId>, timestamp_ms: u64) -> Self {
        Self { kind: kind.code(), body, relay, timestamp_ms }
    }

    /// Declared wire type.
    ///
    /// # Errors
    ///
    /// `ProtocolError::UnknownWireType` if the code is not supported.
    pub fn wire_type(&self) -> Result<WireType> {
        WireType::try_from(self.kind)
    }

    /// CBOR encoding, used when a message is persisted (e.g. quarantine).
    pub fn encode(&self) -> Result<Vec<u8>> {
        crate::to_cbor(self)
    }

    /// Decode a CBOR-encoded message. The type code is not validated here;
    /// callers inspect it with [`WireMessage::wire_type`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        crate::from_cbor(bytes)
    }
}
