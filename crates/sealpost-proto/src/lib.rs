//! Sealpost wire protocol.
//!
//! Types exchanged with the push network when a plaintext message is upgraded
//! to the secure channel. The outer [`WireMessage`] carries a numeric type code
//! and an opaque body; the body is either a standard ciphertext, a
//! [`PreKeyBundleEnvelope`] wrapping a ciphertext together with the sender's
//! identity key, or plain [`MessageContent`].
//!
//! Payloads are CBOR (via `ciborium`) so fields are self-describing and new
//! optional fields can be added without breaking older peers.
//!
//! # Invariants
//!
//! - A [`WireMessage`] stores its type as the raw code it arrived with. Unknown
//!   codes are representable so the receiver can reject them explicitly
//!   instead of failing to parse the outer envelope.
//! - Decoding never guesses: a body that does not match its declared type is
//!   an error.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod bundle;
mod content;
mod envelope;
mod errors;
mod identity;
mod wire;

pub use bundle::PreKeyBundle;
pub use content::{AttachmentPointer, MessageContent};
pub use envelope::{ENVELOPE_VERSION, PreKeyBundleEnvelope};
pub use errors::{ProtocolError, Result};
pub use identity::{IDENTITY_KEY_SIZE, IdentityKey, RelayId};
pub use wire::{WireMessage, WireType};

/// Encode any serializable value as CBOR.
pub(crate) fn to_cbor<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode a CBOR value.
pub(crate) fn from_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
}
