//! Prekey bundle envelope.
//!
//! A `PreKeyBundle` wire message wraps a standard ciphertext together with the
//! sender's identity key. The receiver must check that key against its trust
//! store before committing the session that decrypts the bundled ciphertext.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    identity::IdentityKey,
};

/// Current envelope version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Identity-asserting wrapper around a ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreKeyBundleEnvelope {
    /// Envelope format version.
    pub version: u8,
    /// Sender's identity public key.
    pub identity_key: IdentityKey,
    /// Standard-session ciphertext.
    pub bundled: Vec<u8>,
}

/// Envelope as it travels. The identity key is carried as raw bytes and
/// length-checked on decode.
#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    version: u8,
    identity_key: Vec<u8>,
    bundled: Vec<u8>,
}

impl PreKeyBundleEnvelope {
    /// Wrap a ciphertext with the sender's identity key.
    pub fn new(identity_key: IdentityKey, bundled: Vec<u8>) -> Self {
        Self { version: ENVELOPE_VERSION, identity_key, bundled }
    }

    /// CBOR encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        crate::to_cbor(&RawEnvelope {
            version: self.version,
            identity_key: self.identity_key.as_bytes().to_vec(),
            bundled: self.bundled.clone(),
        })
    }

    /// Decode and version-check an envelope.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Decode` if the bytes are not a valid envelope
    /// - `ProtocolError::UnsupportedVersion` if the version is not
    ///   [`ENVELOPE_VERSION`]
    /// - `ProtocolError::InvalidKeyLength` if the identity key is not
    ///   [`IDENTITY_KEY_SIZE`](crate::IDENTITY_KEY_SIZE) bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let raw: RawEnvelope = crate::from_cbor(bytes)?;
        if raw.version != ENVELOPE_VERSION {
            return Err(ProtocolError::UnsupportedVersion(raw.version));
        }
        Ok(Self {
            version: raw.version,
            identity_key: IdentityKey::from_slice(&raw.identity_key)?,
            bundled: raw.bundled,
        })
    }
}
