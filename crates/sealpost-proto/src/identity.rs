//! Identity keys and relay identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Size of a public identity key in bytes.
pub const IDENTITY_KEY_SIZE: usize = 32;

/// Public identity key of a device.
///
/// Opaque to this crate. The cryptographic meaning (curve, signature scheme)
/// belongs to the session cipher; the trust layer only compares keys for
/// equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey([u8; IDENTITY_KEY_SIZE]);

impl IdentityKey {
    /// Wrap raw key bytes.
    pub const fn new(bytes: [u8; IDENTITY_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a key from a slice.
    ///
    /// # Errors
    ///
    /// `ProtocolError::InvalidKeyLength` if the slice is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; IDENTITY_KEY_SIZE] =
            bytes.try_into().map_err(|_| ProtocolError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// Raw key bytes.
    pub const fn as_bytes(&self) -> &[u8; IDENTITY_KEY_SIZE] {
        &self.0
    }

    /// Short hex fingerprint (first 4 bytes) for logs.
    pub fn fingerprint(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKey({}..)", self.fingerprint())
    }
}

/// Federation relay a peer is reachable through.
///
/// `None` at use sites means the peer is served by our own push server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayId(String);

impl RelayId {
    /// Create a relay identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Relay name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert_eq!(IdentityKey::from_slice(&[0u8; 31]), Err(ProtocolError::InvalidKeyLength(31)));
        assert_eq!(IdentityKey::from_slice(&[0u8; 33]), Err(ProtocolError::InvalidKeyLength(33)));
        assert!(IdentityKey::from_slice(&[7u8; 32]).is_ok());
    }

    #[test]
    fn debug_shows_fingerprint_only() {
        let key = IdentityKey::new([0xAB; 32]);
        assert_eq!(format!("{key:?}"), "IdentityKey(abababab..)");
    }
}
