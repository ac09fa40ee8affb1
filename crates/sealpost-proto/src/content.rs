//! Decrypted message content.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Reference to an encrypted attachment stored on the push server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPointer {
    /// Server-side attachment ID.
    pub id: u64,
    /// MIME type of the plaintext.
    pub content_type: String,
    /// Per-attachment decryption key.
    pub key: Vec<u8>,
}

/// Plaintext payload carried inside every wire type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    /// Message text.
    pub body: String,
    /// Attachments referenced by this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentPointer>,
}

impl MessageContent {
    /// Text-only content.
    pub fn text(body: impl Into<String>) -> Self {
        Self { body: body.into(), attachments: Vec::new() }
    }

    /// CBOR encoding.
    pub fn encode(&self) -> Result<Vec<u8>> {
        crate::to_cbor(self)
    }

    /// Decode CBOR content.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        crate::from_cbor(bytes)
    }
}
