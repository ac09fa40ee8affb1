//! Simulated attachment encryption and storage.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use sealpost_core::{CipherError, StorageError};
use sealpost_service::AttachmentStore;

/// Each attachment key seals exactly one blob.
const ATTACHMENT_NONCE: [u8; 12] = [0; 12];

/// Encrypt an attachment the way a sending device would.
pub fn seal_attachment(plaintext: &[u8], key: &[u8; 32]) -> Vec<u8> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let Ok(sealed) = cipher.encrypt(Nonce::from_slice(&ATTACHMENT_NONCE), plaintext) else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };
    sealed
}

/// In-memory attachment store.
#[derive(Clone, Default)]
pub struct SimAttachmentStore {
    stored: Arc<Mutex<BTreeMap<String, (String, Vec<u8>)>>>,
}

impl SimAttachmentStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type and plaintext stored under `reference`.
    pub fn get(&self, reference: &str) -> Option<(String, Vec<u8>)> {
        #[allow(clippy::expect_used)]
        self.stored.lock().expect("Mutex poisoned").get(reference).cloned()
    }

    /// Number of stored attachments.
    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        self.stored.lock().expect("Mutex poisoned").len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttachmentStore for SimAttachmentStore {
    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
        let key: &[u8; 32] = key
            .try_into()
            .map_err(|_| CipherError::Decrypt(format!("attachment key is {} bytes", key.len())))?;

        ChaCha20Poly1305::new(key.into())
            .decrypt(Nonce::from_slice(&ATTACHMENT_NONCE), ciphertext)
            .map_err(|_| CipherError::Decrypt("attachment authentication failed".to_string()))
    }

    fn store(&self, plaintext: &[u8], content_type: &str) -> Result<String, StorageError> {
        #[allow(clippy::expect_used)]
        let mut stored = self.stored.lock().expect("Mutex poisoned");
        let reference = format!("sim://attachments/{}", stored.len() + 1);
        stored.insert(reference.clone(), (content_type.to_string(), plaintext.to_vec()));
        Ok(reference)
    }
}
