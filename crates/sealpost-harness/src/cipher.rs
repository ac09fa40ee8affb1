//! Simulated session cipher.
//!
//! Not a ratchet. Each direction of a session gets a fixed ChaCha20-Poly1305
//! key derived with HKDF-SHA256 from the two identity keys, so both ends
//! derive the same keys without a handshake. The nonce is a per-session send
//! counter, carried in front of the ciphertext.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{collections::HashMap, sync::Mutex};

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use sealpost_core::{Address, CipherError, SessionCipher, SessionState};
use sealpost_proto::{IdentityKey, PreKeyBundle, PreKeyBundleEnvelope};
use sha2::Sha256;

const SESSION_LABEL: &[u8] = b"sealpostSimSessionV1";
const COUNTER_SIZE: usize = 8;

struct SimSession {
    state: SessionState,
    peer_identity: IdentityKey,
    send_key: [u8; 32],
    recv_key: [u8; 32],
    send_counter: u64,
}

/// Session cipher for one simulated device.
pub struct SimCipher {
    identity: IdentityKey,
    sessions: Mutex<HashMap<Address, SimSession>>,
}

impl SimCipher {
    /// Cipher for the device owning `identity`.
    pub fn new(identity: IdentityKey) -> Self {
        Self { identity, sessions: Mutex::new(HashMap::new()) }
    }

    /// Identity the session with `peer` was established against.
    pub fn peer_identity(&self, peer: &Address) -> Option<IdentityKey> {
        #[allow(clippy::expect_used)]
        self.sessions.lock().expect("Mutex poisoned").get(peer).map(|s| s.peer_identity)
    }

    fn install(&self, peer: &Address, peer_identity: IdentityKey, state: SessionState) {
        #[allow(clippy::expect_used)]
        let mut sessions = self.sessions.lock().expect("Mutex poisoned");

        let send_counter = sessions
            .get(peer)
            .filter(|existing| existing.peer_identity == peer_identity)
            .map_or(0, |existing| existing.send_counter);

        sessions.insert(peer.clone(), SimSession {
            state,
            peer_identity,
            send_key: derive_key(&self.identity, &peer_identity),
            recv_key: derive_key(&peer_identity, &self.identity),
            send_counter,
        });
    }
}

/// Key for messages from `from` to `to`.
fn derive_key(from: &IdentityKey, to: &IdentityKey) -> [u8; 32] {
    let mut ikm = Vec::with_capacity(64);
    ikm.extend_from_slice(from.as_bytes());
    ikm.extend_from_slice(to.as_bytes());

    let hkdf = Hkdf::<Sha256>::new(None, &ikm);
    let mut key = [0u8; 32];
    let Ok(()) = hkdf.expand(SESSION_LABEL, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    key
}

fn nonce(counter: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

impl SessionCipher for SimCipher {
    fn local_identity(&self) -> IdentityKey {
        self.identity
    }

    fn session_state(&self, peer: &Address) -> SessionState {
        #[allow(clippy::expect_used)]
        let sessions = self.sessions.lock().expect("Mutex poisoned");
        sessions.get(peer).map_or(SessionState::None, |session| session.state)
    }

    fn establish_outbound(&self, peer: &Address, bundle: &PreKeyBundle) -> Result<(), CipherError> {
        if bundle.prekey.is_empty() {
            return Err(CipherError::InvalidBundle("empty prekey".to_string()));
        }
        self.install(peer, bundle.identity_key, SessionState::Bundle);
        Ok(())
    }

    fn establish_inbound(
        &self,
        peer: &Address,
        envelope: &PreKeyBundleEnvelope,
    ) -> Result<(), CipherError> {
        self.install(peer, envelope.identity_key, SessionState::Standard);
        Ok(())
    }

    fn encrypt(&self, peer: &Address, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        #[allow(clippy::expect_used)]
        let mut sessions = self.sessions.lock().expect("Mutex poisoned");
        let session = sessions.get_mut(peer).ok_or_else(|| CipherError::NoSession(peer.clone()))?;

        let counter = session.send_counter;
        session.send_counter += 1;

        let cipher = ChaCha20Poly1305::new((&session.send_key).into());
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce(counter)), plaintext)
            .map_err(|_| CipherError::Encrypt("aead failure".to_string()))?;

        let mut out = Vec::with_capacity(COUNTER_SIZE + sealed.len());
        out.extend_from_slice(&counter.to_be_bytes());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, peer: &Address, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        #[allow(clippy::expect_used)]
        let mut sessions = self.sessions.lock().expect("Mutex poisoned");
        let session = sessions.get_mut(peer).ok_or_else(|| CipherError::NoSession(peer.clone()))?;

        let Some((counter, sealed)) = ciphertext.split_first_chunk::<COUNTER_SIZE>() else {
            return Err(CipherError::Decrypt("truncated ciphertext".to_string()));
        };

        let cipher = ChaCha20Poly1305::new((&session.recv_key).into());
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce(u64::from_be_bytes(*counter))), sealed)
            .map_err(|_| CipherError::Decrypt("authentication failed".to_string()))?;

        if session.state == SessionState::Bundle {
            session.state = SessionState::Standard;
        }
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(raw: &str) -> Address {
        Address::new(raw).unwrap()
    }

    fn bundle(identity: IdentityKey) -> PreKeyBundle {
        PreKeyBundle {
            identity_key: identity,
            registration_id: 1,
            prekey_id: 1,
            prekey: vec![1; 32],
        }
    }

    #[test]
    fn bundle_then_reply_promotes_to_standard() {
        let alice_id = IdentityKey::new([1; 32]);
        let bob_id = IdentityKey::new([2; 32]);
        let alice = SimCipher::new(alice_id);
        let bob = SimCipher::new(bob_id);
        let (alice_addr, bob_addr) = (addr("+15550000001"), addr("+15550000002"));

        alice.establish_outbound(&bob_addr, &bundle(bob_id)).unwrap();
        assert_eq!(alice.session_state(&bob_addr), SessionState::Bundle);

        let ct = alice.encrypt(&bob_addr, b"hi bob").unwrap();
        let envelope = PreKeyBundleEnvelope::new(alice_id, Vec::new());
        bob.establish_inbound(&alice_addr, &envelope).unwrap();
        assert_eq!(bob.decrypt(&alice_addr, &ct).unwrap(), b"hi bob");

        let reply = bob.encrypt(&alice_addr, b"hi alice").unwrap();
        assert_eq!(alice.decrypt(&bob_addr, &reply).unwrap(), b"hi alice");
        assert_eq!(alice.session_state(&bob_addr), SessionState::Standard);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let alice_id = IdentityKey::new([1; 32]);
        let bob_id = IdentityKey::new([2; 32]);
        let alice = SimCipher::new(alice_id);
        let bob = SimCipher::new(bob_id);
        let (alice_addr, bob_addr) = (addr("+15550000001"), addr("+15550000002"));
        alice.establish_outbound(&bob_addr, &bundle(bob_id)).unwrap();
        let envelope = PreKeyBundleEnvelope::new(alice_id, Vec::new());
        bob.establish_inbound(&alice_addr, &envelope).unwrap();

        let mut ct = alice.encrypt(&bob_addr, b"payload").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 1;

        assert!(matches!(bob.decrypt(&alice_addr, &ct), Err(CipherError::Decrypt(_))));
        assert!(matches!(bob.decrypt(&alice_addr, &[0; 3]), Err(CipherError::Decrypt(_))));
    }

    #[test]
    fn missing_session_is_reported() {
        let cipher = SimCipher::new(IdentityKey::new([1; 32]));
        let peer = addr("+15550000002");
        assert_eq!(cipher.decrypt(&peer, &[0; 32]), Err(CipherError::NoSession(peer)));
    }
}
