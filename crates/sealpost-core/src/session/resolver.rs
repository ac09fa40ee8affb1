use std::sync::Arc;

use sealpost_proto::{PreKeyBundleEnvelope, WireMessage, WireType};
use tracing::{debug, warn};

use super::{IdentityTrustStore, PeerLocks, PreKeyService, SessionCipher, SessionState};
use crate::{address::Address, error::MessageError};

/// Picks the wire type for outbound messages and the decrypt path for inbound
/// ones, enforcing trust-on-first-use before any session is committed.
///
/// Every session transition for a peer happens under that peer's lock, so two
/// jobs that both observe "no session" cannot both establish one.
#[derive(Clone)]
pub struct SessionTrustResolver {
    cipher: Arc<dyn SessionCipher>,
    trust: Arc<dyn IdentityTrustStore>,
    prekeys: Arc<dyn PreKeyService>,
    locks: PeerLocks,
}

impl SessionTrustResolver {
    /// Create a resolver over the given collaborators.
    pub fn new(
        cipher: Arc<dyn SessionCipher>,
        trust: Arc<dyn IdentityTrustStore>,
        prekeys: Arc<dyn PreKeyService>,
    ) -> Self {
        Self { cipher, trust, prekeys, locks: PeerLocks::new() }
    }

    /// Encrypt `plaintext` for `peer`.
    ///
    /// - Standard session: `Ciphertext`
    /// - Bundle session: `PreKeyBundle` carrying our identity key
    /// - No session: fetch the peer's prekey bundle, check trust, establish
    ///   the session, then as for a bundle session
    ///
    /// # Errors
    ///
    /// - `IdentityMismatch` if the fetched bundle's identity conflicts with
    ///   the pinned one. No session is created.
    /// - `TransportFailure` if the prekey fetch fails
    /// - `InvalidMessage` if the cipher rejects the bundle or plaintext
    pub async fn encrypt_for(
        &self,
        peer: &Address,
        plaintext: &[u8],
    ) -> Result<(WireType, Vec<u8>), MessageError> {
        let _guard = self.locks.lock(peer).await;

        match self.cipher.session_state(peer) {
            SessionState::Standard => {
                debug!(
                    %peer,
                    wire_type = ?WireType::Ciphertext,
                    "encrypting with standard session"
                );
                Ok((WireType::Ciphertext, self.cipher.encrypt(peer, plaintext)?))
            },
            SessionState::Bundle => self.wrap_in_bundle(peer, plaintext),
            SessionState::None => {
                let bundle = self.prekeys.fetch_prekey_bundle(peer).await?;

                if !self.trust.is_trusted(peer, &bundle.identity_key) {
                    warn!(
                        %peer,
                        fingerprint = %bundle.identity_key.fingerprint(),
                        "untrusted prekey bundle"
                    );
                    return Err(MessageError::IdentityMismatch { peer: peer.clone() });
                }

                self.cipher.establish_outbound(peer, &bundle)?;
                self.trust.save_identity(peer, &bundle.identity_key);
                debug!(%peer, "established outbound session");

                self.wrap_in_bundle(peer, plaintext)
            },
        }
    }

    fn wrap_in_bundle(
        &self,
        peer: &Address,
        plaintext: &[u8],
    ) -> Result<(WireType, Vec<u8>), MessageError> {
        let bundled = self.cipher.encrypt(peer, plaintext)?;
        let envelope = PreKeyBundleEnvelope::new(self.cipher.local_identity(), bundled);

        debug!(%peer, wire_type = ?WireType::PreKeyBundle, "encrypting with bundle session");
        Ok((WireType::PreKeyBundle, envelope.encode()?))
    }

    /// Recover the plaintext of `message` sent by `source`.
    ///
    /// Plaintext messages pass through without touching any session.
    ///
    /// # Errors
    ///
    /// - `InvalidMessage` for unknown wire types, malformed envelopes and
    ///   cipher failures
    /// - `IdentityMismatch` if a prekey bundle claims an identity that
    ///   conflicts with the pinned one. No session state changes.
    pub async fn decrypt(
        &self,
        source: &Address,
        message: &WireMessage,
    ) -> Result<Vec<u8>, MessageError> {
        match message.wire_type()? {
            WireType::Plaintext => Ok(message.body.clone()),
            WireType::Ciphertext => {
                let _guard = self.locks.lock(source).await;
                Ok(self.cipher.decrypt(source, &message.body)?)
            },
            WireType::PreKeyBundle => {
                let envelope = PreKeyBundleEnvelope::decode(&message.body)?;
                let _guard = self.locks.lock(source).await;

                if !self.trust.is_trusted(source, &envelope.identity_key) {
                    warn!(
                        peer = %source,
                        fingerprint = %envelope.identity_key.fingerprint(),
                        "untrusted identity in prekey bundle"
                    );
                    return Err(MessageError::IdentityMismatch { peer: source.clone() });
                }

                self.cipher.establish_inbound(source, &envelope)?;
                let plaintext = self.cipher.decrypt(source, &envelope.bundled)?;

                // Pin only once the bundled ciphertext has authenticated.
                self.trust.save_identity(source, &envelope.identity_key);
                debug!(peer = %source, "accepted inbound session");
                Ok(plaintext)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_types, reason = "Test doubles")]

    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;
    use sealpost_proto::{IdentityKey, PreKeyBundle};

    use super::*;
    use crate::{
        error::NetworkError,
        session::{CipherError, TofuTrustStore},
    };

    const LOCAL: IdentityKey = IdentityKey::new([7; 32]);

    /// Cipher that XORs with 0x5a and records every call.
    #[derive(Default)]
    struct MockCipher {
        sessions: Mutex<HashMap<Address, SessionState>>,
        state_queries: AtomicUsize,
        mutations: AtomicUsize,
        reject_decrypt: AtomicBool,
    }

    impl MockCipher {
        fn with_session(peer: &Address, state: SessionState) -> Self {
            let cipher = Self::default();
            cipher.sessions.lock().unwrap().insert(peer.clone(), state);
            cipher
        }

        fn xor(bytes: &[u8]) -> Vec<u8> {
            bytes.iter().map(|b| b ^ 0x5a).collect()
        }
    }

    impl SessionCipher for MockCipher {
        fn local_identity(&self) -> IdentityKey {
            LOCAL
        }

        fn session_state(&self, peer: &Address) -> SessionState {
            self.state_queries.fetch_add(1, Ordering::SeqCst);
            self.sessions.lock().unwrap().get(peer).copied().unwrap_or(SessionState::None)
        }

        fn establish_outbound(&self, peer: &Address, _: &PreKeyBundle) -> Result<(), CipherError> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            self.sessions.lock().unwrap().insert(peer.clone(), SessionState::Bundle);
            Ok(())
        }

        fn establish_inbound(
            &self,
            peer: &Address,
            _: &PreKeyBundleEnvelope,
        ) -> Result<(), CipherError> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            self.sessions.lock().unwrap().insert(peer.clone(), SessionState::Standard);
            Ok(())
        }

        fn encrypt(&self, peer: &Address, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
            match self.sessions.lock().unwrap().get(peer) {
                Some(_) => Ok(Self::xor(plaintext)),
                None => Err(CipherError::NoSession(peer.clone())),
            }
        }

        fn decrypt(&self, peer: &Address, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
            if self.reject_decrypt.load(Ordering::SeqCst) {
                return Err(CipherError::Decrypt("bad mac".to_string()));
            }
            match self.sessions.lock().unwrap().get(peer) {
                Some(_) => Ok(Self::xor(ciphertext)),
                None => Err(CipherError::NoSession(peer.clone())),
            }
        }
    }

    struct FixedPreKeys {
        identity: IdentityKey,
        fetches: AtomicUsize,
    }

    impl FixedPreKeys {
        fn new(identity: IdentityKey) -> Self {
            Self { identity, fetches: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl PreKeyService for FixedPreKeys {
        async fn fetch_prekey_bundle(&self, _: &Address) -> Result<PreKeyBundle, NetworkError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(PreKeyBundle {
                identity_key: self.identity,
                registration_id: 1,
                prekey_id: 1,
                prekey: vec![0; 32],
            })
        }
    }

    struct Fixture {
        cipher: Arc<MockCipher>,
        trust: TofuTrustStore,
        prekeys: Arc<FixedPreKeys>,
        resolver: SessionTrustResolver,
    }

    fn fixture(cipher: MockCipher, peer_identity: IdentityKey) -> Fixture {
        let cipher = Arc::new(cipher);
        let trust = TofuTrustStore::new();
        let prekeys = Arc::new(FixedPreKeys::new(peer_identity));
        let resolver =
            SessionTrustResolver::new(cipher.clone(), Arc::new(trust.clone()), prekeys.clone());
        Fixture { cipher, trust, prekeys, resolver }
    }

    fn peer() -> Address {
        Address::new("+15551234567").unwrap()
    }

    fn wire(kind: WireType, body: Vec<u8>) -> WireMessage {
        WireMessage::new(kind, body, None, 0)
    }

    #[tokio::test]
    async fn no_session_selects_prekey_bundle() {
        let f = fixture(MockCipher::default(), IdentityKey::new([1; 32]));

        let (kind, body) = f.resolver.encrypt_for(&peer(), b"hello").await.unwrap();

        assert_eq!(kind, WireType::PreKeyBundle);
        let envelope = PreKeyBundleEnvelope::decode(&body).unwrap();
        assert_eq!(envelope.identity_key, LOCAL);
        assert_eq!(MockCipher::xor(&envelope.bundled), b"hello");
        assert_eq!(f.prekeys.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(f.trust.pinned(&peer()), Some(IdentityKey::new([1; 32])));
    }

    #[tokio::test]
    async fn bundle_session_rewraps_without_fetch() {
        let cipher = MockCipher::with_session(&peer(), SessionState::Bundle);
        let f = fixture(cipher, IdentityKey::new([1; 32]));

        let (kind, _) = f.resolver.encrypt_for(&peer(), b"again").await.unwrap();

        assert_eq!(kind, WireType::PreKeyBundle);
        assert_eq!(f.prekeys.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn standard_session_selects_ciphertext() {
        let cipher = MockCipher::with_session(&peer(), SessionState::Standard);
        let f = fixture(cipher, IdentityKey::new([1; 32]));

        let (kind, body) = f.resolver.encrypt_for(&peer(), b"hi").await.unwrap();

        assert_eq!(kind, WireType::Ciphertext);
        assert_eq!(MockCipher::xor(&body), b"hi");
    }

    #[tokio::test]
    async fn untrusted_prekey_bundle_aborts_send() {
        let f = fixture(MockCipher::default(), IdentityKey::new([2; 32]));
        f.trust.save_identity(&peer(), &IdentityKey::new([1; 32]));

        let result = f.resolver.encrypt_for(&peer(), b"hello").await;

        assert_eq!(result, Err(MessageError::IdentityMismatch { peer: peer() }));
        assert_eq!(f.cipher.mutations.load(Ordering::SeqCst), 0);
        assert_eq!(f.cipher.session_state(&peer()), SessionState::None);
    }

    #[tokio::test]
    async fn plaintext_passes_through_without_session_lookup() {
        let f = fixture(MockCipher::default(), IdentityKey::new([1; 32]));

        let clear = wire(WireType::Plaintext, b"clear".to_vec());
        let body = f.resolver.decrypt(&peer(), &clear).await.unwrap();

        assert_eq!(body, b"clear");
        assert_eq!(f.cipher.state_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ciphertext_without_session_is_invalid() {
        let f = fixture(MockCipher::default(), IdentityKey::new([1; 32]));

        let result = f.resolver.decrypt(&peer(), &wire(WireType::Ciphertext, vec![1, 2, 3])).await;

        assert!(matches!(result, Err(MessageError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn unknown_wire_type_is_invalid() {
        let f = fixture(MockCipher::default(), IdentityKey::new([1; 32]));
        let mut message = wire(WireType::Plaintext, b"?".to_vec());
        message.kind = 2;

        let result = f.resolver.decrypt(&peer(), &message).await;

        assert!(matches!(result, Err(MessageError::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn trusted_bundle_commits_session_and_decrypts() {
        let f = fixture(MockCipher::default(), IdentityKey::new([1; 32]));
        let claimed = IdentityKey::new([3; 32]);
        let envelope = PreKeyBundleEnvelope::new(claimed, MockCipher::xor(b"first contact"));

        let body = f
            .resolver
            .decrypt(&peer(), &wire(WireType::PreKeyBundle, envelope.encode().unwrap()))
            .await
            .unwrap();

        assert_eq!(body, b"first contact");
        assert_eq!(f.cipher.session_state(&peer()), SessionState::Standard);
        assert_eq!(f.trust.pinned(&peer()), Some(claimed));
    }

    #[tokio::test]
    async fn undecryptable_bundle_pins_nothing() {
        let cipher = MockCipher::default();
        cipher.reject_decrypt.store(true, Ordering::SeqCst);
        let f = fixture(cipher, IdentityKey::new([1; 32]));
        let envelope = PreKeyBundleEnvelope::new(IdentityKey::new([6; 32]), vec![9; 8]);

        let result = f
            .resolver
            .decrypt(&peer(), &wire(WireType::PreKeyBundle, envelope.encode().unwrap()))
            .await;

        assert!(matches!(result, Err(MessageError::InvalidMessage(_))));
        assert_eq!(f.trust.pinned(&peer()), None);
    }

    #[tokio::test]
    async fn conflicting_bundle_identity_is_rejected_without_mutation() {
        let f = fixture(MockCipher::default(), IdentityKey::new([1; 32]));
        f.trust.save_identity(&peer(), &IdentityKey::new([3; 32]));
        let envelope = PreKeyBundleEnvelope::new(IdentityKey::new([4; 32]), vec![9; 8]);

        let result = f
            .resolver
            .decrypt(&peer(), &wire(WireType::PreKeyBundle, envelope.encode().unwrap()))
            .await;

        assert_eq!(result, Err(MessageError::IdentityMismatch { peer: peer() }));
        assert_eq!(f.cipher.mutations.load(Ordering::SeqCst), 0);
        assert_eq!(f.trust.pinned(&peer()), Some(IdentityKey::new([3; 32])));
    }

    #[tokio::test]
    async fn concurrent_first_sends_fetch_once() {
        let f = fixture(MockCipher::default(), IdentityKey::new([1; 32]));

        let (peer_a, peer_b) = (peer(), peer());
        let (a, b) = tokio::join!(
            f.resolver.encrypt_for(&peer_a, b"one"),
            f.resolver.encrypt_for(&peer_b, b"two"),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(f.prekeys.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(f.cipher.mutations.load(Ordering::SeqCst), 1);
    }
}
