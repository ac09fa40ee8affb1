//! Per-job flows.
//!
//! A [`Worker`] runs one job to completion. It holds no per-job state, so a
//! single instance is shared by every task in the pool.

use sealpost_core::{
    Address, DirectoryCache, DirectoryStore, Environment, MessageError, TokenResult,
};
use sealpost_proto::{AttachmentPointer, MessageContent, RelayId, WireMessage};
use tracing::{debug, error, info, warn};

use crate::{
    collaborators::Collaborators,
    job::{
        DeliveredMessage, IncomingMessage, ReceiveOutcome, SendReceipt, SendResult,
        StoredAttachment,
    },
};

pub(crate) struct Worker<S: DirectoryStore, E: Environment> {
    pub local: Address,
    pub cache: DirectoryCache<S, E>,
    pub collaborators: Collaborators,
    pub env: E,
}

impl<S: DirectoryStore, E: Environment> Worker<S, E> {
    /// Outbound flow: route, encrypt, send.
    pub async fn send(&self, destination: &str, parts: Vec<String>) -> SendResult {
        let destination = Address::normalize(destination, &self.local)?;

        self.ensure_registered(&destination).await?;
        let relay = self.cache.relay_for(&destination)?;

        let content = MessageContent::text(parts.concat()).encode()?;
        let (wire_type, body) =
            self.collaborators.resolver.encrypt_for(&destination, &content).await?;

        let timestamp_ms = self.env.wall_clock_millis();
        let message = WireMessage::new(wire_type, body, relay.clone(), timestamp_ms);
        self.collaborators.network.send(&destination, &message).await?;

        Ok(SendReceipt { destination, wire_type, relay, timestamp_ms })
    }

    /// Confirm `destination` is registered, asking the directory service if
    /// the cache has no row or a stale inactive one.
    async fn ensure_registered(&self, destination: &Address) -> Result<(), MessageError> {
        match self.cache.is_active(destination) {
            Ok(true) => return Ok(()),
            Ok(false) | Err(MessageError::NotCached(_)) => {},
            Err(err) => return Err(err),
        }

        debug!(%destination, "looking up directory token");
        match self.collaborators.directory.fetch_token(destination).await? {
            Some(token) => {
                self.cache.record_lookup(&token, true)?;
                Ok(())
            },
            None => {
                let token = TokenResult::new(destination.clone(), None, false);
                self.cache.record_lookup(&token, false)?;
                Err(MessageError::RoutingUnavailable(destination.clone()))
            },
        }
    }

    /// Inbound flow: decrypt, fetch attachments, deliver or quarantine.
    pub async fn receive(&self, incoming: IncomingMessage) -> ReceiveOutcome {
        let source = incoming.source.clone();
        self.note_sender(&incoming);

        match self.open(&incoming).await {
            Ok(delivered) => {
                let attachments = delivered.attachments.clone();
                self.collaborators.sink.deliver(delivered).await;
                info!(%source, attachments = attachments.len(), "message delivered");
                ReceiveOutcome::Delivered { source, attachments }
            },
            Err(err) if err.quarantines() => {
                let quarantine = &self.collaborators.quarantine;
                match quarantine.quarantine(&incoming) {
                    Ok(()) => {
                        quarantine.notify();
                        warn!(%source, "message quarantined pending identity approval");
                        ReceiveOutcome::Quarantined { source }
                    },
                    Err(store_err) => {
                        error!(%source, error = %store_err, "failed to quarantine message");
                        ReceiveOutcome::Dropped(MessageError::Storage(store_err))
                    },
                }
            },
            Err(err) => {
                warn!(%source, error = %err, "dropping incoming message");
                ReceiveOutcome::Dropped(err)
            },
        }
    }

    /// A push message from `source` is evidence that it is registered.
    fn note_sender(&self, incoming: &IncomingMessage) {
        let source = &incoming.source;
        match self.cache.is_active(source) {
            Ok(true) => {},
            Ok(false) | Err(MessageError::NotCached(_)) => {
                if let Err(error) =
                    self.cache.set_registration(source, incoming.message.relay.clone(), true)
                {
                    warn!(%source, %error, "failed to record sender registration");
                }
            },
            Err(error) => warn!(%source, %error, "failed to read sender registration"),
        }
    }

    async fn open(&self, incoming: &IncomingMessage) -> Result<DeliveredMessage, MessageError> {
        let plaintext =
            self.collaborators.resolver.decrypt(&incoming.source, &incoming.message).await?;
        let content = MessageContent::decode(&plaintext)?;

        let relay = incoming.message.relay.as_ref();
        let mut plaintexts = Vec::with_capacity(content.attachments.len());
        for pointer in &content.attachments {
            plaintexts.push(self.fetch_attachment(pointer, relay).await?);
        }

        // Nothing is stored until every attachment has decrypted.
        let mut attachments = Vec::with_capacity(plaintexts.len());
        for (pointer, plaintext) in content.attachments.iter().zip(&plaintexts) {
            let reference = self.collaborators.attachments.store(plaintext, &pointer.content_type)?;
            debug!(id = pointer.id, %reference, "attachment stored");
            attachments.push(StoredAttachment {
                reference,
                content_type: pointer.content_type.clone(),
            });
        }

        Ok(DeliveredMessage {
            source: incoming.source.clone(),
            destinations: incoming.destinations.clone(),
            body: content.body,
            attachments,
            timestamp_ms: incoming.message.timestamp_ms,
        })
    }

    /// Download and decrypt one attachment. The transient file is removed
    /// whether or not decryption succeeds.
    async fn fetch_attachment(
        &self,
        pointer: &AttachmentPointer,
        relay: Option<&RelayId>,
    ) -> Result<Vec<u8>, MessageError> {
        let path = self.collaborators.network.retrieve_attachment(pointer.id, relay).await?;

        let read = tokio::fs::read(&path).await;
        if let Err(error) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), %error, "failed to remove transient attachment");
        }
        let ciphertext = read.map_err(|e| MessageError::TransportFailure(e.to_string()))?;

        Ok(self.collaborators.attachments.decrypt(&ciphertext, &pointer.key)?)
    }
}
