//! Job payloads and outcomes.

use sealpost_core::{Address, MessageError};
use sealpost_proto::{RelayId, WireMessage, WireType};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// An inbound message as received from the network. This is also exactly
/// what the quarantine persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Sender
    pub source: Address,
    /// Recipients named by the sender
    pub destinations: Vec<Address>,
    /// Message as received
    pub message: WireMessage,
}

/// A stored, decrypted attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    /// Reference returned by the attachment store
    pub reference: String,
    /// MIME type declared by the sender
    pub content_type: String,
}

/// A message handed to the delivery sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    /// Sender
    pub source: Address,
    /// Recipients named by the sender
    pub destinations: Vec<Address>,
    /// Decrypted body
    pub body: String,
    /// Attachments, in the order the sender listed them
    pub attachments: Vec<StoredAttachment>,
    /// Sender's timestamp
    pub timestamp_ms: u64,
}

/// Proof that a send reached the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Canonical destination
    pub destination: Address,
    /// Wire type that was sent
    pub wire_type: WireType,
    /// Relay the message was routed through
    pub relay: Option<RelayId>,
    /// Timestamp stamped on the message
    pub timestamp_ms: u64,
}

/// Completion of an outbound job.
///
/// `Err(MessageError::RoutingUnavailable)` means the message was not sent
/// and the caller should use its SMS path.
pub type SendResult = Result<SendReceipt, MessageError>;

/// Completion of an inbound job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Decrypted and handed to the delivery sink
    Delivered {
        /// Sender
        source: Address,
        /// Stored attachments
        attachments: Vec<StoredAttachment>,
    },
    /// Sender identity changed. Held for user approval.
    Quarantined {
        /// Sender
        source: Address,
    },
    /// Not delivered and not kept
    Dropped(MessageError),
}

pub(crate) struct OutgoingJob {
    pub destination: String,
    pub parts: Vec<String>,
    pub completion: oneshot::Sender<SendResult>,
}

pub(crate) struct IncomingJob {
    pub message: IncomingMessage,
    pub completion: oneshot::Sender<ReceiveOutcome>,
}
