//! Error taxonomy for the decision layer.
//!
//! One tagged enumeration covers every way a job can fail. Each variant
//! carries its handling policy: [`MessageError::IdentityMismatch`] quarantines
//! inbound messages, everything else aborts (outbound) or drops (inbound) the
//! current job. Nothing here is retried automatically.

use sealpost_proto::ProtocolError;
use thiserror::Error;

use crate::{address::Address, address::AddressError, session::CipherError, storage::StorageError};

/// Failure reported by a remote collaborator (directory lookup, prekey fetch,
/// message delivery, attachment retrieval).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("network I/O failed: {0}")]
pub struct NetworkError(pub String);

impl NetworkError {
    /// Create a network error with a message.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Errors surfaced to a job's completion signal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Claimed identity key failed the trust check.
    ///
    /// Inbound: the message is quarantined for user approval. Outbound: the
    /// send is aborted. Never falls back to plaintext.
    #[error("identity mismatch for {peer}")]
    IdentityMismatch {
        /// Peer whose identity did not match the pinned key
        peer: Address,
    },

    /// Malformed or undecryptable message. No trust claim was evaluated, so
    /// the message is dropped rather than quarantined.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The directory has no row for this address yet.
    ///
    /// Triggers an on-demand lookup; not a job failure on its own.
    #[error("{0} not cached in directory")]
    NotCached(Address),

    /// Network I/O failed. Aborts the current job only.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// Peer is not reachable over the secure channel, even after a lookup.
    /// The caller owns the SMS fallback.
    #[error("{0} is not registered for secure delivery")]
    RoutingUnavailable(Address),

    /// Address rejected at the boundary.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Directory store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl MessageError {
    /// Whether handling this error persists the message for manual approval.
    pub fn quarantines(&self) -> bool {
        matches!(self, Self::IdentityMismatch { .. })
    }

    /// Whether a later attempt might succeed unchanged.
    ///
    /// Informational only: retry is the queue producer's decision.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransportFailure(_))
    }
}

impl From<ProtocolError> for MessageError {
    fn from(err: ProtocolError) -> Self {
        Self::InvalidMessage(err.to_string())
    }
}

impl From<CipherError> for MessageError {
    fn from(err: CipherError) -> Self {
        Self::InvalidMessage(err.to_string())
    }
}

impl From<NetworkError> for MessageError {
    fn from(err: NetworkError) -> Self {
        Self::TransportFailure(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Address {
        Address::new("+15551234567").unwrap()
    }

    #[test]
    fn only_identity_mismatch_quarantines() {
        assert!(MessageError::IdentityMismatch { peer: peer() }.quarantines());

        assert!(!MessageError::InvalidMessage("bad mac".into()).quarantines());
        assert!(!MessageError::NotCached(peer()).quarantines());
        assert!(!MessageError::TransportFailure("timeout".into()).quarantines());
        assert!(!MessageError::RoutingUnavailable(peer()).quarantines());
    }

    #[test]
    fn only_transport_failures_are_transient() {
        assert!(MessageError::TransportFailure("reset".into()).is_transient());
        assert!(!MessageError::RoutingUnavailable(peer()).is_transient());
        assert!(!MessageError::IdentityMismatch { peer: peer() }.is_transient());
    }

    #[test]
    fn conversions_pick_the_right_variant() {
        let err: MessageError = NetworkError::new("connection reset").into();
        assert_eq!(err, MessageError::TransportFailure("connection reset".into()));

        let err: MessageError = ProtocolError::UnknownWireType(9).into();
        assert!(matches!(err, MessageError::InvalidMessage(_)));

        let err: MessageError = CipherError::NoSession(peer()).into();
        assert!(matches!(err, MessageError::InvalidMessage(_)));
    }

    #[test]
    fn display() {
        assert_eq!(
            MessageError::IdentityMismatch { peer: peer() }.to_string(),
            "identity mismatch for +15551234567"
        );
        assert_eq!(
            MessageError::RoutingUnavailable(peer()).to_string(),
            "+15551234567 is not registered for secure delivery"
        );
    }
}
