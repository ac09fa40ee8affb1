//! Recording delivery sink and in-memory quarantine.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use sealpost_core::{Address, StorageError};
use sealpost_service::{DeliveredMessage, DeliverySink, IncomingMessage, QuarantineStore};
use tracing::warn;

/// Delivery sink that records every message it is given.
#[derive(Clone, Default)]
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<DeliveredMessage>>>,
}

impl RecordingSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, in delivery order.
    pub fn delivered(&self) -> Vec<DeliveredMessage> {
        #[allow(clippy::expect_used)]
        self.delivered.lock().expect("Mutex poisoned").clone()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(&self, message: DeliveredMessage) {
        #[allow(clippy::expect_used)]
        self.delivered.lock().expect("Mutex poisoned").push(message);
    }
}

/// Quarantine held in memory as CBOR records, the same bytes a durable
/// store would write.
#[derive(Clone, Default)]
pub struct MemoryQuarantine {
    records: Arc<Mutex<Vec<Vec<u8>>>>,
    notifications: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryQuarantine {
    /// Empty quarantine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages awaiting approval.
    pub fn held(&self) -> Vec<IncomingMessage> {
        #[allow(clippy::expect_used)]
        let records = self.records.lock().expect("Mutex poisoned");
        records.iter().filter_map(|record| decode(record)).collect()
    }

    /// Remove and return the held messages from `source`, e.g. after the
    /// user approved its new identity.
    pub fn release(&self, source: &Address) -> Vec<IncomingMessage> {
        #[allow(clippy::expect_used)]
        let mut records = self.records.lock().expect("Mutex poisoned");
        let mut released = Vec::new();
        records.retain(|record| match decode(record) {
            Some(message) if &message.source == source => {
                released.push(message);
                false
            },
            _ => true,
        });
        released
    }

    /// Number of user notifications raised.
    pub fn notifications(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }

    /// Make `quarantine` fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl QuarantineStore for MemoryQuarantine {
    fn quarantine(&self, message: &IncomingMessage) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io("simulated quarantine write failure".to_string()));
        }
        let mut record = Vec::new();
        ciborium::into_writer(message, &mut record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        #[allow(clippy::expect_used)]
        self.records.lock().expect("Mutex poisoned").push(record);
        Ok(())
    }

    fn notify(&self) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
    }
}

fn decode(record: &[u8]) -> Option<IncomingMessage> {
    match ciborium::from_reader(record) {
        Ok(message) => Some(message),
        Err(error) => {
            warn!(%error, "unreadable quarantine record");
            None
        },
    }
}
