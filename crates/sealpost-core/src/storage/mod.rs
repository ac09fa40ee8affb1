//! Persistence for the directory cache.
//!
//! The store is synchronous and transactional. A directory sync touches many
//! rows and must land all-or-nothing, so every mutation goes through
//! [`DirectoryStore::transact`]: the closure sees a [`DirectoryTxn`], and its
//! writes become visible only if it returns `Ok` and the commit succeeds.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticDirectoryStore;
pub use error::StorageError;
pub use memory::MemoryDirectoryStore;

pub use self::redb::RedbDirectoryStore;
use crate::{address::Address, directory::DirectoryEntry};

/// Read/write view of the directory inside a transaction.
pub trait DirectoryTxn {
    /// Row for `address` as seen by this transaction, including its own
    /// uncommitted writes.
    fn get(&self, address: &Address) -> Result<Option<DirectoryEntry>, StorageError>;

    /// Insert or replace the row keyed by `entry.address`.
    fn put(&mut self, entry: &DirectoryEntry) -> Result<(), StorageError>;
}

/// Durable directory rows keyed by canonical address.
///
/// Must be Clone (shared between the cache and the orchestrator workers),
/// Send + Sync, and synchronous. Clones observe the same rows.
///
/// # Panics
///
/// In-memory implementations may panic if an internal mutex is poisoned.
pub trait DirectoryStore: Clone + Send + Sync + 'static {
    /// Committed row for `address`, if any.
    fn load(&self, address: &Address) -> Result<Option<DirectoryEntry>, StorageError>;

    /// Every committed row, ordered by address.
    fn list(&self) -> Result<Vec<DirectoryEntry>, StorageError>;

    /// Run `f` inside a single transaction.
    ///
    /// # Invariants
    ///
    /// - Post (Ok): every `put` made by `f` is committed
    /// - Post (Err): no `put` made by `f` is visible to any reader
    fn transact<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut dyn DirectoryTxn) -> Result<(), StorageError>;
}
