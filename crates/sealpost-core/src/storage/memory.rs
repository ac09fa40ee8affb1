#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use super::{DirectoryStore, DirectoryTxn, StorageError};
use crate::{address::Address, directory::DirectoryEntry};

/// In-memory directory store for tests and simulation.
///
/// Transactions stage writes on a copy of the table and swap it in on
/// success, so a failed closure leaves the committed rows untouched. The lock
/// is held for the whole transaction, which serializes writers.
#[derive(Clone, Default)]
pub struct MemoryDirectoryStore {
    rows: Arc<Mutex<BTreeMap<Address, DirectoryEntry>>>,
}

impl MemoryDirectoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed rows.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        self.rows.lock().expect("Mutex poisoned").len()
    }

    /// Whether no rows are committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct StagedTxn<'a> {
    rows: &'a mut BTreeMap<Address, DirectoryEntry>,
}

impl DirectoryTxn for StagedTxn<'_> {
    fn get(&self, address: &Address) -> Result<Option<DirectoryEntry>, StorageError> {
        Ok(self.rows.get(address).cloned())
    }

    fn put(&mut self, entry: &DirectoryEntry) -> Result<(), StorageError> {
        self.rows.insert(entry.address.clone(), entry.clone());
        Ok(())
    }
}

impl DirectoryStore for MemoryDirectoryStore {
    fn load(&self, address: &Address) -> Result<Option<DirectoryEntry>, StorageError> {
        #[allow(clippy::expect_used)]
        let rows = self.rows.lock().expect("Mutex poisoned");
        Ok(rows.get(address).cloned())
    }

    fn list(&self) -> Result<Vec<DirectoryEntry>, StorageError> {
        #[allow(clippy::expect_used)]
        let rows = self.rows.lock().expect("Mutex poisoned");
        Ok(rows.values().cloned().collect())
    }

    fn transact<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut dyn DirectoryTxn) -> Result<(), StorageError>,
    {
        #[allow(clippy::expect_used)]
        let mut rows = self.rows.lock().expect("Mutex poisoned");

        let mut staged = rows.clone();
        f(&mut StagedTxn { rows: &mut staged })?;
        *rows = staged;
        Ok(())
    }
}
