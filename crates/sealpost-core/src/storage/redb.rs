//! Redb-backed durable directory store.
//!
//! Uses Redb's ACID write transactions so a directory sync either commits in
//! full or not at all, even across a crash.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, Table, TableDefinition};

use super::{DirectoryStore, DirectoryTxn, StorageError};
use crate::{address::Address, directory::DirectoryEntry};

/// Table: directory
/// Key: canonical address string
/// Value: CBOR-encoded DirectoryEntry
const DIRECTORY: TableDefinition<&str, &[u8]> = TableDefinition::new("directory");

/// Durable directory store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbDirectoryStore {
    db: Arc<Database>,
}

impl RedbDirectoryStore {
    /// Open or create a Redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(DIRECTORY).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

fn encode_entry(entry: &DirectoryEntry) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(entry, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode_entry(key: &str, bytes: &[u8]) -> Result<DirectoryEntry, StorageError> {
    let entry: DirectoryEntry =
        ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;
    if entry.address.as_str() != key {
        return Err(StorageError::Corrupted(key.to_string()));
    }
    Ok(entry)
}

fn read_entry<T: ReadableTable<&'static str, &'static [u8]>>(
    table: &T,
    address: &Address,
) -> Result<Option<DirectoryEntry>, StorageError> {
    let value = table.get(address.as_str()).map_err(|e| StorageError::Io(e.to_string()))?;
    value.map(|v| decode_entry(address.as_str(), v.value())).transpose()
}

struct RedbTxn<'txn> {
    table: Table<'txn, &'static str, &'static [u8]>,
}

impl DirectoryTxn for RedbTxn<'_> {
    fn get(&self, address: &Address) -> Result<Option<DirectoryEntry>, StorageError> {
        read_entry(&self.table, address)
    }

    fn put(&mut self, entry: &DirectoryEntry) -> Result<(), StorageError> {
        let bytes = encode_entry(entry)?;
        self.table
            .insert(entry.address.as_str(), bytes.as_slice())
            .map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(())
    }
}

impl DirectoryStore for RedbDirectoryStore {
    fn load(&self, address: &Address) -> Result<Option<DirectoryEntry>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(DIRECTORY).map_err(|e| StorageError::Io(e.to_string()))?;

        read_entry(&table, address)
    }

    fn list(&self) -> Result<Vec<DirectoryEntry>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(DIRECTORY).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut entries = Vec::new();
        for result in table.iter().map_err(|e| StorageError::Io(e.to_string()))? {
            let (key, value) = result.map_err(|e| StorageError::Io(e.to_string()))?;
            entries.push(decode_entry(key.value(), value.value())?);
        }

        Ok(entries)
    }

    fn transact<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut dyn DirectoryTxn) -> Result<(), StorageError>,
    {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        let outcome = {
            let table = txn.open_table(DIRECTORY).map_err(|e| StorageError::Io(e.to_string()))?;
            let mut scoped = RedbTxn { table };
            f(&mut scoped)
        };

        match outcome {
            Ok(()) => txn.commit().map_err(|e| StorageError::Io(e.to_string())),
            Err(err) => {
                txn.abort().map_err(|e| StorageError::Io(e.to_string()))?;
                Err(err)
            },
        }
    }
}
