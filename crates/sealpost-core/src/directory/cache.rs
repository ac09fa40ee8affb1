use std::collections::BTreeSet;

use sealpost_proto::RelayId;
use tracing::{debug, warn};

use super::{DirectoryEntry, TokenResult};
use crate::{
    address::Address,
    env::Environment,
    error::MessageError,
    storage::{DirectoryStore, StorageError},
};

/// Local record of which addresses can be reached over the secure channel.
///
/// The cache never talks to the network. Lookup results are produced by an
/// external directory service and passed in, which keeps every operation a
/// plain read or a single store transaction.
///
/// Clone is cheap and clones share the same store.
#[derive(Clone)]
pub struct DirectoryCache<S: DirectoryStore, E: Environment> {
    store: S,
    env: E,
}

impl<S: DirectoryStore, E: Environment> DirectoryCache<S, E> {
    /// Create a cache over `store`, stamping rows with `env`'s clock.
    pub fn new(store: S, env: E) -> Self {
        Self { store, env }
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cached registration flag for `address`.
    ///
    /// # Errors
    ///
    /// - `MessageError::NotCached` if there is no row, so callers can tell
    ///   "unknown" apart from "known inactive"
    /// - `MessageError::Storage` if the store fails
    pub fn is_active(&self, address: &Address) -> Result<bool, MessageError> {
        match self.store.load(address)? {
            Some(entry) => Ok(entry.registered),
            None => Err(MessageError::NotCached(address.clone())),
        }
    }

    /// Whether every address in `addresses` has a registered row.
    ///
    /// Inputs are canonical addresses that may carry stray whitespace. Input
    /// that does not parse can never match a row. An empty input is `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails while taking the snapshot.
    pub fn are_all_active<I, A>(&self, addresses: I) -> Result<bool, StorageError>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<str>,
    {
        let active = self.active_addresses()?;

        let mut seen = false;
        for raw in addresses {
            seen = true;
            match Address::new(raw.as_ref()) {
                Ok(address) if active.contains(&address) => {},
                _ => return Ok(false),
            }
        }
        Ok(seen)
    }

    /// Whether `address` accepts SMS fallback. `false` when unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn supports_sms_fallback(&self, address: &Address) -> Result<bool, StorageError> {
        Ok(self.store.load(address)?.is_some_and(|entry| entry.supports_sms))
    }

    /// Upsert the registration flag and relay for one address.
    ///
    /// Keeps an existing row's SMS capability. A new row gets `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store transaction fails.
    pub fn set_registration(
        &self,
        address: &Address,
        relay: Option<RelayId>,
        registered: bool,
    ) -> Result<(), StorageError> {
        let now = self.env.wall_clock_millis();
        self.store.transact(|txn| {
            let supports_sms = txn.get(address)?.is_some_and(|entry| entry.supports_sms);
            txn.put(&DirectoryEntry {
                address: address.clone(),
                registered,
                relay,
                supports_sms,
                last_synced_ms: now,
            })
        })?;

        debug!(%address, registered, "registration updated");
        Ok(())
    }

    /// Replace the row for `token.address` with the result of a single
    /// remote lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the store transaction fails.
    pub fn record_lookup(&self, token: &TokenResult, registered: bool) -> Result<(), StorageError> {
        let entry = if registered {
            self.active_entry(token)
        } else {
            self.inactive_entry(&token.address)
        };
        self.store.transact(|txn| txn.put(&entry))
    }

    /// Apply a directory sync in one transaction.
    ///
    /// Active rows get the token's relay and SMS capability. Inactive rows
    /// are cleared. An address listed on both sides ends up inactive.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails, in which case no row has
    /// changed.
    pub fn bulk_sync(
        &self,
        active: &[TokenResult],
        inactive: &[Address],
    ) -> Result<(), StorageError> {
        let rows: Vec<DirectoryEntry> = active
            .iter()
            .map(|token| self.active_entry(token))
            .chain(inactive.iter().map(|address| self.inactive_entry(address)))
            .collect();

        self.store.transact(|txn| rows.iter().try_for_each(|row| txn.put(row)))?;

        debug!(active = active.len(), inactive = inactive.len(), "directory synced");
        Ok(())
    }

    /// Relay to route `address` through, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn relay_for(&self, address: &Address) -> Result<Option<RelayId>, StorageError> {
        Ok(self.store.load(address)?.and_then(|entry| entry.relay))
    }

    /// Every address worth asking the directory service about: the
    /// canonicalized contacts plus every address already cached.
    ///
    /// Contacts that fail to canonicalize are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn push_eligible_addresses<I, A>(
        &self,
        local: &Address,
        contacts: I,
    ) -> Result<BTreeSet<Address>, StorageError>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<str>,
    {
        let mut eligible = BTreeSet::new();
        for raw in contacts {
            match Address::normalize(raw.as_ref(), local) {
                Ok(address) => {
                    eligible.insert(address);
                },
                Err(error) => warn!(contact = raw.as_ref(), %error, "skipping contact"),
            }
        }

        eligible.extend(self.store.list()?.into_iter().map(|entry| entry.address));
        Ok(eligible)
    }

    /// Every registered address.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn active_addresses(&self) -> Result<BTreeSet<Address>, StorageError> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|entry| entry.registered)
            .map(|entry| entry.address)
            .collect())
    }

    /// Full row for `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn entry(&self, address: &Address) -> Result<Option<DirectoryEntry>, StorageError> {
        self.store.load(address)
    }

    fn active_entry(&self, token: &TokenResult) -> DirectoryEntry {
        DirectoryEntry {
            address: token.address.clone(),
            registered: true,
            relay: token.relay.clone(),
            supports_sms: token.supports_sms,
            last_synced_ms: self.env.wall_clock_millis(),
        }
    }

    fn inactive_entry(&self, address: &Address) -> DirectoryEntry {
        DirectoryEntry {
            address: address.clone(),
            registered: false,
            relay: None,
            supports_sms: false,
            last_synced_ms: self.env.wall_clock_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::*;
    use crate::storage::{ChaoticDirectoryStore, MemoryDirectoryStore};

    #[derive(Clone, Default)]
    struct FixedClock(Arc<AtomicU64>);

    impl Environment for FixedClock {
        fn wall_clock_millis(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn addr(raw: &str) -> Address {
        Address::new(raw).unwrap()
    }

    fn cache() -> DirectoryCache<MemoryDirectoryStore, FixedClock> {
        DirectoryCache::new(MemoryDirectoryStore::new(), FixedClock::default())
    }

    #[test]
    fn unknown_address_is_not_cached() {
        let cache = cache();
        let alice = addr("+15551234567");
        assert_eq!(cache.is_active(&alice), Err(MessageError::NotCached(alice)));
    }

    #[test]
    fn bulk_sync_marks_active_and_inactive() {
        let cache = cache();
        let active = addr("+15551234567");
        let inactive = addr("+17771234567");

        cache
            .bulk_sync(&[TokenResult::new(active.clone(), None, true)], &[inactive.clone()])
            .unwrap();

        assert_eq!(cache.is_active(&active), Ok(true));
        assert_eq!(cache.is_active(&inactive), Ok(false));
        assert!(cache.supports_sms_fallback(&active).unwrap());
        assert!(!cache.supports_sms_fallback(&inactive).unwrap());
    }

    #[test]
    fn inactive_wins_when_listed_twice() {
        let cache = cache();
        let alice = addr("+15551234567");
        let token = TokenResult::new(alice.clone(), Some(RelayId::new("relay")), true);

        cache.bulk_sync(&[token], &[alice.clone()]).unwrap();

        let entry = cache.entry(&alice).unwrap().unwrap();
        assert!(!entry.registered);
        assert_eq!(entry.relay, None);
    }

    #[test]
    fn failed_sync_changes_nothing() {
        let store = ChaoticDirectoryStore::failing_on_write(MemoryDirectoryStore::new(), 1);
        let cache = DirectoryCache::new(store.clone(), FixedClock::default());
        let alice = addr("+15551234567");
        let bob = addr("+15557654321");

        let result = cache.bulk_sync(
            &[TokenResult::new(alice.clone(), None, true), TokenResult::new(bob, None, true)],
            &[],
        );

        assert!(result.is_err());
        assert!(store.inner().is_empty());
    }

    #[test]
    fn are_all_active_requires_every_member() {
        let cache = cache();
        let a = addr("+15550000001");
        let b = addr("+15550000002");
        let c = addr("+15550000003");
        cache
            .bulk_sync(&[TokenResult::new(a, None, false), TokenResult::new(b, None, false)], &[c])
            .unwrap();

        assert!(cache.are_all_active(["+15550000001", " +1 555 000 0002 "]).unwrap());
        assert!(!cache.are_all_active(["+15550000001", "+15550000003"]).unwrap());
        assert!(!cache.are_all_active(["+15550000001", "+15550000009"]).unwrap());
        assert!(!cache.are_all_active(["+15550000001", "garbage"]).unwrap());
        assert!(!cache.are_all_active(Vec::<String>::new()).unwrap());
    }

    #[test]
    fn set_registration_keeps_sms_flag_and_stamps_time() {
        let env = FixedClock::default();
        let cache = DirectoryCache::new(MemoryDirectoryStore::new(), env.clone());
        let alice = addr("+15551234567");
        cache.bulk_sync(&[TokenResult::new(alice.clone(), None, true)], &[]).unwrap();

        env.0.store(500, Ordering::SeqCst);
        cache.set_registration(&alice, Some(RelayId::new("relay-b")), true).unwrap();

        let entry = cache.entry(&alice).unwrap().unwrap();
        assert!(entry.supports_sms);
        assert_eq!(entry.relay, Some(RelayId::new("relay-b")));
        assert_eq!(entry.last_synced_ms, 500);

        let bob = addr("+15557654321");
        cache.set_registration(&bob, None, true).unwrap();
        assert!(!cache.supports_sms_fallback(&bob).unwrap());
    }

    #[test]
    fn record_lookup_replaces_row() {
        let cache = cache();
        let alice = addr("+15551234567");
        let token = TokenResult::new(alice.clone(), Some(RelayId::new("relay")), true);

        cache.record_lookup(&token, true).unwrap();
        assert_eq!(cache.relay_for(&alice).unwrap(), Some(RelayId::new("relay")));

        cache.record_lookup(&TokenResult::new(alice.clone(), None, false), false).unwrap();
        assert_eq!(cache.is_active(&alice), Ok(false));
        assert_eq!(cache.relay_for(&alice).unwrap(), None);
    }

    #[test]
    fn push_eligible_merges_contacts_and_cache() {
        let cache = cache();
        let local = addr("+15551234567");
        let cached = addr("+447700900123");
        cache.bulk_sync(&[], &[cached.clone()]).unwrap();

        let eligible = cache
            .push_eligible_addresses(&local, ["(555) 765-4321", "not a number", "+1 555 765 4321"])
            .unwrap();

        let expected: BTreeSet<Address> = [addr("+15557654321"), cached].into_iter().collect();
        assert_eq!(eligible, expected);
    }

    #[test]
    fn push_eligible_places_national_contacts_in_local_country() {
        let cache = cache();
        let berlin = addr("+49301234567");

        let eligible = cache
            .push_eligible_addresses(&berlin, ["0151 2345678", "030 7654321"])
            .unwrap();

        let expected = BTreeSet::from([addr("+491512345678"), addr("+49307654321")]);
        assert_eq!(eligible, expected);
    }

    #[test]
    fn active_addresses_lists_only_registered() {
        let cache = cache();
        let a = addr("+15550000001");
        let b = addr("+15550000002");
        cache.bulk_sync(&[TokenResult::new(a.clone(), None, false)], &[b]).unwrap();

        assert_eq!(cache.active_addresses().unwrap(), BTreeSet::from([a]));
    }
}
