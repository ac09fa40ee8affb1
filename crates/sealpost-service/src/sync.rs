//! Contact discovery.

use std::{collections::BTreeSet, sync::Arc};

use sealpost_core::{Address, DirectoryCache, DirectoryStore, Environment, MessageError};
use tracing::info;

use crate::collaborators::DirectoryService;

/// Outcome of a directory refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Rows written as registered
    pub active: usize,
    /// Rows written as not registered
    pub inactive: usize,
}

/// Refreshes the directory cache from the remote directory service.
///
/// Asks about every push-eligible address (contacts plus everything already
/// cached) and applies the answer as one bulk sync. Addresses the service
/// leaves unclassified are recorded as inactive.
#[derive(Clone)]
pub struct DirectoryRefresher<S: DirectoryStore, E: Environment> {
    local: Address,
    cache: DirectoryCache<S, E>,
    directory: Arc<dyn DirectoryService>,
}

impl<S: DirectoryStore, E: Environment> DirectoryRefresher<S, E> {
    /// Create a refresher for the device whose number is `local`.
    pub fn new(
        local: Address,
        cache: DirectoryCache<S, E>,
        directory: Arc<dyn DirectoryService>,
    ) -> Self {
        Self { local, cache, directory }
    }

    /// Run one refresh over `contacts` (raw, user-entered numbers).
    ///
    /// # Errors
    ///
    /// - `TransportFailure` if the lookup fails. The cache is unchanged.
    /// - `Storage` if the sync transaction fails. The cache is unchanged.
    pub async fn refresh(&self, contacts: Vec<String>) -> Result<SyncReport, MessageError> {
        let eligible = self.cache.push_eligible_addresses(&self.local, &contacts)?;
        let addresses: Vec<Address> = eligible.iter().cloned().collect();

        let lookup = self.directory.bulk_fetch_tokens(&addresses).await?;

        let classified: BTreeSet<&Address> = lookup
            .active
            .iter()
            .map(|token| &token.address)
            .chain(lookup.inactive.iter())
            .collect();
        let mut inactive = lookup.inactive.clone();
        inactive.extend(eligible.iter().filter(|address| !classified.contains(address)).cloned());

        self.cache.bulk_sync(&lookup.active, &inactive)?;

        let report = SyncReport { active: lookup.active.len(), inactive: inactive.len() };
        info!(active = report.active, inactive = report.inactive, "directory refreshed");
        Ok(report)
    }
}
