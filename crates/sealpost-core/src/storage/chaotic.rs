//! Chaotic directory store for fault injection testing
//!
//! Wraps another store and fails operations either randomly (seeded, so runs
//! are reproducible) or at a chosen write inside a transaction. Used to check
//! that a directory sync interrupted part-way leaves no partial state.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use super::{DirectoryStore, DirectoryTxn, StorageError};
use crate::{address::Address, directory::DirectoryEntry};

/// Store wrapper that injects failures
#[derive(Clone)]
pub struct ChaoticDirectoryStore<S: DirectoryStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// Fail the nth `put` (zero-based) of every transaction
    fail_on_write: Option<usize>,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<Mutex<usize>>,
}

/// Linear congruential generator, deterministic per seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<S: DirectoryStore> ChaoticDirectoryStore<S> {
    /// Wrap `inner`, failing each operation with probability `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x5EA1_9057_D1CE_0001)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            fail_on_write: None,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Never fail randomly, but fail the `n`th write of every transaction.
    pub fn failing_on_write(inner: S, n: usize) -> Self {
        let mut store = Self::with_seed(inner, 0.0, 0);
        store.fail_on_write = Some(n);
        store
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of operations attempted, including individual writes.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    fn increment_operation_count(&self) {
        #[allow(clippy::expect_used)]
        let mut count = self.operation_count.lock().expect("operation_count mutex poisoned");
        *count += 1;
    }

    fn should_fail(&self) -> bool {
        #[allow(clippy::expect_used)]
        self.rng.lock().expect("ChaoticRng mutex poisoned").should_fail(self.failure_rate)
    }
}

struct ChaoticTxn<'a, S: DirectoryStore> {
    inner: &'a mut dyn DirectoryTxn,
    store: &'a ChaoticDirectoryStore<S>,
    writes: usize,
}

impl<S: DirectoryStore> DirectoryTxn for ChaoticTxn<'_, S> {
    fn get(&self, address: &Address) -> Result<Option<DirectoryEntry>, StorageError> {
        self.inner.get(address)
    }

    fn put(&mut self, entry: &DirectoryEntry) -> Result<(), StorageError> {
        self.store.increment_operation_count();
        let index = self.writes;
        self.writes += 1;

        if self.store.fail_on_write == Some(index) || self.store.should_fail() {
            return Err(StorageError::Io(format!("chaos: put {} failed", entry.address)));
        }
        self.inner.put(entry)
    }
}

impl<S: DirectoryStore> DirectoryStore for ChaoticDirectoryStore<S> {
    fn load(&self, address: &Address) -> Result<Option<DirectoryEntry>, StorageError> {
        self.increment_operation_count();
        if self.should_fail() {
            return Err(StorageError::Io("chaos: load failed".to_string()));
        }
        self.inner.load(address)
    }

    fn list(&self) -> Result<Vec<DirectoryEntry>, StorageError> {
        self.increment_operation_count();
        if self.should_fail() {
            return Err(StorageError::Io("chaos: list failed".to_string()));
        }
        self.inner.list()
    }

    fn transact<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut dyn DirectoryTxn) -> Result<(), StorageError>,
    {
        self.increment_operation_count();
        if self.should_fail() {
            return Err(StorageError::Io("chaos: begin failed".to_string()));
        }

        self.inner.transact(|txn| {
            let mut chaotic = ChaoticTxn { inner: txn, store: self, writes: 0 };
            f(&mut chaotic)
        })
    }
}
