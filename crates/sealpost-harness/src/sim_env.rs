//! Manually advanced clock.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use sealpost_core::Environment;

/// Shared simulated wall clock. Clones observe the same time.
#[derive(Clone, Debug, Default)]
pub struct SimEnv {
    millis: Arc<AtomicU64>,
}

impl SimEnv {
    /// Clock starting at `millis`.
    pub fn at(millis: u64) -> Self {
        Self { millis: Arc::new(AtomicU64::new(millis)) }
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Environment for SimEnv {
    fn wall_clock_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
