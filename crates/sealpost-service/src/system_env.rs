//! Production Environment implementation using the system clock.

use sealpost_core::Environment;

/// Production environment.
///
/// # Panics
///
/// Panics if the system clock reads earlier than the Unix epoch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn wall_clock_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_past_2020() {
        assert!(SystemEnv::new().wall_clock_millis() > 1_577_836_800_000);
    }
}
