//! Environment abstraction for deterministic testing.
//!
//! Directory rows and outgoing messages are stamped with wall-clock time.
//! Routing time through this trait lets simulations use a virtual clock while
//! production reads the system clock.

/// Source of wall-clock time.
///
/// # Invariants
///
/// - Implementations are cheap to clone and share state between clones
pub trait Environment: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn wall_clock_millis(&self) -> u64;
}
