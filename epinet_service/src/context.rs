//! Seeding context trait for EpiNet sessions.

/// Source of session seeds.
///
/// This trait abstracts where a new session's randomness comes from, so the
/// same service code runs in production and under deterministic simulation.
///
/// # Implementations
///
/// - **Production**: `OsSeedContext` - draws every seed from OS entropy
/// - **Simulation**: `SimContext` (in `epinet_sim`) - derives seeds from a
///   single master seed
///
/// # Determinism
///
/// A session's whole trajectory is a function of its seed, so a
/// deterministic context makes every request sequence reproducible.
pub trait SeedContext: Send + Sync + 'static {
    /// Returns the seed for a newly created session.
    fn next_session_seed(&self) -> u64;

    /// Returns the context's master seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}

impl<T: SeedContext> SeedContext for std::sync::Arc<T> {
    fn next_session_seed(&self) -> u64 {
        (**self).next_session_seed()
    }

    fn seed(&self) -> u64 {
        (**self).seed()
    }
}
