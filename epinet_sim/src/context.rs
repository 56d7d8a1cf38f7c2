//! Simulation context implementing SeedContext for deterministic testing.

use epinet_service::SeedContext;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, PoisonError};

/// Seed multiplier for the session-seed stream.
const SESSION_SEED_MIX: u64 = 0x517cc1b727220a95;

/// Simulation context backed by a seeded RNG.
///
/// Every session seed is drawn from a ChaCha8 stream derived from the master
/// seed, so a sequence of session creations is reproducible.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Stream that hands out session seeds
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(
                seed.wrapping_mul(SESSION_SEED_MIX),
            ))),
        }
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            rng: Arc::clone(&self.rng),
        }
    }
}

impl SeedContext for SimContext {
    fn next_session_seed(&self) -> u64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_u64()
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
