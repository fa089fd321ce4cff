//! Chaotic store wrapper for fault injection testing
//!
//! Delegates to an inner store but fails writes at a configured rate, so
//! tests can check that a failed persist loses a session instead of reusing
//! ratchet state.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::{KeyValueStore, StorageError};

/// Store wrapper that randomly fails `set` and `remove`.
///
/// Reads always succeed so recovery paths can be observed. The failure RNG
/// is seeded, making a chaos run reproducible.
#[derive(Clone)]
pub struct ChaoticStore<S: KeyValueStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: Arc<Mutex<f64>>,
    rng: Arc<Mutex<ChaCha20Rng>>,
    failures: Arc<Mutex<usize>>,
}

impl<S: KeyValueStore> ChaoticStore<S> {
    /// Wrap `inner`, failing writes with probability `failure_rate`.
    ///
    /// The rate is clamped to [0.0, 1.0].
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: Arc::new(Mutex::new(failure_rate.clamp(0.0, 1.0))),
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            failures: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Change the failure rate; shared by all clones.
    pub fn set_failure_rate(&self, failure_rate: f64) -> Result<(), StorageError> {
        *self.failure_rate.lock()? = failure_rate.clamp(0.0, 1.0);
        Ok(())
    }

    /// Writes failed so far.
    pub fn failure_count(&self) -> Result<usize, StorageError> {
        Ok(*self.failures.lock()?)
    }

    fn inject(&self, operation: &str) -> Result<(), StorageError> {
        let rate = *self.failure_rate.lock()?;
        if self.rng.lock()?.gen_bool(rate) {
            *self.failures.lock()? += 1;
            return Err(StorageError::Io(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

impl<S: KeyValueStore> KeyValueStore for ChaoticStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.inject("set")?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inject("remove")?;
        self.inner.remove(key)
    }
}
