//! Chaotic storage wrapper for fault injection testing
//!
//! Storage wrapper that randomly fails operations so tests can check that a
//! failed erase or write never leaves the decoder holding a mixed or
//! half-installed subscription.

use std::sync::{Arc, Mutex};

use super::{Block, Storage, StorageError};

/// Which operations the wrapper may fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTarget {
    /// Erase, write, and read
    All,
    /// Only writes (erase succeeds, write fails)
    WritesOnly,
}

/// Chaotic storage wrapper that randomly injects failures
///
/// Delegates to an underlying storage implementation but fails operations
/// with a configured probability. The RNG is seeded, so a failing schedule is
/// reproducible.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    target: FaultTarget,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Injected failures so far
    failures: Arc<Mutex<usize>>,
}

/// Linear congruential generator; reproducible with the same seed.
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
}

impl<S: Storage> ChaoticStorage<S> {
    /// Create a chaotic wrapper failing any operation with `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
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
            target: FaultTarget::All,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            failures: Arc::new(Mutex::new(0)),
        }
    }

    /// Restrict injected faults to `target`.
    #[must_use]
    pub fn targeting(mut self, target: FaultTarget) -> Self {
        self.target = target;
        self
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of failures injected so far.
    #[allow(clippy::expect_used)]
    pub fn failure_count(&self) -> usize {
        *self.failures.lock().expect("failures mutex poisoned")
    }

    #[allow(clippy::expect_used)]
    fn inject(&self, is_write: bool) -> Result<(), StorageError> {
        if self.target == FaultTarget::WritesOnly && !is_write {
            return Ok(());
        }

        let fail = self.rng.lock().expect("ChaoticRng mutex poisoned").next() < self.failure_rate;
        if fail {
            *self.failures.lock().expect("failures mutex poisoned") += 1;
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }

        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn erase_block(&self, block: Block) -> Result<(), StorageError> {
        self.inject(false)?;
        self.inner.erase_block(block)
    }

    fn write_block(&self, block: Block, data: &[u8]) -> Result<(), StorageError> {
        self.inject(true)?;
        self.inner.write_block(block, data)
    }

    fn read_block(&self, block: Block) -> Result<Option<Vec<u8>>, StorageError> {
        self.inject(false)?;
        self.inner.read_block(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn zero_failure_rate_never_fails() {
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 0.0);

        for slot in 0..8 {
            chaotic.erase_block(Block::Subscription(slot)).expect("should not fail with 0% rate");
            chaotic.write_block(Block::Subscription(slot), &[slot as u8]).expect("write failed");
        }

        assert_eq!(chaotic.inner().written_block_count(), 8);
        assert_eq!(chaotic.failure_count(), 0);
    }

    #[test]
    fn full_failure_rate_always_fails() {
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 1.0);

        assert!(chaotic.erase_block(Block::Subscription(0)).is_err());
        assert!(chaotic.write_block(Block::Subscription(0), b"x").is_err());
        assert!(chaotic.read_block(Block::Subscription(0)).is_err());
        assert_eq!(chaotic.inner().written_block_count(), 0);
    }

    #[test]
    fn writes_only_target_lets_erase_through() {
        let memory = MemoryStorage::new();
        memory.write_block(Block::Subscription(0), b"old").unwrap();

        let chaotic =
            ChaoticStorage::new(memory.clone(), 1.0).targeting(FaultTarget::WritesOnly);
        chaotic.erase_block(Block::Subscription(0)).unwrap();
        assert!(chaotic.write_block(Block::Subscription(0), b"new").is_err());

        assert_eq!(memory.read_block(Block::Subscription(0)).unwrap(), None);
    }

    #[test]
    fn deterministic_with_seed() {
        let chaotic1 = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, 42);
        let chaotic2 = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, 42);

        for i in 0..100 {
            let result1 = chaotic1.erase_block(Block::Subscription(i % 8));
            let result2 = chaotic2.erase_block(Block::Subscription(i % 8));

            assert_eq!(result1.is_ok(), result2.is_ok(), "determinism violated at iteration {i}");
        }
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between 0.0 and 1.0")]
    fn rejects_invalid_failure_rate() {
        let _chaotic = ChaoticStorage::new(MemoryStorage::new(), 1.5);
    }
}
