//! Environment abstraction for deterministic testing.
//!
//! Decouples room logic from system resources (time, randomness). Production
//! uses [`crate::SystemEnv`]; the harness supplies a virtual clock and a
//! seeded RNG.

/// Time and randomness available to the room state machines.
///
/// # Invariants
///
/// - `monotonic_micros()` never decreases within one process
/// - Given the same seed, a simulated `random_bytes()` produces the same
///   sequence
pub trait Environment: Clone + Send + Sync + 'static {
    /// Microseconds on a monotonic clock.
    fn monotonic_micros(&self) -> u64;

    /// Seconds since the Unix epoch. Used to timestamp local echoes.
    fn wall_clock_secs(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u32`.
    fn random_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }
}

/// Deterministic environment for unit tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::Environment;

    /// Wall clock at micros zero (2023-11-14).
    const EPOCH_SECS: u64 = 1_700_000_000;

    /// Mock environment: the clock ticks one microsecond per read and random
    /// bytes are a running counter.
    #[derive(Clone, Default, Debug)]
    pub struct MockEnv {
        clock: Arc<AtomicU64>,
        counter: Arc<AtomicU64>,
    }

    impl MockEnv {
        /// Create a mock environment at time zero.
        pub fn new() -> Self {
            Self::default()
        }

        /// Move the clock forward.
        pub fn advance_micros(&self, micros: u64) {
            self.clock.fetch_add(micros, Ordering::SeqCst);
        }
    }

    impl Environment for MockEnv {
        fn monotonic_micros(&self) -> u64 {
            self.clock.fetch_add(1, Ordering::SeqCst)
        }

        fn wall_clock_secs(&self) -> u64 {
            EPOCH_SECS + self.clock.load(Ordering::SeqCst) / 1_000_000
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for byte in buffer {
                *byte = self.counter.fetch_add(1, Ordering::SeqCst) as u8;
            }
        }
    }
}
