//! Production Environment implementation using system time and OS RNG.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::Environment;

/// Production environment.
///
/// The monotonic clock counts from the moment the environment was created.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. Transaction ids cannot be made
/// unique without it.
#[derive(Clone, Debug)]
pub struct SystemEnv {
    origin: Instant,
}

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    #[allow(clippy::disallowed_methods)]
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn monotonic_micros(&self) -> u64 {
        let elapsed = Instant::now().duration_since(self.origin);
        u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_secs(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn monotonic_clock_advances() {
        let env = SystemEnv::new();

        let t1 = env.monotonic_micros();
        std::thread::sleep(Duration::from_millis(2));
        let t2 = env.monotonic_micros();

        assert!(t2 > t1, "Time should advance");
    }

    #[test]
    fn random_bytes_differ() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];
        env.random_bytes(&mut bytes1);
        env.random_bytes(&mut bytes2);

        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn wall_clock_is_after_2020() {
        assert!(SystemEnv::new().wall_clock_secs() > 1_577_836_800);
    }
}
