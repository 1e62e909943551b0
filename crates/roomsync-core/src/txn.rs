//! Client-generated transaction ids.

use std::fmt;

use crate::Environment;

/// Transaction id attached to an outgoing event.
///
/// Formatted as the decimal monotonic clock in microseconds immediately
/// followed by a decimal random `u32`. The server echoes it back to the
/// sending client in `unsigned.transaction_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generate a fresh id.
    pub fn generate<E: Environment>(env: &E) -> Self {
        Self(format!("{}{}", env.monotonic_micros(), env.random_u32()))
    }

    /// The id as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
