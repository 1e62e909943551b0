//! Replay errors.

use roomsync_client::ClientError;
use thiserror::Error;

/// Errors that stop a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The script is not valid JSON or names an unknown step.
    #[error("invalid replay script: {0}")]
    Script(#[from] serde_json::Error),

    /// The client rejected a step.
    #[error("step {step}: {source}")]
    Client {
        /// Zero-based index of the failing step.
        step: usize,
        /// What the client reported.
        #[source]
        source: ClientError,
    },
}
