//! Error types for parsing inbound events.

use thiserror::Error;

/// Result alias for protocol parsing.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Inbound data that cannot be turned into an event.
///
/// These are never fatal: the room logs the error and drops the event without
/// mutating any state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Event JSON could not be decoded at all.
    #[error("malformed event: {0}")]
    Malformed(String),

    /// A field the room logic depends on is absent.
    #[error("event missing required field `{0}`")]
    MissingField(&'static str),

    /// A field is present but has the wrong JSON type.
    #[error("field `{field}` has wrong type, expected {expected}")]
    WrongType {
        /// Field name.
        field: &'static str,
        /// Expected JSON type.
        expected: &'static str,
    },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
