//! Error types for the room core.

use thiserror::Error;

use crate::membership::RenderState;

/// Errors from the membership table.
///
/// These indicate a bug in the caller (drains out of sync with the table),
/// never bad input from the server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemberError {
    /// A render-state transition was attempted from a state that does not
    /// allow it.
    #[error("invalid render transition for {user_id}: cannot {operation} from {state:?}")]
    InvalidTransition {
        /// Member whose record was being updated.
        user_id: String,
        /// Attempted transition.
        operation: &'static str,
        /// State the record was in.
        state: RenderState,
    },
}
