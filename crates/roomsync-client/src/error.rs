//! Client error types.

use roomsync_core::MemberError;
use roomsync_proto::RoomId;
use thiserror::Error;

/// Errors returned by [`crate::Client::handle`].
///
/// Malformed server data and failed requests are not errors: the former is
/// logged and dropped, the latter is reported through
/// [`crate::ClientAction::RequestFailed`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The room is not joined.
    #[error("room not found: {room_id}")]
    RoomNotFound {
        /// Room that was looked up.
        room_id: RoomId,
    },

    /// The room is already joined.
    #[error("room already exists: {room_id}")]
    RoomAlreadyExists {
        /// Room that was joined twice.
        room_id: RoomId,
    },

    /// The membership table rejected a roster transition.
    #[error(transparent)]
    Member(#[from] MemberError),
}
