//! Replay script format.

use roomsync_client::RoomId;
use serde::Deserialize;
use serde_json::Value;

use crate::ReplayError;

/// One step of a replay script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// The user joined a room.
    Join {
        /// Room.
        room_id: RoomId,
    },

    /// A sync batch for one room, raw server JSON.
    Sync {
        /// Room.
        room_id: RoomId,
        /// `state.events`.
        #[serde(default)]
        state: Vec<Value>,
        /// `timeline.events`.
        #[serde(default)]
        timeline: Vec<Value>,
    },

    /// The user sends a text message.
    Send {
        /// Room.
        room_id: RoomId,
        /// Message text; a `/me ` prefix sends an emote.
        body: String,
    },

    /// The user sends an image filled with `size` zero bytes.
    Image {
        /// Room.
        room_id: RoomId,
        /// File name, used for the MIME type and the message body.
        filename: String,
        /// Payload size in bytes.
        #[serde(default)]
        size: usize,
    },

    /// The user retries the room's send queue.
    Retry {
        /// Room.
        room_id: RoomId,
    },

    /// The user leaves a room.
    Leave {
        /// Room.
        room_id: RoomId,
    },

    /// The connection shuts down.
    Close,
}

/// Parse a replay script.
pub fn parse_script(json: &str) -> Result<Vec<Step>, ReplayError> {
    Ok(serde_json::from_str(json)?)
}
