//! Client events and actions.

use bitflags::bitflags;
use bytes::Bytes;
use roomsync_core::{ImageUpload, NewMember, TransactionId};
use roomsync_proto::{EventContent, RequestHandle, RequestOutcome, RoomId, UserId};
use serde_json::Value;

/// One room's slice of a sync response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomSync {
    /// Room the events belong to.
    pub room_id: RoomId,
    /// `state.events`, raw JSON in server order.
    pub state: Vec<Value>,
    /// `timeline.events`, raw JSON in server order.
    pub timeline: Vec<Value>,
    /// Whether the host should announce arrivals (false on initial sync).
    pub announce_arrivals: bool,
}

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Running the sync loop and handing each joined room's data to the client
/// - Executing [`ClientAction::Request`] and reporting the outcome back
/// - Forwarding user intents (send message, leave room, etc.)
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The user joined a room.
    RoomJoined {
        /// Joined room.
        room_id: RoomId,
    },

    /// Sync data for one room. Creates the room if it is not known yet.
    Sync(RoomSync),

    /// User wants to send a text message. A leading emote prefix sends an
    /// emote.
    SendMessage {
        /// Target room.
        room_id: RoomId,
        /// Message text.
        body: String,
    },

    /// User wants to send an image.
    SendImage {
        /// Target room.
        room_id: RoomId,
        /// Image to upload and send.
        image: ImageUpload,
    },

    /// Redispatch the head of the send queue after a failure.
    RetrySend {
        /// Target room.
        room_id: RoomId,
    },

    /// A request issued via [`ClientAction::Request`] finished.
    RequestCompleted {
        /// Handle from the request action.
        handle: RequestHandle,
        /// How it finished.
        outcome: RequestOutcome,
    },

    /// User wants to leave a room.
    LeaveRoom {
        /// Room to leave.
        room_id: RoomId,
    },

    /// The connection is shutting down. No further sends are dispatched.
    ConnectionClosing,
}

/// An HTTP request against the homeserver.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// `PUT /rooms/{room_id}/send/{event_type}/{txn_id}`
    SendEvent {
        /// Target room.
        room_id: RoomId,
        /// Event type.
        event_type: String,
        /// Transaction id.
        txn_id: TransactionId,
        /// Event content.
        content: EventContent,
    },
    /// `POST /upload`
    UploadFile {
        /// MIME type.
        content_type: String,
        /// File contents.
        data: Bytes,
    },
    /// `POST /rooms/{room_id}/leave`
    LeaveRoom {
        /// Room to leave.
        room_id: RoomId,
    },
}

impl ApiRequest {
    /// Request kind, for error reporting.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::SendEvent { .. } => RequestKind::SendEvent,
            Self::UploadFile { .. } => RequestKind::Upload,
            Self::LeaveRoom { .. } => RequestKind::LeaveRoom,
        }
    }
}

/// Kind of an outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Event send.
    SendEvent,
    /// Media upload.
    Upload,
    /// Leave room.
    LeaveRoom,
}

bitflags! {
    /// How a message is shown in the conversation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MessageFlags: u8 {
        /// Received from another user.
        const RECEIVED = 1 << 0;
        /// Sent by us (local echo).
        const SENT = 1 << 1;
        /// Carries an image.
        const IMAGES = 1 << 2;
    }
}

/// A message for the host conversation surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Sender display name.
    pub sender: String,
    /// Rendered body.
    pub body: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Display flags.
    pub flags: MessageFlags,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// Issue an HTTP request and report back with
    /// [`ClientEvent::RequestCompleted`].
    Request {
        /// Handle identifying the request.
        handle: RequestHandle,
        /// Request to perform.
        request: ApiRequest,
    },

    /// Abort an outstanding request. No completion is expected.
    CancelRequest {
        /// Request to abort.
        handle: RequestHandle,
    },

    /// Open a conversation for a newly joined room.
    RoomCreated {
        /// New room.
        room_id: RoomId,
    },

    /// Tear down a room's conversation.
    RoomRemoved {
        /// Removed room.
        room_id: RoomId,
        /// Why it was removed.
        reason: String,
    },

    /// Add members to the roster.
    MembersAdded {
        /// Room.
        room_id: RoomId,
        /// New roster entries.
        members: Vec<NewMember>,
        /// Whether to announce the arrivals in the conversation.
        announce: bool,
    },

    /// Rename a roster entry.
    MemberRenamed {
        /// Room.
        room_id: RoomId,
        /// Member.
        user_id: UserId,
        /// Name currently in the roster.
        old_name: String,
        /// Name to show.
        new_name: String,
    },

    /// Remove a roster entry.
    MemberRemoved {
        /// Room.
        room_id: RoomId,
        /// Member.
        user_id: UserId,
        /// Name currently in the roster.
        name: String,
    },

    /// Set the room's buddy-list alias.
    SetChatAlias {
        /// Room.
        room_id: RoomId,
        /// Alias.
        alias: String,
    },

    /// Set the conversation title.
    SetTitle {
        /// Room.
        room_id: RoomId,
        /// Title.
        title: String,
    },

    /// Show a message in the conversation.
    DisplayMessage(DisplayMessage),

    /// A request failed. Queued events stay queued.
    RequestFailed {
        /// Room the request was for.
        room_id: RoomId,
        /// What kind of request failed.
        kind: RequestKind,
        /// Human-readable reason.
        reason: String,
    },
}
