//! Protocol vocabulary for roomsync.
//!
//! Typed views over the opaque JSON the homeserver pushes at a room: state
//! events, timeline events, `m.room.member` and `m.room.message` content, and
//! the outcome of asynchronous API requests.
//!
//! Nothing in this crate owns a wire format. Event content stays an opaque
//! [`EventContent`] object that is passed through untouched; the typed views
//! only read the handful of fields the room state machine needs.
//!
//! # Components
//!
//! - [`RoomEvent`] / [`StateEvent`]: parsed sync events
//! - [`MemberContent`] / [`MessageContent`]: typed content views
//! - [`RequestHandle`] / [`RequestOutcome`]: request tracking and completion
//! - [`ProtocolError`]: malformed inbound data

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod api;
pub mod content;
pub mod errors;
pub mod event;

pub use api::{RequestFailure, RequestHandle, RequestOutcome, SendEventResponse, UploadResponse};
pub use content::{MemberContent, Membership, MessageContent, MsgType};
pub use errors::{ProtocolError, Result};
pub use event::{RoomEvent, StateEvent, event_type};

/// Opaque event content: a JSON object passed through unmodified.
pub type EventContent = serde_json::Map<String, serde_json::Value>;

/// Homeserver room identifier (`!opaque:server`).
pub type RoomId = String;

/// Fully qualified user identifier (`@local:server`).
pub type UserId = String;
