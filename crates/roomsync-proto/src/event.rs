//! Room events as delivered by a sync response.
//!
//! A sync batch carries two kinds of events for a room: state events (keyed by
//! `(type, state_key)`) and timeline events. Timeline entries that carry a
//! `state_key` are state events too and are applied to the state table before
//! the timeline is dispatched.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{EventContent, ProtocolError, Result, UserId};

/// Well-known event types.
pub mod event_type {
    /// Membership of a single user, keyed by user id.
    pub const MEMBER: &str = "m.room.member";
    /// Explicit room name.
    pub const NAME: &str = "m.room.name";
    /// Canonical room alias.
    pub const CANONICAL_ALIAS: &str = "m.room.canonical_alias";
    /// Legacy single alias event.
    pub const ALIAS: &str = "m.room.alias";
    /// Per-server alias lists, keyed by server name.
    pub const ALIASES: &str = "m.room.aliases";
    /// Chat message.
    pub const MESSAGE: &str = "m.room.message";
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    state_key: Option<String>,
    #[serde(default)]
    content: EventContent,
    #[serde(default)]
    sender: Option<UserId>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    origin_server_ts: u64,
    #[serde(default)]
    unsigned: Unsigned,
}

/// Anything other than a non-negative integer reads as 0 rather than
/// rejecting the event.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_u64().unwrap_or(0))
}

#[derive(Deserialize, Default)]
struct Unsigned {
    #[serde(default)]
    transaction_id: Option<String>,
}

/// A single event from the `state` or `timeline` section of a sync.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEvent {
    /// Event type, e.g. `m.room.message`.
    pub event_type: String,
    /// Present only for state events.
    pub state_key: Option<String>,
    /// Opaque content object.
    pub content: EventContent,
    /// Sending user.
    pub sender: Option<UserId>,
    /// Server timestamp in milliseconds.
    pub origin_server_ts: u64,
    /// Echo marker: the transaction id the sender attached, only visible to
    /// the client that sent it.
    pub transaction_id: Option<String>,
}

impl RoomEvent {
    /// Parse an event from its JSON representation.
    ///
    /// Only `type` is required. Missing `content` is treated as an empty
    /// object; a `content` that is not an object is malformed.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or(ProtocolError::WrongType { field: "event", expected: "object" })?;
        match object.get("type") {
            None | Some(Value::Null) => return Err(ProtocolError::MissingField("type")),
            Some(Value::String(_)) => {},
            Some(_) => return Err(ProtocolError::WrongType { field: "type", expected: "string" }),
        }

        let raw = RawEvent::deserialize(value)?;
        Ok(Self {
            event_type: raw.event_type,
            state_key: raw.state_key,
            content: raw.content,
            sender: raw.sender,
            origin_server_ts: raw.origin_server_ts,
            transaction_id: raw.unsigned.transaction_id,
        })
    }

    /// Whether this event updates room state.
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// Convert into a state event.
    ///
    /// # Errors
    ///
    /// `MissingField("state_key")` if this is a plain timeline event.
    pub fn into_state(self) -> Result<StateEvent> {
        let state_key = self.state_key.ok_or(ProtocolError::MissingField("state_key"))?;
        Ok(StateEvent {
            event_type: self.event_type,
            state_key,
            content: self.content,
            sender: self.sender,
            origin_server_ts: self.origin_server_ts,
        })
    }
}

/// Latest value stored for one `(event_type, state_key)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEvent {
    /// Event type.
    pub event_type: String,
    /// State key (user id for `m.room.member`, empty for most others).
    pub state_key: String,
    /// Opaque content object.
    pub content: EventContent,
    /// Sending user.
    pub sender: Option<UserId>,
    /// Server timestamp in milliseconds.
    pub origin_server_ts: u64,
}

impl StateEvent {
    /// Build a state event with no sender or timestamp.
    pub fn new(
        event_type: impl Into<String>,
        state_key: impl Into<String>,
        content: EventContent,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            state_key: state_key.into(),
            content,
            sender: None,
            origin_server_ts: 0,
        }
    }

    /// Non-empty string field of the content, if any.
    pub fn content_str(&self, field: &str) -> Option<&str> {
        self.content.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
    }
}
