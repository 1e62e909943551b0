//! Room state table.
//!
//! Holds the latest [`StateEvent`] for every `(event_type, state_key)` pair.
//! Updates are last-write-wins in server delivery order; the server is the
//! single order-giver, so no timestamp comparison happens here. Keys are never
//! removed while the room exists.

use std::collections::{BTreeMap, HashMap};

use roomsync_proto::{StateEvent, event_type};
use serde_json::Value;

/// One applied state update, handed to the change handler.
#[derive(Debug, Clone, Copy)]
pub struct StateChange<'a> {
    /// Event type of the update.
    pub event_type: &'a str,
    /// State key of the update.
    pub state_key: &'a str,
    /// Value stored before the update, if any.
    pub old: Option<&'a StateEvent>,
    /// Value now stored.
    pub new: &'a StateEvent,
}

/// Latest state value per `(event_type, state_key)`.
#[derive(Debug, Clone, Default)]
pub struct RoomStateTable {
    events: HashMap<String, BTreeMap<String, StateEvent>>,
}

impl RoomStateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `event`, replacing any previous value for its key.
    ///
    /// `on_change` runs synchronously after the replacement with both the old
    /// and new values borrowed from the table. The previous value is returned.
    pub fn apply<F>(&mut self, event: StateEvent, on_change: F) -> Option<StateEvent>
    where
        F: FnOnce(&StateChange<'_>),
    {
        let by_key = self.events.entry(event.event_type.clone()).or_default();
        let state_key = event.state_key.clone();
        let old = by_key.insert(state_key.clone(), event);

        if let Some(new) = by_key.get(&state_key) {
            on_change(&StateChange {
                event_type: &new.event_type,
                state_key: &new.state_key,
                old: old.as_ref(),
                new,
            });
        }
        old
    }

    /// Current value for a key.
    pub fn get(&self, event_type: &str, state_key: &str) -> Option<&StateEvent> {
        self.events.get(event_type)?.get(state_key)
    }

    /// All values of one event type, ordered by state key.
    pub fn events_of_type<'a>(
        &'a self,
        event_type: &str,
    ) -> impl Iterator<Item = &'a StateEvent> + use<'a> {
        self.events.get(event_type).into_iter().flat_map(BTreeMap::values)
    }

    /// Number of stored `(type, state_key)` entries.
    pub fn len(&self) -> usize {
        self.events.values().map(BTreeMap::len).sum()
    }

    /// Whether nothing has been applied yet.
    pub fn is_empty(&self) -> bool {
        self.events.values().all(BTreeMap::is_empty)
    }

    /// The name-like alias the room state exposes, if any.
    ///
    /// Priority: `m.room.name`, then `m.room.canonical_alias`, then any
    /// `m.room.alias`, then the first entry of any `m.room.aliases` list.
    /// Empty strings count as absent.
    pub fn room_alias(&self) -> Option<&str> {
        if let Some(name) = self.get(event_type::NAME, "").and_then(|e| e.content_str("name")) {
            return Some(name);
        }
        if let Some(alias) =
            self.get(event_type::CANONICAL_ALIAS, "").and_then(|e| e.content_str("alias"))
        {
            return Some(alias);
        }
        if let Some(alias) =
            self.events_of_type(event_type::ALIAS).find_map(|e| e.content_str("alias"))
        {
            return Some(alias);
        }
        self.events_of_type(event_type::ALIASES).find_map(|e| {
            e.content.get("aliases")?.as_array()?.iter().find_map(Value::as_str).filter(|s| !s.is_empty())
        })
    }
}
