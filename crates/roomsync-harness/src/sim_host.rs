//! Simulated chat host.
//!
//! Applies the UI-facing actions a client emits to an in-memory model of
//! conversations. The roster is a multiset of rendered names, so renames and
//! removals must name an entry that is actually shown. Anything else is a
//! [`HostError`].

use std::collections::BTreeMap;

use roomsync_client::{ClientAction, DisplayMessage, MessageFlags, RoomId};
use thiserror::Error;

/// An action the host could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Action for a conversation that is not open.
    #[error("no conversation for room {room_id}")]
    UnknownRoom {
        /// Room the action named.
        room_id: RoomId,
    },

    /// Conversation opened twice.
    #[error("conversation for room {room_id} already open")]
    DuplicateRoom {
        /// Room opened twice.
        room_id: RoomId,
    },

    /// Rename or removal of a name the roster does not show.
    #[error("room {room_id}: {name:?} is not in the roster")]
    NotInRoster {
        /// Room.
        room_id: RoomId,
        /// Name the action referred to.
        name: String,
    },
}

/// One open conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostRoom {
    /// Rendered roster names, with duplicates.
    pub roster: Vec<String>,
    /// Names announced as arrivals in the conversation.
    pub announced_arrivals: Vec<String>,
    /// Buddy-list alias.
    pub alias: Option<String>,
    /// Conversation title.
    pub title: Option<String>,
    /// Messages shown, in order.
    pub messages: Vec<DisplayMessage>,
    /// Request failures reported to the user.
    pub errors: Vec<String>,
}

impl HostRoom {
    /// Roster names, sorted.
    pub fn sorted_roster(&self) -> Vec<String> {
        let mut roster = self.roster.clone();
        roster.sort();
        roster
    }

    /// `(sender, body)` of every received message.
    pub fn received(&self) -> impl Iterator<Item = (&str, &str)> {
        self.messages
            .iter()
            .filter(|m| m.flags.contains(MessageFlags::RECEIVED))
            .map(|m| (m.sender.as_str(), m.body.as_str()))
    }

    /// Local echoes of messages we sent.
    pub fn sent(&self) -> impl Iterator<Item = &DisplayMessage> {
        self.messages.iter().filter(|m| m.flags.contains(MessageFlags::SENT))
    }

    fn remove_name(&mut self, room_id: &str, name: &str) -> Result<(), HostError> {
        let pos = self.roster.iter().position(|shown| shown == name).ok_or_else(|| {
            HostError::NotInRoster { room_id: room_id.to_owned(), name: name.to_owned() }
        })?;
        self.roster.swap_remove(pos);
        Ok(())
    }
}

/// All open conversations plus closed-room history.
#[derive(Debug, Clone, Default)]
pub struct SimHost {
    rooms: BTreeMap<RoomId, HostRoom>,
    removed: Vec<(RoomId, String)>,
}

impl SimHost {
    /// Host with no conversations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open conversation for a room.
    pub fn room(&self, room_id: &str) -> Option<&HostRoom> {
        self.rooms.get(room_id)
    }

    /// Ids of all open conversations.
    pub fn room_ids(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    /// `(room_id, reason)` of every conversation torn down.
    pub fn removed(&self) -> &[(RoomId, String)] {
        &self.removed
    }

    /// Apply a batch of actions, stopping at the first failure.
    pub fn apply_all(&mut self, actions: &[ClientAction]) -> Result<(), HostError> {
        actions.iter().try_for_each(|action| self.apply(action))
    }

    /// Apply one action. Request actions are not the host's business.
    pub fn apply(&mut self, action: &ClientAction) -> Result<(), HostError> {
        match action {
            ClientAction::Request { .. } | ClientAction::CancelRequest { .. } => Ok(()),
            ClientAction::RoomCreated { room_id } => {
                if self.rooms.contains_key(room_id) {
                    return Err(HostError::DuplicateRoom { room_id: room_id.clone() });
                }
                self.rooms.insert(room_id.clone(), HostRoom::default());
                Ok(())
            },
            ClientAction::RoomRemoved { room_id, reason } => {
                self.rooms
                    .remove(room_id)
                    .ok_or_else(|| HostError::UnknownRoom { room_id: room_id.clone() })?;
                self.removed.push((room_id.clone(), reason.clone()));
                Ok(())
            },
            ClientAction::MembersAdded { room_id, members, announce } => {
                let room = self.room_mut(room_id)?;
                for member in members {
                    room.roster.push(member.display_name.clone());
                    if *announce {
                        room.announced_arrivals.push(member.display_name.clone());
                    }
                }
                Ok(())
            },
            ClientAction::MemberRenamed { room_id, old_name, new_name, .. } => {
                let room = self.room_mut(room_id)?;
                room.remove_name(room_id, old_name)?;
                room.roster.push(new_name.clone());
                Ok(())
            },
            ClientAction::MemberRemoved { room_id, name, .. } => {
                self.room_mut(room_id)?.remove_name(room_id, name)
            },
            ClientAction::SetChatAlias { room_id, alias } => {
                self.room_mut(room_id)?.alias = Some(alias.clone());
                Ok(())
            },
            ClientAction::SetTitle { room_id, title } => {
                self.room_mut(room_id)?.title = Some(title.clone());
                Ok(())
            },
            ClientAction::DisplayMessage(message) => {
                self.room_mut(&message.room_id)?.messages.push(message.clone());
                Ok(())
            },
            ClientAction::RequestFailed { room_id, kind, reason } => {
                // Leave failures arrive after the conversation is gone.
                if let Some(room) = self.rooms.get_mut(room_id) {
                    room.errors.push(format!("{kind:?}: {reason}"));
                }
                Ok(())
            },
        }
    }

    fn room_mut(&mut self, room_id: &str) -> Result<&mut HostRoom, HostError> {
        self.rooms
            .get_mut(room_id)
            .ok_or_else(|| HostError::UnknownRoom { room_id: room_id.to_owned() })
    }
}
