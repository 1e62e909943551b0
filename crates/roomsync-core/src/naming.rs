//! Room display-name derivation.
//!
//! The first non-empty source wins:
//!
//! 1. the alias the state table exposes ([`RoomStateTable::room_alias`])
//! 2. a name built from the other joined or invited members
//! 3. the room id
//!
//! Recomputing is deferred: state changes that may affect the name only set
//! [`RoomFlags::NEEDS_NAME_UPDATE`], and the room recomputes once per batch.

use bitflags::bitflags;
use roomsync_proto::event_type;

use crate::{MemberRecord, MembershipTable, RoomStateTable};

bitflags! {
    /// Per-room dirty bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RoomFlags: u8 {
        /// A state change may have changed the room name.
        const NEEDS_NAME_UPDATE = 1 << 0;
    }
}

/// Whether a state change of `event_type` can change the room name.
pub fn is_naming_event(event_type: &str) -> bool {
    matches!(
        event_type,
        event_type::MEMBER
            | event_type::NAME
            | event_type::CANONICAL_ALIAS
            | event_type::ALIAS
            | event_type::ALIASES
    )
}

/// Name built from the other members' display names.
///
/// `"A"`, `"A and B"`, or `"A and N others"` where N counts every other
/// member including A. `None` when there are no other members.
pub fn name_from_members<'a>(others: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut others = others.into_iter();
    let first = others.next()?;
    let rest: Vec<&str> = others.collect();

    Some(match rest.as_slice() {
        [] => first.to_owned(),
        [second] => format!("{first} and {second}"),
        more => format!("{first} and {} others", more.len() + 1),
    })
}

/// Derive the display name of a room.
pub fn derive_name(
    state: &RoomStateTable,
    members: &MembershipTable,
    own_user_id: &str,
    room_id: &str,
) -> String {
    if let Some(alias) = state.room_alias() {
        return alias.to_owned();
    }

    let others = members
        .active_members(true)
        .filter(|m| m.user_id() != own_user_id)
        .map(MemberRecord::displayname);

    name_from_members(others).unwrap_or_else(|| room_id.to_owned())
}
