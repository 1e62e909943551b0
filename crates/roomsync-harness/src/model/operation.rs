//! Operations for model-based testing.
//!
//! Operations represent everything that can happen to one room: remote
//! membership and naming changes staged at the server, messages from other
//! users, local sends, request completions and syncs. They are generated
//! randomly by proptest (or decoded with `arbitrary` when fuzzing) and
//! applied to both the model and the real implementation.

use arbitrary::Arbitrary;

/// Remote user selector, reduced modulo [`USER_COUNT`].
pub type UserSlot = u8;

/// Display name selector, reduced modulo the name pool plus one "no name".
pub type NameSlot = u8;

/// Number of distinct remote users.
pub const USER_COUNT: u8 = 4;

/// Display names remote users pick from. Collisions are intended.
const NAME_POOL: [&str; 4] = ["Alice", "Bob", "Carol", "Dave"];

/// User id of a remote user.
pub fn user_id_for(slot: UserSlot) -> String {
    format!("@user{}:sim.test", slot % USER_COUNT)
}

/// Display name for a slot. One slot in five means "no display name".
pub fn display_name_for(slot: NameSlot) -> Option<&'static str> {
    NAME_POOL.get(usize::from(slot) % (NAME_POOL.len() + 1)).copied()
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// A remote user joins.
    Join {
        /// Who.
        user: UserSlot,
        /// Display name to join with.
        name: NameSlot,
    },

    /// A remote user is invited.
    Invite {
        /// Who.
        user: UserSlot,
        /// Display name carried in the invite.
        name: NameSlot,
    },

    /// A remote user leaves.
    Leave {
        /// Who.
        user: UserSlot,
    },

    /// A remote user is banned.
    Ban {
        /// Who.
        user: UserSlot,
    },

    /// A remote user changes display name, keeping their membership.
    Rename {
        /// Who.
        user: UserSlot,
        /// New display name.
        name: NameSlot,
    },

    /// The explicit room name is set, or cleared with `None`.
    SetRoomName {
        /// New name.
        name: Option<NameSlot>,
    },

    /// A remote user posts a message.
    RemoteMessage {
        /// Sender.
        user: UserSlot,
        /// Send as an emote.
        emote: bool,
    },

    /// We send a text message.
    SendText {
        /// Send as an emote.
        emote: bool,
    },

    /// We send an image.
    SendImage,

    /// The server completes its oldest outstanding request.
    CompleteRequest {
        /// Whether it succeeds.
        success: bool,
    },

    /// We retry the head of the send queue.
    RetrySend,

    /// The connection starts shutting down.
    CloseConnection,

    /// Everything staged at the server is delivered.
    Sync,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_wrap() {
        assert_eq!(user_id_for(1), user_id_for(1 + USER_COUNT));
        assert_eq!(display_name_for(0), Some("Alice"));
        assert_eq!(display_name_for(4), None);
        assert_eq!(display_name_for(5), Some("Alice"));
    }
}
