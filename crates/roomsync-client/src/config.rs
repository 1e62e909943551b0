//! Client configuration.

use roomsync_proto::UserId;

/// Sender name shown for messages from users the roster has never seen.
pub const DEFAULT_UNKNOWN_SENDER: &str = "<unknown>";

/// Prefix that turns an outgoing text into an emote, and that is prepended to
/// incoming emotes.
pub const DEFAULT_EMOTE_PREFIX: &str = "/me ";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Our own user id. Excluded from member-derived room names.
    pub user_id: UserId,
    /// Sender name for messages from unknown users.
    pub unknown_sender_name: String,
    /// Emote prefix.
    pub emote_prefix: String,
}

impl ClientConfig {
    /// Default configuration for `user_id`.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self { user_id: user_id.into(), ..Self::default() }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_id: UserId::new(),
            unknown_sender_name: DEFAULT_UNKNOWN_SENDER.to_owned(),
            emote_prefix: DEFAULT_EMOTE_PREFIX.to_owned(),
        }
    }
}
