//! Typed views over `m.room.member` and `m.room.message` content.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EventContent, ProtocolError, Result};

/// Membership status carried in `m.room.member` content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    /// Joined the room.
    Join,
    /// Invited but not yet joined.
    Invite,
    /// Left or was kicked.
    Leave,
    /// Banned.
    Ban,
    /// Requested to join.
    Knock,
    /// Missing or unrecognised status.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Membership {
    /// Whether a member with this status belongs in the host roster.
    pub fn is_visible(self) -> bool {
        matches!(self, Self::Join | Self::Invite)
    }
}

/// Content of an `m.room.member` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MemberContent {
    /// Membership status.
    #[serde(default)]
    pub membership: Membership,
    /// Display name set by the user, if any.
    #[serde(default)]
    pub displayname: Option<String>,
}

impl MemberContent {
    /// Parse member content.
    ///
    /// `displayname` may be absent or `null`. Any other non-string value is
    /// malformed.
    pub fn from_content(content: &EventContent) -> Result<Self> {
        Ok(Self::deserialize(Value::Object(content.clone()))?)
    }

    /// Display name to use for `user_id`, falling back to the id itself when
    /// none is set.
    pub fn display_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        match self.displayname.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => user_id,
        }
    }
}

/// `msgtype` of an `m.room.message` event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MsgType {
    /// `m.text`
    Text,
    /// `m.emote`
    Emote,
    /// `m.notice`
    Notice,
    /// `m.image`
    Image,
    /// `m.file`
    File,
    /// Any other subtype, kept verbatim.
    Other(String),
}

impl MsgType {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "m.text",
            Self::Emote => "m.emote",
            Self::Notice => "m.notice",
            Self::Image => "m.image",
            Self::File => "m.file",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for MsgType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "m.text" => Self::Text,
            "m.emote" => Self::Emote,
            "m.notice" => Self::Notice,
            "m.image" => Self::Image,
            "m.file" => Self::File,
            _ => Self::Other(value),
        }
    }
}

impl From<MsgType> for String {
    fn from(value: MsgType) -> Self {
        match value {
            MsgType::Other(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

/// Content of an `m.room.message` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    /// Message subtype.
    pub msgtype: MsgType,
    /// Plain-text body. For images this is the file name.
    pub body: String,
    /// Content reference for media messages.
    pub url: Option<String>,
}

impl MessageContent {
    /// Plain text message.
    pub fn text(body: impl Into<String>) -> Self {
        Self { msgtype: MsgType::Text, body: body.into(), url: None }
    }

    /// Emote (`/me`) message.
    pub fn emote(body: impl Into<String>) -> Self {
        Self { msgtype: MsgType::Emote, body: body.into(), url: None }
    }

    /// Image message. The `url` is filled in once the upload completes.
    pub fn image(filename: impl Into<String>) -> Self {
        Self { msgtype: MsgType::Image, body: filename.into(), url: None }
    }

    /// Parse message content, requiring both `body` and `msgtype`.
    pub fn from_content(content: &EventContent) -> Result<Self> {
        let body = required_str(content, "body")?;
        let msgtype = required_str(content, "msgtype")?;
        let url = content.get("url").and_then(Value::as_str).map(str::to_owned);
        Ok(Self { msgtype: MsgType::from(msgtype.to_owned()), body: body.to_owned(), url })
    }

    /// Encode as opaque event content.
    pub fn into_content(self) -> EventContent {
        let mut content = EventContent::new();
        content.insert("msgtype".into(), Value::String(self.msgtype.into()));
        content.insert("body".into(), Value::String(self.body));
        if let Some(url) = self.url {
            content.insert("url".into(), Value::String(url));
        }
        content
    }
}

fn required_str<'a>(content: &'a EventContent, field: &'static str) -> Result<&'a str> {
    match content.get(field) {
        None | Some(Value::Null) => Err(ProtocolError::MissingField(field)),
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(ProtocolError::WrongType { field, expected: "string" }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn content(value: Value) -> EventContent {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn membership_parses_known_and_unknown() {
        let parsed = MemberContent::from_content(&content(json!({ "membership": "invite" }))).unwrap();
        assert_eq!(parsed.membership, Membership::Invite);

        let parsed = MemberContent::from_content(&content(json!({ "membership": "shun" }))).unwrap();
        assert_eq!(parsed.membership, Membership::Unknown);

        let parsed = MemberContent::from_content(&content(json!({}))).unwrap();
        assert_eq!(parsed.membership, Membership::Unknown);
        assert!(!parsed.membership.is_visible());
    }

    #[test]
    fn only_join_and_invite_are_visible() {
        let visible: Vec<_> = [
            Membership::Join,
            Membership::Invite,
            Membership::Leave,
            Membership::Ban,
            Membership::Knock,
            Membership::Unknown,
        ]
        .into_iter()
        .filter(|m| m.is_visible())
        .collect();
        assert_eq!(visible, vec![Membership::Join, Membership::Invite]);
    }

    #[test]
    fn display_name_falls_back_to_user_id() {
        let named = MemberContent::from_content(&content(
            json!({ "membership": "join", "displayname": "Alice" }),
        ))
        .unwrap();
        assert_eq!(named.display_name("@alice:hs"), "Alice");

        let null = MemberContent::from_content(&content(
            json!({ "membership": "join", "displayname": null }),
        ))
        .unwrap();
        assert_eq!(null.display_name("@bob:hs"), "@bob:hs");

        let empty = MemberContent::from_content(&content(
            json!({ "membership": "join", "displayname": "" }),
        ))
        .unwrap();
        assert_eq!(empty.display_name("@carol:hs"), "@carol:hs");
    }

    #[test]
    fn numeric_displayname_is_malformed() {
        let err = MemberContent::from_content(&content(json!({ "displayname": 3 }))).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn message_requires_body_and_msgtype() {
        let err = MessageContent::from_content(&content(json!({ "msgtype": "m.text" }))).unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("body"));

        let err = MessageContent::from_content(&content(json!({ "body": "hi" }))).unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("msgtype"));

        let err = MessageContent::from_content(&content(json!({ "body": 1, "msgtype": "m.text" })))
            .unwrap_err();
        assert_eq!(err, ProtocolError::WrongType { field: "body", expected: "string" });
    }

    #[test]
    fn unknown_msgtype_is_kept_verbatim() {
        let parsed = MessageContent::from_content(&content(
            json!({ "body": "x", "msgtype": "org.example.custom" }),
        ))
        .unwrap();
        assert_eq!(parsed.msgtype, MsgType::Other("org.example.custom".into()));
        assert_eq!(parsed.msgtype.as_str(), "org.example.custom");
    }

    #[test]
    fn image_content_encodes_url_when_present() {
        let mut image = MessageContent::image("cat.png");
        assert!(!image.clone().into_content().contains_key("url"));

        image.url = Some("mxc://hs/abc".into());
        let encoded = image.into_content();
        assert_eq!(encoded["msgtype"], "m.image");
        assert_eq!(encoded["body"], "cat.png");
        assert_eq!(encoded["url"], "mxc://hs/abc");
    }
}
