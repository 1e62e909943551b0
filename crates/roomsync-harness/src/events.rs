//! JSON builders for server events.

use roomsync_proto::{EventContent, Membership};
use serde_json::{Value, json};

/// `m.room.member` state event.
pub fn member(user_id: &str, membership: Membership, displayname: Option<&str>) -> Value {
    let mut content = json!({ "membership": membership });
    if let Some(name) = displayname {
        content["displayname"] = json!(name);
    }
    json!({
        "type": "m.room.member",
        "state_key": user_id,
        "sender": user_id,
        "content": content,
    })
}

/// `m.room.name` state event. An empty name clears it.
pub fn room_name(name: &str) -> Value {
    json!({ "type": "m.room.name", "state_key": "", "content": { "name": name } })
}

/// `m.room.canonical_alias` state event.
pub fn canonical_alias(alias: &str) -> Value {
    json!({ "type": "m.room.canonical_alias", "state_key": "", "content": { "alias": alias } })
}

/// `m.room.message` timeline event.
pub fn message(sender: &str, msgtype: &str, body: &str, origin_server_ts: u64) -> Value {
    json!({
        "type": "m.room.message",
        "sender": sender,
        "origin_server_ts": origin_server_ts,
        "content": { "msgtype": msgtype, "body": body },
    })
}

/// Server echo of an event we sent, carrying our transaction id.
pub fn echo(
    sender: &str,
    event_type: &str,
    content: &EventContent,
    txn_id: &str,
    origin_server_ts: u64,
) -> Value {
    json!({
        "type": event_type,
        "sender": sender,
        "origin_server_ts": origin_server_ts,
        "content": content,
        "unsigned": { "transaction_id": txn_id },
    })
}
