//! Room naming across state table and roster, through the public API only.

use proptest::prelude::*;
use roomsync_core::{MembershipTable, RoomStateTable, naming};
use roomsync_proto::{MemberContent, Membership, StateEvent, event_type};
use serde_json::{Value, json};

const ME: &str = "@me:hs";
const ROOM: &str = "!room:hs";

fn state(event_type: &str, state_key: &str, content: Value) -> StateEvent {
    let Value::Object(content) = content else { panic!("content must be an object") };
    StateEvent::new(event_type, state_key, content)
}

/// A naming source that may be absent, empty or set.
fn source() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        "[a-z]{1,8}".prop_map(Some),
    ]
}

fn roster(names: &[&str]) -> MembershipTable {
    let mut members = MembershipTable::new();
    members.update_member(
        ME,
        &MemberContent { membership: Membership::Join, displayname: Some("Me".into()) },
    );
    for (i, name) in names.iter().enumerate() {
        members.update_member(
            &format!("@u{i}:hs"),
            &MemberContent { membership: Membership::Join, displayname: Some((*name).into()) },
        );
    }
    members
}

proptest! {
    /// The highest-priority non-empty source names the room.
    #[test]
    fn first_non_empty_source_wins(
        name in source(),
        canonical in source(),
        alias in source(),
        aliases in source(),
        others in prop::collection::vec("[A-Z][a-z]{0,5}", 0..5),
    ) {
        let mut table = RoomStateTable::new();
        if let Some(name) = &name {
            table.apply(state(event_type::NAME, "", json!({ "name": name })), |_| {});
        }
        if let Some(alias) = &canonical {
            table.apply(state(event_type::CANONICAL_ALIAS, "", json!({ "alias": alias })), |_| {});
        }
        if let Some(alias) = &alias {
            table.apply(state(event_type::ALIAS, "hs", json!({ "alias": alias })), |_| {});
        }
        if let Some(alias) = &aliases {
            table.apply(state(event_type::ALIASES, "hs", json!({ "aliases": [alias] })), |_| {});
        }

        let names: Vec<&str> = others.iter().map(String::as_str).collect();
        let members = roster(&names);

        let from_state = [&name, &canonical, &alias, &aliases]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned();
        let expected = from_state
            .or_else(|| naming::name_from_members(names.iter().copied()))
            .unwrap_or_else(|| ROOM.to_owned());

        prop_assert_eq!(naming::derive_name(&table, &members, ME, ROOM), expected);
    }
}

#[test]
fn departed_and_banned_members_do_not_count() {
    let mut members = roster(&["Alice", "Bob", "Carol"]);
    members.update_member(
        "@u1:hs",
        &MemberContent { membership: Membership::Leave, displayname: None },
    );
    members.update_member(
        "@u2:hs",
        &MemberContent { membership: Membership::Ban, displayname: None },
    );

    let table = RoomStateTable::new();
    assert_eq!(naming::derive_name(&table, &members, ME, ROOM), "Alice");
}

#[test]
fn invited_members_count_in_first_seen_order() {
    let mut members = roster(&[]);
    members.update_member(
        "@late:hs",
        &MemberContent { membership: Membership::Invite, displayname: Some("Zed".into()) },
    );
    members.update_member(
        "@later:hs",
        &MemberContent { membership: Membership::Join, displayname: Some("Amy".into()) },
    );

    let table = RoomStateTable::new();
    assert_eq!(naming::derive_name(&table, &members, ME, ROOM), "Zed and Amy");
}

#[test]
fn naming_events_are_recognised() {
    for ty in [
        event_type::MEMBER,
        event_type::NAME,
        event_type::CANONICAL_ALIAS,
        event_type::ALIAS,
        event_type::ALIASES,
    ] {
        assert!(naming::is_naming_event(ty), "{ty}");
    }
    assert!(!naming::is_naming_event("m.room.topic"));
    assert!(!naming::is_naming_event(event_type::MESSAGE));
}
