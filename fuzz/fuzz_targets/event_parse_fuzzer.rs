//! Fuzz target for event parsing
//!
//! Feeds arbitrary bytes through the JSON decoder and every typed view of an
//! event: the envelope, the state conversion, member content and message
//! content.
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomsync_proto::{MemberContent, MessageContent, RoomEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(event) = RoomEvent::from_json(&value) else {
        return;
    };

    let _ = MemberContent::from_content(&event.content);
    let _ = MessageContent::from_content(&event.content);

    let was_state = event.is_state();
    match event.into_state() {
        Ok(state) => {
            assert!(was_state, "non-state event converted to state");
            let _ = state.content_str("name");
        },
        Err(_) => assert!(!was_state, "state event failed conversion"),
    }
});
