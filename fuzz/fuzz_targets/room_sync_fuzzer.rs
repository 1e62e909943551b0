//! Fuzz target for the client room pipeline
//!
//! Decodes a seed and a sequence of harness operations, drives a client
//! through the simulated homeserver and host, and checks the standard
//! invariants after every step. Raw sync batches with arbitrary JSON are
//! mixed in to make sure malformed events are dropped rather than trusted.
//!
//! # Invariants
//!
//! - The client never returns an error for a known room
//! - The host accepts every action (no rename or removal of unknown names)
//! - Single flight, roster agreement and request accounting hold after every
//!   step

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomsync_client::{Client, ClientAction, ClientConfig, ClientEvent, ImageUpload, RoomSync};
use roomsync_harness::{
    InvariantRegistry, Operation, RequestsAccounted, RosterMatchesAnnounced, SimEnv,
    SimHomeserver, SimHost, SingleFlight, SystemSnapshot, display_name_for, user_id_for,
};
use roomsync_proto::Membership;

const ME: &str = "@me:fuzz";
const ROOM: &str = "!room:fuzz";

#[derive(Debug, Arbitrary)]
enum Input {
    Op(Operation),
    RawState(Vec<u8>),
    RawTimeline(Vec<u8>),
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    inputs: Vec<Input>,
}

struct World {
    client: Client<SimEnv>,
    server: SimHomeserver,
    host: SimHost,
    next: u32,
}

impl World {
    fn feed(&mut self, event: ClientEvent) {
        let actions: Vec<ClientAction> = self.client.handle(event).expect("client error");
        self.server.absorb(&actions);
        self.host.apply_all(&actions).expect("host rejected action");
    }

    fn raw_sync(&mut self, bytes: &[u8], as_state: bool) {
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) else {
            return;
        };
        let events = match value {
            serde_json::Value::Array(events) => events,
            other => vec![other],
        };
        let (state, timeline) = if as_state { (events, Vec::new()) } else { (Vec::new(), events) };
        self.feed(ClientEvent::Sync(RoomSync {
            room_id: ROOM.into(),
            state,
            timeline,
            announce_arrivals: true,
        }));
    }

    fn apply(&mut self, op: &Operation) {
        self.next += 1;
        match *op {
            Operation::Join { user, name } => self.server.set_membership(
                ROOM,
                &user_id_for(user),
                Membership::Join,
                display_name_for(name),
            ),
            Operation::Invite { user, name } => self.server.set_membership(
                ROOM,
                &user_id_for(user),
                Membership::Invite,
                display_name_for(name),
            ),
            Operation::Leave { user } => {
                self.server.set_membership(ROOM, &user_id_for(user), Membership::Leave, None);
            },
            Operation::Ban { user } => {
                self.server.set_membership(ROOM, &user_id_for(user), Membership::Ban, None);
            },
            Operation::Rename { user, name } => {
                self.server.set_displayname(ROOM, &user_id_for(user), display_name_for(name));
            },
            Operation::SetRoomName { name } => {
                let name = name.and_then(display_name_for).unwrap_or_default();
                self.server.set_room_name(ROOM, name);
            },
            Operation::RemoteMessage { user, emote } => {
                let msgtype = if emote { "m.emote" } else { "m.text" };
                let body = format!("remote-{}", self.next);
                self.server.post_message(ROOM, &user_id_for(user), msgtype, &body);
            },
            Operation::SendText { emote } => {
                let prefix = if emote { "/me " } else { "" };
                let body = format!("{prefix}msg-{}", self.next);
                self.feed(ClientEvent::SendMessage { room_id: ROOM.into(), body });
            },
            Operation::SendImage => {
                let image = ImageUpload::new(format!("img-{}.png", self.next), vec![0u8; 4]);
                self.feed(ClientEvent::SendImage { room_id: ROOM.into(), image });
            },
            Operation::CompleteRequest { success } => {
                if let Some(completion) = self.server.complete_next(success) {
                    self.feed(completion);
                }
            },
            Operation::RetrySend => self.feed(ClientEvent::RetrySend { room_id: ROOM.into() }),
            Operation::CloseConnection => self.feed(ClientEvent::ConnectionClosing),
            Operation::Sync => {
                let sync = self.server.take_sync(ROOM);
                self.feed(ClientEvent::Sync(sync));
            },
        }
    }
}

fuzz_target!(|scenario: Scenario| {
    let mut world = World {
        client: Client::new(SimEnv::with_seed(scenario.seed), ClientConfig::new(ME)),
        server: SimHomeserver::new(ME),
        host: SimHost::new(),
        next: 0,
    };
    world.server.set_membership(ROOM, ME, Membership::Join, Some("Me"));
    world.apply(&Operation::Sync);

    // Raw events can impersonate our own display name, so echo detection is
    // left to the model-based tests.
    let mut registry = InvariantRegistry::new();
    registry.add(SingleFlight);
    registry.add(RosterMatchesAnnounced);
    registry.add(RequestsAccounted);
    for input in &scenario.inputs {
        match input {
            Input::Op(op) => world.apply(op),
            Input::RawState(bytes) => world.raw_sync(bytes, true),
            Input::RawTimeline(bytes) => world.raw_sync(bytes, false),
        }
        let snapshot = SystemSnapshot::capture(&world.client, &world.server, &world.host);
        registry.assert_all(&snapshot, &format!("after {input:?}"));
    }
});
