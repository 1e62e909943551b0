//! In-memory homeserver.
//!
//! Absorbs the request actions a client emits, holds them until the test
//! completes them, and assembles sync batches from the state and timeline
//! events staged since the previous sync. Successful sends come back in the
//! next sync as echoes carrying their transaction id, the way a real
//! homeserver reflects events to the device that sent them.

use std::collections::{BTreeMap, VecDeque};

use roomsync_client::{ApiRequest, ClientAction, ClientEvent, RequestKind, RoomSync};
use roomsync_proto::{
    EventContent, Membership, RequestHandle, RequestOutcome, RoomId, UserId, event_type,
};
use serde_json::{Value, json};
use tracing::trace;

use crate::events;

/// A request the client issued that has not completed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingRequest {
    /// Handle the client assigned.
    pub handle: RequestHandle,
    /// The request itself.
    pub request: ApiRequest,
}

#[derive(Debug, Default)]
struct ServerRoom {
    members: BTreeMap<UserId, (Membership, Option<String>)>,
    staged_state: Vec<Value>,
    staged_timeline: Vec<Value>,
    sent: Vec<EventContent>,
    echoed_bodies: Vec<String>,
    synced: bool,
}

/// Simulated homeserver for one client.
#[derive(Debug)]
pub struct SimHomeserver {
    own_user_id: UserId,
    rooms: BTreeMap<RoomId, ServerRoom>,
    outstanding: VecDeque<OutstandingRequest>,
    next_event: u64,
    next_media: u64,
    clock_ms: u64,
}

impl SimHomeserver {
    /// Server whose client is logged in as `own_user_id`.
    pub fn new(own_user_id: impl Into<UserId>) -> Self {
        Self {
            own_user_id: own_user_id.into(),
            rooms: BTreeMap::new(),
            outstanding: VecDeque::new(),
            next_event: 0,
            next_media: 0,
            clock_ms: 1_700_000_000_000,
        }
    }

    /// User id of the simulated client.
    pub fn own_user_id(&self) -> &str {
        &self.own_user_id
    }

    fn tick(&mut self) -> u64 {
        self.clock_ms += 1000;
        self.clock_ms
    }

    fn room_mut(&mut self, room_id: &str) -> &mut ServerRoom {
        self.rooms.entry(room_id.to_owned()).or_default()
    }

    /// Stage a membership change.
    pub fn set_membership(
        &mut self,
        room_id: &str,
        user_id: &str,
        membership: Membership,
        displayname: Option<&str>,
    ) {
        let room = self.room_mut(room_id);
        room.members.insert(user_id.to_owned(), (membership, displayname.map(str::to_owned)));
        room.staged_state.push(events::member(user_id, membership, displayname));
    }

    /// Stage a display name change, keeping the user's membership.
    ///
    /// Users the room has never seen are recorded as having left.
    pub fn set_displayname(&mut self, room_id: &str, user_id: &str, displayname: Option<&str>) {
        let membership = self.membership_of(room_id, user_id).unwrap_or(Membership::Leave);
        self.set_membership(room_id, user_id, membership, displayname);
    }

    /// Current server-side membership of a user.
    pub fn membership_of(&self, room_id: &str, user_id: &str) -> Option<Membership> {
        self.rooms.get(room_id)?.members.get(user_id).map(|(membership, _)| *membership)
    }

    /// Stage an `m.room.name` change.
    pub fn set_room_name(&mut self, room_id: &str, name: &str) {
        self.room_mut(room_id).staged_state.push(events::room_name(name));
    }

    /// Stage an `m.room.canonical_alias` change.
    pub fn set_canonical_alias(&mut self, room_id: &str, alias: &str) {
        self.room_mut(room_id).staged_state.push(events::canonical_alias(alias));
    }

    /// Stage a message from another user.
    pub fn post_message(&mut self, room_id: &str, sender: &str, msgtype: &str, body: &str) {
        let ts = self.tick();
        self.room_mut(room_id).staged_timeline.push(events::message(sender, msgtype, body, ts));
    }

    /// Stage an arbitrary timeline event.
    pub fn post_raw(&mut self, room_id: &str, event: Value) {
        self.room_mut(room_id).staged_timeline.push(event);
    }

    /// Everything staged for a room since the last sync.
    ///
    /// Arrivals are announced on every sync after the first.
    pub fn take_sync(&mut self, room_id: &str) -> RoomSync {
        let room = self.room_mut(room_id);
        let announce_arrivals = room.synced;
        room.synced = true;
        RoomSync {
            room_id: room_id.to_owned(),
            state: std::mem::take(&mut room.staged_state),
            timeline: std::mem::take(&mut room.staged_timeline),
            announce_arrivals,
        }
    }

    /// Record requests and cancellations from a batch of client actions.
    pub fn absorb(&mut self, actions: &[ClientAction]) {
        for action in actions {
            match action {
                ClientAction::Request { handle, request } => {
                    trace!(%handle, kind = ?request.kind(), "request received");
                    self.outstanding
                        .push_back(OutstandingRequest { handle: *handle, request: request.clone() });
                },
                ClientAction::CancelRequest { handle } => {
                    self.outstanding.retain(|pending| pending.handle != *handle);
                },
                _ => {},
            }
        }
    }

    /// Requests awaiting completion, oldest first.
    pub fn outstanding(&self) -> impl Iterator<Item = &OutstandingRequest> {
        self.outstanding.iter()
    }

    /// Kind of every outstanding request.
    pub fn outstanding_kinds(&self) -> Vec<(RequestHandle, RequestKind)> {
        self.outstanding.iter().map(|pending| (pending.handle, pending.request.kind())).collect()
    }

    /// Complete the oldest outstanding request.
    pub fn complete_next(&mut self, success: bool) -> Option<ClientEvent> {
        let pending = self.outstanding.pop_front()?;
        Some(self.finish(pending, success))
    }

    /// Complete a specific outstanding request.
    pub fn complete(&mut self, handle: RequestHandle, success: bool) -> Option<ClientEvent> {
        let pos = self.outstanding.iter().position(|pending| pending.handle == handle)?;
        let pending = self.outstanding.remove(pos)?;
        Some(self.finish(pending, success))
    }

    fn finish(&mut self, pending: OutstandingRequest, success: bool) -> ClientEvent {
        let outcome = if success {
            RequestOutcome::Ok(self.execute(pending.request))
        } else {
            RequestOutcome::ServerError {
                status: 500,
                body: json!({ "errcode": "M_UNKNOWN", "error": "simulated failure" }),
            }
        };
        ClientEvent::RequestCompleted { handle: pending.handle, outcome }
    }

    fn execute(&mut self, request: ApiRequest) -> Value {
        match request {
            ApiRequest::SendEvent { room_id, event_type: kind, txn_id, content } => {
                self.next_event += 1;
                let event_id = format!("$event{}", self.next_event);
                let ts = self.tick();
                let sender = self.own_user_id.clone();

                let room = self.room_mut(&room_id);
                room.staged_timeline.push(events::echo(
                    &sender,
                    &kind,
                    &content,
                    txn_id.as_str(),
                    ts,
                ));
                let body = content.get("body").and_then(Value::as_str);
                if let Some(body) = body.filter(|_| kind == event_type::MESSAGE) {
                    room.echoed_bodies.push(body.to_owned());
                }
                room.sent.push(content);
                json!({ "event_id": event_id })
            },
            ApiRequest::UploadFile { .. } => {
                self.next_media += 1;
                json!({ "content_uri": format!("mxc://sim.test/media{}", self.next_media) })
            },
            ApiRequest::LeaveRoom { room_id } => {
                let own = self.own_user_id.clone();
                self.room_mut(&room_id).members.insert(own, (Membership::Leave, None));
                json!({})
            },
        }
    }

    /// Content of every event accepted for a room, in order.
    pub fn sent(&self, room_id: &str) -> &[EventContent] {
        self.rooms.get(room_id).map(|room| room.sent.as_slice()).unwrap_or_default()
    }

    /// Bodies of every message accepted for a room, in order.
    pub fn sent_bodies(&self, room_id: &str) -> Vec<String> {
        self.sent(room_id)
            .iter()
            .filter_map(|content| content.get("body").and_then(Value::as_str))
            .map(str::to_owned)
            .collect()
    }

    /// Bodies of our own messages echoed back into a room.
    pub fn echoed_bodies(&self, room_id: &str) -> &[String] {
        self.rooms.get(room_id).map(|room| room.echoed_bodies.as_slice()).unwrap_or_default()
    }
}
