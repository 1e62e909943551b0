//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use roomsync_client::{Client, Environment, RequestHandle, RequestKind, RoomId};

use crate::{SimHomeserver, SimHost};

/// Snapshot of client, server and host.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-room state, sorted by room id.
    pub rooms: Vec<RoomSnapshot>,
    /// Requests the server has not completed.
    pub outstanding: Vec<(RequestHandle, RequestKind)>,
    /// Requests the client is waiting on.
    pub client_in_flight: usize,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no rooms, nothing in flight).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the current state of a simulated system.
    pub fn capture<E: Environment>(
        client: &Client<E>,
        server: &SimHomeserver,
        host: &SimHost,
    ) -> Self {
        let mut rooms: Vec<_> = client
            .rooms()
            .map(|room| {
                let room_id = room.room_id().to_owned();
                let host_room = host.room(&room_id);

                let mut announced: Vec<String> =
                    room.members().announced().map(|(_, name)| name.to_owned()).collect();
                announced.sort();

                RoomSnapshot {
                    own_name: room.own_display_name(client.config()).to_owned(),
                    queue_len: room.queue().len(),
                    active_handle: room.queue().active().map(|active| active.handle()),
                    announced,
                    host_roster: host_room.map(|r| r.sorted_roster()),
                    received: host_room
                        .map(|r| r.received().map(|(s, b)| (s.to_owned(), b.to_owned())).collect())
                        .unwrap_or_default(),
                    echoed_bodies: server.echoed_bodies(&room_id).to_vec(),
                    room_id,
                }
            })
            .collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));

        Self {
            rooms,
            outstanding: server.outstanding_kinds(),
            client_in_flight: client.requests_in_flight(),
        }
    }

    /// Snapshot for one room.
    pub fn room(&self, room_id: &str) -> Option<&RoomSnapshot> {
        self.rooms.iter().find(|room| room.room_id == room_id)
    }
}

/// Observable state of one room.
#[derive(Debug, Clone, Default)]
pub struct RoomSnapshot {
    /// Room.
    pub room_id: RoomId,
    /// Our own display name in the room.
    pub own_name: String,
    /// Events waiting in the send queue, including the active one.
    pub queue_len: usize,
    /// Request backing the in-flight send or upload.
    pub active_handle: Option<RequestHandle>,
    /// Names the client believes the host shows, sorted.
    pub announced: Vec<String>,
    /// Names the host actually shows, sorted. `None` without a conversation.
    pub host_roster: Option<Vec<String>>,
    /// `(sender, body)` of received messages the host shows.
    pub received: Vec<(String, String)>,
    /// Bodies of our own messages the server echoed back.
    pub echoed_bodies: Vec<String>,
}
