//! Client state machine.
//!
//! The `Client` is the top-level state machine: it owns one [`Room`] per
//! joined room, allocates request handles, and routes request completions back
//! to the room that issued them.

use std::collections::HashMap;

use roomsync_proto::{RequestHandle, RequestOutcome, RoomId};
use tracing::{debug, info, warn};

use crate::{
    ClientAction, ClientConfig, ClientError, ClientEvent, Environment, ImageUpload, RequestKind,
    Room, RoomSync,
    outbox::{Outbox, RequestRegistry},
};

/// Client for a set of joined rooms on one homeserver connection.
pub struct Client<E: Environment> {
    /// Environment for time and randomness.
    env: E,

    /// Client configuration.
    config: ClientConfig,

    /// Joined rooms.
    rooms: HashMap<RoomId, Room>,

    /// Outstanding requests across all rooms.
    requests: RequestRegistry,
}

impl<E: Environment> Client<E> {
    /// Create a new client.
    pub fn new(env: E, config: ClientConfig) -> Self {
        Self { env, config, rooms: HashMap::new(), requests: RequestRegistry::default() }
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Number of joined rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Check if the client is in a room.
    pub fn is_member(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// A joined room.
    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// All joined rooms, in no particular order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Number of requests issued and not yet completed or cancelled.
    pub fn requests_in_flight(&self) -> usize {
        self.requests.in_flight()
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::RoomJoined { room_id } => self.handle_room_joined(room_id),
            ClientEvent::Sync(sync) => self.handle_sync(&sync),
            ClientEvent::SendMessage { room_id, body } => self.handle_send_message(room_id, body),
            ClientEvent::SendImage { room_id, image } => self.handle_send_image(room_id, image),
            ClientEvent::RetrySend { room_id } => self.handle_retry_send(room_id),
            ClientEvent::RequestCompleted { handle, outcome } => {
                Ok(self.handle_request_completed(handle, outcome))
            },
            ClientEvent::LeaveRoom { room_id } => self.handle_leave_room(room_id),
            ClientEvent::ConnectionClosing => {
                info!("connection closing, holding queued events");
                self.requests.set_closing();
                Ok(Vec::new())
            },
        }
    }

    fn handle_room_joined(&mut self, room_id: RoomId) -> Result<Vec<ClientAction>, ClientError> {
        if self.rooms.contains_key(&room_id) {
            return Err(ClientError::RoomAlreadyExists { room_id });
        }
        Ok(vec![self.create_room(room_id)])
    }

    fn create_room(&mut self, room_id: RoomId) -> ClientAction {
        info!(%room_id, "new room");
        self.rooms.insert(room_id.clone(), Room::new(room_id.clone()));
        ClientAction::RoomCreated { room_id }
    }

    fn handle_sync(&mut self, sync: &RoomSync) -> Result<Vec<ClientAction>, ClientError> {
        let mut actions = Vec::new();
        if !self.rooms.contains_key(&sync.room_id) {
            actions.push(self.create_room(sync.room_id.clone()));
        }
        let room = self
            .rooms
            .get_mut(&sync.room_id)
            .ok_or_else(|| ClientError::RoomNotFound { room_id: sync.room_id.clone() })?;

        let mut out = Outbox::new(&sync.room_id, &mut self.requests, &mut actions);
        room.apply_sync(&self.config, sync, &mut out)?;
        Ok(actions)
    }

    fn handle_send_message(
        &mut self,
        room_id: RoomId,
        body: String,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| ClientError::RoomNotFound { room_id: room_id.clone() })?;

        let mut actions = Vec::new();
        let mut out = Outbox::new(&room_id, &mut self.requests, &mut actions);
        room.send_message(&self.env, &self.config, body, &mut out);
        Ok(actions)
    }

    fn handle_send_image(
        &mut self,
        room_id: RoomId,
        image: ImageUpload,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| ClientError::RoomNotFound { room_id: room_id.clone() })?;

        let mut actions = Vec::new();
        let mut out = Outbox::new(&room_id, &mut self.requests, &mut actions);
        room.send_image(&self.env, &self.config, image, &mut out);
        Ok(actions)
    }

    fn handle_retry_send(&mut self, room_id: RoomId) -> Result<Vec<ClientAction>, ClientError> {
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| ClientError::RoomNotFound { room_id: room_id.clone() })?;

        let mut actions = Vec::new();
        let mut out = Outbox::new(&room_id, &mut self.requests, &mut actions);
        room.retry_send(&mut out);
        Ok(actions)
    }

    fn handle_request_completed(
        &mut self,
        handle: RequestHandle,
        outcome: RequestOutcome,
    ) -> Vec<ClientAction> {
        let mut actions = Vec::new();
        let Some((room_id, kind)) = self.requests.complete(handle) else {
            debug!(%handle, "completion for unknown or cancelled request");
            return actions;
        };

        if kind == RequestKind::LeaveRoom {
            match outcome.into_result() {
                Ok(_) => debug!(%room_id, "leave confirmed"),
                Err(failure) => {
                    warn!(%room_id, %failure, "leave failed");
                    actions.push(ClientAction::RequestFailed {
                        room_id,
                        kind,
                        reason: failure.to_string(),
                    });
                },
            }
            return actions;
        }

        let Some(room) = self.rooms.get_mut(&room_id) else {
            debug!(%room_id, %handle, "completion for departed room");
            return actions;
        };
        let mut out = Outbox::new(&room_id, &mut self.requests, &mut actions);
        room.handle_completion(handle, kind, outcome, &mut out);
        actions
    }

    fn handle_leave_room(&mut self, room_id: RoomId) -> Result<Vec<ClientAction>, ClientError> {
        let Some(mut room) = self.rooms.remove(&room_id) else {
            return Err(ClientError::RoomNotFound { room_id });
        };

        let mut actions = Vec::new();
        let mut out = Outbox::new(&room_id, &mut self.requests, &mut actions);
        room.leave(&mut out);
        actions.push(ClientAction::RoomRemoved { room_id, reason: "Left room".to_string() });
        Ok(actions)
    }
}
