//! Per-room context.
//!
//! A [`Room`] owns everything known about one joined room: the state table,
//! the roster derived from it, the outgoing send queue and the last title
//! pushed to the host. The [`crate::Client`] routes events to it.

use roomsync_core::{
    Completion, EventQueue, ImageUpload, MemberRecord, MembershipTable, RoomFlags,
    RoomStateTable, SendHook, StateChange,
    naming::{self, derive_name},
};
use roomsync_proto::{
    MemberContent, MessageContent, MsgType, RequestHandle, RequestOutcome, RoomEvent, RoomId,
    StateEvent, event_type,
};
use tracing::{debug, info, warn};

use crate::{
    ClientAction, ClientConfig, ClientError, DisplayMessage, Environment, MessageFlags,
    RequestKind, RoomSync, outbox::Outbox,
};

/// State machine for one joined room.
#[derive(Debug, Clone)]
pub struct Room {
    room_id: RoomId,
    state: RoomStateTable,
    members: MembershipTable,
    queue: EventQueue,
    flags: RoomFlags,
    title: Option<String>,
}

impl Room {
    /// Create an empty room.
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        let room_id = room_id.into();
        Self {
            queue: EventQueue::new(room_id.clone()),
            room_id,
            state: RoomStateTable::new(),
            members: MembershipTable::new(),
            flags: RoomFlags::empty(),
            title: None,
        }
    }

    /// Room id.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// State table.
    pub fn state(&self) -> &RoomStateTable {
        &self.state
    }

    /// Roster.
    pub fn members(&self) -> &MembershipTable {
        &self.members
    }

    /// Outgoing send queue.
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Dirty bits.
    pub fn flags(&self) -> RoomFlags {
        self.flags
    }

    /// Last title pushed to the host.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Our display name in this room, or our user id if we have none.
    pub fn own_display_name<'a>(&'a self, config: &'a ClientConfig) -> &'a str {
        self.members
            .lookup(&config.user_id)
            .map_or(config.user_id.as_str(), MemberRecord::displayname)
    }

    /// Resolve a roster name back to a user id.
    pub fn user_id_for_rendered_name(&self, name: &str) -> Option<&str> {
        self.members.user_id_for_rendered_name(name)
    }

    /// Name the room would get right now.
    pub fn display_name(&self, config: &ClientConfig) -> String {
        derive_name(&self.state, &self.members, &config.user_id, &self.room_id)
    }

    /// Process one room's slice of a sync response.
    ///
    /// State is applied first, then timeline entries that carry a state key,
    /// then the roster and name are brought up to date, and finally messages
    /// are dispatched.
    pub(crate) fn apply_sync(
        &mut self,
        config: &ClientConfig,
        sync: &RoomSync,
        out: &mut Outbox<'_>,
    ) -> Result<(), ClientError> {
        for raw in &sync.state {
            match RoomEvent::from_json(raw).and_then(RoomEvent::into_state) {
                Ok(event) => self.handle_state_event(event),
                Err(err) => warn!(room_id = %self.room_id, %err, "dropping malformed state event"),
            }
        }

        let mut messages = Vec::new();
        for raw in &sync.timeline {
            match RoomEvent::from_json(raw) {
                Ok(event) if event.is_state() => match event.into_state() {
                    Ok(state) => self.handle_state_event(state),
                    Err(err) => {
                        warn!(room_id = %self.room_id, %err, "dropping malformed timeline state event");
                    },
                },
                Ok(event) => messages.push(event),
                Err(err) => {
                    warn!(room_id = %self.room_id, %err, "dropping malformed timeline event");
                },
            }
        }

        self.complete_state_update(config, sync.announce_arrivals, out)?;

        for event in messages {
            self.handle_timeline_event(config, &event, out);
        }
        Ok(())
    }

    /// Apply one state event.
    ///
    /// Member events with unreadable content are dropped before touching the
    /// state table.
    pub fn handle_state_event(&mut self, event: StateEvent) {
        let member_content = if event.event_type == event_type::MEMBER {
            match MemberContent::from_content(&event.content) {
                Ok(content) => Some(content),
                Err(err) => {
                    warn!(
                        room_id = %self.room_id,
                        user_id = %event.state_key,
                        %err,
                        "dropping malformed member event"
                    );
                    return;
                },
            }
        } else {
            None
        };

        let members = &mut self.members;
        let flags = &mut self.flags;
        self.state.apply(event, |change: &StateChange<'_>| {
            if let Some(content) = &member_content {
                members.update_member(change.state_key, content);
            }
            if naming::is_naming_event(change.event_type) {
                flags.insert(RoomFlags::NEEDS_NAME_UPDATE);
            }
        });
    }

    /// Drain roster diffs into host actions and refresh the name if needed.
    pub(crate) fn complete_state_update(
        &mut self,
        config: &ClientConfig,
        announce_arrivals: bool,
        out: &mut Outbox<'_>,
    ) -> Result<(), ClientError> {
        let diff = self.members.drain()?;

        if !diff.added.is_empty() {
            out.push(ClientAction::MembersAdded {
                room_id: self.room_id.clone(),
                members: diff.added,
                announce: announce_arrivals,
            });
        }
        for renamed in diff.renamed {
            out.push(ClientAction::MemberRenamed {
                room_id: self.room_id.clone(),
                user_id: renamed.user_id,
                old_name: renamed.old_name,
                new_name: renamed.new_name,
            });
        }
        for departed in diff.left {
            out.push(ClientAction::MemberRemoved {
                room_id: self.room_id.clone(),
                user_id: departed.user_id,
                name: departed.rendered_name,
            });
        }

        if self.flags.contains(RoomFlags::NEEDS_NAME_UPDATE) {
            self.update_room_name(config, out);
        }
        Ok(())
    }

    fn update_room_name(&mut self, config: &ClientConfig, out: &mut Outbox<'_>) {
        let name = self.display_name(config);
        self.flags.remove(RoomFlags::NEEDS_NAME_UPDATE);

        out.push(ClientAction::SetChatAlias { room_id: self.room_id.clone(), alias: name.clone() });
        if self.title.as_deref() != Some(name.as_str()) {
            debug!(room_id = %self.room_id, title = %name, "room renamed");
            out.push(ClientAction::SetTitle { room_id: self.room_id.clone(), title: name.clone() });
            self.title = Some(name);
        }
    }

    /// Dispatch one non-state timeline event.
    pub(crate) fn handle_timeline_event(
        &self,
        config: &ClientConfig,
        event: &RoomEvent,
        out: &mut Outbox<'_>,
    ) {
        if event.event_type != event_type::MESSAGE {
            debug!(room_id = %self.room_id, event_type = %event.event_type, "ignoring timeline event");
            return;
        }

        let message = match MessageContent::from_content(&event.content) {
            Ok(message) => message,
            Err(err) => {
                warn!(room_id = %self.room_id, %err, "dropping malformed message");
                return;
            },
        };

        if let Some(txn_id) = &event.transaction_id {
            debug!(room_id = %self.room_id, %txn_id, "dropping remote echo");
            return;
        }

        let sender = event
            .sender
            .as_deref()
            .and_then(|sender| self.members.lookup(sender))
            .map_or(config.unknown_sender_name.as_str(), MemberRecord::displayname);

        let body = match message.msgtype {
            MsgType::Emote => format!("{}{}", config.emote_prefix, message.body),
            _ => message.body,
        };

        debug!(room_id = %self.room_id, sender = ?event.sender, "message received");
        out.push(ClientAction::DisplayMessage(DisplayMessage {
            room_id: self.room_id.clone(),
            sender: sender.to_owned(),
            body,
            timestamp: event.origin_server_ts / 1000,
            flags: MessageFlags::RECEIVED,
        }));
    }

    /// Queue a text message and echo it locally.
    pub(crate) fn send_message<E: Environment>(
        &mut self,
        env: &E,
        config: &ClientConfig,
        body: String,
        out: &mut Outbox<'_>,
    ) {
        let content = match body.strip_prefix(config.emote_prefix.as_str()) {
            Some(emote) if !config.emote_prefix.is_empty() => MessageContent::emote(emote),
            _ => MessageContent::text(body.as_str()),
        };
        self.queue.enqueue(env, out, event_type::MESSAGE, content.into_content(), SendHook::Direct);

        self.echo_local(env, config, body, MessageFlags::SENT, out);
    }

    /// Queue an image; it is uploaded when it reaches the head of the queue.
    pub(crate) fn send_image<E: Environment>(
        &mut self,
        env: &E,
        config: &ClientConfig,
        image: ImageUpload,
        out: &mut Outbox<'_>,
    ) {
        let filename = image.filename.clone();
        let content = MessageContent::image(filename.as_str()).into_content();
        self.queue.enqueue(env, out, event_type::MESSAGE, content, SendHook::UploadThenSend(image));

        self.echo_local(env, config, filename, MessageFlags::SENT | MessageFlags::IMAGES, out);
    }

    fn echo_local<E: Environment>(
        &self,
        env: &E,
        config: &ClientConfig,
        body: String,
        flags: MessageFlags,
        out: &mut Outbox<'_>,
    ) {
        out.push(ClientAction::DisplayMessage(DisplayMessage {
            room_id: self.room_id.clone(),
            sender: self.own_display_name(config).to_owned(),
            body,
            timestamp: env.wall_clock_secs(),
            flags,
        }));
    }

    /// Redispatch the queue head if nothing is in flight.
    pub(crate) fn retry_send(&mut self, out: &mut Outbox<'_>) {
        if self.queue.active().is_none() && !self.queue.is_empty() {
            info!(room_id = %self.room_id, "retrying queued event");
        }
        self.queue.send_next(out);
    }

    /// Feed a request outcome to the send queue.
    pub(crate) fn handle_completion(
        &mut self,
        handle: RequestHandle,
        kind: RequestKind,
        outcome: RequestOutcome,
        out: &mut Outbox<'_>,
    ) {
        if let Completion::Failed { failure, .. } = self.queue.handle_completion(out, handle, outcome)
        {
            out.push(ClientAction::RequestFailed {
                room_id: self.room_id.clone(),
                kind,
                reason: failure.to_string(),
            });
        }
    }

    /// Abandon the room: cancel the active send, ask the server to let us
    /// leave and drop everything queued.
    pub(crate) fn leave(&mut self, out: &mut Outbox<'_>) {
        self.queue.cancel_active_send(out);
        out.issue(crate::ApiRequest::LeaveRoom { room_id: self.room_id.clone() });
        let dropped = self.queue.discard_all();
        info!(room_id = %self.room_id, dropped, "left room");
    }
}
