//! Drives a client through a replay script.

use std::collections::{HashSet, VecDeque};

use roomsync_client::{
    ApiRequest, Client, ClientAction, ClientConfig, ClientError, ClientEvent, Environment,
    ImageUpload, MessageFlags, RequestHandle, RequestOutcome, RoomId, RoomSync,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{ReplayError, Step};

/// Tally of what a replay produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Steps applied.
    pub steps: usize,
    /// Conversations opened.
    pub rooms_created: usize,
    /// Conversations closed.
    pub rooms_removed: usize,
    /// Received messages shown.
    pub messages_received: usize,
    /// Local echoes shown.
    pub messages_sent: usize,
    /// Events the simulated server accepted.
    pub events_accepted: usize,
    /// Uploads the simulated server accepted.
    pub uploads: usize,
    /// Failures reported to the host.
    pub failures: usize,
    /// Last title pushed to the host.
    pub last_title: Option<String>,
}

/// Replays script steps against a [`Client`], answering every request.
pub struct Replayer<E: Environment> {
    client: Client<E>,
    announce: bool,
    synced: HashSet<RoomId>,
    pending: VecDeque<(RequestHandle, ApiRequest)>,
    next_id: u64,
    summary: ReplaySummary,
}

impl<E: Environment> Replayer<E> {
    /// Replayer for a fresh client.
    ///
    /// With `announce` unset every sync behaves like an initial sync and
    /// arrivals are added to the roster silently.
    pub fn new(env: E, config: ClientConfig, announce: bool) -> Self {
        Self {
            client: Client::new(env, config),
            announce,
            synced: HashSet::new(),
            pending: VecDeque::new(),
            next_id: 0,
            summary: ReplaySummary::default(),
        }
    }

    /// The client being driven.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// What has been produced so far.
    pub fn summary(&self) -> &ReplaySummary {
        &self.summary
    }

    /// Apply every step, stopping at the first client error.
    pub fn run(
        &mut self,
        steps: impl IntoIterator<Item = Step>,
    ) -> Result<ReplaySummary, ReplayError> {
        for (index, step) in steps.into_iter().enumerate() {
            self.step(step).map_err(|source| ReplayError::Client { step: index, source })?;
        }
        info!(steps = self.summary.steps, "replay finished");
        Ok(self.summary.clone())
    }

    /// Apply one step and answer every request it causes.
    pub fn step(&mut self, step: Step) -> Result<(), ClientError> {
        self.summary.steps += 1;
        let event = match step {
            Step::Join { room_id } => ClientEvent::RoomJoined { room_id },
            Step::Sync { room_id, state, timeline } => {
                let first = self.synced.insert(room_id.clone());
                ClientEvent::Sync(RoomSync {
                    room_id,
                    state,
                    timeline,
                    announce_arrivals: self.announce && !first,
                })
            },
            Step::Send { room_id, body } => ClientEvent::SendMessage { room_id, body },
            Step::Image { room_id, filename, size } => {
                ClientEvent::SendImage { room_id, image: ImageUpload::new(filename, vec![0u8; size]) }
            },
            Step::Retry { room_id } => ClientEvent::RetrySend { room_id },
            Step::Leave { room_id } => ClientEvent::LeaveRoom { room_id },
            Step::Close => ClientEvent::ConnectionClosing,
        };

        let actions = self.client.handle(event)?;
        self.absorb(actions);

        while let Some((handle, request)) = self.pending.pop_front() {
            let outcome = self.respond(&request);
            let actions = self.client.handle(ClientEvent::RequestCompleted { handle, outcome })?;
            self.absorb(actions);
        }
        Ok(())
    }

    fn respond(&mut self, request: &ApiRequest) -> RequestOutcome {
        self.next_id += 1;
        match request {
            ApiRequest::SendEvent { room_id, txn_id, .. } => {
                debug!(%room_id, %txn_id, "accepting event");
                self.summary.events_accepted += 1;
                RequestOutcome::Ok(json!({ "event_id": format!("$replay{}", self.next_id) }))
            },
            ApiRequest::UploadFile { content_type, data } => {
                debug!(%content_type, size = data.len(), "accepting upload");
                self.summary.uploads += 1;
                let content_uri = format!("mxc://replay/{}", self.next_id);
                RequestOutcome::Ok(json!({ "content_uri": content_uri }))
            },
            ApiRequest::LeaveRoom { .. } => RequestOutcome::Ok(json!({})),
        }
    }

    fn absorb(&mut self, actions: Vec<ClientAction>) {
        for action in actions {
            match action {
                ClientAction::Request { handle, request } => {
                    self.pending.push_back((handle, request));
                },
                ClientAction::CancelRequest { handle } => {
                    self.pending.retain(|(pending, _)| *pending != handle);
                },
                ClientAction::RoomCreated { room_id } => {
                    info!(%room_id, "conversation opened");
                    self.summary.rooms_created += 1;
                },
                ClientAction::RoomRemoved { room_id, reason } => {
                    info!(%room_id, %reason, "conversation closed");
                    self.summary.rooms_removed += 1;
                },
                ClientAction::MembersAdded { room_id, members, announce } => {
                    for member in members {
                        info!(
                            %room_id,
                            user_id = %member.user_id,
                            name = %member.display_name,
                            announce,
                            "member added"
                        );
                    }
                },
                ClientAction::MemberRenamed { room_id, user_id, old_name, new_name } => {
                    info!(%room_id, %user_id, %old_name, %new_name, "member renamed");
                },
                ClientAction::MemberRemoved { room_id, user_id, name } => {
                    info!(%room_id, %user_id, %name, "member removed");
                },
                ClientAction::SetChatAlias { room_id, alias } => {
                    debug!(%room_id, %alias, "chat alias");
                },
                ClientAction::SetTitle { room_id, title } => {
                    info!(%room_id, %title, "title");
                    self.summary.last_title = Some(title);
                },
                ClientAction::DisplayMessage(message) => {
                    info!(
                        room_id = %message.room_id,
                        sender = %message.sender,
                        flags = ?message.flags,
                        timestamp = message.timestamp,
                        "{}",
                        message.body
                    );
                    if message.flags.contains(MessageFlags::SENT) {
                        self.summary.messages_sent += 1;
                    } else {
                        self.summary.messages_received += 1;
                    }
                },
                ClientAction::RequestFailed { room_id, kind, reason } => {
                    warn!(%room_id, ?kind, %reason, "request failed");
                    self.summary.failures += 1;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use roomsync_client::SystemEnv;
    use serde_json::json;

    use super::*;

    const ROOM: &str = "!r:hs";

    fn replayer(announce: bool) -> Replayer<SystemEnv> {
        Replayer::new(SystemEnv::new(), ClientConfig::new("@me:hs"), announce)
    }

    fn join_sync(user: &str, name: &str) -> Step {
        Step::Sync {
            room_id: ROOM.into(),
            state: vec![json!({
                "type": "m.room.member",
                "state_key": user,
                "content": { "membership": "join", "displayname": name },
            })],
            timeline: Vec::new(),
        }
    }

    #[test]
    fn sends_are_answered_until_the_queue_drains() {
        let mut replay = replayer(true);
        let summary = replay
            .run([
                join_sync("@me:hs", "Me"),
                Step::Send { room_id: ROOM.into(), body: "a".into() },
                Step::Image { room_id: ROOM.into(), filename: "b.jpg".into(), size: 3 },
                Step::Send { room_id: ROOM.into(), body: "/me c".into() },
            ])
            .unwrap();

        assert_eq!(summary.events_accepted, 3);
        assert_eq!(summary.uploads, 1);
        assert_eq!(summary.messages_sent, 3);
        assert_eq!(summary.rooms_created, 1);
        assert!(replay.client().room(ROOM).unwrap().queue().is_empty());
    }

    #[test]
    fn close_holds_later_sends() {
        let mut replay = replayer(true);
        replay
            .run([
                join_sync("@me:hs", "Me"),
                Step::Close,
                Step::Send { room_id: ROOM.into(), body: "held".into() },
                Step::Retry { room_id: ROOM.into() },
            ])
            .unwrap();

        assert_eq!(replay.summary().events_accepted, 0);
        assert_eq!(replay.client().room(ROOM).unwrap().queue().len(), 1);
    }

    #[test]
    fn client_errors_name_the_step() {
        let mut replay = replayer(true);
        let err = replay
            .run([Step::Join { room_id: ROOM.into() }, Step::Join { room_id: ROOM.into() }])
            .unwrap_err();
        assert!(matches!(err, ReplayError::Client { step: 1, .. }));
    }

    #[test]
    fn title_follows_the_roster() {
        let mut replay = replayer(false);
        replay.run([join_sync("@me:hs", "Me"), join_sync("@a:hs", "Alice")]).unwrap();
        assert_eq!(replay.summary().last_title.as_deref(), Some("Alice"));
    }
}
