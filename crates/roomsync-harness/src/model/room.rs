//! Reference model of one room.

use std::collections::{BTreeMap, VecDeque};

use roomsync_client::{DEFAULT_EMOTE_PREFIX, DEFAULT_UNKNOWN_SENDER};
use roomsync_proto::{Membership, UserId};

use super::{Operation, display_name_for, user_id_for};

/// What the host and server show, in a form both sides can produce.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservableState {
    /// Roster names, sorted.
    pub roster: Vec<String>,
    /// Conversation title.
    pub title: Option<String>,
    /// `(sender, body)` of received messages, in order.
    pub received: Vec<(String, String)>,
    /// Bodies of local echoes, in order.
    pub local_echoes: Vec<String>,
    /// Bodies the server accepted, in order.
    pub sent: Vec<String>,
    /// Events still queued.
    pub queue_len: usize,
    /// Whether a send or upload is in flight.
    pub in_flight: bool,
}

#[derive(Debug, Clone)]
struct QueuedSend {
    body: String,
    needs_upload: bool,
}

#[derive(Debug, Clone)]
struct StagedMessage {
    sender: UserId,
    emote: bool,
    body: String,
}

type MemberState = (Membership, Option<String>);

/// Reference model for a single room seen by one client.
#[derive(Debug, Clone)]
pub struct ModelRoom {
    own_user_id: UserId,
    room_id: String,

    /// Membership as the server knows it, staged or not.
    server_members: BTreeMap<UserId, MemberState>,
    /// Users in the order the client first hears of them.
    seen_order: Vec<UserId>,
    staged_members: Vec<(UserId, MemberState)>,
    staged_room_name: Option<String>,
    staged_messages: Vec<StagedMessage>,

    /// Membership as the client has been told.
    synced_members: BTreeMap<UserId, MemberState>,
    room_name: Option<String>,
    title: Option<String>,
    received: Vec<(String, String)>,

    queue: VecDeque<QueuedSend>,
    in_flight: bool,
    closing: bool,
    local_echoes: Vec<String>,
    sent: Vec<String>,
    next_message: u32,
    next_remote: u32,
}

impl ModelRoom {
    /// Room joined by `own_user_id` under `own_name`. The join is staged
    /// for the first sync.
    pub fn new(room_id: impl Into<String>, own_user_id: impl Into<UserId>, own_name: &str) -> Self {
        let mut room = Self {
            own_user_id: own_user_id.into(),
            room_id: room_id.into(),
            server_members: BTreeMap::new(),
            seen_order: Vec::new(),
            staged_members: Vec::new(),
            staged_room_name: None,
            staged_messages: Vec::new(),
            synced_members: BTreeMap::new(),
            room_name: None,
            title: None,
            received: Vec::new(),
            queue: VecDeque::new(),
            in_flight: false,
            closing: false,
            local_echoes: Vec::new(),
            sent: Vec::new(),
            next_message: 0,
            next_remote: 0,
        };
        let own = room.own_user_id.clone();
        room.stage_member(&own, Membership::Join, Some(own_name));
        room
    }

    /// Body of the next text message we send.
    pub fn next_text_body(&self) -> String {
        format!("msg-{}", self.next_message)
    }

    /// Filename of the next image we send.
    pub fn next_image_name(&self) -> String {
        format!("img-{}.png", self.next_message)
    }

    /// Body of the next remote message.
    pub fn next_remote_body(&self) -> String {
        format!("remote-{}", self.next_remote)
    }

    /// Current server-side membership of a user.
    pub fn server_membership(&self, user_id: &str) -> Option<Membership> {
        self.server_members.get(user_id).map(|(membership, _)| *membership)
    }

    fn stage_member(&mut self, user_id: &str, membership: Membership, name: Option<&str>) {
        if !self.seen_order.iter().any(|seen| seen == user_id) {
            self.seen_order.push(user_id.to_owned());
        }
        let state = (membership, name.map(str::to_owned));
        self.server_members.insert(user_id.to_owned(), state.clone());
        self.staged_members.push((user_id.to_owned(), state));
    }

    fn dispatch(&mut self) {
        if !self.in_flight && !self.closing && !self.queue.is_empty() {
            self.in_flight = true;
        }
    }

    fn enqueue(&mut self, body: String, needs_upload: bool) {
        self.next_message += 1;
        self.queue.push_back(QueuedSend { body, needs_upload });
        self.dispatch();
    }

    fn complete(&mut self, success: bool) {
        if !self.in_flight {
            return;
        }
        self.in_flight = false;
        if !success {
            return;
        }
        match self.queue.front_mut() {
            Some(head) if head.needs_upload => head.needs_upload = false,
            Some(_) => {
                if let Some(done) = self.queue.pop_front() {
                    self.sent.push(done.body);
                }
            },
            None => {},
        }
        self.dispatch();
    }

    fn sync(&mut self) {
        let had_state = !self.staged_members.is_empty() || self.staged_room_name.is_some();

        for (user_id, state) in std::mem::take(&mut self.staged_members) {
            self.synced_members.insert(user_id, state);
        }
        if let Some(name) = self.staged_room_name.take() {
            self.room_name = Some(name).filter(|name| !name.is_empty());
        }
        if had_state {
            self.title = Some(self.derived_name());
        }

        for message in std::mem::take(&mut self.staged_messages) {
            let sender = self.synced_members.get(&message.sender).map_or_else(
                || DEFAULT_UNKNOWN_SENDER.to_owned(),
                |(_, name)| name.clone().unwrap_or_else(|| message.sender.clone()),
            );
            let body = if message.emote {
                format!("{DEFAULT_EMOTE_PREFIX}{}", message.body)
            } else {
                message.body
            };
            self.received.push((sender, body));
        }
    }

    fn derived_name(&self) -> String {
        if let Some(name) = &self.room_name {
            return name.clone();
        }

        let others: Vec<String> = self
            .seen_order
            .iter()
            .filter(|user_id| **user_id != self.own_user_id)
            .filter_map(|user_id| {
                let (membership, name) = self.synced_members.get(user_id)?;
                membership.is_visible().then(|| name.clone().unwrap_or_else(|| user_id.clone()))
            })
            .collect();

        match others.as_slice() {
            [] => self.room_id.clone(),
            [only] => only.clone(),
            [first, second] => format!("{first} and {second}"),
            [first, ..] => format!("{first} and {} others", others.len()),
        }
    }

    /// Apply an operation to the model.
    pub fn apply(&mut self, op: &Operation) {
        match *op {
            Operation::Join { user, name } => {
                self.stage_member(&user_id_for(user), Membership::Join, display_name_for(name));
            },
            Operation::Invite { user, name } => {
                self.stage_member(&user_id_for(user), Membership::Invite, display_name_for(name));
            },
            Operation::Leave { user } => {
                self.stage_member(&user_id_for(user), Membership::Leave, None);
            },
            Operation::Ban { user } => {
                self.stage_member(&user_id_for(user), Membership::Ban, None);
            },
            Operation::Rename { user, name } => {
                let user_id = user_id_for(user);
                let membership = self.server_membership(&user_id).unwrap_or(Membership::Leave);
                self.stage_member(&user_id, membership, display_name_for(name));
            },
            Operation::SetRoomName { name } => {
                self.staged_room_name =
                    Some(name.and_then(display_name_for).unwrap_or_default().to_owned());
            },
            Operation::RemoteMessage { user, emote } => {
                let body = self.next_remote_body();
                self.next_remote += 1;
                self.staged_messages.push(StagedMessage { sender: user_id_for(user), emote, body });
            },
            Operation::SendText { emote } => {
                let body = self.next_text_body();
                let echo = if emote { format!("{DEFAULT_EMOTE_PREFIX}{body}") } else { body.clone() };
                self.local_echoes.push(echo);
                self.enqueue(body, false);
            },
            Operation::SendImage => {
                let filename = self.next_image_name();
                self.local_echoes.push(filename.clone());
                self.enqueue(filename, true);
            },
            Operation::CompleteRequest { success } => self.complete(success),
            Operation::RetrySend => self.dispatch(),
            Operation::CloseConnection => self.closing = true,
            Operation::Sync => self.sync(),
        }
    }

    /// Observable state for comparison with the real system.
    pub fn observable(&self) -> ObservableState {
        let mut roster: Vec<String> = self
            .synced_members
            .iter()
            .filter(|(_, (membership, _))| membership.is_visible())
            .map(|(user_id, (_, name))| name.clone().unwrap_or_else(|| user_id.clone()))
            .collect();
        roster.sort();

        ObservableState {
            roster,
            title: self.title.clone(),
            received: self.received.clone(),
            local_echoes: self.local_echoes.clone(),
            sent: self.sent.clone(),
            queue_len: self.queue.len(),
            in_flight: self.in_flight,
        }
    }
}
