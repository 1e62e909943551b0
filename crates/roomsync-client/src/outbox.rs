//! Request bookkeeping and action collection.
//!
//! Rooms talk to the homeserver through [`Outbox`], which implements
//! [`Transport`] by turning each call into a [`ClientAction`]. The
//! [`RequestRegistry`] remembers which room and request kind every handle
//! belongs to so completions can be routed back.

use std::collections::HashMap;

use bytes::Bytes;
use roomsync_core::{TransactionId, Transport};
use roomsync_proto::{EventContent, RequestHandle, RoomId};
use tracing::trace;

use crate::{ApiRequest, ClientAction, RequestKind};

/// Outstanding requests across all rooms.
#[derive(Debug, Default)]
pub(crate) struct RequestRegistry {
    next_handle: u64,
    in_flight: HashMap<RequestHandle, (RoomId, RequestKind)>,
    closing: bool,
}

impl RequestRegistry {
    /// Take the routing entry for a finished request.
    pub(crate) fn complete(&mut self, handle: RequestHandle) -> Option<(RoomId, RequestKind)> {
        self.in_flight.remove(&handle)
    }

    pub(crate) fn set_closing(&mut self) {
        self.closing = true;
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// Per-call view of the client's request registry and action list.
pub(crate) struct Outbox<'a> {
    room_id: &'a str,
    registry: &'a mut RequestRegistry,
    actions: &'a mut Vec<ClientAction>,
}

impl<'a> Outbox<'a> {
    pub(crate) fn new(
        room_id: &'a str,
        registry: &'a mut RequestRegistry,
        actions: &'a mut Vec<ClientAction>,
    ) -> Self {
        Self { room_id, registry, actions }
    }

    /// Queue an action for the caller.
    pub(crate) fn push(&mut self, action: ClientAction) {
        self.actions.push(action);
    }

    /// Allocate a handle for `request` and emit it.
    pub(crate) fn issue(&mut self, request: ApiRequest) -> RequestHandle {
        self.registry.next_handle += 1;
        let handle = RequestHandle::new(self.registry.next_handle);
        trace!(room_id = self.room_id, %handle, kind = ?request.kind(), "issue request");

        self.registry.in_flight.insert(handle, (self.room_id.to_owned(), request.kind()));
        self.actions.push(ClientAction::Request { handle, request });
        handle
    }
}

impl Transport for Outbox<'_> {
    fn send_event(
        &mut self,
        room_id: &str,
        event_type: &str,
        txn_id: &TransactionId,
        content: &EventContent,
    ) -> RequestHandle {
        self.issue(ApiRequest::SendEvent {
            room_id: room_id.to_owned(),
            event_type: event_type.to_owned(),
            txn_id: txn_id.clone(),
            content: content.clone(),
        })
    }

    fn upload_file(&mut self, content_type: &str, data: &Bytes) -> RequestHandle {
        self.issue(ApiRequest::UploadFile { content_type: content_type.to_owned(), data: data.clone() })
    }

    fn cancel(&mut self, handle: RequestHandle) {
        self.registry.in_flight.remove(&handle);
        self.actions.push(ClientAction::CancelRequest { handle });
    }

    fn is_closing(&self) -> bool {
        self.registry.closing
    }
}
