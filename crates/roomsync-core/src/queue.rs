//! Outgoing event queue.
//!
//! Events leave a room strictly in enqueue order with at most one request in
//! flight. The head of the queue is always the event being sent (or the next
//! one to send). A failed request leaves its event at the head with no active
//! send; nothing is retried until the next [`EventQueue::send_next`], which
//! happens when another event is enqueued or the caller retries explicitly.
//!
//! Some events need work before they can be sent. [`SendHook::UploadThenSend`]
//! uploads an image first and fills the returned content reference into the
//! event, which then becomes a plain direct send.

use std::collections::VecDeque;

use bytes::Bytes;
use roomsync_proto::{
    EventContent, RequestFailure, RequestHandle, RequestOutcome, RoomId, SendEventResponse,
    UploadResponse,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{Environment, TransactionId};

/// Requests the queue needs from the outside world.
///
/// Calls return immediately with a handle; the outcome is delivered later via
/// [`EventQueue::handle_completion`].
pub trait Transport {
    /// Send `content` as an event of `event_type` to `room_id`.
    fn send_event(
        &mut self,
        room_id: &str,
        event_type: &str,
        txn_id: &TransactionId,
        content: &EventContent,
    ) -> RequestHandle;

    /// Upload media, yielding a `content_uri` on success.
    fn upload_file(&mut self, content_type: &str, data: &Bytes) -> RequestHandle;

    /// Abandon an outstanding request. Its completion, if it still arrives,
    /// is ignored.
    fn cancel(&mut self, handle: RequestHandle);

    /// Whether the connection is shutting down. Nothing is dispatched while
    /// it is.
    fn is_closing(&self) -> bool;
}

/// Image waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// File name, used as the message body.
    pub filename: String,
    /// MIME type sent with the upload.
    pub content_type: String,
    /// Raw image bytes.
    pub data: Bytes,
}

impl ImageUpload {
    /// Build an upload, guessing the MIME type from the file name.
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let filename = filename.into();
        let content_type =
            mime_guess::from_path(&filename).first_or_octet_stream().essence_str().to_owned();
        Self { filename, content_type, data: data.into() }
    }
}

/// What happens when an event reaches the head of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SendHook {
    /// Send the event as is.
    #[default]
    Direct,
    /// Upload the image, add its `url` to the content, then send.
    UploadThenSend(ImageUpload),
}

/// An event waiting to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    event_type: String,
    content: EventContent,
    txn_id: TransactionId,
    hook: SendHook,
}

impl PendingEvent {
    /// Event type.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Content as it will be sent.
    pub fn content(&self) -> &EventContent {
        &self.content
    }

    /// Transaction id.
    pub fn txn_id(&self) -> &TransactionId {
        &self.txn_id
    }

    /// Remaining pre-send work.
    pub fn hook(&self) -> &SendHook {
        &self.hook
    }
}

/// The single outstanding request for the head event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveSend {
    /// Upload hook running.
    Uploading(RequestHandle),
    /// Event send request outstanding.
    Sending(RequestHandle),
}

impl ActiveSend {
    /// Handle of the outstanding request.
    pub fn handle(self) -> RequestHandle {
        match self {
            Self::Uploading(handle) | Self::Sending(handle) => handle,
        }
    }
}

/// Result of feeding a request outcome to the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The head event was sent and removed from the queue.
    Sent {
        /// Transaction id of the sent event.
        txn_id: TransactionId,
        /// Server event id, if the response carried one.
        event_id: Option<String>,
    },
    /// The head event's upload finished; its send is now in flight.
    Uploaded {
        /// Transaction id of the event.
        txn_id: TransactionId,
        /// Reference now stored in the event's `url`.
        content_uri: String,
    },
    /// The request failed. The event stays at the head, nothing in flight.
    Failed {
        /// Transaction id of the event.
        txn_id: TransactionId,
        /// What went wrong.
        failure: RequestFailure,
    },
    /// The handle is not the active send (cancelled or already finished).
    Stale,
}

/// FIFO of outgoing events for one room.
#[derive(Debug, Clone)]
pub struct EventQueue {
    room_id: RoomId,
    events: VecDeque<PendingEvent>,
    active: Option<ActiveSend>,
}

impl EventQueue {
    /// Create an empty queue for `room_id`.
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self { room_id: room_id.into(), events: VecDeque::new(), active: None }
    }

    /// Append an event with a fresh transaction id and dispatch it right away
    /// if nothing is in flight.
    pub fn enqueue<E: Environment>(
        &mut self,
        env: &E,
        transport: &mut impl Transport,
        event_type: impl Into<String>,
        content: EventContent,
        hook: SendHook,
    ) -> TransactionId {
        let txn_id = TransactionId::generate(env);
        let event_type = event_type.into();
        debug!(
            room_id = %self.room_id,
            %txn_id,
            %event_type,
            queued = self.events.len(),
            "enqueue event"
        );

        self.events.push_back(PendingEvent { event_type, content, txn_id: txn_id.clone(), hook });
        self.send_next(transport);
        txn_id
    }

    /// Dispatch the head event if nothing is in flight.
    pub fn send_next(&mut self, transport: &mut impl Transport) {
        if self.active.is_some() {
            return;
        }
        let Some(head) = self.events.front_mut() else {
            return;
        };
        if transport.is_closing() {
            debug!(room_id = %self.room_id, txn_id = %head.txn_id, "connection closing, not sending");
            return;
        }

        let active = match &head.hook {
            SendHook::Direct => {
                debug!(room_id = %self.room_id, txn_id = %head.txn_id, "sending event");
                ActiveSend::Sending(transport.send_event(
                    &self.room_id,
                    &head.event_type,
                    &head.txn_id,
                    &head.content,
                ))
            },
            SendHook::UploadThenSend(upload) => {
                debug!(
                    room_id = %self.room_id,
                    txn_id = %head.txn_id,
                    filename = %upload.filename,
                    "uploading image before send"
                );
                head.content.insert("body".into(), Value::String(upload.filename.clone()));
                ActiveSend::Uploading(transport.upload_file(&upload.content_type, &upload.data))
            },
        };
        self.active = Some(active);
    }

    /// Feed the outcome of a request this queue issued.
    pub fn handle_completion(
        &mut self,
        transport: &mut impl Transport,
        handle: RequestHandle,
        outcome: RequestOutcome,
    ) -> Completion {
        let Some(active) = self.active.filter(|active| active.handle() == handle) else {
            debug!(room_id = %self.room_id, %handle, "ignoring stale completion");
            return Completion::Stale;
        };
        self.active = None;
        let Some(head) = self.events.front_mut() else {
            return Completion::Stale;
        };
        let txn_id = head.txn_id.clone();

        let completion = match active {
            ActiveSend::Sending(_) => match outcome.into_result() {
                Ok(body) => {
                    let event_id = serde_json::from_value::<SendEventResponse>(body)
                        .unwrap_or_default()
                        .event_id;
                    self.events.pop_front();
                    info!(room_id = %self.room_id, %txn_id, ?event_id, "event sent");
                    Completion::Sent { txn_id, event_id }
                },
                Err(failure) => Completion::Failed { txn_id, failure },
            },
            ActiveSend::Uploading(_) => {
                match outcome.into_result().and_then(UploadResponse::from_value) {
                    Ok(UploadResponse { content_uri }) => {
                        head.content.insert("url".into(), Value::String(content_uri.clone()));
                        head.hook = SendHook::Direct;
                        debug!(room_id = %self.room_id, %txn_id, %content_uri, "image uploaded");
                        Completion::Uploaded { txn_id, content_uri }
                    },
                    Err(failure) => Completion::Failed { txn_id, failure },
                }
            },
        };

        if let Completion::Failed { txn_id, failure } = &completion {
            warn!(room_id = %self.room_id, %txn_id, %failure, "send failed, event left queued");
        } else {
            self.send_next(transport);
        }
        completion
    }

    /// Cancel the in-flight request, if any. Afterwards nothing is active.
    pub fn cancel_active_send(&mut self, transport: &mut impl Transport) -> Option<RequestHandle> {
        let handle = self.active.take()?.handle();
        debug!(room_id = %self.room_id, %handle, "cancelling active send");
        transport.cancel(handle);
        Some(handle)
    }

    /// Drop every queued event without sending it. Returns how many were
    /// dropped.
    pub fn discard_all(&mut self) -> usize {
        let dropped = self.events.len();
        self.events.clear();
        self.active = None;
        if dropped > 0 {
            debug!(room_id = %self.room_id, dropped, "discarded queued events");
        }
        dropped
    }

    /// The outstanding request, if any.
    pub fn active(&self) -> Option<ActiveSend> {
        self.active
    }

    /// Event at the head of the queue.
    pub fn head(&self) -> Option<&PendingEvent> {
        self.events.front()
    }

    /// Queued events, head first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingEvent> {
        self.events.iter()
    }

    /// Number of queued events, including the one in flight.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::env::test_utils::MockEnv;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Send { handle: RequestHandle, txn_id: TransactionId, content: EventContent },
        Upload { handle: RequestHandle, content_type: String },
        Cancel(RequestHandle),
    }

    #[derive(Default)]
    struct RecordingTransport {
        next: u64,
        calls: Vec<Call>,
        closing: bool,
    }

    impl RecordingTransport {
        fn handle(&mut self) -> RequestHandle {
            self.next += 1;
            RequestHandle::new(self.next)
        }

        fn last(&self) -> &Call {
            self.calls.last().unwrap()
        }
    }

    impl Transport for RecordingTransport {
        fn send_event(
            &mut self,
            room_id: &str,
            _event_type: &str,
            txn_id: &TransactionId,
            content: &EventContent,
        ) -> RequestHandle {
            assert_eq!(room_id, "!room:hs");
            let handle = self.handle();
            self.calls.push(Call::Send { handle, txn_id: txn_id.clone(), content: content.clone() });
            handle
        }

        fn upload_file(&mut self, content_type: &str, _data: &Bytes) -> RequestHandle {
            let handle = self.handle();
            self.calls.push(Call::Upload { handle, content_type: content_type.to_owned() });
            handle
        }

        fn cancel(&mut self, handle: RequestHandle) {
            self.calls.push(Call::Cancel(handle));
        }

        fn is_closing(&self) -> bool {
            self.closing
        }
    }

    fn text(body: &str) -> EventContent {
        let mut content = EventContent::new();
        content.insert("msgtype".into(), json!("m.text"));
        content.insert("body".into(), json!(body));
        content
    }

    fn ok() -> RequestOutcome {
        RequestOutcome::Ok(json!({ "event_id": "$ev" }))
    }

    fn fail() -> RequestOutcome {
        RequestOutcome::TransportError("connection reset".into())
    }

    fn active_handle(queue: &EventQueue) -> RequestHandle {
        queue.active().unwrap().handle()
    }

    #[test]
    fn enqueue_on_idle_queue_dispatches_immediately() {
        let env = MockEnv::new();
        let mut transport = RecordingTransport::default();
        let mut queue = EventQueue::new("!room:hs");

        let txn = queue.enqueue(&env, &mut transport, "m.room.message", text("x"), SendHook::Direct);

        assert_eq!(transport.calls.len(), 1);
        assert!(matches!(transport.last(), Call::Send { txn_id, .. } if *txn_id == txn));
        assert!(matches!(queue.active(), Some(ActiveSend::Sending(_))));
    }

    #[test]
    fn enqueue_on_busy_queue_waits() {
        let env = MockEnv::new();
        let mut transport = RecordingTransport::default();
        let mut queue = EventQueue::new("!room:hs");

        let x = queue.enqueue(&env, &mut transport, "m.room.message", text("x"), SendHook::Direct);
        let y = queue.enqueue(&env, &mut transport, "m.room.message", text("y"), SendHook::Direct);
        assert_eq!(transport.calls.len(), 1);
        assert_eq!(queue.len(), 2);

        let completion = queue.handle_completion(&mut transport, active_handle(&queue), ok());
        assert_eq!(completion, Completion::Sent { txn_id: x, event_id: Some("$ev".into()) });
        assert!(matches!(transport.last(), Call::Send { txn_id, .. } if *txn_id == y));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn failure_leaves_event_at_head() {
        let env = MockEnv::new();
        let mut transport = RecordingTransport::default();
        let mut queue = EventQueue::new("!room:hs");

        let x = queue.enqueue(&env, &mut transport, "m.room.message", text("x"), SendHook::Direct);
        let completion = queue.handle_completion(&mut transport, active_handle(&queue), fail());

        assert!(matches!(completion, Completion::Failed { ref txn_id, .. } if *txn_id == x));
        assert_eq!(queue.head().unwrap().txn_id(), &x);
        assert!(queue.active().is_none());
        assert_eq!(transport.calls.len(), 1, "no automatic retry");

        // Enqueueing Y retries X first; Y waits behind it.
        let y = queue.enqueue(&env, &mut transport, "m.room.message", text("y"), SendHook::Direct);
        assert!(matches!(transport.last(), Call::Send { txn_id, .. } if *txn_id == x));
        let order: Vec<_> = queue.iter().map(PendingEvent::txn_id).cloned().collect();
        assert_eq!(order, vec![x, y]);
    }

    #[test]
    fn server_error_counts_as_failure() {
        let env = MockEnv::new();
        let mut transport = RecordingTransport::default();
        let mut queue = EventQueue::new("!room:hs");

        queue.enqueue(&env, &mut transport, "m.room.message", text("x"), SendHook::Direct);
        let completion = queue.handle_completion(
            &mut transport,
            active_handle(&queue),
            RequestOutcome::ServerError { status: 429, body: json!({ "error": "slow down" }) },
        );
        assert!(matches!(
            completion,
            Completion::Failed { failure: RequestFailure::Server { status: 429, .. }, .. }
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn closing_transport_keeps_events_queued() {
        let env = MockEnv::new();
        let mut transport = RecordingTransport { closing: true, ..Default::default() };
        let mut queue = EventQueue::new("!room:hs");

        queue.enqueue(&env, &mut transport, "m.room.message", text("x"), SendHook::Direct);
        assert!(transport.calls.is_empty());
        assert!(queue.active().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn image_hook_uploads_then_sends() {
        let env = MockEnv::new();
        let mut transport = RecordingTransport::default();
        let mut queue = EventQueue::new("!room:hs");

        let mut content = EventContent::new();
        content.insert("msgtype".into(), json!("m.image"));
        let upload = ImageUpload::new("cat.png", vec![1u8, 2, 3]);
        queue.enqueue(&env, &mut transport, "m.room.message", content, SendHook::UploadThenSend(upload));

        assert_eq!(
            transport.last(),
            &Call::Upload { handle: RequestHandle::new(1), content_type: "image/png".into() }
        );
        assert_eq!(queue.head().unwrap().content()["body"], "cat.png");

        let completion = queue.handle_completion(
            &mut transport,
            RequestHandle::new(1),
            RequestOutcome::Ok(json!({ "content_uri": "mxc://hs/cat" })),
        );
        assert!(matches!(completion, Completion::Uploaded { ref content_uri, .. } if content_uri == "mxc://hs/cat"));
        let Call::Send { content, .. } = transport.last() else { panic!("expected send") };
        assert_eq!(content["url"], "mxc://hs/cat");
        assert_eq!(content["body"], "cat.png");

        // A failed send after upload retries as a direct send.
        queue.handle_completion(&mut transport, active_handle(&queue), fail());
        assert_eq!(queue.head().unwrap().hook(), &SendHook::Direct);
        queue.send_next(&mut transport);
        assert!(matches!(transport.last(), Call::Send { .. }));
    }

    #[test]
    fn upload_without_content_uri_fails() {
        let env = MockEnv::new();
        let mut transport = RecordingTransport::default();
        let mut queue = EventQueue::new("!room:hs");

        let upload = ImageUpload::new("photo.unknownext", vec![0u8]);
        assert_eq!(upload.content_type, "application/octet-stream");
        queue.enqueue(&env, &mut transport, "m.room.message", EventContent::new(), SendHook::UploadThenSend(upload));

        let completion =
            queue.handle_completion(&mut transport, active_handle(&queue), RequestOutcome::Ok(json!({})));
        assert!(matches!(completion, Completion::Failed { failure: RequestFailure::BadResponse(_), .. }));
        assert!(queue.active().is_none());
        assert!(matches!(queue.head().unwrap().hook(), SendHook::UploadThenSend(_)));
    }

    #[test]
    fn cancel_clears_active_and_ignores_late_completion() {
        let env = MockEnv::new();
        let mut transport = RecordingTransport::default();
        let mut queue = EventQueue::new("!room:hs");

        queue.enqueue(&env, &mut transport, "m.room.message", text("x"), SendHook::Direct);
        let handle = active_handle(&queue);

        assert_eq!(queue.cancel_active_send(&mut transport), Some(handle));
        assert_eq!(transport.last(), &Call::Cancel(handle));
        assert!(queue.active().is_none());
        assert_eq!(queue.cancel_active_send(&mut transport), None);

        assert_eq!(queue.handle_completion(&mut transport, handle, ok()), Completion::Stale);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.discard_all(), 1);
        assert!(queue.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue,
        CompleteOk,
        CompleteErr,
        Retry,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Enqueue),
            3 => Just(Op::CompleteOk),
            1 => Just(Op::CompleteErr),
            1 => Just(Op::Retry),
        ]
    }

    proptest! {
        #[test]
        fn single_flight_and_fifo(ops in prop::collection::vec(arb_op(), 0..64)) {
            let env = MockEnv::new();
            let mut transport = RecordingTransport::default();
            let mut queue = EventQueue::new("!room:hs");
            let mut enqueued = Vec::new();
            let mut sent = Vec::new();
            let mut outstanding: HashSet<RequestHandle> = HashSet::new();

            for op in ops {
                let before = transport.calls.len();
                match op {
                    Op::Enqueue => {
                        let txn = queue.enqueue(&env, &mut transport, "m.room.message", text("m"), SendHook::Direct);
                        enqueued.push(txn);
                    },
                    Op::CompleteOk | Op::CompleteErr => {
                        if let Some(active) = queue.active() {
                            outstanding.remove(&active.handle());
                            let outcome = if matches!(op, Op::CompleteOk) { ok() } else { fail() };
                            if let Completion::Sent { txn_id, .. } = queue.handle_completion(&mut transport, active.handle(), outcome) {
                                sent.push(txn_id);
                            }
                        }
                    },
                    Op::Retry => queue.send_next(&mut transport),
                }

                for call in &transport.calls[before..] {
                    if let Call::Send { handle, .. } = call {
                        outstanding.insert(*handle);
                    }
                }
                prop_assert!(outstanding.len() <= 1);
                prop_assert_eq!(queue.active().is_some(), !outstanding.is_empty());
                if queue.active().is_some() {
                    prop_assert!(!queue.is_empty());
                }
            }

            // Sent events are a prefix of the enqueue order; the rest are
            // still queued in order.
            let queued: Vec<_> = queue.iter().map(|e| e.txn_id().clone()).collect();
            let mut reassembled = sent;
            reassembled.extend(queued);
            prop_assert_eq!(reassembled, enqueued);
        }
    }
}
