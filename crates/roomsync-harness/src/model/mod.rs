//! Reference model for model-based testing.
//!
//! The model is a deliberately naive re-statement of what a single room
//! should look like from the host's point of view: who is on the roster,
//! what the room is called, which messages were shown and which queued
//! events the server accepted. It keeps plain maps and counters, no diff
//! queues, no render states, so a divergence from the real client points at
//! a bug in the incremental bookkeeping.

mod operation;
mod room;

pub use operation::{NameSlot, Operation, USER_COUNT, UserSlot, display_name_for, user_id_for};
pub use room::{ModelRoom, ObservableState};
