//! Core
//!
//! Pure per-room state machines. Nothing here performs I/O: outgoing requests
//! go through the [`Transport`] seam and time/randomness come from the
//! [`Environment`] seam, so every component runs identically under simulation.
//!
//! # Components
//!
//! - [`RoomStateTable`]: latest state event per `(type, state_key)`
//! - [`MembershipTable`]: roster derived from `m.room.member` with
//!   arrival/rename/departure diffs
//! - [`EventQueue`]: FIFO of outgoing events with single-flight dispatch
//! - [`naming`]: room display-name derivation

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod membership;
pub mod naming;
pub mod queue;
pub mod state;
pub mod system_env;
pub mod txn;

pub use env::Environment;
pub use error::MemberError;
pub use membership::{
    DepartedMember, MemberDiff, MemberRecord, MembershipTable, NewMember, RenamedMember,
    RenderState,
};
pub use naming::RoomFlags;
pub use queue::{
    ActiveSend, Completion, EventQueue, ImageUpload, PendingEvent, SendHook, Transport,
};
pub use state::{RoomStateTable, StateChange};
pub use system_env::SystemEnv;
pub use txn::TransactionId;
