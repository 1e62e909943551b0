//! Deterministic simulation harness for roomsync testing.
//!
//! In-memory stand-ins for everything around the client: a seeded
//! [`SimEnv`], a [`SimHomeserver`] that executes request actions and produces
//! sync batches, and a [`SimHost`] that applies roster, title and message
//! actions the way a chat UI would.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and real implementation,
//! and their observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold after every step,
//! whatever the operation sequence. Use [`InvariantRegistry::standard()`] for
//! the full set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod events;
pub mod invariants;
pub mod model;
pub mod sim_env;
pub mod sim_homeserver;
pub mod sim_host;

pub use invariants::{
    Invariant, InvariantRegistry, InvariantResult, NoEchoDelivered, RequestsAccounted,
    RoomSnapshot, RosterMatchesAnnounced, SingleFlight, SystemSnapshot, Violation,
};
pub use model::{
    ModelRoom, NameSlot, ObservableState, Operation, USER_COUNT, UserSlot, display_name_for,
    user_id_for,
};
pub use sim_env::SimEnv;
pub use sim_homeserver::{OutstandingRequest, SimHomeserver};
pub use sim_host::{HostError, HostRoom, SimHost};
