//! Client
//!
//! Action-based client state machine for Matrix-style rooms. Owns one
//! [`Room`] per joined room and routes request completions back to the room
//! that issued them.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`roomsync_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute: HTTP requests against the homeserver and updates to
//! the host UI.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine managing multiple rooms
//! - [`Room`]: Per-room context (state table, roster, send queue, naming)
//! - [`ClientEvent`]: Events fed into the client
//! - [`ClientAction`]: Actions produced by the client

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod error;
mod event;
mod outbox;
mod room;

pub use client::Client;
pub use config::{ClientConfig, DEFAULT_EMOTE_PREFIX, DEFAULT_UNKNOWN_SENDER};
pub use error::ClientError;
pub use event::{ApiRequest, ClientAction, ClientEvent, DisplayMessage, MessageFlags, RequestKind, RoomSync};
pub use roomsync_core::{Environment, ImageUpload, SystemEnv};
pub use roomsync_proto::{RequestHandle, RequestOutcome, RoomId, UserId};
pub use room::Room;
