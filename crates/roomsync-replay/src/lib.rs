//! Replay recorded sync batches and user sends through a roomsync client.
//!
//! A replay script is a JSON array of [`Step`]s. Every request the client
//! issues is answered successfully on the spot, so a script exercises the
//! whole pipeline (state, roster diffs, naming, timeline dispatch and the
//! send queue) without a homeserver. Host actions are logged as they are
//! produced and tallied in a [`ReplaySummary`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod replayer;
mod script;

pub use error::ReplayError;
pub use replayer::{ReplaySummary, Replayer};
pub use script::{Step, parse_script};
