//! Roomsync replay binary.
//!
//! # Usage
//!
//! ```bash
//! roomsync-replay demos/lobby.json --user-id @me:example.org
//!
//! # Treat every sync as an initial sync
//! roomsync-replay demos/lobby.json --user-id @me:example.org --no-announce
//! ```

use std::path::PathBuf;

use clap::Parser;
use roomsync_client::{ClientConfig, SystemEnv};
use roomsync_replay::{Replayer, parse_script};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Roomsync replay tool
#[derive(Parser, Debug)]
#[command(name = "roomsync-replay")]
#[command(about = "Replay sync batches and sends through a roomsync client")]
#[command(version)]
struct Args {
    /// Replay script (JSON array of steps)
    input: PathBuf,

    /// Matrix user id of the replaying account
    #[arg(short, long)]
    user_id: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Never announce arrivals, as on an initial sync
    #[arg(long)]
    no_announce: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(input = %args.input.display(), user_id = %args.user_id, "replay starting");

    let script = std::fs::read_to_string(&args.input)?;
    let steps = parse_script(&script)?;

    let mut replayer =
        Replayer::new(SystemEnv::new(), ClientConfig::new(args.user_id), !args.no_announce);
    let summary = replayer.run(steps)?;

    tracing::info!(
        rooms_created = summary.rooms_created,
        rooms_removed = summary.rooms_removed,
        received = summary.messages_received,
        sent = summary.messages_sent,
        accepted = summary.events_accepted,
        uploads = summary.uploads,
        failures = summary.failures,
        last_title = ?summary.last_title,
        "replay summary"
    );

    Ok(())
}
