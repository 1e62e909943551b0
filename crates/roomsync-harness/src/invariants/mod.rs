//! Cross-component checks run after every simulated step.
//!
//! A [`SystemSnapshot`] records, per room, what the client believes (queue
//! depth, active send, announced members), what the simulated homeserver has
//! accepted and echoed, and what the simulated host is showing. Each
//! [`Invariant`] compares those three views and reports a [`Violation`] when
//! they disagree.
//!
//! ```ignore
//! let snapshot = SystemSnapshot::capture(&client, &homeserver, &host);
//! InvariantRegistry::standard().assert_all(&snapshot, "after sync");
//! ```

mod checks;
mod snapshot;

pub use checks::{NoEchoDelivered, RequestsAccounted, RosterMatchesAnnounced, SingleFlight};
pub use snapshot::{RoomSnapshot, SystemSnapshot};

/// Outcome of a single check.
pub type InvariantResult = Result<(), Violation>;

/// A check that failed, tagged with the check's name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{invariant}: {message}")]
pub struct Violation {
    /// Which check failed.
    pub invariant: &'static str,
    /// Room and values involved.
    pub message: String,
}

/// A property relating client, homeserver and host state.
pub trait Invariant: Send + Sync {
    /// Short name used in violation reports.
    fn name(&self) -> &'static str;

    /// Inspect one snapshot.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;

    /// Tag `message` with this check's name.
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// Ordered set of checks applied to each snapshot.
#[derive(Default)]
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// No checks registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Single flight per room, roster agreement with the host, no delivered
    /// echoes, and request bookkeeping shared by client and homeserver.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(SingleFlight);
        registry.add(RosterMatchesAnnounced);
        registry.add(NoEchoDelivered);
        registry.add(RequestsAccounted);
        registry
    }

    /// Register another check.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.checks.push(Box::new(invariant));
    }

    /// Run every check, collecting all failures rather than stopping at the
    /// first.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let failed: Vec<Violation> =
            self.checks.iter().filter_map(|check| check.check(state).err()).collect();
        if failed.is_empty() { Ok(()) } else { Err(failed) }
    }

    /// Like [`Self::check_all`], but panics listing every failure. `context`
    /// names the step that produced the snapshot.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(failed) = self.check_all(state) {
            let report: Vec<String> = failed.iter().map(ToString::to_string).collect();
            panic!("invariants broken {context}:\n  {}", report.join("\n  "));
        }
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
