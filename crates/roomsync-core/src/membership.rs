//! Membership table.
//!
//! A roster derived incrementally from `m.room.member` state changes. Besides
//! the current status and display name of every user seen in the room, the
//! table tracks what the host roster currently shows for each member
//! ([`RenderState`]) and queues the arrivals, renames and departures the host
//! has not been told about yet.
//!
//! # Diff cycle
//!
//! Updates accumulate across one sync batch. The caller then drains the
//! queues in order: new, renamed, left ([`MembershipTable::drain`] does all
//! three). Each member sits in at most one queue at a time, and a member that
//! arrives and renames within the same batch is reported once as new, carrying
//! its latest name.

use std::{collections::HashMap, mem};

use roomsync_proto::{MemberContent, Membership, UserId};
use tracing::{debug, trace};

use crate::MemberError;

/// What the host roster currently shows for a member.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RenderState {
    /// Never added to the roster.
    #[default]
    Unannounced,
    /// In the roster under this name.
    Announced(String),
    /// Was in the roster and has been removed.
    Removed,
}

impl RenderState {
    /// The name shown in the roster, if announced.
    pub fn rendered_name(&self) -> Option<&str> {
        match self {
            Self::Announced(name) => Some(name),
            Self::Unannounced | Self::Removed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingDiff {
    New,
    Renamed,
    Left,
}

/// Everything known about one user in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    user_id: UserId,
    membership: Membership,
    displayname: String,
    render: RenderState,
    pending: Option<PendingDiff>,
}

impl MemberRecord {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            membership: Membership::Unknown,
            displayname: user_id.to_owned(),
            render: RenderState::Unannounced,
            pending: None,
        }
    }

    /// User id.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Latest membership status.
    pub fn membership(&self) -> Membership {
        self.membership
    }

    /// Latest display name from state (user id if none set).
    pub fn displayname(&self) -> &str {
        &self.displayname
    }

    /// Roster state.
    pub fn render_state(&self) -> &RenderState {
        &self.render
    }

    /// Name currently shown in the roster.
    pub fn rendered_name(&self) -> Option<&str> {
        self.render.rendered_name()
    }

    fn announce(&mut self) -> Result<(), MemberError> {
        match self.render {
            RenderState::Unannounced | RenderState::Removed => {
                self.render = RenderState::Announced(self.displayname.clone());
                Ok(())
            },
            RenderState::Announced(_) => Err(self.invalid("announce")),
        }
    }

    fn rename(&mut self) -> Result<String, MemberError> {
        if let RenderState::Announced(name) = &mut self.render {
            return Ok(mem::replace(name, self.displayname.clone()));
        }
        Err(self.invalid("rename"))
    }

    fn remove(&mut self) -> Result<String, MemberError> {
        match mem::take(&mut self.render) {
            RenderState::Announced(name) => {
                self.render = RenderState::Removed;
                Ok(name)
            },
            other => {
                self.render = other;
                Err(self.invalid("remove"))
            },
        }
    }

    fn invalid(&self, operation: &'static str) -> MemberError {
        MemberError::InvalidTransition {
            user_id: self.user_id.clone(),
            operation,
            state: self.render.clone(),
        }
    }
}

/// A member to add to the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    /// User id.
    pub user_id: UserId,
    /// Name to show.
    pub display_name: String,
}

/// A roster entry to rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedMember {
    /// User id.
    pub user_id: UserId,
    /// Name the roster currently shows.
    pub old_name: String,
    /// Name to show from now on.
    pub new_name: String,
}

/// A roster entry to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartedMember {
    /// User id.
    pub user_id: UserId,
    /// Name the roster currently shows.
    pub rendered_name: String,
}

/// All roster changes from one drain cycle, in application order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberDiff {
    /// Arrivals.
    pub added: Vec<NewMember>,
    /// Renames.
    pub renamed: Vec<RenamedMember>,
    /// Departures.
    pub left: Vec<DepartedMember>,
}

impl MemberDiff {
    /// Whether the roster is unchanged.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.renamed.is_empty() && self.left.is_empty()
    }
}

/// Roster of one room, keyed by user id, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct MembershipTable {
    members: Vec<MemberRecord>,
    index: HashMap<UserId, usize>,
    new_queue: Vec<usize>,
    renamed_queue: Vec<usize>,
    left_queue: Vec<usize>,
}

impl MembershipTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one `m.room.member` state change.
    pub fn update_member(&mut self, user_id: &str, content: &MemberContent) {
        let idx = match self.index.get(user_id) {
            Some(&idx) => idx,
            None => {
                let idx = self.members.len();
                self.members.push(MemberRecord::new(user_id));
                self.index.insert(user_id.to_owned(), idx);
                idx
            },
        };

        let record = &mut self.members[idx];
        let was_visible = record.membership.is_visible();
        let now_visible = content.membership.is_visible();
        record.membership = content.membership;
        record.displayname = content.display_name(user_id).to_owned();

        trace!(
            user_id,
            membership = ?content.membership,
            displayname = %record.displayname,
            "member update"
        );

        match (was_visible, now_visible) {
            (false, true) => self.arrive(idx),
            (true, true) => self.sync_rename(idx),
            (true, false) => self.depart(idx),
            (false, false) => {},
        }
    }

    fn arrive(&mut self, idx: usize) {
        let record = &mut self.members[idx];
        match record.pending {
            Some(PendingDiff::Left) => {
                // Left and came back before the host heard about it.
                record.pending = None;
                remove_idx(&mut self.left_queue, idx);
                self.sync_rename(idx);
            },
            None if record.render.rendered_name().is_some() => self.sync_rename(idx),
            None => {
                record.pending = Some(PendingDiff::New);
                self.new_queue.push(idx);
            },
            Some(PendingDiff::New | PendingDiff::Renamed) => {},
        }
    }

    fn sync_rename(&mut self, idx: usize) {
        let record = &mut self.members[idx];
        let Some(rendered) = record.render.rendered_name() else {
            return;
        };
        let differs = rendered != record.displayname;

        match (differs, record.pending) {
            (true, None) => {
                record.pending = Some(PendingDiff::Renamed);
                self.renamed_queue.push(idx);
            },
            (false, Some(PendingDiff::Renamed)) => {
                record.pending = None;
                remove_idx(&mut self.renamed_queue, idx);
            },
            _ => {},
        }
    }

    fn depart(&mut self, idx: usize) {
        let record = &mut self.members[idx];
        match record.pending {
            Some(PendingDiff::New) => {
                record.pending = None;
                remove_idx(&mut self.new_queue, idx);
            },
            Some(PendingDiff::Renamed) => {
                remove_idx(&mut self.renamed_queue, idx);
                record.pending = Some(PendingDiff::Left);
                self.left_queue.push(idx);
            },
            None if record.render.rendered_name().is_some() => {
                record.pending = Some(PendingDiff::Left);
                self.left_queue.push(idx);
            },
            None | Some(PendingDiff::Left) => {},
        }
    }

    /// Take pending arrivals and mark them announced under their latest
    /// display name.
    pub fn drain_new(&mut self) -> Result<Vec<NewMember>, MemberError> {
        let queue = mem::take(&mut self.new_queue);
        let mut added = Vec::with_capacity(queue.len());
        for idx in queue {
            let record = &mut self.members[idx];
            record.pending = None;
            record.announce()?;
            added.push(NewMember {
                user_id: record.user_id.clone(),
                display_name: record.displayname.clone(),
            });
        }
        Ok(added)
    }

    /// Take pending renames and update their rendered names.
    pub fn drain_renamed(&mut self) -> Result<Vec<RenamedMember>, MemberError> {
        let queue = mem::take(&mut self.renamed_queue);
        let mut renamed = Vec::with_capacity(queue.len());
        for idx in queue {
            let record = &mut self.members[idx];
            record.pending = None;
            let old_name = record.rename()?;
            renamed.push(RenamedMember {
                user_id: record.user_id.clone(),
                old_name,
                new_name: record.displayname.clone(),
            });
        }
        Ok(renamed)
    }

    /// Take pending departures and clear their rendered names.
    pub fn drain_left(&mut self) -> Result<Vec<DepartedMember>, MemberError> {
        let queue = mem::take(&mut self.left_queue);
        let mut left = Vec::with_capacity(queue.len());
        for idx in queue {
            let record = &mut self.members[idx];
            record.pending = None;
            let rendered_name = record.remove()?;
            left.push(DepartedMember { user_id: record.user_id.clone(), rendered_name });
        }
        Ok(left)
    }

    /// Drain all three queues in order.
    pub fn drain(&mut self) -> Result<MemberDiff, MemberError> {
        let diff = MemberDiff {
            added: self.drain_new()?,
            renamed: self.drain_renamed()?,
            left: self.drain_left()?,
        };
        if !diff.is_empty() {
            debug!(
                added = diff.added.len(),
                renamed = diff.renamed.len(),
                left = diff.left.len(),
                "membership diff drained"
            );
        }
        Ok(diff)
    }

    /// Whether any diff is waiting to be drained.
    pub fn has_pending(&self) -> bool {
        !(self.new_queue.is_empty() && self.renamed_queue.is_empty() && self.left_queue.is_empty())
    }

    /// Joined members, plus invited ones if requested, in first-seen order.
    pub fn active_members(&self, include_invited: bool) -> impl Iterator<Item = &MemberRecord> {
        self.members.iter().filter(move |m| match m.membership {
            Membership::Join => true,
            Membership::Invite => include_invited,
            _ => false,
        })
    }

    /// Record for a user, if ever seen.
    pub fn lookup(&self, user_id: &str) -> Option<&MemberRecord> {
        self.index.get(user_id).map(|&idx| &self.members[idx])
    }

    /// User id of the active member shown in the roster as `name`.
    pub fn user_id_for_rendered_name(&self, name: &str) -> Option<&str> {
        self.active_members(true)
            .find(|m| m.rendered_name() == Some(name))
            .map(MemberRecord::user_id)
    }

    /// `(user_id, rendered_name)` of every announced member.
    pub fn announced(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members.iter().filter_map(|m| Some((m.user_id(), m.rendered_name()?)))
    }

    /// Number of users ever seen.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no member event has been applied.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

fn remove_idx(queue: &mut Vec<usize>, idx: usize) {
    queue.retain(|&queued| queued != idx);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;

    fn member(membership: Membership, displayname: Option<&str>) -> MemberContent {
        MemberContent { membership, displayname: displayname.map(str::to_owned) }
    }

    fn join(name: &str) -> MemberContent {
        member(Membership::Join, Some(name))
    }

    fn leave() -> MemberContent {
        member(Membership::Leave, None)
    }

    #[test]
    fn new_member_announced_with_latest_name() {
        let mut table = MembershipTable::new();
        table.update_member("@a:hs", &join("Alice"));
        table.update_member("@a:hs", &join("Alicia"));

        let diff = table.drain().unwrap();
        assert_eq!(
            diff.added,
            vec![NewMember { user_id: "@a:hs".into(), display_name: "Alicia".into() }]
        );
        assert!(diff.renamed.is_empty());
        assert_eq!(table.lookup("@a:hs").unwrap().rendered_name(), Some("Alicia"));
    }

    #[test]
    fn rename_after_announce() {
        let mut table = MembershipTable::new();
        table.update_member("@a:hs", &join("Alice"));
        table.drain().unwrap();

        table.update_member("@a:hs", &join("Al"));
        let diff = table.drain().unwrap();
        assert_eq!(
            diff.renamed,
            vec![RenamedMember {
                user_id: "@a:hs".into(),
                old_name: "Alice".into(),
                new_name: "Al".into(),
            }]
        );
        assert_eq!(table.user_id_for_rendered_name("Al"), Some("@a:hs"));
        assert_eq!(table.user_id_for_rendered_name("Alice"), None);
    }

    #[test]
    fn rename_reverted_within_batch_is_silent() {
        let mut table = MembershipTable::new();
        table.update_member("@a:hs", &join("Alice"));
        table.drain().unwrap();

        table.update_member("@a:hs", &join("Al"));
        table.update_member("@a:hs", &join("Alice"));
        assert!(!table.has_pending());
        assert!(table.drain().unwrap().is_empty());
    }

    #[test]
    fn redundant_update_is_noop() {
        let mut table = MembershipTable::new();
        table.update_member("@a:hs", &join("Alice"));
        table.drain().unwrap();

        table.update_member("@a:hs", &join("Alice"));
        assert!(table.drain().unwrap().is_empty());
    }

    #[test]
    fn join_then_leave_in_one_batch_is_never_announced() {
        let mut table = MembershipTable::new();
        table.update_member("@a:hs", &join("Alice"));
        table.update_member("@a:hs", &leave());

        assert!(table.drain().unwrap().is_empty());
        assert_eq!(table.lookup("@a:hs").unwrap().render_state(), &RenderState::Unannounced);
    }

    #[test]
    fn departure_reports_rendered_name() {
        let mut table = MembershipTable::new();
        table.update_member("@a:hs", &join("Alice"));
        table.drain().unwrap();

        table.update_member("@a:hs", &join("Al"));
        table.update_member("@a:hs", &member(Membership::Ban, Some("Al")));
        let diff = table.drain().unwrap();
        assert!(diff.renamed.is_empty());
        assert_eq!(
            diff.left,
            vec![DepartedMember { user_id: "@a:hs".into(), rendered_name: "Alice".into() }]
        );
        assert_eq!(table.lookup("@a:hs").unwrap().render_state(), &RenderState::Removed);
    }

    #[test]
    fn leave_and_rejoin_in_one_batch_becomes_rename() {
        let mut table = MembershipTable::new();
        table.update_member("@a:hs", &join("Alice"));
        table.drain().unwrap();

        table.update_member("@a:hs", &leave());
        table.update_member("@a:hs", &join("Alice"));
        assert!(table.drain().unwrap().is_empty());

        table.update_member("@a:hs", &leave());
        table.update_member("@a:hs", &join("Back"));
        let diff = table.drain().unwrap();
        assert!(diff.left.is_empty());
        assert_eq!(diff.renamed.len(), 1);
        assert_eq!(diff.renamed[0].new_name, "Back");
    }

    #[test]
    fn rejoin_after_removal_is_new_again() {
        let mut table = MembershipTable::new();
        table.update_member("@a:hs", &join("Alice"));
        table.drain().unwrap();
        table.update_member("@a:hs", &leave());
        table.drain().unwrap();

        table.update_member("@a:hs", &member(Membership::Invite, None));
        let diff = table.drain().unwrap();
        assert_eq!(diff.added[0].display_name, "@a:hs");
    }

    #[test]
    fn invisible_first_sighting_creates_record_only() {
        let mut table = MembershipTable::new();
        table.update_member("@a:hs", &leave());

        assert_eq!(table.len(), 1);
        assert!(!table.has_pending());
        assert_eq!(table.active_members(true).count(), 0);
    }

    #[test]
    fn active_members_keep_first_seen_order() {
        let mut table = MembershipTable::new();
        table.update_member("@c:hs", &join("C"));
        table.update_member("@a:hs", &member(Membership::Invite, Some("A")));
        table.update_member("@b:hs", &join("B"));

        let joined: Vec<_> = table.active_members(false).map(MemberRecord::user_id).collect();
        assert_eq!(joined, vec!["@c:hs", "@b:hs"]);
        let all: Vec<_> = table.active_members(true).map(MemberRecord::user_id).collect();
        assert_eq!(all, vec!["@c:hs", "@a:hs", "@b:hs"]);
    }

    #[test]
    fn render_transitions_are_checked() {
        let mut record = MemberRecord::new("@a:hs");
        assert!(matches!(
            record.remove(),
            Err(MemberError::InvalidTransition { operation: "remove", .. })
        ));
        assert!(matches!(
            record.rename(),
            Err(MemberError::InvalidTransition { operation: "rename", .. })
        ));

        record.announce().unwrap();
        let err = record.announce().unwrap_err();
        assert_eq!(
            err,
            MemberError::InvalidTransition {
                user_id: "@a:hs".into(),
                operation: "announce",
                state: RenderState::Announced("@a:hs".into()),
            }
        );

        assert_eq!(record.remove().unwrap(), "@a:hs");
        assert_eq!(record.render_state(), &RenderState::Removed);
        record.announce().unwrap();
    }

    fn arb_update() -> impl Strategy<Value = (u8, MemberContent)> {
        let membership = prop_oneof![
            Just(Membership::Join),
            Just(Membership::Invite),
            Just(Membership::Leave),
            Just(Membership::Ban),
        ];
        let name = proptest::option::of(prop_oneof![Just("x"), Just("y"), Just("z")]);
        (0u8..4, membership, name).prop_map(|(user, membership, name)| {
            (user, MemberContent { membership, displayname: name.map(str::to_owned) })
        })
    }

    proptest! {
        #[test]
        fn each_member_in_at_most_one_queue(
            batches in prop::collection::vec(prop::collection::vec(arb_update(), 0..12), 1..6)
        ) {
            let mut table = MembershipTable::new();
            for batch in batches {
                for (user, content) in batch {
                    table.update_member(&format!("@u{user}:hs"), &content);
                }

                let diff = table.drain().unwrap();
                let mut seen = BTreeMap::new();
                for id in diff.added.iter().map(|m| &m.user_id)
                    .chain(diff.renamed.iter().map(|m| &m.user_id))
                    .chain(diff.left.iter().map(|m| &m.user_id))
                {
                    prop_assert!(seen.insert(id.clone(), ()).is_none(), "{} in two queues", id);
                }

                prop_assert!(!table.has_pending());
                prop_assert!(table.drain().unwrap().is_empty());

                // After a drain the roster is exactly the visible members
                // under their current names.
                for record in &table.members {
                    if record.membership().is_visible() {
                        prop_assert_eq!(record.rendered_name(), Some(record.displayname()));
                    } else {
                        prop_assert_eq!(record.rendered_name(), None);
                    }
                }
            }
        }
    }
}
