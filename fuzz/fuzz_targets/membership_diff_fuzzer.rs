//! Fuzz target for membership diffing
//!
//! Applies arbitrary member updates to a `MembershipTable`, draining at
//! arbitrary points, and replays every drained diff onto a roster multiset
//! the way a host would.
//!
//! # Invariants
//!
//! - Draining never fails (no illegal render transition is reachable)
//! - Renames and removals only name entries the roster shows
//! - After a drain the roster equals the visible members' display names

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomsync_core::MembershipTable;
use roomsync_proto::{MemberContent, Membership};

#[derive(Debug, Arbitrary)]
enum Step {
    Update { user: u8, membership: MembershipChoice, name: Option<u8> },
    Drain,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum MembershipChoice {
    Join,
    Invite,
    Leave,
    Ban,
    Knock,
    Unknown,
}

impl From<MembershipChoice> for Membership {
    fn from(choice: MembershipChoice) -> Self {
        match choice {
            MembershipChoice::Join => Membership::Join,
            MembershipChoice::Invite => Membership::Invite,
            MembershipChoice::Leave => Membership::Leave,
            MembershipChoice::Ban => Membership::Ban,
            MembershipChoice::Knock => Membership::Knock,
            MembershipChoice::Unknown => Membership::Unknown,
        }
    }
}

fn take_name(roster: &mut Vec<String>, name: &str) {
    let pos = roster.iter().position(|shown| shown == name);
    let pos = pos.unwrap_or_else(|| panic!("{name:?} not in roster {roster:?}"));
    roster.swap_remove(pos);
}

fn drain(table: &mut MembershipTable, roster: &mut Vec<String>) {
    let diff = table.drain().expect("drain hit an illegal transition");
    for added in diff.added {
        roster.push(added.display_name);
    }
    for renamed in diff.renamed {
        take_name(roster, &renamed.old_name);
        roster.push(renamed.new_name);
    }
    for departed in diff.left {
        take_name(roster, &departed.rendered_name);
    }

    let mut shown = roster.clone();
    shown.sort();
    let mut expected: Vec<String> = table
        .active_members(true)
        .map(|member| member.displayname().to_owned())
        .collect();
    expected.sort();
    assert_eq!(shown, expected);
}

fuzz_target!(|steps: Vec<Step>| {
    let mut table = MembershipTable::new();
    let mut roster = Vec::new();

    for step in steps {
        match step {
            Step::Update { user, membership, name } => {
                let content = MemberContent {
                    membership: membership.into(),
                    displayname: name.map(|n| format!("name{}", n % 4)),
                };
                table.update_member(&format!("@u{}:fuzz", user % 8), &content);
            },
            Step::Drain => drain(&mut table, &mut roster),
        }
    }
    drain(&mut table, &mut roster);
});
