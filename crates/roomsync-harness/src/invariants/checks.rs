//! Standard invariant checks.

use roomsync_client::RequestKind;

use super::{Invariant, InvariantResult, SystemSnapshot};

/// At most one send or upload per room, and it is really outstanding.
///
/// Every active queue handle must be pending at the server as a send or an
/// upload, and the server holds no transfer that no queue is waiting on.
pub struct SingleFlight;

impl Invariant for SingleFlight {
    fn name(&self) -> &'static str {
        "SingleFlight"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let transfers = state
            .outstanding
            .iter()
            .filter(|(_, kind)| matches!(kind, RequestKind::SendEvent | RequestKind::Upload))
            .count();

        let mut active = 0;
        for room in &state.rooms {
            let Some(handle) = room.active_handle else {
                continue;
            };
            active += 1;

            let outstanding = state.outstanding.iter().find(|(pending, _)| *pending == handle);
            match outstanding {
                Some((_, RequestKind::SendEvent | RequestKind::Upload)) => {},
                Some((_, kind)) => {
                    return Err(self.violation(format!(
                        "room {}: active {handle} is a {kind:?} request",
                        room.room_id
                    )));
                },
                None => {
                    return Err(self.violation(format!(
                        "room {}: active {handle} is not outstanding",
                        room.room_id
                    )));
                },
            }

            if room.queue_len == 0 {
                return Err(self.violation(format!(
                    "room {}: {handle} active with an empty queue",
                    room.room_id
                )));
            }
        }

        if transfers != active {
            return Err(self.violation(format!(
                "{transfers} transfers outstanding for {active} active sends"
            )));
        }
        Ok(())
    }
}

/// The host roster shows exactly the names the client announced.
pub struct RosterMatchesAnnounced;

impl Invariant for RosterMatchesAnnounced {
    fn name(&self) -> &'static str {
        "RosterMatchesAnnounced"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            let Some(roster) = &room.host_roster else {
                return Err(self.violation(format!("room {}: no host conversation", room.room_id)));
            };
            if *roster != room.announced {
                return Err(self.violation(format!(
                    "room {}: host shows {:?}, client announced {:?}",
                    room.room_id, roster, room.announced
                )));
            }
        }
        Ok(())
    }
}

/// Server echoes of our own sends are never shown as received messages.
pub struct NoEchoDelivered;

impl Invariant for NoEchoDelivered {
    fn name(&self) -> &'static str {
        "NoEchoDelivered"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            let echo = room
                .received
                .iter()
                .find(|(sender, body)| *sender == room.own_name && room.echoed_bodies.contains(body));
            if let Some((_, body)) = echo {
                return Err(self.violation(format!(
                    "room {}: own message {body:?} delivered as received",
                    room.room_id
                )));
            }
        }
        Ok(())
    }
}

/// Client and server agree on how many requests are in flight.
///
/// A mismatch means a completion was lost or a cancelled request is still
/// tracked.
pub struct RequestsAccounted;

impl Invariant for RequestsAccounted {
    fn name(&self) -> &'static str {
        "RequestsAccounted"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if state.client_in_flight != state.outstanding.len() {
            return Err(self.violation(format!(
                "client tracks {} requests, server holds {}",
                state.client_in_flight,
                state.outstanding.len()
            )));
        }
        Ok(())
    }
}
