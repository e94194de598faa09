//! A seat is a slot in a match (white or black) that points to a session's
//! outbound transport without owning its lifetime (§9 "Seat vs session").
//! Decoupling status this way avoids the "socket sentinel" race the design
//! notes call out: a seat is explicitly `Present`, `Disconnected`, or
//! `Forfeited` rather than inferring liveness from a nullable socket.

use crate::protocol::ServerMessage;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// A handle to a connection's writer task. Sending never blocks the match
/// lock: a full or closed channel just drops the message, matching how a
/// SIGPIPE-safe write would fail silently from the match handler's point of
/// view (the reader task on the other end will independently notice the
/// disconnect).
#[derive(Clone, Debug)]
pub struct OutboundHandle {
    sender: mpsc::UnboundedSender<String>,
}

impl OutboundHandle {
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        OutboundHandle { sender }
    }

    pub fn send(&self, message: ServerMessage) {
        let _ = self.sender.send(message.to_string());
    }

    /// Sends a raw, pre-formatted line — used for ack codes (§4.2), which
    /// are bare two-digit numbers and not a `ServerMessage` variant.
    pub fn send_raw(&self, line: String) {
        let _ = self.sender.send(line);
    }
}

#[derive(Clone, Debug)]
pub enum SeatStatus {
    Present(OutboundHandle),
    Disconnected { since: DateTime<Utc> },
    Forfeited,
}

impl SeatStatus {
    pub fn is_present(&self) -> bool {
        matches!(self, SeatStatus::Present(_))
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, SeatStatus::Disconnected { .. })
    }
}

/// A match's view of one participant: reconnection identity, liveness, and
/// the protocol-error budget (§3's `Session` fields that are match-scoped).
#[derive(Clone, Debug)]
pub struct Seat {
    pub name: String,
    pub id: String,
    pub status: SeatStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub error_count: u32,
    /// Whether this seat still occupies a global admission slot. Cleared
    /// exactly once, whichever of {graceful exit, forfeit} happens first,
    /// so the player counter is never decremented twice for one seat.
    pub is_counted: bool,
}

impl Seat {
    pub fn new(name: String, id: String, outbound: OutboundHandle, now: DateTime<Utc>) -> Self {
        Seat {
            name,
            id,
            status: SeatStatus::Present(outbound),
            last_heartbeat: now,
            error_count: 0,
            is_counted: true,
        }
    }

    /// Releases this seat's admission slot, if it still holds one.
    pub fn release_count(&mut self, counter: &crate::counter::PlayerCounter) {
        if self.is_counted {
            self.is_counted = false;
            counter.release();
        }
    }

    /// Whether `(name, id)` names this seat, the reconnection key (§9).
    pub fn matches_identity(&self, name: &str, id: &str) -> bool {
        self.name == name && self.id == id
    }

    pub fn send(&self, message: ServerMessage) {
        if let SeatStatus::Present(handle) = &self.status {
            handle.send(message);
        }
    }

    /// Re-attaches a live transport to a reconnecting seat.
    pub fn reconnect(&mut self, outbound: OutboundHandle, now: DateTime<Utc>) {
        self.status = SeatStatus::Present(outbound);
        self.last_heartbeat = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_match_is_exact() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let seat = Seat::new("Bob".to_string(), "id-b".to_string(), OutboundHandle::new(tx), Utc::now());
        assert!(seat.matches_identity("Bob", "id-b"));
        assert!(!seat.matches_identity("Bob", "id-x"));
        assert!(!seat.matches_identity("Alice", "id-b"));
    }

    #[test]
    fn sending_to_disconnected_seat_is_a_noop() {
        let mut seat = {
            let (tx, _rx) = mpsc::unbounded_channel();
            Seat::new("Bob".to_string(), "id-b".to_string(), OutboundHandle::new(tx), Utc::now())
        };
        seat.status = SeatStatus::Disconnected { since: Utc::now() };
        seat.send(ServerMessage::Pong);
    }
}
