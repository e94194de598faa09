//! Per-match periodic task enforcing the turn clock, heartbeat-based
//! zombie detection, the disconnect grace period, and final forfeit
//! (§4.5). One task per match, holding one ref for as long as it runs.

use crate::counter::PlayerCounter;
use crate::matchroom::MatchHandle;
use crate::protocol::ServerMessage;
use crate::registry::Registry;
use chess_rules::Color;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;

pub const HEARTBEAT_TIMEOUT_SECONDS: i64 = 15;
pub const DISCONNECT_GRACE_PERIOD_SECONDS: i64 = 3;
pub const DISCONNECT_TIMEOUT_SECONDS: i64 = 60;
const TICK_PERIOD: StdDuration = StdDuration::from_secs(1);

/// Spawns the watchdog task for `handle`. Returns the `JoinHandle` so the
/// creator can decide whether to treat a spawn failure as "the creator is
/// the only holder" (§4.3) — in practice `tokio::spawn` only fails to
/// schedule under runtime shutdown, but the caller still owns that call.
pub fn spawn_watchdog(
    handle: MatchHandle,
    registry: Arc<Registry>,
    counter: Arc<PlayerCounter>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_PERIOD);
        loop {
            interval.tick().await;
            if tick(&handle, &registry, &counter) {
                break;
            }
        }
    })
}

/// Runs one watchdog tick. Returns `true` once the match has been
/// destroyed and the task should stop.
fn tick(handle: &MatchHandle, registry: &Registry, counter: &PlayerCounter) -> bool {
    let now = Utc::now();
    let mut state = handle.lock();

    if state.finished {
        let destroyed = state.release_ref();
        if destroyed {
            let id = state.id;
            drop(state);
            registry.unregister(id);
        }
        return destroyed;
    }

    check_turn_timeout(&mut state, now);
    if state.finished {
        // Let the next tick perform the ref release and possible
        // destruction, mirroring step 2's "continue to let the next tick
        // perform destruction."
        return false;
    }

    zombie_check(&mut state, now);
    grace_to_pause(&mut state, now);
    final_disconnect(&mut state, now, counter);

    false
}

fn check_turn_timeout(state: &mut crate::matchroom::MatchState, now: DateTime<Utc>) {
    if state.timer.has_timed_out(now) {
        state.mark_finished();
        let mover = state.position.turn;
        if let Some(seat) = state.seat(mover) {
            seat.send(ServerMessage::Timeout);
        }
        if let Some(seat) = state.seat(mover.opposite()) {
            seat.send(ServerMessage::OppTimeout);
        }
    }
}

fn zombie_check(state: &mut crate::matchroom::MatchState, now: DateTime<Utc>) {
    for color in [Color::White, Color::Black] {
        if let Some(seat) = state.seat_mut(color) {
            if seat.status.is_present()
                && (now - seat.last_heartbeat).num_seconds() > HEARTBEAT_TIMEOUT_SECONDS
            {
                seat.status = crate::seat::SeatStatus::Disconnected { since: now };
            }
        }
    }
}

fn grace_to_pause(state: &mut crate::matchroom::MatchState, now: DateTime<Utc>) {
    let any_disconnected_past_grace = [Color::White, Color::Black].into_iter().any(|color| {
        matches!(
            state.seat(color),
            Some(seat) if matches!(seat.status, crate::seat::SeatStatus::Disconnected { since }
                if (now - since).num_seconds() > DISCONNECT_GRACE_PERIOD_SECONDS)
        )
    });
    if any_disconnected_past_grace && !state.timer.is_paused() {
        state.timer.pause(now);
        for color in [Color::White, Color::Black] {
            if let Some(seat) = state.seat(color) {
                if seat.status.is_present() {
                    seat.send(ServerMessage::WaitConn);
                }
            }
        }
    }
}

fn final_disconnect(state: &mut crate::matchroom::MatchState, now: DateTime<Utc>, counter: &PlayerCounter) {
    for color in [Color::White, Color::Black] {
        let timed_out = matches!(
            state.seat(color),
            Some(seat) if matches!(seat.status, crate::seat::SeatStatus::Disconnected { since }
                if (now - since).num_seconds() > DISCONNECT_TIMEOUT_SECONDS)
        );
        if !timed_out {
            continue;
        }
        state.mark_finished();
        if let Some(seat) = state.seat(color.opposite()) {
            seat.send(ServerMessage::OppExit);
        }
        if let Some(seat) = state.seat_mut(color) {
            seat.release_count(counter);
            seat.status = crate::seat::SeatStatus::Forfeited;
        }
        state.release_ref();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchroom::MatchState;
    use crate::seat::{OutboundHandle, Seat, SeatStatus};
    use chrono::Duration;
    use tokio::sync::mpsc;

    fn test_seat(name: &str) -> Seat {
        let (tx, _rx) = mpsc::unbounded_channel();
        Seat::new(name.to_string(), "id".to_string(), OutboundHandle::new(tx), Utc::now())
    }

    #[test]
    fn turn_timeout_finishes_the_match() {
        let mut state = MatchState::new(1, test_seat("Alice"));
        state.join(test_seat("Bob"), Utc::now() - Duration::seconds(200)).unwrap();
        let now = Utc::now();
        check_turn_timeout(&mut state, now);
        assert!(state.finished);
    }

    #[test]
    fn zombie_check_marks_seat_disconnected() {
        let mut state = MatchState::new(1, test_seat("Alice"));
        state.white.as_mut().unwrap().last_heartbeat = Utc::now() - Duration::seconds(20);
        zombie_check(&mut state, Utc::now());
        assert!(state.white.as_ref().unwrap().status.is_disconnected());
    }

    #[test]
    fn grace_to_pause_only_after_grace_window() {
        let mut state = MatchState::new(1, test_seat("Alice"));
        state.join(test_seat("Bob"), Utc::now()).unwrap();
        state.white.as_mut().unwrap().status = SeatStatus::Disconnected { since: Utc::now() };
        grace_to_pause(&mut state, Utc::now());
        assert!(!state.timer.is_paused());

        state.white.as_mut().unwrap().status =
            SeatStatus::Disconnected { since: Utc::now() - Duration::seconds(10) };
        grace_to_pause(&mut state, Utc::now());
        assert!(state.timer.is_paused());
    }

    #[test]
    fn final_disconnect_forfeits_and_releases_counter() {
        let counter = PlayerCounter::new(None);
        counter.try_admit().unwrap();
        let mut state = MatchState::new(1, test_seat("Alice"));
        state.join(test_seat("Bob"), Utc::now()).unwrap();
        state.white.as_mut().unwrap().status =
            SeatStatus::Disconnected { since: Utc::now() - Duration::seconds(61) };
        final_disconnect(&mut state, Utc::now(), &counter);
        assert!(state.finished);
        assert!(matches!(state.white.as_ref().unwrap().status, SeatStatus::Forfeited));
        assert_eq!(counter.current(), 0);
    }
}
