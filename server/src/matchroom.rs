//! Per-match state and its lifecycle operations (§4.3). A match is modeled
//! as `Arc<Mutex<MatchState>>`: the `Arc`'s clone count is not the same
//! thing as `refs` (§9's refcount-vs-ownership decision) — `refs` is the
//! logical holder count (seats still claiming the match, plus the
//! watchdog while it runs), tracked explicitly inside the guarded state so
//! destruction happens exactly once, driven by the same lock that guards
//! every other field.

use crate::errors::MatchError;
use crate::seat::{Seat, SeatStatus};
use crate::timer::Timer;
use chess_rules::{Color, Position};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

pub const DEFAULT_TURN_TIMEOUT_SECONDS: i64 = 180;
pub const INITIAL_MOVE_CAPACITY: usize = 8;

pub struct MatchState {
    pub id: u64,
    pub white: Option<Seat>,
    pub black: Option<Seat>,
    pub position: Position,
    pub moves: Vec<String>,
    pub finished: bool,
    pub draw_offered_by: Option<Color>,
    pub timer: Timer,
    pub refs: u32,
}

impl MatchState {
    /// A newly created match starts with the host seated as white, one
    /// holder (the host), and a clock that has not started (the turn clock
    /// only begins once black joins, §4.3 `match_join`).
    pub fn new(id: u64, host: Seat) -> Self {
        MatchState {
            id,
            white: Some(host),
            black: None,
            position: Position::starting(),
            moves: Vec::with_capacity(INITIAL_MOVE_CAPACITY),
            finished: false,
            draw_offered_by: None,
            timer: Timer::new(DEFAULT_TURN_TIMEOUT_SECONDS),
            refs: 1,
        }
    }

    pub fn seat(&self, color: Color) -> &Option<Seat> {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn seat_mut(&mut self, color: Color) -> &mut Option<Seat> {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    pub fn host_name(&self) -> Option<&str> {
        self.white.as_ref().map(|s| s.name.as_str())
    }

    /// `match_join` (§4.3): assigns the opponent seat, starts the clock,
    /// and adds one holder.
    pub fn join(&mut self, black: Seat, now: DateTime<Utc>) -> Result<(), MatchError> {
        if self.finished {
            return Err(MatchError::AlreadyFinished);
        }
        if self.black.is_some() {
            return Err(MatchError::BlackAlreadyPresent);
        }
        self.black = Some(black);
        self.timer.reset_turn(now);
        self.refs += 1;
        Ok(())
    }

    /// `match_append_move` (§4.3). `Vec::push` already doubles its backing
    /// storage on overflow, satisfying the geometric-growth requirement.
    pub fn append_move(&mut self, mv: String) {
        self.moves.push(mv);
    }

    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    /// `match_leave_by_client` (§4.3): a clean, voluntary exit. Clears the
    /// caller's seat and drops one holder. Returns `true` if this was the
    /// last holder, so the caller should destroy the match.
    pub fn leave_by_client(&mut self, color: Color) -> bool {
        *self.seat_mut(color) = None;
        self.release_ref()
    }

    /// `match_release_after_client` (§4.3). Returns `persisted`: `true` if
    /// the seat was preserved, disconnected, for possible reconnection;
    /// `false` if it was cleared because the match had already finished.
    pub fn release_after_client(&mut self, color: Color, now: DateTime<Utc>) -> bool {
        if self.finished {
            self.leave_by_client(color);
            return false;
        }
        if let Some(seat) = self.seat_mut(color) {
            seat.status = SeatStatus::Disconnected { since: now };
        }
        true
    }

    /// Drops one holder, returning `true` iff `refs` reached zero.
    pub fn release_ref(&mut self) -> bool {
        self.refs = self.refs.saturating_sub(1);
        self.refs == 0
    }

    pub fn add_ref(&mut self) {
        self.refs += 1;
    }

    /// `match_try_resume` (§4.5): resumes a paused clock once both seats
    /// have a live transport again.
    pub fn try_resume(&mut self, now: DateTime<Utc>) {
        let both_present = self.white.as_ref().is_some_and(|s| s.status.is_present())
            && self.black.as_ref().is_some_and(|s| s.status.is_present());
        if self.timer.is_paused() && both_present {
            self.timer.resume(now);
        }
    }

    /// `match_get_remaining_time` (§4.5).
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.timer.remaining_seconds(now)
    }

    pub fn history_line(&self) -> String {
        self.moves.join(" ")
    }

    pub fn broadcast(&self, message: crate::protocol::ServerMessage) {
        if let Some(seat) = &self.white {
            seat.send(message.clone());
        }
        if let Some(seat) = &self.black {
            seat.send(message);
        }
    }
}

/// Shared ownership of a match's state, guarded by one lock (the "match
/// lock" of §5's lock-ordering table).
#[derive(Clone)]
pub struct MatchHandle(Arc<Mutex<MatchState>>);

impl MatchHandle {
    pub fn new(state: MatchState) -> Self {
        MatchHandle(Arc::new(Mutex::new(state)))
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, MatchState> {
        self.0.lock().unwrap()
    }

    pub fn id(&self) -> u64 {
        self.lock().id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seat::OutboundHandle;
    use tokio::sync::mpsc;

    fn test_seat(name: &str, id: &str) -> Seat {
        let (tx, _rx) = mpsc::unbounded_channel();
        Seat::new(name.to_string(), id.to_string(), OutboundHandle::new(tx), Utc::now())
    }

    #[test]
    fn join_fails_when_already_occupied() {
        let mut state = MatchState::new(1, test_seat("Alice", "a"));
        state.join(test_seat("Bob", "b"), Utc::now()).unwrap();
        assert_eq!(
            state.join(test_seat("Carol", "c"), Utc::now()),
            Err(MatchError::BlackAlreadyPresent)
        );
    }

    #[test]
    fn join_fails_when_finished() {
        let mut state = MatchState::new(1, test_seat("Alice", "a"));
        state.mark_finished();
        assert_eq!(
            state.join(test_seat("Bob", "b"), Utc::now()),
            Err(MatchError::AlreadyFinished)
        );
    }

    #[test]
    fn leave_by_client_destroys_at_zero_refs() {
        let mut state = MatchState::new(1, test_seat("Alice", "a"));
        assert_eq!(state.refs, 1);
        assert!(state.leave_by_client(Color::White));
        assert_eq!(state.refs, 0);
    }

    #[test]
    fn release_after_client_preserves_seat_mid_game() {
        let mut state = MatchState::new(1, test_seat("Alice", "a"));
        state.join(test_seat("Bob", "b"), Utc::now()).unwrap();
        let persisted = state.release_after_client(Color::White, Utc::now());
        assert!(persisted);
        assert!(state.white.as_ref().unwrap().status.is_disconnected());
        assert_eq!(state.refs, 2);
    }

    #[test]
    fn release_after_client_clears_seat_when_finished() {
        let mut state = MatchState::new(1, test_seat("Alice", "a"));
        state.join(test_seat("Bob", "b"), Utc::now()).unwrap();
        state.mark_finished();
        let persisted = state.release_after_client(Color::White, Utc::now());
        assert!(!persisted);
        assert!(state.white.is_none());
    }

    #[test]
    fn try_resume_only_when_both_present() {
        let mut state = MatchState::new(1, test_seat("Alice", "a"));
        state.join(test_seat("Bob", "b"), Utc::now()).unwrap();
        state.timer.pause(Utc::now());
        state.white.as_mut().unwrap().status = SeatStatus::Disconnected { since: Utc::now() };
        state.try_resume(Utc::now());
        assert!(state.timer.is_paused());
    }
}
