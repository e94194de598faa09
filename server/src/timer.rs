//! The turn clock for a single match. Unlike a classical two-budget chess
//! clock, each match has one shared timeout per turn (§3, §4.5 of the
//! design): the side to move has `turn_timeout_seconds` to play before the
//! watchdog forfeits it, and the clock pauses wholesale (rather than
//! crediting time to either side) while a seat is disconnected.

use chrono::{DateTime, Duration, Utc};

#[derive(Clone, Debug)]
pub struct Timer {
    turn_timeout: Duration,
    /// Wall-clock at which the current turn started. `None` means paused.
    last_move_time: Option<DateTime<Utc>>,
    /// Seconds already consumed on the current turn, frozen while paused.
    elapsed_at_pause: Duration,
}

impl Timer {
    pub fn new(turn_timeout_seconds: i64) -> Self {
        Timer {
            turn_timeout: Duration::seconds(turn_timeout_seconds),
            last_move_time: None,
            elapsed_at_pause: Duration::zero(),
        }
    }

    /// Starts (or restarts, on the next turn) the clock at `now`.
    pub fn reset_turn(&mut self, now: DateTime<Utc>) {
        self.last_move_time = Some(now);
        self.elapsed_at_pause = Duration::zero();
    }

    pub fn is_paused(&self) -> bool {
        self.last_move_time.is_none()
    }

    /// Freezes the clock, recording how much of the turn has been used so
    /// far. A no-op if already paused.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if let Some(started) = self.last_move_time.take() {
            self.elapsed_at_pause = now - started;
        }
    }

    /// Resumes a paused clock, crediting back the time already spent on
    /// this turn before the pause. A no-op if not paused.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.last_move_time.is_none() {
            self.last_move_time = Some(now - self.elapsed_at_pause);
            self.elapsed_at_pause = Duration::zero();
        }
    }

    /// Elapsed time on the current turn: time since `last_move_time` while
    /// running, or the frozen `elapsed_at_pause` while paused.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.last_move_time {
            Some(started) => now - started,
            None => self.elapsed_at_pause,
        }
    }

    pub fn has_timed_out(&self, now: DateTime<Utc>) -> bool {
        !self.is_paused() && self.elapsed(now) >= self.turn_timeout
    }

    /// Seconds remaining before forfeit, floored at zero.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.turn_timeout - self.elapsed(now)).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_timer_is_paused() {
        let timer = Timer::new(180);
        assert!(timer.is_paused());
        assert_eq!(timer.remaining_seconds(Utc::now()), 180);
    }

    #[test]
    fn reset_then_elapsed_tracks_wall_clock() {
        let mut timer = Timer::new(180);
        let now = Utc::now();
        timer.reset_turn(now);
        let later = now + Duration::seconds(30);
        assert_eq!(timer.elapsed(later), Duration::seconds(30));
        assert_eq!(timer.remaining_seconds(later), 150);
        assert!(!timer.has_timed_out(later));
    }

    #[test]
    fn timeout_fires_at_exact_budget() {
        let mut timer = Timer::new(180);
        let now = Utc::now();
        timer.reset_turn(now);
        let later = now + Duration::seconds(180);
        assert!(timer.has_timed_out(later));
    }

    #[test]
    fn pause_then_resume_preserves_elapsed_time() {
        let mut timer = Timer::new(180);
        let now = Utc::now();
        timer.reset_turn(now);
        let pause_at = now + Duration::seconds(40);
        timer.pause(pause_at);
        assert!(timer.is_paused());
        assert_eq!(timer.elapsed(pause_at + Duration::seconds(1000)), Duration::seconds(40));

        let resume_at = pause_at + Duration::seconds(500);
        timer.resume(resume_at);
        assert!(!timer.is_paused());
        assert_eq!(timer.elapsed(resume_at), Duration::seconds(40));
        assert_eq!(timer.remaining_seconds(resume_at), 140);
    }

    #[test]
    fn pause_is_a_noop_when_already_paused() {
        let mut timer = Timer::new(180);
        timer.pause(Utc::now());
        assert!(timer.is_paused());
        assert_eq!(timer.elapsed_at_pause, Duration::zero());
    }
}
