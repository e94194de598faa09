//! Global admission cap for concurrent sessions (§4.7). A single counter
//! behind an exclusion lock; admission is an atomic test-and-increment
//! against the configured maximum.

use crate::errors::AdmissionError;
use std::sync::Mutex;

pub struct PlayerCounter {
    limit: Option<usize>,
    count: Mutex<usize>,
}

impl PlayerCounter {
    pub fn new(limit: Option<usize>) -> Self {
        PlayerCounter {
            limit,
            count: Mutex::new(0),
        }
    }

    /// Attempts to admit one more player. Fails without mutating state if
    /// the configured maximum is already reached.
    pub fn try_admit(&self) -> Result<(), AdmissionError> {
        let mut count = self.count.lock().unwrap();
        if let Some(limit) = self.limit {
            if *count >= limit {
                return Err(AdmissionError::PlayerLimitReached);
            }
        }
        *count += 1;
        Ok(())
    }

    /// Releases one admitted slot. Safe against underflow: releasing more
    /// than was admitted saturates at zero rather than panicking, since a
    /// double-release is a caller bug we'd rather tolerate than crash on.
    pub fn release(&self) {
        let mut count = self.count.lock().unwrap();
        *count = count.saturating_sub(1);
    }

    pub fn current(&self) -> usize {
        *self.count.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_until_limit_then_rejects() {
        let counter = PlayerCounter::new(Some(2));
        assert!(counter.try_admit().is_ok());
        assert!(counter.try_admit().is_ok());
        assert!(counter.try_admit().is_err());
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn unlimited_never_rejects() {
        let counter = PlayerCounter::new(None);
        for _ in 0..1000 {
            assert!(counter.try_admit().is_ok());
        }
    }

    #[test]
    fn release_does_not_underflow() {
        let counter = PlayerCounter::new(Some(1));
        counter.release();
        counter.release();
        assert_eq!(counter.current(), 0);
        assert!(counter.try_admit().is_ok());
    }
}
