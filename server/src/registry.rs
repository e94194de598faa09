//! Global table of active matches (§4.4). A plain `Vec` behind one
//! exclusion lock, matching the spec's literal "guarded by one exclusion
//! lock" wording over a concurrent map — list-open order is unspecified
//! and lookups are by id, so a lock-free map buys nothing here.

use crate::errors::RegistryError;
use crate::matchroom::MatchHandle;
use std::sync::Mutex;

struct Entry {
    id: u64,
    handle: MatchHandle,
}

struct Inner {
    entries: Vec<Entry>,
    next_id: u64,
}

pub struct Registry {
    room_limit: Option<usize>,
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new(room_limit: Option<usize>) -> Self {
        Registry {
            room_limit,
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// `register(m)` (§4.4): assigns the next id and links the match in.
    /// Fails without registering if the configured room cap is already
    /// reached.
    pub fn register(&self, handle: MatchHandle) -> Result<u64, RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(limit) = self.room_limit {
            if inner.entries.len() >= limit {
                return Err(RegistryError::RoomLimitReached);
            }
        }
        let id = inner.next_id;
        inner.next_id += 1;
        {
            let mut state = handle.lock();
            state.id = id;
        }
        inner.entries.push(Entry { id, handle });
        Ok(id)
    }

    /// `unregister(m)` (§4.4): unlinks by id.
    pub fn unregister(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.retain(|e| e.id != id);
    }

    pub fn lookup(&self, id: u64) -> Option<MatchHandle> {
        let inner = self.inner.lock().unwrap();
        inner.entries.iter().find(|e| e.id == id).map(|e| e.handle.clone())
    }

    /// `find_open(id)` (§4.4): only matches that still have an empty black
    /// seat and are not finished count as open.
    pub fn find_open(&self, id: u64) -> Option<MatchHandle> {
        let handle = self.lookup(id)?;
        let is_open = {
            let state = handle.lock();
            state.black.is_none() && !state.finished
        };
        is_open.then_some(handle)
    }

    /// Finds the match (if any) with a disconnected seat matching the
    /// reconnection identity `(name, id)` — used by the handshake's
    /// reconnection path (§4.6). Only disconnected seats qualify; a seat
    /// occupied by a live transport cannot be reconnected into.
    pub fn find_reconnectable(&self, name: &str, reconnect_id: &str) -> Option<MatchHandle> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .iter()
            .find(|e| {
                let state = e.handle.lock();
                !state.finished
                    && [&state.white, &state.black].into_iter().flatten().any(|seat| {
                        seat.matches_identity(name, reconnect_id) && seat.status.is_disconnected()
                    })
            })
            .map(|e| e.handle.clone())
    }

    /// `list_open()` (§4.4): `"<id>:<host-name> …"` for every open room, or
    /// the literal `EMPTY` if there are none.
    pub fn list_open(&self) -> String {
        let inner = self.inner.lock().unwrap();
        let mut parts = Vec::new();
        for entry in &inner.entries {
            let state = entry.handle.lock();
            if state.black.is_none() && !state.finished {
                if let Some(host) = state.host_name() {
                    parts.push(format!("{}:{}", entry.id, host));
                }
            }
        }
        if parts.is_empty() {
            "EMPTY".to_string()
        } else {
            parts.join(" ")
        }
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchroom::MatchState;
    use crate::seat::{OutboundHandle, Seat};
    use chrono::Utc;
    use tokio::sync::mpsc;

    fn test_match(name: &str) -> MatchHandle {
        let (tx, _rx) = mpsc::unbounded_channel();
        let seat = Seat::new(name.to_string(), "id".to_string(), OutboundHandle::new(tx), Utc::now());
        MatchHandle::new(MatchState::new(0, seat))
    }

    #[test]
    fn register_assigns_increasing_ids() {
        let registry = Registry::new(None);
        let a = registry.register(test_match("Alice")).unwrap();
        let b = registry.register(test_match("Bob")).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn room_limit_is_enforced() {
        let registry = Registry::new(Some(1));
        registry.register(test_match("Alice")).unwrap();
        assert_eq!(registry.register(test_match("Bob")), Err(RegistryError::RoomLimitReached));
    }

    #[test]
    fn list_open_reports_empty_literal() {
        let registry = Registry::new(None);
        assert_eq!(registry.list_open(), "EMPTY");
    }

    #[test]
    fn list_open_includes_only_unjoined_rooms() {
        let registry = Registry::new(None);
        let id = registry.register(test_match("Alice")).unwrap();
        assert_eq!(registry.list_open(), format!("{id}:Alice"));
    }

    #[test]
    fn find_open_excludes_joined_rooms() {
        let registry = Registry::new(None);
        let handle = test_match("Alice");
        let id = registry.register(handle.clone()).unwrap();
        assert!(registry.find_open(id).is_some());

        let (tx, _rx) = mpsc::unbounded_channel();
        let black = Seat::new("Bob".to_string(), "id-b".to_string(), OutboundHandle::new(tx), Utc::now());
        handle.lock().join(black, Utc::now()).unwrap();
        assert!(registry.find_open(id).is_none());
    }

    #[test]
    fn unregister_removes_the_entry() {
        let registry = Registry::new(None);
        let id = registry.register(test_match("Alice")).unwrap();
        registry.unregister(id);
        assert_eq!(registry.count(), 0);
        assert!(registry.lookup(id).is_none());
    }
}
