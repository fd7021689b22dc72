//! Sessions group a run of sets under one completion notification.

use crate::builtin::{SESSION_DONE, SESSION_START};
use crate::error::OptResult;
use crate::registry::Registry;
use crate::types::{SessionId, Value};
use tracing::warn;

impl Registry {
    /// Starts a session and announces it on the session-start entry.
    pub fn session_start(&self) -> SessionId {
        let id = {
            let mut last = self.last_session.lock();
            *last = last.next();
            *last
        };
        if let Err(err) = self.set_in(id, SESSION_START, Value::Int(0)) {
            warn!("Session {} start notification failed: {}", id, err);
        }
        id
    }

    /// Commits a session.
    ///
    /// Watchers of the session-done entry see the cancel flag as the
    /// pending value and may report error bits; the union of those bits
    /// is returned.
    pub fn session_commit(&self, session: SessionId, cancelled: bool) -> OptResult<u32> {
        let entry = self.lookup(SESSION_DONE)?;
        let (_, bits) = self.set_entry(session, &entry, Value::Int(i64::from(cancelled)))?;
        Ok(bits)
    }
}

#[cfg(test)]
mod tests {
    use crate::types::WatchPhase;
    use crate::{Registry, SessionId};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn session_ids_increase_and_are_never_zero() {
        let registry = Registry::new();
        let a = registry.session_start();
        let b = registry.session_start();
        assert!(a.is_some());
        assert!(b > a);
    }

    #[test]
    fn session_ids_wrap_past_zero() {
        let registry = Registry::new();
        *registry.last_session.lock() = SessionId::new(u32::MAX);
        assert_eq!(registry.session_start(), SessionId::new(1));
    }

    #[test]
    fn commit_aggregates_watcher_bits() {
        let registry = Registry::new();
        registry
            .watch(super::SESSION_DONE, WatchPhase::After, |event| {
                event.report_session_error(0b01)
            })
            .unwrap();
        registry
            .watch(super::SESSION_DONE, WatchPhase::After, |event| {
                event.report_session_error(0b10)
            })
            .unwrap();

        let session = registry.session_start();
        assert_eq!(registry.session_commit(session, false).unwrap(), 0b11);
    }

    #[test]
    fn bits_outside_a_session_are_ignored() {
        let registry = Registry::new();
        registry
            .watch(super::SESSION_DONE, WatchPhase::After, |event| {
                event.report_session_error(0x4)
            })
            .unwrap();
        assert_eq!(
            registry.session_commit(SessionId::NONE, false).unwrap(),
            0
        );
    }

    #[test]
    fn watchers_see_session_and_cancel_flag() {
        let registry = Registry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        registry
            .watch(super::SESSION_DONE, WatchPhase::Before, move |event| {
                log.lock().push((event.session(), event.session_cancelled()));
            })
            .unwrap();

        let first = registry.session_start();
        registry.session_commit(first, true).unwrap();
        let second = registry.session_start();
        registry.session_commit(second, false).unwrap();

        assert_eq!(*seen.lock(), vec![(first, true), (second, false)]);
    }

    #[test]
    fn start_is_announced_with_the_new_id() {
        let registry = Registry::new();
        let started = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&started);
        registry
            .watch(super::SESSION_START, WatchPhase::After, move |event| {
                *slot.lock() = Some(event.session());
            })
            .unwrap();
        let id = registry.session_start();
        assert_eq!(*started.lock(), Some(id));
    }
}
