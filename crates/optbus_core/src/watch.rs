//! Watches and the pending-watch lists.

use crate::builtin::SESSION_DONE;
use crate::registry::Registry;
use crate::types::{SessionId, Value, WatchPhase};
use std::cell::Cell;
use std::sync::Arc;

/// Stable identifier of a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

/// Handle returned by [`Registry::watch`], used to remove the watch again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchHandle {
    pub(crate) id: WatchId,
    pub(crate) path: String,
    pub(crate) phase: WatchPhase,
}

impl WatchHandle {
    /// The watch id.
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// The watched path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The phase the watch fires in.
    pub fn phase(&self) -> WatchPhase {
        self.phase
    }
}

/// What a watch callback sees.
pub struct WatchEvent<'a> {
    registry: &'a Registry,
    path: &'a str,
    session: SessionId,
    phase: WatchPhase,
    pending: &'a Value,
    current: &'a Value,
    session_errors: &'a Cell<u32>,
}

impl<'a> WatchEvent<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        path: &'a str,
        session: SessionId,
        phase: WatchPhase,
        pending: &'a Value,
        current: &'a Value,
        session_errors: &'a Cell<u32>,
    ) -> Self {
        Self {
            registry,
            path,
            session,
            phase,
            pending,
            current,
            session_errors,
        }
    }

    /// The registry that owns the entry.
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Path of the entry that changed.
    pub fn path(&self) -> &str {
        self.path
    }

    /// Session of the set, or [`SessionId::NONE`].
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Phase this callback runs in.
    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    /// The proposed value of the set.
    pub fn pending(&self) -> &Value {
        self.pending
    }

    /// The current value. Before-watchers see the old value, after-watchers
    /// the applied one.
    pub fn current(&self) -> &Value {
        self.current
    }

    /// True when this is the commit of a cancelled session.
    pub fn session_cancelled(&self) -> bool {
        self.path == SESSION_DONE && self.pending.as_int().unwrap_or(0) != 0
    }

    /// ORs error bits into the commit result of the session.
    ///
    /// Ignored outside the commit of a real session.
    pub fn report_session_error(&self, bits: u32) {
        if self.session.is_some() && self.path == SESSION_DONE {
            self.session_errors.set(self.session_errors.get() | bits);
        }
    }
}

/// Callback invoked when a watched entry is set.
pub trait WatchCallback: Send + Sync {
    /// Handles one notification.
    fn notify(&self, event: &WatchEvent<'_>);
}

impl<F> WatchCallback for F
where
    F: Fn(&WatchEvent<'_>) + Send + Sync,
{
    fn notify(&self, event: &WatchEvent<'_>) {
        self(event)
    }
}

pub(crate) struct Watcher {
    pub(crate) id: WatchId,
    pub(crate) path: String,
    pub(crate) callback: Arc<dyn WatchCallback>,
}

/// Watches whose entry does not exist yet, one list per phase.
#[derive(Default)]
pub(crate) struct PendingWatches {
    before: Vec<Arc<Watcher>>,
    after: Vec<Arc<Watcher>>,
}

impl PendingWatches {
    pub(crate) fn list(&self, phase: WatchPhase) -> &[Arc<Watcher>] {
        match phase {
            WatchPhase::Before => &self.before,
            WatchPhase::After => &self.after,
        }
    }

    pub(crate) fn list_mut(&mut self, phase: WatchPhase) -> &mut Vec<Arc<Watcher>> {
        match phase {
            WatchPhase::Before => &mut self.before,
            WatchPhase::After => &mut self.after,
        }
    }

    /// Removes and returns the watches for `path`, keeping their order.
    pub(crate) fn take_matching(&mut self, path: &str, phase: WatchPhase) -> Vec<Arc<Watcher>> {
        let list = self.list_mut(phase);
        let mut taken = Vec::new();
        list.retain(|w| {
            if w.path == path {
                taken.push(Arc::clone(w));
                false
            } else {
                true
            }
        });
        taken
    }

    pub(crate) fn remove(&mut self, id: WatchId, phase: WatchPhase) -> bool {
        remove_watcher(self.list_mut(phase), id)
    }
}

pub(crate) fn remove_watcher(list: &mut Vec<Arc<Watcher>>, id: WatchId) -> bool {
    match list.iter().position(|w| w.id == id) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}
