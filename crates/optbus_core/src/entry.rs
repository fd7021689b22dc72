//! Registry entries and their reentrancy state machine.

use crate::error::{OptError, OptResult};
use crate::hooks::Hooks;
use crate::types::{Attributes, Value, ValueType, WatchPhase};
use crate::watch::Watcher;
use parking_lot::Mutex;
use std::sync::Arc;

/// What an entry is doing right now.
///
/// Public operations may only start from `Idle`; the set pipeline then
/// moves through its phases and returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Not in any operation.
    Idle,
    /// Running the setter.
    InSet,
    /// Running a getter.
    InGet,
    /// Running before-watchers.
    InBeforeWatch,
    /// Running after-watchers.
    InAfterWatch,
    /// Being unregistered.
    InDelete,
}

impl EntryState {
    /// Returns true if `next` is a legal successor of this state.
    #[must_use]
    pub fn can_transition_to(self, next: EntryState) -> bool {
        use EntryState::*;
        matches!(
            (self, next),
            (Idle, InSet)
                | (Idle, InGet)
                | (Idle, InDelete)
                | (InSet, InBeforeWatch)
                | (InSet, InAfterWatch)
                | (InSet, Idle)
                | (InBeforeWatch, InSet)
                | (InAfterWatch, InSet)
                | (InGet, Idle)
        )
    }

    /// Returns true while a set is in flight.
    #[must_use]
    pub fn is_setting(self) -> bool {
        matches!(
            self,
            EntryState::InSet | EntryState::InBeforeWatch | EntryState::InAfterWatch
        )
    }
}

/// Call counters kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryStats {
    /// Number of set calls that passed the type, reentrancy and
    /// permission checks.
    pub set_calls: u64,
    /// Number of get calls.
    pub get_calls: u64,
    /// Number of before-watch callbacks run.
    pub before_watch_calls: u64,
    /// Number of after-watch callbacks run.
    pub after_watch_calls: u64,
}

/// A snapshot of an entry, for diagnostics and iteration.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// Full path.
    pub path: String,
    /// Type from the path tag.
    pub value_type: ValueType,
    /// Capability bits.
    pub attributes: Attributes,
    /// Free-form description given at registration.
    pub description: Option<String>,
    /// Whether a setter is installed.
    pub has_setter: bool,
    /// Whether a getter is installed.
    pub has_getter: bool,
    /// Whether a deleter is installed.
    pub has_deleter: bool,
    /// State at the time of the snapshot.
    pub state: EntryState,
    /// Stored value at the time of the snapshot.
    pub current: Value,
    /// Call counters.
    pub stats: EntryStats,
    /// Number of before-watchers attached.
    pub before_watchers: usize,
    /// Number of after-watchers attached.
    pub after_watchers: usize,
}

pub(crate) struct EntryInner {
    pub(crate) state: EntryState,
    pub(crate) current: Value,
    pub(crate) before: Vec<Arc<Watcher>>,
    pub(crate) after: Vec<Arc<Watcher>>,
    pub(crate) stats: EntryStats,
}

impl EntryInner {
    /// Starts a public operation. Busy entries are reentered only by the
    /// thread holding the registry gate, so a busy state means recursion.
    pub(crate) fn begin(&mut self, path: &str, next: EntryState) -> OptResult<()> {
        match self.state {
            EntryState::Idle => self.advance(next),
            EntryState::InDelete => Err(OptError::not_found(path)),
            _ => Err(OptError::recursive(path)),
        }
    }

    pub(crate) fn advance(&mut self, next: EntryState) -> OptResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(OptError::generic(format!(
                "illegal entry transition {:?} -> {:?}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    pub(crate) fn watchers(&self, phase: WatchPhase) -> &[Arc<Watcher>] {
        match phase {
            WatchPhase::Before => &self.before,
            WatchPhase::After => &self.after,
        }
    }

    pub(crate) fn watchers_mut(&mut self, phase: WatchPhase) -> &mut Vec<Arc<Watcher>> {
        match phase {
            WatchPhase::Before => &mut self.before,
            WatchPhase::After => &mut self.after,
        }
    }
}

pub(crate) struct Entry {
    pub(crate) path: String,
    pub(crate) value_type: ValueType,
    pub(crate) attributes: Attributes,
    pub(crate) description: Option<String>,
    pub(crate) hooks: Hooks,
    pub(crate) inner: Mutex<EntryInner>,
}

impl Entry {
    pub(crate) fn new(
        path: &str,
        value_type: ValueType,
        attributes: Attributes,
        description: Option<String>,
        hooks: Hooks,
    ) -> Self {
        Self {
            path: path.to_string(),
            value_type,
            attributes,
            description,
            hooks,
            inner: Mutex::new(EntryInner {
                state: EntryState::Idle,
                current: value_type.default_value(),
                before: Vec::new(),
                after: Vec::new(),
                stats: EntryStats::default(),
            }),
        }
    }

    pub(crate) fn info(&self) -> EntryInfo {
        let inner = self.inner.lock();
        EntryInfo {
            path: self.path.clone(),
            value_type: self.value_type,
            attributes: self.attributes,
            description: self.description.clone(),
            has_setter: self.hooks.setter.is_some(),
            has_getter: self.hooks.getter.is_some(),
            has_deleter: self.hooks.deleter.is_some(),
            state: inner.state,
            current: inner.current.clone(),
            stats: inner.stats,
            before_watchers: inner.before.len(),
            after_watchers: inner.after.len(),
        }
    }
}
