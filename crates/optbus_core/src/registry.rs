//! The entry registry.

use crate::builtin;
use crate::entry::{Entry, EntryInfo, EntryState};
use crate::error::{OptError, OptResult};
use crate::hooks::{GetContext, Hooks, SetContext, SetOutcome};
use crate::types::{Attributes, SessionId, Value, ValueType, WatchPhase};
use crate::watch::{
    remove_watcher, PendingWatches, WatchCallback, WatchEvent, WatchHandle, WatchId, Watcher,
};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Result of a set that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStatus {
    /// The pipeline ran to completion.
    Applied,
    /// The setter asked to skip; after-watchers did not run.
    Skipped,
}

/// A process-local store of typed, path-addressed entries.
///
/// Every entry carries optional hooks and two watcher lists. Watches may
/// be added before their entry exists; they wait in a pending list and
/// attach when the entry is registered.
///
/// # Example
///
/// ```
/// use optbus_core::{Registry, WatchPhase};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let registry = Registry::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// registry
///     .watch("s:/net/addr", WatchPhase::After, move |_event| {
///         counter.fetch_add(1, Ordering::SeqCst);
///     })
///     .unwrap();
///
/// registry.register_default("s:/net/addr").unwrap();
/// registry.set_str("s:/net/addr", "10.0.0.1").unwrap();
///
/// assert_eq!(registry.get_str("s:/net/addr").unwrap(), "10.0.0.1");
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
pub struct Registry {
    /// Serializes set, get and delete pipelines across threads. The thread
    /// holding it may reenter other entries from hooks and watchers.
    gate: ReentrantMutex<()>,
    entries: RwLock<BTreeMap<String, Arc<Entry>>>,
    pending: RwLock<PendingWatches>,
    next_watch: AtomicU64,
    pub(crate) last_session: Mutex<SessionId>,
}

impl Registry {
    /// Creates a registry holding only the built-in entries.
    pub fn new() -> Self {
        let registry = Self {
            gate: ReentrantMutex::new(()),
            entries: RwLock::new(BTreeMap::new()),
            pending: RwLock::new(PendingWatches::default()),
            next_watch: AtomicU64::new(1),
            last_session: Mutex::new(SessionId::NONE),
        };
        builtin::install(&registry);
        registry
    }

    /// Registers an entry.
    ///
    /// Registering an existing path again with the same attributes and
    /// clones of the same [`Hooks`] returns the existing entry. Anything
    /// else fails with [`OptError::AlreadyExists`].
    pub fn register(&self, path: &str, attributes: Attributes, hooks: Hooks) -> OptResult<EntryInfo> {
        self.register_described(path, None, attributes, hooks)
    }

    /// Registers an entry with default attributes and no hooks.
    pub fn register_default(&self, path: &str) -> OptResult<EntryInfo> {
        self.register(path, Attributes::default(), Hooks::new())
    }

    /// Registers an entry with a description shown in diagnostics.
    pub fn register_described(
        &self,
        path: &str,
        description: Option<&str>,
        attributes: Attributes,
        hooks: Hooks,
    ) -> OptResult<EntryInfo> {
        let value_type = ValueType::from_path(path)?;
        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(path) {
            let reusable = existing.attributes == attributes
                && !attributes.contains(Attributes::REGISTER_ONCE)
                && existing.hooks.same_as(&hooks);
            if reusable {
                let existing = Arc::clone(existing);
                drop(entries);
                debug!("Reusing entry {}", path);
                return Ok(existing.info());
            }
            warn!("Refusing duplicate registration of {}", path);
            return Err(OptError::already_exists(path));
        }

        let entry = Entry::new(
            path,
            value_type,
            attributes,
            description.map(str::to_string),
            hooks,
        );
        let entry = self.attach(&mut entries, entry);
        drop(entries);

        debug!("Registered {}", path);
        Ok(entry.info())
    }

    /// Inserts a new entry and adopts its pending watches.
    pub(crate) fn attach(
        &self,
        entries: &mut BTreeMap<String, Arc<Entry>>,
        entry: Entry,
    ) -> Arc<Entry> {
        if entry.attributes.contains(Attributes::CAN_WATCH) {
            let mut pending = self.pending.write();
            let mut inner = entry.inner.lock();
            inner.before = pending.take_matching(&entry.path, WatchPhase::Before);
            inner.after = pending.take_matching(&entry.path, WatchPhase::After);
        }
        let entry = Arc::new(entry);
        entries.insert(entry.path.clone(), Arc::clone(&entry));
        entry
    }

    pub(crate) fn insert_builtin(
        &self,
        path: &str,
        value_type: ValueType,
        description: &str,
        hooks: Hooks,
    ) {
        let entry = Entry::new(
            path,
            value_type,
            Attributes::default(),
            Some(description.to_string()),
            hooks,
        );
        let mut entries = self.entries.write();
        self.attach(&mut entries, entry);
    }

    /// Removes an entry.
    ///
    /// Its watches go back to the pending lists, so registering the path
    /// again reconnects them. The deleter runs after removal.
    pub fn unregister(&self, path: &str) -> OptResult<()> {
        let entry = self.lookup(path)?;
        let _gate = self.gate.lock();
        entry.inner.lock().begin(path, EntryState::InDelete)?;

        let last_value = {
            let mut entries = self.entries.write();
            if entries
                .get(path)
                .is_some_and(|current| Arc::ptr_eq(current, &entry))
            {
                entries.remove(path);
            }
            let mut pending = self.pending.write();
            let mut inner = entry.inner.lock();
            pending.list_mut(WatchPhase::Before).append(&mut inner.before);
            pending.list_mut(WatchPhase::After).append(&mut inner.after);
            inner.current.clone()
        };

        if let Some(deleter) = &entry.hooks.deleter {
            deleter.delete(path, &last_value);
        }
        debug!("Unregistered {}", path);
        Ok(())
    }

    /// Returns true if an entry with this path exists.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.read().contains_key(path)
    }

    /// Number of registered entries, built-ins included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no entry is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns the type of a registered entry.
    pub fn value_type(&self, path: &str) -> OptResult<ValueType> {
        Ok(self.lookup(path)?.value_type)
    }

    /// Returns a diagnostic snapshot of an entry.
    pub fn entry_info(&self, path: &str) -> OptResult<EntryInfo> {
        Ok(self.lookup(path)?.info())
    }

    /// All registered paths in order.
    pub fn paths(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Calls `f` for every entry matching `pattern`, in path order.
    ///
    /// `None` and `"*"` match everything, a trailing `*` matches by
    /// prefix, anything else must match exactly. No lock is held while
    /// `f` runs.
    pub fn for_each<F>(&self, pattern: Option<&str>, mut f: F)
    where
        F: FnMut(&EntryInfo),
    {
        let matching: Vec<Arc<Entry>> = self
            .entries
            .read()
            .values()
            .filter(|entry| matches_pattern(pattern, &entry.path))
            .cloned()
            .collect();
        for entry in matching {
            f(&entry.info());
        }
    }

    pub(crate) fn lookup(&self, path: &str) -> OptResult<Arc<Entry>> {
        self.entries
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| OptError::not_found(path))
    }

    // ------------------------------------------------------------------
    // Set
    // ------------------------------------------------------------------

    /// Sets a value outside any session.
    pub fn set(&self, path: &str, value: Value) -> OptResult<SetStatus> {
        self.set_in(SessionId::NONE, path, value)
    }

    /// Sets a value as part of a session.
    pub fn set_in(&self, session: SessionId, path: &str, value: Value) -> OptResult<SetStatus> {
        let entry = self.lookup(path)?;
        self.set_entry(session, &entry, value)
            .map(|(status, _)| status)
    }

    /// Sets an int, bool or event entry.
    pub fn set_int(&self, path: &str, value: i64) -> OptResult<SetStatus> {
        self.set(path, Value::Int(value))
    }

    /// Sets a bool entry.
    pub fn set_bool(&self, path: &str, value: bool) -> OptResult<SetStatus> {
        self.set(path, Value::from(value))
    }

    /// Sets a string entry.
    pub fn set_str(&self, path: &str, value: impl Into<String>) -> OptResult<SetStatus> {
        self.set(path, Value::Str(value.into()))
    }

    /// Sets a blob entry.
    pub fn set_blob(&self, path: &str, value: impl Into<Vec<u8>>) -> OptResult<SetStatus> {
        self.set(path, Value::Blob(value.into()))
    }

    /// Sets a pointer entry.
    pub fn set_pointer(&self, path: &str, value: usize) -> OptResult<SetStatus> {
        self.set(path, Value::Pointer(value))
    }

    /// Sets an array entry.
    pub fn set_array(&self, path: &str, value: Vec<String>) -> OptResult<SetStatus> {
        self.set(path, Value::Array(value))
    }

    /// Fires an event entry. Its value becomes the number of times it fired.
    pub fn fire_event(&self, path: &str) -> OptResult<SetStatus> {
        let entry = self.lookup(path)?;
        if entry.value_type != ValueType::Event {
            return Err(OptError::bad_type(format!("{path} is not an event")));
        }
        self.set_entry(SessionId::NONE, &entry, Value::Int(1))
            .map(|(status, _)| status)
    }

    /// Runs the set pipeline and returns the session error bits reported
    /// by watchers.
    pub(crate) fn set_entry(
        &self,
        session: SessionId,
        entry: &Entry,
        value: Value,
    ) -> OptResult<(SetStatus, u32)> {
        if !entry.value_type.accepts(&value) {
            return Err(OptError::bad_type(format!(
                "{} holds {} values, got {}",
                entry.path,
                entry.value_type,
                value.kind()
            )));
        }

        let _gate = self.gate.lock();
        {
            let mut inner = entry.inner.lock();
            inner.begin(&entry.path, EntryState::InSet)?;
            if !entry.attributes.contains(Attributes::CAN_SET) && inner.stats.set_calls > 0 {
                inner.advance(EntryState::Idle)?;
                return Err(OptError::forbidden(format!(
                    "{} may only be set once",
                    entry.path
                )));
            }
            inner.stats.set_calls += 1;
        }

        let session_errors = Cell::new(0);
        let result = self.apply(session, entry, &value, &session_errors);
        entry.inner.lock().state = EntryState::Idle;

        result.map(|status| (status, session_errors.get()))
    }

    fn apply(
        &self,
        session: SessionId,
        entry: &Entry,
        value: &Value,
        session_errors: &Cell<u32>,
    ) -> OptResult<SetStatus> {
        self.run_watchers(session, entry, WatchPhase::Before, value, session_errors)?;

        let mut failure = None;
        if entry.value_type == ValueType::Event {
            let mut inner = entry.inner.lock();
            let fired = i64::try_from(inner.stats.set_calls).unwrap_or(i64::MAX);
            inner.current = Value::Int(fired);
        } else {
            match &entry.hooks.setter {
                None => entry.inner.lock().current = value.clone(),
                Some(setter) => {
                    let current = entry.inner.lock().current.clone();
                    let mut ctx = SetContext::new(self, &entry.path, session, value, &current);
                    match setter.set(&mut ctx) {
                        Ok(SetOutcome::Handled) => {
                            if let Some(replacement) = ctx.into_replacement() {
                                entry.inner.lock().current = replacement;
                            }
                        }
                        Ok(SetOutcome::UseDefault) => entry.inner.lock().current = value.clone(),
                        Ok(SetOutcome::Skip) => {
                            debug!("Setter skipped {}", entry.path);
                            return Ok(SetStatus::Skipped);
                        }
                        Err(err) => {
                            error!("Set failed for {}: {}", entry.path, err);
                            failure = Some(err);
                        }
                    }
                }
            }
            if entry.value_type == ValueType::Bool && failure.is_none() {
                entry.inner.lock().current = value.clone();
            }
        }

        self.run_watchers(session, entry, WatchPhase::After, value, session_errors)?;

        match failure {
            Some(err) => Err(err),
            None => Ok(SetStatus::Applied),
        }
    }

    fn run_watchers(
        &self,
        session: SessionId,
        entry: &Entry,
        phase: WatchPhase,
        pending: &Value,
        session_errors: &Cell<u32>,
    ) -> OptResult<()> {
        let (watchers, current) = {
            let mut inner = entry.inner.lock();
            inner.advance(match phase {
                WatchPhase::Before => EntryState::InBeforeWatch,
                WatchPhase::After => EntryState::InAfterWatch,
            })?;
            let watchers = inner.watchers(phase).to_vec();
            let calls = watchers.len() as u64;
            match phase {
                WatchPhase::Before => inner.stats.before_watch_calls += calls,
                WatchPhase::After => inner.stats.after_watch_calls += calls,
            }
            (watchers, inner.current.clone())
        };

        if !watchers.is_empty() {
            let event = WatchEvent::new(
                self,
                &entry.path,
                session,
                phase,
                pending,
                &current,
                session_errors,
            );
            for watcher in &watchers {
                watcher.callback.notify(&event);
            }
        }

        entry.inner.lock().advance(EntryState::InSet)
    }

    // ------------------------------------------------------------------
    // Get
    // ------------------------------------------------------------------

    /// Reads a value, running the getter if one is installed.
    pub fn get(&self, path: &str) -> OptResult<Value> {
        let entry = self.lookup(path)?;
        self.get_entry(&entry)
    }

    /// Reads an int, bool or event entry.
    pub fn get_int(&self, path: &str) -> OptResult<i64> {
        let entry = self.lookup_typed(path, &[ValueType::Int, ValueType::Bool, ValueType::Event])?;
        match self.get_entry(&entry)? {
            Value::Int(v) => Ok(v),
            other => Err(mismatch(path, &other)),
        }
    }

    /// Reads a bool (or int) entry as a flag.
    pub fn get_bool(&self, path: &str) -> OptResult<bool> {
        let entry = self.lookup_typed(path, &[ValueType::Bool, ValueType::Int])?;
        match self.get_entry(&entry)? {
            Value::Int(v) => Ok(v != 0),
            other => Err(mismatch(path, &other)),
        }
    }

    /// Reads a string entry.
    pub fn get_str(&self, path: &str) -> OptResult<String> {
        let entry = self.lookup_typed(path, &[ValueType::Str])?;
        match self.get_entry(&entry)? {
            Value::Str(v) => Ok(v),
            other => Err(mismatch(path, &other)),
        }
    }

    /// Reads a blob entry.
    pub fn get_blob(&self, path: &str) -> OptResult<Vec<u8>> {
        let entry = self.lookup_typed(path, &[ValueType::Blob])?;
        match self.get_entry(&entry)? {
            Value::Blob(v) => Ok(v),
            other => Err(mismatch(path, &other)),
        }
    }

    /// Reads a pointer entry.
    pub fn get_pointer(&self, path: &str) -> OptResult<usize> {
        let entry = self.lookup_typed(path, &[ValueType::Pointer])?;
        match self.get_entry(&entry)? {
            Value::Pointer(v) => Ok(v),
            other => Err(mismatch(path, &other)),
        }
    }

    /// Reads an array entry.
    pub fn get_array(&self, path: &str) -> OptResult<Vec<String>> {
        let entry = self.lookup_typed(path, &[ValueType::Array])?;
        match self.get_entry(&entry)? {
            Value::Array(v) => Ok(v),
            other => Err(mismatch(path, &other)),
        }
    }

    fn lookup_typed(&self, path: &str, allowed: &[ValueType]) -> OptResult<Arc<Entry>> {
        let entry = self.lookup(path)?;
        if !allowed.contains(&entry.value_type) {
            return Err(OptError::bad_type(format!(
                "{} is a {} entry",
                path, entry.value_type
            )));
        }
        Ok(entry)
    }

    pub(crate) fn get_entry(&self, entry: &Entry) -> OptResult<Value> {
        if !entry.attributes.contains(Attributes::CAN_GET) {
            return Err(OptError::forbidden(format!("{} is not readable", entry.path)));
        }

        let _gate = self.gate.lock();
        let (nested, current) = {
            let mut inner = entry.inner.lock();
            let nested = inner.state.is_setting();
            if !nested {
                inner.begin(&entry.path, EntryState::InGet)?;
            }
            inner.stats.get_calls += 1;
            (nested, inner.current.clone())
        };

        let fetched = match &entry.hooks.getter {
            Some(getter) => getter.get(&GetContext::new(self, &entry.path, &current)),
            None => Ok(None),
        };

        let mut inner = entry.inner.lock();
        if !nested {
            inner.advance(EntryState::Idle)?;
        }
        match fetched {
            Ok(Some(value)) if entry.value_type.accepts(&value) => {
                inner.current = value.clone();
                Ok(value)
            }
            Ok(Some(value)) => Err(mismatch(&entry.path, &value)),
            Ok(None) => Ok(inner.current.clone()),
            Err(err) => {
                warn!("Get failed for {}: {}", entry.path, err);
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Watch
    // ------------------------------------------------------------------

    /// Watches a path, whether or not its entry exists yet.
    pub fn watch<F>(&self, path: &str, phase: WatchPhase, callback: F) -> OptResult<WatchHandle>
    where
        F: Fn(&WatchEvent<'_>) + Send + Sync + 'static,
    {
        self.watch_with(path, phase, Arc::new(callback))
    }

    /// Watches a path with a shared callback object.
    pub fn watch_with(
        &self,
        path: &str,
        phase: WatchPhase,
        callback: Arc<dyn WatchCallback>,
    ) -> OptResult<WatchHandle> {
        ValueType::from_path(path)?;
        let id = WatchId(self.next_watch.fetch_add(1, Ordering::Relaxed));
        let watcher = Arc::new(Watcher {
            id,
            path: path.to_string(),
            callback,
        });

        let entries = self.entries.read();
        match entries.get(path) {
            Some(entry) => {
                if !entry.attributes.contains(Attributes::CAN_WATCH) {
                    return Err(OptError::forbidden(format!("{path} cannot be watched")));
                }
                entry.inner.lock().watchers_mut(phase).push(watcher);
            }
            None => {
                debug!("Parking watch on {} until it is registered", path);
                self.pending.write().list_mut(phase).push(watcher);
            }
        }

        Ok(WatchHandle {
            id,
            path: path.to_string(),
            phase,
        })
    }

    /// Removes a watch from its entry or from the pending list.
    pub fn unwatch(&self, handle: &WatchHandle) -> OptResult<()> {
        let entries = self.entries.read();
        if let Some(entry) = entries.get(&handle.path) {
            if remove_watcher(entry.inner.lock().watchers_mut(handle.phase), handle.id) {
                return Ok(());
            }
        }
        if self.pending.write().remove(handle.id, handle.phase) {
            return Ok(());
        }
        Err(OptError::not_found(handle.path.clone()))
    }

    /// Paths of watches still waiting for their entry.
    pub fn pending_watch_paths(&self, phase: WatchPhase) -> Vec<String> {
        self.pending
            .read()
            .list(phase)
            .iter()
            .map(|w| w.path.clone())
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

/// Glob used by [`Registry::for_each`].
pub fn matches_pattern(pattern: Option<&str>, path: &str) -> bool {
    match pattern {
        None | Some("*") => true,
        Some(p) => match p.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => p == path,
        },
    }
}

fn mismatch(path: &str, value: &Value) -> OptError {
    OptError::bad_type(format!("{path} produced a {} value", value.kind()))
}
