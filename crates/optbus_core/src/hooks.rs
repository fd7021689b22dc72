//! Setter, getter and deleter hooks.
//!
//! Hooks are trait objects so that long-lived components can implement them
//! on their own types. Closures work too through blanket impls, which is what
//! most callers use.

use crate::error::{OptError, OptResult};
use crate::registry::Registry;
use crate::types::{SessionId, Value};
use std::sync::Arc;

/// What a setter did with the pending value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The setter applied the value itself, possibly through
    /// [`SetContext::set_current`].
    Handled,
    /// Copy the pending value to the current value.
    UseDefault,
    /// Drop the set silently. After-watchers are not run.
    Skip,
}

/// View handed to a [`Setter`] while a set is in flight.
pub struct SetContext<'a> {
    registry: &'a Registry,
    path: &'a str,
    session: SessionId,
    pending: &'a Value,
    current: &'a Value,
    replacement: Option<Value>,
}

impl<'a> SetContext<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        path: &'a str,
        session: SessionId,
        pending: &'a Value,
        current: &'a Value,
    ) -> Self {
        Self {
            registry,
            path,
            session,
            pending,
            current,
            replacement: None,
        }
    }

    /// The registry that owns the entry.
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Path of the entry being set.
    pub fn path(&self) -> &str {
        self.path
    }

    /// Session the set belongs to, or [`SessionId::NONE`].
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The proposed value.
    pub fn pending(&self) -> &Value {
        self.pending
    }

    /// The value before this set.
    pub fn current(&self) -> &Value {
        self.current
    }

    /// Stores a new current value. Only honoured when the setter returns
    /// [`SetOutcome::Handled`].
    pub fn set_current(&mut self, value: Value) -> OptResult<()> {
        if std::mem::discriminant(&value) != std::mem::discriminant(self.current) {
            return Err(OptError::bad_type(format!(
                "{} cannot hold a {} value",
                self.path,
                value.kind()
            )));
        }
        self.replacement = Some(value);
        Ok(())
    }

    pub(crate) fn into_replacement(self) -> Option<Value> {
        self.replacement
    }
}

/// View handed to a [`Getter`].
pub struct GetContext<'a> {
    registry: &'a Registry,
    path: &'a str,
    current: &'a Value,
}

impl<'a> GetContext<'a> {
    pub(crate) fn new(registry: &'a Registry, path: &'a str, current: &'a Value) -> Self {
        Self {
            registry,
            path,
            current,
        }
    }

    /// The registry that owns the entry.
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Path of the entry being read.
    pub fn path(&self) -> &str {
        self.path
    }

    /// The stored value.
    pub fn current(&self) -> &Value {
        self.current
    }
}

/// Decides how a proposed value is applied.
pub trait Setter: Send + Sync {
    /// Called between the before- and after-watchers of a set.
    fn set(&self, ctx: &mut SetContext<'_>) -> OptResult<SetOutcome>;
}

impl<F> Setter for F
where
    F: Fn(&mut SetContext<'_>) -> OptResult<SetOutcome> + Send + Sync,
{
    fn set(&self, ctx: &mut SetContext<'_>) -> OptResult<SetOutcome> {
        self(ctx)
    }
}

/// Produces the value returned by a get.
pub trait Getter: Send + Sync {
    /// Returns `Some` to replace the stored value, `None` to keep it.
    fn get(&self, ctx: &GetContext<'_>) -> OptResult<Option<Value>>;
}

impl<F> Getter for F
where
    F: Fn(&GetContext<'_>) -> OptResult<Option<Value>> + Send + Sync,
{
    fn get(&self, ctx: &GetContext<'_>) -> OptResult<Option<Value>> {
        self(ctx)
    }
}

/// Notified when an entry is unregistered.
pub trait Deleter: Send + Sync {
    /// Called once the entry is no longer reachable by path.
    fn delete(&self, path: &str, last_value: &Value);
}

impl<F> Deleter for F
where
    F: Fn(&str, &Value) + Send + Sync,
{
    fn delete(&self, path: &str, last_value: &Value) {
        self(path, last_value)
    }
}

/// The optional hooks of an entry.
///
/// Registering the same path twice with clones of one `Hooks` value is
/// idempotent; hooks are compared by identity, not by behaviour.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) setter: Option<Arc<dyn Setter>>,
    pub(crate) getter: Option<Arc<dyn Getter>>,
    pub(crate) deleter: Option<Arc<dyn Deleter>>,
}

impl Hooks {
    /// No hooks: plain copy semantics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a setter closure.
    pub fn with_setter<F>(self, setter: F) -> Self
    where
        F: Fn(&mut SetContext<'_>) -> OptResult<SetOutcome> + Send + Sync + 'static,
    {
        self.with_shared_setter(Arc::new(setter))
    }

    /// Installs a shared setter object.
    pub fn with_shared_setter(mut self, setter: Arc<dyn Setter>) -> Self {
        self.setter = Some(setter);
        self
    }

    /// Installs a getter closure.
    pub fn with_getter<F>(self, getter: F) -> Self
    where
        F: Fn(&GetContext<'_>) -> OptResult<Option<Value>> + Send + Sync + 'static,
    {
        self.with_shared_getter(Arc::new(getter))
    }

    /// Installs a shared getter object.
    pub fn with_shared_getter(mut self, getter: Arc<dyn Getter>) -> Self {
        self.getter = Some(getter);
        self
    }

    /// Installs a deleter closure.
    pub fn with_deleter<F>(mut self, deleter: F) -> Self
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.deleter = Some(Arc::new(deleter));
        self
    }

    /// Returns true if both hold the very same hook objects.
    pub fn same_as(&self, other: &Hooks) -> bool {
        fn same<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
        }
        same(&self.setter, &other.setter)
            && same(&self.getter, &other.getter)
            && same(&self.deleter, &other.deleter)
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("setter", &self.setter.is_some())
            .field("getter", &self.getter.is_some())
            .field("deleter", &self.deleter.is_some())
            .finish()
    }
}
