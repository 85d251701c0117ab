//! Actions: the values a store applies.
//!
//! An [`Action`] is either a terminal [`Record`] the reducer understands, a
//! [`Thunk`] that computes further actions, or a plain value that carries no
//! state change at all. Actions have no identity of their own; every
//! asynchronous dispatch is tagged with a fresh [`ActionId`] instead.

use crate::error::PathError;
use crate::path::StatePath;
use crate::store::StoreHandle;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Record kind understood by the default reducer: replace the value at
/// `meta.path` with the record's payload.
pub const VOLATILE_SET: &str = "@@STORE//VOLATILE_SET";

/// What applying an action produced.
///
/// `None` for a bare record or plain value, `Some(output)` for a thunk.
pub type ActionResult = Option<Action>;

/// What a thunk body returns.
pub type ThunkResult = anyhow::Result<Action>;

/// Token identifying one asynchronous dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(Uuid);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Function that derived a record's payload from the previous value.
#[derive(Clone)]
pub struct Updater(Arc<dyn Fn(&Value) -> Value + Send + Sync>);

impl Updater {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: &Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Updater(..)")
    }
}

/// Metadata attached to a [`Record`].
#[derive(Debug, Clone, Default)]
pub struct Meta {
    /// Location in the state tree the record targets.
    pub path: Option<StatePath>,
    /// Value found at `path` when the record was built.
    pub old_value: Option<Value>,
    /// Updater that produced the payload, if any.
    pub updater: Option<Updater>,
    /// Free-form data for custom reducers.
    pub extra: Value,
}

/// A terminal, reducer-applicable description of a state change.
#[derive(Debug, Clone)]
pub struct Record {
    pub kind: Cow<'static, str>,
    pub payload: Value,
    pub meta: Meta,
}

impl Record {
    pub fn new(kind: impl Into<Cow<'static, str>>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            meta: Meta::default(),
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    /// Build a record that replaces the value at `path` with `payload`.
    pub fn volatile_set(path: &str, payload: Value) -> Result<Self, PathError> {
        let path = StatePath::parse(path)?;
        Ok(Self::new(VOLATILE_SET, payload).with_meta(Meta {
            path: Some(path),
            ..Meta::default()
        }))
    }

    pub fn is_volatile_set(&self) -> bool {
        self.kind == VOLATILE_SET
    }
}

// ============================================================================
// Thunks
// ============================================================================

type SyncBody = dyn Fn(&StoreHandle) -> ThunkResult + Send + Sync;
type SuspendingBody = dyn Fn(StoreHandle) -> BoxFuture<'static, ThunkResult> + Send + Sync;

/// A callable action.
///
/// The body receives the store handle, which gives it `dispatch`,
/// `dispatch_sync` and `get_state`. A suspending thunk returns a future and
/// can only be applied through the queued path.
#[derive(Clone)]
pub enum Thunk {
    Sync(Arc<SyncBody>),
    Suspending(Arc<SuspendingBody>),
}

impl Thunk {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&StoreHandle) -> ThunkResult + Send + Sync + 'static,
    {
        Thunk::Sync(Arc::new(body))
    }

    pub fn suspending<F, Fut>(body: F) -> Self
    where
        F: Fn(StoreHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ThunkResult> + Send + 'static,
    {
        Thunk::Suspending(Arc::new(move |store| body(store).boxed()))
    }

    pub fn is_suspending(&self) -> bool {
        matches!(self, Thunk::Suspending(_))
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Thunk::Sync(_) => f.write_str("Thunk::Sync(..)"),
            Thunk::Suspending(_) => f.write_str("Thunk::Suspending(..)"),
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone)]
pub enum Action {
    Record(Record),
    Thunk(Thunk),
    /// A plain value. Applying it leaves state unchanged.
    Value(Value),
}

impl Action {
    /// The "nothing" a thunk returns when it only dispatched other actions.
    pub fn none() -> Self {
        Action::Value(Value::Null)
    }

    /// Short label for logs.
    pub fn kind(&self) -> &str {
        match self {
            Action::Record(record) => &record.kind,
            Action::Thunk(Thunk::Sync(_)) => "thunk",
            Action::Thunk(Thunk::Suspending(_)) => "suspending-thunk",
            Action::Value(_) => "value",
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Action::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Action::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Action::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Record> for Action {
    fn from(record: Record) -> Self {
        Action::Record(record)
    }
}

impl From<Thunk> for Action {
    fn from(thunk: Thunk) -> Self {
        Action::Thunk(thunk)
    }
}

impl From<Value> for Action {
    fn from(value: Value) -> Self {
        Action::Value(value)
    }
}
