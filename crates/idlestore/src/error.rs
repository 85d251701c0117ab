//! Error types and the overridable action error handler.

use crate::action::{Action, ActionId};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by a store.
///
/// `Clone` because one failure is observed by every waiter on the same
/// dispatched action.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A thunk body returned an error while being applied.
    #[error("thunk failed: {0}")]
    ThunkFailed(Arc<anyhow::Error>),

    /// A suspending thunk was passed to `dispatch_sync`.
    #[error("suspending thunk cannot be applied synchronously")]
    SuspendingThunk,

    /// The store went away before the action was applied.
    #[error("action {0} was dropped before it was applied")]
    Abandoned(ActionId),

    /// The store was shut down; queued and new actions are rejected.
    #[error("store has been shut down")]
    ShutDown,

    /// `Store::start` was called outside a tokio runtime.
    #[error("no tokio runtime is available to drive the store")]
    NoRuntime,
}

impl StoreError {
    pub(crate) fn thunk(error: anyhow::Error) -> Self {
        StoreError::ThunkFailed(Arc::new(error))
    }

    /// The thunk error behind this failure, if any.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            StoreError::ThunkFailed(error) => Some(error),
            _ => None,
        }
    }
}

/// Errors parsing a [`StatePath`](crate::StatePath).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path `{0}` contains an empty segment")]
    EmptySegment(String),

    #[error("path `{0}` has a malformed index")]
    MalformedIndex(String),
}

/// Invoked when a queued action fails.
///
/// Receives the error, the failing action and the state at failure time.
/// Must not panic; the failure is also delivered to the action's waiters.
pub trait ErrorHandler: Send + Sync + 'static {
    fn on_action_error(&self, error: &anyhow::Error, action: &Action, state: &Value);
}

/// Default handler: logs and carries on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn on_action_error(&self, error: &anyhow::Error, action: &Action, state: &Value) {
        error!(
            error = %error,
            kind = action.kind(),
            action = ?action,
            state = %state,
            "error while applying action"
        );
    }
}

impl<F> ErrorHandler for F
where
    F: Fn(&anyhow::Error, &Action, &Value) + Send + Sync + 'static,
{
    fn on_action_error(&self, error: &anyhow::Error, action: &Action, state: &Value) {
        self(error, action, state)
    }
}
