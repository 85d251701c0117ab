//! Deferred results for queued actions.
//!
//! Every asynchronous dispatch gets an [`ActionId`]; the registry maps that
//! id to a shared future that settles once the action has been applied.
//! Lookups are idempotent, so every caller asking for the same id gets the
//! same future. Settled entries are evicted after a grace period; a
//! [`Dispatched`] handle keeps its own clone of the future and is unaffected.

use crate::action::{ActionId, ActionResult};
use crate::error::StoreError;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Outcome delivered to every waiter on one action.
pub type Settled = Result<ActionResult, StoreError>;

/// Shared future for one action's outcome.
pub type DeferredResult = Shared<BoxFuture<'static, Settled>>;

struct Deferred {
    resolver: Option<oneshot::Sender<Settled>>,
    result: DeferredResult,
    settled_at: Option<Instant>,
}

impl Deferred {
    fn new(id: ActionId) -> Self {
        let (resolver, receiver) = oneshot::channel();
        let result = receiver
            .map(move |received| received.unwrap_or(Err(StoreError::Abandoned(id))))
            .boxed()
            .shared();
        Self {
            resolver: Some(resolver),
            result,
            settled_at: None,
        }
    }
}

#[derive(Default)]
pub(crate) struct DeferredRegistry {
    entries: DashMap<ActionId, Deferred>,
}

impl DeferredRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Future for `id`, created on first reference.
    pub fn deferred_for(&self, id: ActionId) -> DeferredResult {
        self.entries
            .entry(id)
            .or_insert_with(|| Deferred::new(id))
            .result
            .clone()
    }

    /// Create the entry for `id` without taking a handle to it.
    pub fn register(&self, id: ActionId) {
        self.entries.entry(id).or_insert_with(|| Deferred::new(id));
    }

    pub fn resolve(&self, id: ActionId, result: ActionResult) -> bool {
        self.settle(id, Ok(result))
    }

    pub fn reject(&self, id: ActionId, error: StoreError) -> bool {
        self.settle(id, Err(error))
    }

    /// Returns false if `id` was already settled.
    fn settle(&self, id: ActionId, outcome: Settled) -> bool {
        let mut entry = self.entries.entry(id).or_insert_with(|| Deferred::new(id));
        let Some(resolver) = entry.resolver.take() else {
            return false;
        };
        entry.settled_at = Some(Instant::now());
        // the entry itself holds a clone of the receiving side
        let _ = resolver.send(outcome);
        true
    }

    /// Drop entries settled at least `grace` ago. Returns how many went.
    pub fn evict_settled(&self, grace: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, deferred| deferred.settled_at.map_or(true, |at| at.elapsed() < grace));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Handle to an action queued with [`StoreHandle::dispatch`](crate::StoreHandle::dispatch).
///
/// Awaiting it yields the action's result once a drain has applied it.
/// Dropping it does not withdraw the action.
#[derive(Clone)]
pub struct Dispatched {
    id: ActionId,
    result: DeferredResult,
}

impl Dispatched {
    pub(crate) fn new(id: ActionId, result: DeferredResult) -> Self {
        Self { id, result }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }
}

impl std::fmt::Debug for Dispatched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatched").field("id", &self.id).finish()
    }
}

impl Future for Dispatched {
    type Output = Settled;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.result.poll_unpin(cx)
    }
}
