//! Dispatch engine - decides how an action is applied and applies it.
//!
//! Two entry points:
//! - [`StoreHandle::dispatch_sync`] applies right now on the caller's
//!   thread, bypassing the queue and the deferred registry. Errors come
//!   straight back to the caller.
//! - [`StoreHandle::dispatch`] pushes onto the queue, arms the scheduler and
//!   returns a [`Dispatched`] future that settles once a drain applied it.
//!   Errors go to the error handler and reject that action's future.
//!
//! Applying an action:
//! 1. A thunk is invoked with the store handle; its output is the result.
//! 2. A record (dispatched directly, or returned by a thunk) passes through
//!    the middleware chain and then the reducer. A thunk returning another
//!    thunk is not applied further.
//! 3. A suspending thunk met during a drain runs as its own task; its record
//!    is reduced and its future settled when it completes.

use crate::action::{Action, ActionId, ActionResult, Record, Thunk, ThunkResult};
use crate::deferred::Dispatched;
use crate::error::StoreError;
use crate::store::StoreHandle;
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, trace, warn};

/// Counts from one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions applied and resolved in this pass.
    pub applied: usize,
    /// Suspending thunks handed off to their own task.
    pub spawned: usize,
    /// Whether the pass stopped early on a failing action.
    pub failed: bool,
}

enum Applied {
    Done(ActionResult),
    Suspended(BoxFuture<'static, ThunkResult>),
}

impl StoreHandle {
    /// Apply an action immediately and return its result.
    pub fn dispatch_sync(&self, action: impl Into<Action>) -> Result<ActionResult, StoreError> {
        let action = action.into();
        trace!(kind = action.kind(), "dispatching synchronously");

        if let Action::Thunk(Thunk::Suspending(_)) = action {
            return Err(StoreError::SuspendingThunk);
        }
        match self.apply_action(&action) {
            Ok(Applied::Done(result)) => Ok(result),
            Ok(Applied::Suspended(_)) => Err(StoreError::SuspendingThunk),
            Err(error) => Err(StoreError::thunk(error)),
        }
    }

    /// Queue an action for the next drain.
    ///
    /// The action is queued before this returns; awaiting the returned
    /// future is optional.
    pub fn dispatch(&self, action: impl Into<Action>) -> Dispatched {
        let action = action.into();
        let id = ActionId::new();
        let result = self.core.deferred.deferred_for(id);

        if self.is_shut_down() {
            self.core.deferred.reject(id, StoreError::ShutDown);
            return Dispatched::new(id, result);
        }

        let kind = action.kind().to_owned();
        let queued = self.core.queue.push(id, action);
        debug!(action_id = %id, kind = %kind, queued, "action queued");

        // shutdown may have run its final rejection between the check and the push
        if self.is_shut_down() {
            self.reject_queued();
            return Dispatched::new(id, result);
        }
        self.core.scheduler.arm();

        Dispatched::new(id, result)
    }

    /// Wait for a pending action value, then queue it and wait for its
    /// result.
    pub async fn dispatch_pending<F>(&self, pending: F) -> Result<ActionResult, StoreError>
    where
        F: Future,
        F::Output: Into<Action>,
    {
        let action = pending.await;
        self.dispatch(action).await
    }

    /// Apply queued actions until the queue is empty or one fails.
    ///
    /// Leaves the scheduler armed if work remains. A panic while applying an
    /// action counts as that action failing.
    pub fn drain_pass(&self) -> DrainReport {
        let mut report = DrainReport::default();
        // held across pop and apply so concurrent drainers keep queue order
        let _gate = self.core.gate.enter_draining();

        while let Some(queued) = self.core.queue.pop() {
            let id = queued.id;
            let applied =
                panic::catch_unwind(AssertUnwindSafe(|| self.apply_action(&queued.action)))
                    .unwrap_or_else(|payload| Err(panicked(payload)));
            match applied {
                Ok(Applied::Done(result)) => {
                    trace!(action_id = %id, "action applied");
                    self.core.deferred.resolve(id, result);
                    report.applied += 1;
                }
                Ok(Applied::Suspended(body)) => {
                    self.spawn_suspended(id, queued.action, body);
                    report.spawned += 1;
                }
                Err(error) => {
                    self.fail(id, &queued.action, error);
                    report.failed = true;
                    break;
                }
            }
        }

        if !self.core.queue.is_empty() {
            self.core.scheduler.arm();
        }
        report
    }

    fn apply_action(&self, action: &Action) -> anyhow::Result<Applied> {
        let _gate = self.core.gate.enter();
        match action {
            Action::Record(record) => {
                self.reduce_record(record.clone());
                Ok(Applied::Done(None))
            }
            Action::Value(_) => Ok(Applied::Done(None)),
            Action::Thunk(Thunk::Sync(body)) => {
                let output = body(self)?;
                if let Action::Record(record) = &output {
                    self.reduce_record(record.clone());
                }
                Ok(Applied::Done(Some(output)))
            }
            Action::Thunk(Thunk::Suspending(body)) => Ok(Applied::Suspended(body(self.clone()))),
        }
    }

    /// Caller must hold the apply gate.
    fn reduce_record(&self, record: Record) {
        let current = self.core.snapshot();
        let Some(record) = self.core.middleware.run(record, &current) else {
            trace!("record consumed by middleware");
            return;
        };
        let next = self.core.reducer.reduce(&current, &record);
        self.core.replace_state(next);
    }

    fn spawn_suspended(
        &self,
        id: ActionId,
        action: Action,
        body: BoxFuture<'static, ThunkResult>,
    ) {
        trace!(action_id = %id, "running suspending thunk");
        let store = self.clone();
        self.core.runtime.spawn(async move {
            let outcome = AssertUnwindSafe(body)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(panicked(payload)));
            match outcome {
                Ok(output) => {
                    if let Action::Record(record) = &output {
                        let _gate = store.core.gate.enter();
                        store.reduce_record(record.clone());
                    }
                    store.core.deferred.resolve(id, Some(output));
                }
                Err(error) => store.fail(id, &action, error),
            }
        });
    }

    fn fail(&self, id: ActionId, action: &Action, error: anyhow::Error) {
        let state = self.core.snapshot();
        self.core.error_handler.on_action_error(&error, action, &state);
        self.core.deferred.reject(id, StoreError::thunk(error));
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned());
    warn!(%message, "action panicked");
    anyhow::anyhow!("action panicked: {message}")
}
