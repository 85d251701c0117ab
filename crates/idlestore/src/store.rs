//! Store - owns state, queue and deferred results.
//!
//! ```text
//! StoreBuilder::build() -> Store -> Store::start() -> StoreHandle (Clone)
//! ```
//!
//! The scheduler task is spawned by `start()`, so a store only drains queued
//! actions once it has been started inside a tokio runtime.

use crate::action::{Action, ActionId};
use crate::config::StoreConfig;
use crate::deferred::DeferredRegistry;
use crate::error::{ErrorHandler, LogErrorHandler, StoreError};
use crate::gate::ApplyGate;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::queue::ActionQueue;
use crate::reducer::{Reducer, VolatileReducer};
use crate::scheduler::{self, IdleSource, RunState, Scheduler};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, info};

pub(crate) struct StoreCore {
    state: RwLock<Arc<Value>>,
    pub(crate) reducer: Box<dyn Reducer>,
    pub(crate) middleware: MiddlewareChain,
    pub(crate) error_handler: Box<dyn ErrorHandler>,
    pub(crate) queue: ActionQueue,
    pub(crate) deferred: DeferredRegistry,
    pub(crate) gate: ApplyGate,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) config: StoreConfig,
    pub(crate) runtime: Handle,
}

impl StoreCore {
    pub(crate) fn snapshot(&self) -> Arc<Value> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn replace_state(&self, next: Arc<Value>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl Drop for StoreCore {
    fn drop(&mut self) {
        self.scheduler.shut_down();
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for a [`Store`].
pub struct StoreBuilder {
    reducer: Box<dyn Reducer>,
    initial_state: Value,
    middleware: Vec<Box<dyn Middleware>>,
    error_handler: Box<dyn ErrorHandler>,
    idle_source: Option<Arc<dyn IdleSource>>,
    initial_actions: Vec<Action>,
    config: StoreConfig,
}

impl StoreBuilder {
    /// Volatile-set reducer, empty object state, no middleware.
    pub fn new() -> Self {
        Self {
            reducer: Box::new(VolatileReducer),
            initial_state: Value::Object(Default::default()),
            middleware: Vec::new(),
            error_handler: Box::new(LogErrorHandler),
            idle_source: None,
            initial_actions: Vec::new(),
            config: StoreConfig::default(),
        }
    }

    pub fn reducer<R: Reducer>(mut self, reducer: R) -> Self {
        self.reducer = Box::new(reducer);
        self
    }

    pub fn initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }

    /// Append a middleware; they run in the order added.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    pub fn error_handler<H: ErrorHandler>(mut self, handler: H) -> Self {
        self.error_handler = Box::new(handler);
        self
    }

    /// Overrides the idle source derived from the config.
    pub fn idle_source<I: IdleSource>(mut self, idle: I) -> Self {
        self.idle_source = Some(Arc::new(idle));
        self
    }

    /// Actions queued as soon as the store starts.
    pub fn initial_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.initial_actions.extend(actions);
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Store {
        Store { parts: self }
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Store
// ============================================================================

/// A configured store that has not been started yet.
pub struct Store {
    parts: StoreBuilder,
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Spawn the idle scheduler on the current tokio runtime.
    pub fn start(self) -> Result<StoreHandle, StoreError> {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let StoreBuilder {
            reducer,
            initial_state,
            middleware,
            error_handler,
            idle_source,
            initial_actions,
            config,
        } = self.parts;

        let idle = idle_source.unwrap_or_else(|| config.idle_source());
        let scheduler = Arc::new(Scheduler::new(idle));
        let core = Arc::new(StoreCore {
            state: RwLock::new(Arc::new(initial_state)),
            reducer,
            middleware: MiddlewareChain::new(middleware),
            error_handler,
            queue: ActionQueue::new(config.queue_order),
            deferred: DeferredRegistry::new(),
            gate: ApplyGate::new(),
            scheduler: Arc::clone(&scheduler),
            config,
            runtime,
        });

        core.runtime
            .spawn(scheduler::run(scheduler, Arc::downgrade(&core)));

        let handle = StoreHandle::from_core(core);
        if !initial_actions.is_empty() {
            for action in initial_actions {
                let id = ActionId::new();
                handle.core.deferred.register(id);
                handle.core.queue.push(id, action);
            }
            handle.core.scheduler.arm();
        }

        info!(
            queue_order = ?handle.core.config.queue_order,
            middleware = handle.core.middleware.len(),
            queued = handle.queued(),
            "store started"
        );
        Ok(handle)
    }
}

/// Build and start a store in one call.
pub fn create_store<R: Reducer>(
    reducer: R,
    initial_state: Value,
    middleware: Vec<Box<dyn Middleware>>,
) -> Result<StoreHandle, StoreError> {
    let mut builder = StoreBuilder::new()
        .reducer(reducer)
        .initial_state(initial_state);
    builder.middleware = middleware;
    builder.build().start()
}

// ============================================================================
// Handle
// ============================================================================

/// Cheap, cloneable access to a running store.
///
/// Dispatch entry points live in the engine module; this type carries the
/// read side and lifecycle.
#[derive(Clone)]
pub struct StoreHandle {
    pub(crate) core: Arc<StoreCore>,
}

impl StoreHandle {
    pub(crate) fn from_core(core: Arc<StoreCore>) -> Self {
        Self { core }
    }

    /// Current state, after draining whatever is queued.
    ///
    /// Draining here is best effort: suspending thunks met during the drain
    /// finish later, so their effects may not be visible yet. Called from an
    /// action being applied by a drain pass, it returns the current state
    /// without draining, so queued actions keep their order.
    pub fn get_state(&self) -> Arc<Value> {
        if !self.core.queue.is_empty() && !self.core.gate.is_draining_here() {
            self.drain_pass();
        }
        self.core.snapshot()
    }

    /// Number of actions waiting in the queue.
    pub fn queued(&self) -> usize {
        self.core.queue.len()
    }

    /// Number of entries held by the deferred registry.
    pub fn pending_results(&self) -> usize {
        self.core.deferred.len()
    }

    pub fn run_state(&self) -> RunState {
        self.core.scheduler.run_state()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.core.config
    }

    /// Stop the scheduler and reject everything still queued.
    pub fn shutdown(&self) {
        info!("store shutting down");
        self.core.scheduler.shut_down();
        self.reject_queued();
    }

    pub fn is_shut_down(&self) -> bool {
        self.core.scheduler.is_shut_down()
    }

    pub(crate) fn reject_queued(&self) {
        for queued in self.core.queue.take_all() {
            debug!(action_id = %queued.id, "rejecting queued action on shutdown");
            self.core.deferred.reject(queued.id, StoreError::ShutDown);
        }
    }

    pub(crate) fn evict_settled(&self) {
        if let Some(grace) = self.core.config.eviction_grace() {
            let evicted = self.core.deferred.evict_settled(grace);
            if evicted > 0 {
                debug!(evicted, "evicted settled results");
            }
        }
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("queued", &self.queued())
            .field("run_state", &self.run_state())
            .finish()
    }
}
