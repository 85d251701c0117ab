//! # idlestore
//!
//! A state container that applies actions either immediately or from a
//! queue drained during idle time.
//!
//! ## Core Concepts
//!
//! - [`Record`] = a terminal description of a state change
//! - [`Thunk`] = a callable that computes and dispatches further actions
//! - [`Reducer`] = pure `(state, record) -> state`
//!
//! Every asynchronous dispatch gets a [`Dispatched`] future that settles
//! exactly once with the result of applying that action.
//!
//! ## Architecture
//!
//! ```text
//! caller
//!   │
//!   ├─► dispatch_sync() ──► apply ──► middleware ──► reducer ──► state
//!   │                         ▲
//!   └─► dispatch() ──► ActionQueue                   DeferredRegistry
//!                          │                               ▲
//!                          ▼ arm()                         │ resolve / reject
//!                     idle scheduler ──► drain_pass() ─────┘
//!                          ▲     │
//!                          └─────┘ while queue non-empty: wait for idle, drain
//! ```
//!
//! ## Key Invariants
//!
//! 1. **State is copy-on-write** - snapshots returned by `get_state` never change
//! 2. **One settlement per dispatch** - resolve or reject, never both, never swapped
//! 3. **Failures are action-scoped** - a failing action rejects its own future
//!    and the scheduler keeps draining the rest
//! 4. **One applier at a time** - synchronous dispatches and drain steps are
//!    serialized, and a thunk may re-enter the store while being applied
//!
//! ## Ordering
//!
//! Drains take from the tail of the queue by default, so the most recently
//! dispatched action is applied first. Use [`QueueOrder::Fifo`] for arrival
//! order.
//!
//! ## Example
//!
//! ```ignore
//! use idlestore::{mutation, selector, StoreBuilder};
//! use serde_json::json;
//!
//! let store = StoreBuilder::new()
//!     .initial_state(json!({"counter": {"value": 1}}))
//!     .build()
//!     .start()?;
//!
//! // Applied right away
//! store.dispatch_sync(mutation("counter.value", |v| json!(v.as_i64().unwrap_or(0) + 1)))?;
//!
//! // Applied by the next drain
//! store.dispatch(mutation("counter.value", |v| json!(v.as_i64().unwrap_or(0) + 1))).await?;
//!
//! let count = store.dispatch_sync(selector("counter.value"))?;
//! ```

// Core modules
mod action;
mod builders;
mod config;
mod deferred;
mod engine;
mod error;
mod gate;
mod middleware;
mod path;
mod queue;
mod reducer;
mod scheduler;
mod store;
mod thunk_macro;

// Stress tests (test-only)
#[cfg(test)]
mod stress_tests;

// Re-export action types
pub use action::{
    Action, ActionId, ActionResult, Meta, Record, Thunk, ThunkResult, Updater, VOLATILE_SET,
};

// Re-export action builders
pub use builders::{mutation, mutation_with, selector};

// Re-export configuration
pub use config::StoreConfig;
pub use queue::QueueOrder;

// Re-export deferred result types
pub use deferred::{DeferredResult, Dispatched, Settled};

// Re-export engine types
pub use engine::DrainReport;

// Re-export error types
pub use error::{ErrorHandler, LogErrorHandler, PathError, StoreError};

// Re-export middleware types
pub use middleware::{LoggingMiddleware, Middleware};

// Re-export path types
pub use path::{PathSegment, StatePath, MAX_INDEX};

// Re-export reducer types
pub use reducer::{Reducer, VolatileReducer};

// Re-export scheduler types
pub use scheduler::{IdleSource, IntervalIdle, RunState, YieldIdle};

// Re-export store types (primary entry point)
pub use store::{create_store, Store, StoreBuilder, StoreHandle};

#[doc(hidden)]
pub use thunk_macro::__suspending_body;

// Re-export commonly used external types
pub use async_trait::async_trait;
