//! Testing utilities for idlestore.
//!
//! - [`RecordingErrorHandler`] captures action failures instead of logging
//! - [`ManualIdle`] makes idle time a test-controlled event
//! - [`settle`] waits until a store has nothing left to drain
//! - [`counter_store`] / [`increment`] mirror the usual counter fixture

use anyhow::{bail, Result};
use async_trait::async_trait;
use idlestore::{
    mutation, mutation_with, Action, ErrorHandler, IdleSource, RunState, StoreBuilder,
    StoreHandle, Thunk,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Error capture
// ============================================================================

/// One failure seen by a [`RecordingErrorHandler`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFailure {
    pub message: String,
    pub kind: String,
    pub state: Value,
}

/// Error handler that stores every failure for later assertions.
#[derive(Clone, Default)]
pub struct RecordingErrorHandler {
    failures: Arc<Mutex<Vec<RecordedFailure>>>,
}

impl RecordingErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<RecordedFailure> {
        self.failures.lock().unwrap().clone()
    }
}

impl ErrorHandler for RecordingErrorHandler {
    fn on_action_error(&self, error: &anyhow::Error, action: &Action, state: &Value) {
        self.failures.lock().unwrap().push(RecordedFailure {
            message: error.to_string(),
            kind: action.kind().to_owned(),
            state: state.clone(),
        });
    }
}

// ============================================================================
// Manual idle source
// ============================================================================

/// Idle source that only reports idle time when [`ManualIdle::tick`] is
/// called. Ticks are remembered, so a tick before the scheduler waits is
/// not lost.
#[derive(Clone, Default)]
pub struct ManualIdle {
    ticks: Arc<Notify>,
}

impl ManualIdle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) {
        self.ticks.notify_one();
    }
}

#[async_trait]
impl IdleSource for ManualIdle {
    async fn idle(&self) {
        self.ticks.notified().await;
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Wait until the queue is empty and the scheduler is idle.
pub async fn settle(store: &StoreHandle, timeout: Duration) -> Result<()> {
    let waited = tokio::time::timeout(timeout, async {
        while store.queued() > 0 || store.run_state() != RunState::Idle {
            tokio::task::yield_now().await;
        }
    })
    .await;

    if waited.is_err() {
        bail!(
            "store did not settle within {:?} ({} queued, {:?})",
            timeout,
            store.queued(),
            store.run_state()
        );
    }
    Ok(())
}

/// Builder preloaded with `{"counter": {"value": value}}`.
pub fn counter_store(value: i64) -> StoreBuilder {
    StoreBuilder::new().initial_state(json!({"counter": {"value": value}}))
}

/// Current `counter.value`.
pub fn counter_value(store: &StoreHandle) -> Option<i64> {
    store.get_state()["counter"]["value"].as_i64()
}

/// Mutation adding `by` to `counter.value`.
pub fn increment(by: i64) -> Thunk {
    mutation_with("counter.value", json!(by), |current, by| {
        json!(current.as_i64().unwrap_or(0) + by.as_i64().unwrap_or(0))
    })
}

/// Mutation replacing `counter.value` with `current * by`.
pub fn multiply(by: i64) -> Thunk {
    mutation("counter.value", move |current| json!(current.as_i64().unwrap_or(0) * by))
}

/// Thunk whose body always fails with `message`.
pub fn failing(message: &'static str) -> Thunk {
    Thunk::new(move |_| bail!(message))
}
