//! Idle scheduler - drains the queue whenever the runtime has spare time.
//!
//! One background task per store. Arming it is debounced: any number of
//! `arm()` calls before the task wakes collapse into a single pass. A woken
//! task drains immediately, then keeps waiting for idle time and draining
//! again for as long as the queue is non-empty.

use crate::store::{StoreCore, StoreHandle};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, trace};

/// Tells the scheduler when the host has spare capacity.
#[async_trait]
pub trait IdleSource: Send + Sync + 'static {
    /// Resolves at the next idle moment.
    async fn idle(&self);
}

/// Idle whenever the runtime gets to run other tasks once.
#[derive(Debug, Clone, Copy, Default)]
pub struct YieldIdle;

#[async_trait]
impl IdleSource for YieldIdle {
    async fn idle(&self) {
        tokio::task::yield_now().await;
    }
}

/// Idle on a fixed period.
#[derive(Debug, Clone, Copy)]
pub struct IntervalIdle {
    period: Duration,
}

impl IntervalIdle {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

#[async_trait]
impl IdleSource for IntervalIdle {
    async fn idle(&self) {
        tokio::time::sleep(self.period).await;
    }
}

/// What the scheduler task is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// Waiting to be armed.
    Idle = 0,
    /// Work remains; waiting for idle time.
    Armed = 1,
    /// Applying queued actions.
    Draining = 2,
}

impl RunState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RunState::Armed,
            2 => RunState::Draining,
            _ => RunState::Idle,
        }
    }
}

pub(crate) struct Scheduler {
    wake: Notify,
    run_state: AtomicU8,
    shutdown: watch::Sender<bool>,
    idle: Arc<dyn IdleSource>,
}

impl Scheduler {
    pub fn new(idle: Arc<dyn IdleSource>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            wake: Notify::new(),
            run_state: AtomicU8::new(RunState::Idle as u8),
            shutdown,
            idle,
        }
    }

    /// Ask for a drain pass. Replaces any pass already requested.
    pub fn arm(&self) {
        self.wake.notify_one();
    }

    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.run_state.load(Ordering::Acquire))
    }

    fn set_run_state(&self, state: RunState) {
        self.run_state.store(state as u8, Ordering::Release);
    }

    pub fn shut_down(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Scheduler task body. Holds the store weakly so dropping every handle
/// ends the task.
pub(crate) async fn run(scheduler: Arc<Scheduler>, store: Weak<StoreCore>) {
    let mut shutdown = scheduler.shutdown.subscribe();
    info!("idle scheduler started");

    'scheduler: loop {
        scheduler.set_run_state(RunState::Idle);
        tokio::select! {
            _ = shutdown.wait_for(|stopped| *stopped) => break 'scheduler,
            _ = scheduler.wake.notified() => {}
        }

        loop {
            let Some(core) = store.upgrade() else {
                break 'scheduler;
            };
            let handle = StoreHandle::from_core(core);

            scheduler.set_run_state(RunState::Draining);
            let report = handle.drain_pass();
            trace!(
                applied = report.applied,
                spawned = report.spawned,
                failed = report.failed,
                "drain pass finished"
            );

            if handle.queued() == 0 {
                handle.evict_settled();
                break;
            }
            drop(handle);

            scheduler.set_run_state(RunState::Armed);
            tokio::select! {
                _ = shutdown.wait_for(|stopped| *stopped) => break 'scheduler,
                _ = scheduler.idle.idle() => {}
            }
        }
    }

    scheduler.set_run_state(RunState::Idle);
    if let Some(core) = store.upgrade() {
        StoreHandle::from_core(core).reject_queued();
    }
    debug!("idle scheduler stopped");
}
