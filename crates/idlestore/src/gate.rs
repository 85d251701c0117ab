//! Serializes action application across threads.
//!
//! At most one thread applies actions at a time. The owning thread may
//! re-enter, so a thunk can call `dispatch_sync` or `get_state` while it is
//! itself being applied. A thread inside a drain pass is marked, so reads
//! made from that pass do not start a nested drain.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Debug)]
struct Owner {
    thread: ThreadId,
    depth: usize,
    draining: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ApplyGate {
    owner: Mutex<Option<Owner>>,
    released: Condvar,
}

impl ApplyGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner(&self) -> MutexGuard<'_, Option<Owner>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enter(&self) -> GateGuard<'_> {
        self.acquire(None)
    }

    /// Enter for a drain pass. Until the guard drops, [`is_draining_here`]
    /// is true on this thread.
    ///
    /// [`is_draining_here`]: ApplyGate::is_draining_here
    pub fn enter_draining(&self) -> GateGuard<'_> {
        self.acquire(Some(true))
    }

    /// Whether the calling thread holds the gate for a drain pass.
    pub fn is_draining_here(&self) -> bool {
        let me = thread::current().id();
        matches!(self.owner().as_ref(), Some(owner) if owner.thread == me && owner.draining)
    }

    fn acquire(&self, draining: Option<bool>) -> GateGuard<'_> {
        let me = thread::current().id();
        let mut owner = self.owner();
        loop {
            match owner.as_mut() {
                None => {
                    *owner = Some(Owner {
                        thread: me,
                        depth: 1,
                        draining: false,
                    });
                    break;
                }
                Some(held) if held.thread == me => {
                    held.depth += 1;
                    break;
                }
                Some(_) => {
                    owner = self
                        .released
                        .wait(owner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        let restore = match (draining, owner.as_mut()) {
            (Some(flag), Some(held)) => Some(std::mem::replace(&mut held.draining, flag)),
            _ => None,
        };
        GateGuard {
            gate: self,
            restore,
        }
    }
}

/// Leaves the gate on drop, including during unwinding.
pub(crate) struct GateGuard<'a> {
    gate: &'a ApplyGate,
    restore: Option<bool>,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let mut owner = self.gate.owner();
        let Some(held) = owner.as_mut() else {
            return;
        };
        if let Some(draining) = self.restore {
            held.draining = draining;
        }
        held.depth -= 1;
        if held.depth == 0 {
            *owner = None;
            self.gate.released.notify_all();
        }
    }
}
