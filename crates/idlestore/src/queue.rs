//! Pending actions awaiting a drain.

use crate::action::{Action, ActionId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Which end of the queue a drain takes from.
///
/// New actions always go to the tail. `Lifo` takes from the tail too, so
/// the most recently dispatched action is applied first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOrder {
    #[default]
    Lifo,
    Fifo,
}

#[derive(Debug)]
pub(crate) struct QueuedAction {
    pub id: ActionId,
    pub action: Action,
}

#[derive(Debug)]
pub(crate) struct ActionQueue {
    order: QueueOrder,
    entries: Mutex<VecDeque<QueuedAction>>,
}

impl ActionQueue {
    pub fn new(order: QueueOrder) -> Self {
        Self {
            order,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<QueuedAction>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, id: ActionId, action: Action) -> usize {
        let mut entries = self.entries();
        entries.push_back(QueuedAction { id, action });
        entries.len()
    }

    pub fn pop(&self) -> Option<QueuedAction> {
        let mut entries = self.entries();
        match self.order {
            QueueOrder::Lifo => entries.pop_back(),
            QueueOrder::Fifo => entries.pop_front(),
        }
    }

    pub fn take_all(&self) -> Vec<QueuedAction> {
        self.entries().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
