//! The reducer contract and the default volatile-set reducer.

use crate::action::Record;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Pure state transition: `(state, record) -> state`.
///
/// Implementations must not have side effects. Returning the same `Arc` is
/// how a reducer says "unchanged".
pub trait Reducer: Send + Sync + 'static {
    fn reduce(&self, state: &Arc<Value>, record: &Record) -> Arc<Value>;
}

impl<F> Reducer for F
where
    F: Fn(&Arc<Value>, &Record) -> Arc<Value> + Send + Sync + 'static,
{
    fn reduce(&self, state: &Arc<Value>, record: &Record) -> Arc<Value> {
        self(state, record)
    }
}

/// Handles [`VOLATILE_SET`](crate::VOLATILE_SET) by cloning the tree and
/// replacing the value at `meta.path`; every other kind is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatileReducer;

impl Reducer for VolatileReducer {
    fn reduce(&self, state: &Arc<Value>, record: &Record) -> Arc<Value> {
        if !record.is_volatile_set() {
            return Arc::clone(state);
        }
        let Some(path) = &record.meta.path else {
            warn!("volatile set record without a path ignored");
            return Arc::clone(state);
        };

        let mut next = Value::clone(state);
        path.set(&mut next, record.payload.clone());
        Arc::new(next)
    }
}
