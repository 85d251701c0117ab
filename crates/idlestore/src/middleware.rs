//! Middleware - intercepts records before they reach the reducer.

use crate::action::Record;
use crate::path::StatePath;
use serde_json::Value;
use tracing::debug;

/// Sees every record on its way to the reducer.
///
/// Returns the record to pass on (possibly rewritten), or `None` to consume
/// it. Middleware runs while actions are being applied and must not block.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, record: Record, state: &Value) -> Option<Record>;
}

impl<F> Middleware for F
where
    F: Fn(Record, &Value) -> Option<Record> + Send + Sync + 'static,
{
    fn handle(&self, record: Record, state: &Value) -> Option<Record> {
        self(record, state)
    }
}

/// Ordered middleware, run first to last.
#[derive(Default)]
pub(crate) struct MiddlewareChain {
    links: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new(links: Vec<Box<dyn Middleware>>) -> Self {
        Self { links }
    }

    pub fn run(&self, record: Record, state: &Value) -> Option<Record> {
        self.links
            .iter()
            .try_fold(record, |record, link| link.handle(record, state))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }
}

/// LoggingMiddleware - logs every record passing through
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for LoggingMiddleware {
    fn handle(&self, record: Record, _state: &Value) -> Option<Record> {
        debug!(
            kind = %record.kind,
            path = record.meta.path.as_ref().map(StatePath::as_str),
            payload = %record.payload,
            "record"
        );
        Some(record)
    }
}
