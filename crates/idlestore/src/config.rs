//! Store configuration.

use crate::queue::QueueOrder;
use crate::scheduler::{IdleSource, IntervalIdle, YieldIdle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_EVICTION_GRACE_MS: u64 = 30_000;

/// Tunables for a store. Every field has a default, so partial JSON works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Which end of the queue drains take from.
    pub queue_order: QueueOrder,
    /// How long a settled result stays in the registry. `None` keeps it for
    /// the life of the store.
    pub eviction_grace_ms: Option<u64>,
    /// Period of the idle timer. `None` yields to the runtime instead.
    pub idle_interval_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            queue_order: QueueOrder::default(),
            eviction_grace_ms: Some(DEFAULT_EVICTION_GRACE_MS),
            idle_interval_ms: None,
        }
    }
}

impl StoreConfig {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn eviction_grace(&self) -> Option<Duration> {
        self.eviction_grace_ms.map(Duration::from_millis)
    }

    pub(crate) fn idle_source(&self) -> Arc<dyn IdleSource> {
        match self.idle_interval_ms {
            Some(ms) => Arc::new(IntervalIdle::new(Duration::from_millis(ms))),
            None => Arc::new(YieldIdle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.queue_order, QueueOrder::Lifo);
        assert_eq!(config.eviction_grace(), Some(Duration::from_secs(30)));
        assert_eq!(config.idle_interval_ms, None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = StoreConfig::from_json(r#"{"queue_order": "fifo"}"#).unwrap();
        assert_eq!(config.queue_order, QueueOrder::Fifo);
        assert_eq!(config.eviction_grace_ms, Some(DEFAULT_EVICTION_GRACE_MS));
    }

    #[test]
    fn test_null_grace_disables_eviction() {
        let config =
            StoreConfig::from_json(r#"{"eviction_grace_ms": null, "idle_interval_ms": 16}"#)
                .unwrap();
        assert_eq!(config.eviction_grace(), None);
        assert_eq!(config.idle_interval_ms, Some(16));
    }

    #[test]
    fn test_rejects_unknown_order() {
        assert!(StoreConfig::from_json(r#"{"queue_order": "random"}"#).is_err());
    }
}
