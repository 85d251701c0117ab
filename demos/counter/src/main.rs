//! Counter demo: synchronous and idle-time dispatch against one store.
//!
//! Run with `RUST_LOG=idlestore=trace` to watch the scheduler drain.

use anyhow::Result;
use idlestore::{mutation_with, selector, LoggingMiddleware, StoreBuilder, StoreHandle, Thunk};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn add(current: &Value, by: &Value) -> Value {
    json!(current.as_i64().unwrap_or(0) + by.as_i64().unwrap_or(0))
}

fn incr(by: i64) -> Thunk {
    mutation_with("counter.value", json!(by), add)
}

fn decr(by: i64) -> Thunk {
    mutation_with("counter.value", json!(-by), add)
}

fn read(store: &StoreHandle) -> Result<Value> {
    let value = store
        .dispatch_sync(selector("counter.value"))?
        .and_then(|action| action.into_value())
        .unwrap_or(Value::Null);
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = StoreBuilder::new()
        .initial_state(json!({"counter": {"value": 1}}))
        .middleware(LoggingMiddleware::new())
        .build()
        .start()?;

    store.dispatch_sync(incr(1))?;
    info!(value = %read(&store)?, "after synchronous increment");

    // queued, applied newest first once the runtime is idle
    let pending = vec![store.dispatch(incr(10)), store.dispatch(decr(3))];
    info!(queued = store.queued(), "dispatched to the idle queue");

    for dispatched in pending {
        let id = dispatched.id();
        dispatched.await?;
        info!(action_id = %id, "settled");
    }
    info!(value = %read(&store)?, "after idle drain");

    let broken = store.dispatch(Thunk::new(|_| anyhow::bail!("counter jammed")));
    if let Err(error) = broken.await {
        info!(%error, "failed action rejected its own result");
    }
    store.dispatch(incr(100)).await?;

    println!("final state: {}", store.get_state());
    store.shutdown();
    Ok(())
}
