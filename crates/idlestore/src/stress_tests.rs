//! Randomized dispatch storms.
//!
//! Many tasks on a multi-threaded runtime mix synchronous and queued
//! dispatches, reads and failing thunks. Increments commute, so the final
//! count is known regardless of drain order. Ordering and shutdown storms
//! check that concurrent drainers and late dispatches never lose an action.

use crate::{
    mutation, Action, QueueOrder, StoreBuilder, StoreConfig, StoreError, StoreHandle, Thunk,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn increment(v: &Value) -> Value {
    json!(v.as_i64().unwrap_or(0) + 1)
}

fn counter(store: &StoreHandle) -> i64 {
    store.get_state()["counter"]["value"].as_i64().unwrap_or(-1)
}

fn counter_store() -> StoreHandle {
    StoreBuilder::new()
        .initial_state(json!({"counter": {"value": 0}}))
        .error_handler(|_: &anyhow::Error, _: &Action, _: &Value| {})
        .build()
        .start()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_mixed_sync_and_queued_increments() {
    let store = counter_store();
    let tasks = 8;
    let per_task = 200;

    let workers: Vec<_> = (0..tasks)
        .map(|seed| {
            let store = store.clone();
            tokio::spawn(async move {
                let mut rng = fastrand::Rng::with_seed(seed);
                let mut pending = Vec::new();
                for _ in 0..per_task {
                    match rng.u8(0..3) {
                        0 => {
                            store.dispatch_sync(mutation("counter.value", increment)).unwrap();
                        }
                        1 => pending.push(store.dispatch(mutation("counter.value", increment))),
                        _ => {
                            store.dispatch(mutation("counter.value", increment)).await.unwrap();
                        }
                    }
                    if rng.bool() {
                        counter(&store);
                    }
                }
                for dispatched in pending {
                    dispatched.await.unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(counter(&store), (tasks * per_task) as i64);
    assert_eq!(store.queued(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_failures_never_lose_other_actions() {
    let store = counter_store();
    let mut rng = fastrand::Rng::with_seed(7);
    let mut dispatched = Vec::new();
    let mut expected_ok = 0;

    for _ in 0..500 {
        if rng.u8(0..5) == 0 {
            dispatched.push((false, store.dispatch(Thunk::new(|_| anyhow::bail!("storm")))));
        } else {
            expected_ok += 1;
            dispatched.push((true, store.dispatch(mutation("counter.value", increment))));
        }
    }

    let mut settled_ok = 0;
    for (should_succeed, pending) in dispatched {
        match pending.await {
            Ok(_) => {
                assert!(should_succeed);
                settled_ok += 1;
            }
            Err(StoreError::ThunkFailed(_)) => assert!(!should_succeed),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(settled_ok, expected_ok);
    assert_eq!(counter(&store), expected_ok as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_suspending_thunks_complete() {
    let store = counter_store();
    let finished = Arc::new(AtomicUsize::new(0));
    let mut rng = fastrand::Rng::with_seed(42);

    let dispatched: Vec<_> = (0..100)
        .map(|_| {
            let finished = finished.clone();
            let yields = rng.usize(0..4);
            store.dispatch(Thunk::suspending(move |store| {
                let finished = finished.clone();
                async move {
                    for _ in 0..yields {
                        tokio::task::yield_now().await;
                    }
                    store.dispatch_sync(mutation("counter.value", increment))?;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(Action::none())
                }
            }))
        })
        .collect();

    for pending in dispatched {
        pending.await.unwrap();
    }

    assert_eq!(finished.load(Ordering::SeqCst), 100);
    assert_eq!(counter(&store), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_concurrent_drainers_keep_queue_order() {
    let config = StoreConfig {
        queue_order: QueueOrder::Fifo,
        ..StoreConfig::default()
    };
    let store = StoreBuilder::new().config(config).build().start().unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let dispatched: Vec<_> = (0..1000)
        .map(|i| {
            let order = order.clone();
            store.dispatch(Thunk::new(move |_| {
                order.lock().unwrap().push(i);
                Ok(Action::none())
            }))
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                while store.queued() > 0 {
                    store.get_state();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for pending in dispatched {
        pending.await.unwrap();
    }
    for reader in readers {
        reader.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), (0..1000).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_dispatch_racing_shutdown_always_settles() {
    for round in 0..20 {
        let store = counter_store();
        let mut rng = fastrand::Rng::with_seed(round);
        let stop_after = rng.usize(0..200);

        let dispatchers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    (0..100)
                        .map(|_| store.dispatch(mutation("counter.value", increment)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let stopper = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..stop_after {
                    tokio::task::yield_now().await;
                }
                store.shutdown();
            })
        };

        stopper.await.unwrap();
        for dispatcher in dispatchers {
            for pending in dispatcher.await.unwrap() {
                let settled = tokio::time::timeout(Duration::from_secs(5), pending)
                    .await
                    .expect("dispatch left unsettled after shutdown");
                assert!(matches!(settled, Ok(_) | Err(StoreError::ShutDown)));
            }
        }
        assert_eq!(store.queued(), 0);
    }
}
