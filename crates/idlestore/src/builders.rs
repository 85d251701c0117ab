//! Action builders for code that reads from or writes to a store.
//!
//! - [`selector`] reads the value at a path.
//! - [`mutation`] computes a new value from the current one and emits a
//!   volatile-set record for it.
//!
//! Both produce synchronous thunks, so they work with `dispatch_sync` as
//! well as `dispatch`. Paths are parsed up front; an invalid path surfaces
//! as a thunk error when the action is applied.

use crate::action::{Action, Meta, Record, Thunk, Updater, VOLATILE_SET};
use crate::error::PathError;
use crate::path::StatePath;
use serde_json::Value;

/// Thunk returning the value at `path`, or `null` when absent.
pub fn selector(path: &str) -> Thunk {
    let parsed = StatePath::parse(path);
    Thunk::new(move |store| {
        let path = parsed.clone()?;
        let value = path.get(&store.get_state()).cloned().unwrap_or(Value::Null);
        Ok(Action::Value(value))
    })
}

/// Thunk emitting `VOLATILE_SET` with `updater(current value at path)`.
///
/// The record's meta carries the path, the previous value and the updater.
pub fn mutation<F>(path: &str, updater: F) -> Thunk
where
    F: Fn(&Value) -> Value + Send + Sync + 'static,
{
    build_mutation(StatePath::parse(path), Updater::new(updater), Value::Null)
}

/// Like [`mutation`], but the updater also receives `arg`.
///
/// `arg` is recorded in `meta.extra`.
pub fn mutation_with<F>(path: &str, arg: Value, updater: F) -> Thunk
where
    F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
{
    let captured = arg.clone();
    let updater = Updater::new(move |current| updater(current, &captured));
    build_mutation(StatePath::parse(path), updater, arg)
}

fn build_mutation(parsed: Result<StatePath, PathError>, updater: Updater, extra: Value) -> Thunk {
    Thunk::new(move |store| {
        let path = parsed.clone()?;
        let old_value = path.get(&store.get_state()).cloned().unwrap_or(Value::Null);
        let payload = updater.apply(&old_value);
        let record = Record::new(VOLATILE_SET, payload).with_meta(Meta {
            path: Some(path),
            old_value: Some(old_value),
            updater: Some(updater.clone()),
            extra: extra.clone(),
        });
        Ok(Action::Record(record))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{StoreBuilder, StoreHandle};
    use serde_json::json;

    fn store() -> StoreHandle {
        StoreBuilder::new()
            .initial_state(json!({"counter": {"value": 1}, "items": ["a", "b"]}))
            .build()
            .start()
            .unwrap()
    }

    #[tokio::test]
    async fn test_selector_reads_path() {
        let store = store();

        let value = store.dispatch_sync(selector("items[1]")).unwrap().unwrap();
        let missing = store.dispatch_sync(selector("nope.nothing")).unwrap().unwrap();

        assert_eq!(value.into_value(), Some(json!("b")));
        assert_eq!(missing.into_value(), Some(Value::Null));
    }

    #[tokio::test]
    async fn test_selector_sees_queued_updates() {
        let store = store();
        let _queued = store.dispatch(Record::volatile_set("counter.value", json!(42)).unwrap());

        let value = store.dispatch_sync(selector("counter.value")).unwrap().unwrap();

        assert_eq!(value.into_value(), Some(json!(42)));
    }

    #[tokio::test]
    async fn test_mutation_records_old_value_and_updater() {
        let store = store();

        let result = store
            .dispatch_sync(mutation("counter.value", |v| json!(v.as_i64().unwrap_or(0) * 3)))
            .unwrap()
            .unwrap();
        let record = result.as_record().unwrap();

        assert_eq!(record.kind, VOLATILE_SET);
        assert_eq!(record.payload, json!(3));
        assert_eq!(record.meta.old_value, Some(json!(1)));
        assert_eq!(record.meta.updater.as_ref().unwrap().apply(&json!(2)), json!(6));
        assert_eq!(store.get_state()["counter"]["value"], json!(3));
    }

    #[tokio::test]
    async fn test_mutation_with_argument() {
        let store = store();
        let add = |v: &Value, by: &Value| json!(v.as_i64().unwrap_or(0) + by.as_i64().unwrap_or(0));
        let sub = |v: &Value, by: &Value| json!(v.as_i64().unwrap_or(0) - by.as_i64().unwrap_or(0));

        store.dispatch_sync(mutation_with("counter.value", json!(5), add)).unwrap();
        let result = store
            .dispatch_sync(mutation_with("counter.value", json!(2), sub))
            .unwrap()
            .unwrap();

        assert_eq!(store.get_state()["counter"]["value"], json!(4));
        assert_eq!(result.as_record().unwrap().meta.extra, json!(2));
    }

    #[tokio::test]
    async fn test_invalid_path_fails_when_applied() {
        let store = store();

        let err = store.dispatch_sync(mutation("a..b", |v| v.clone())).unwrap_err();

        assert!(matches!(err, StoreError::ThunkFailed(_)));
        assert_eq!(
            err.cause().unwrap().downcast_ref::<PathError>(),
            Some(&PathError::EmptySegment("a..b".into()))
        );
    }

    #[tokio::test]
    async fn test_out_of_range_index_fails_without_touching_state() {
        let store = store();
        let raw = format!("items[{}]", usize::MAX);

        let err = store.dispatch_sync(mutation(&raw, |_| json!("x"))).unwrap_err();

        assert_eq!(
            err.cause().unwrap().downcast_ref::<PathError>(),
            Some(&PathError::MalformedIndex(raw.clone()))
        );
        assert!(Record::volatile_set(&raw, json!("x")).is_err());
        assert_eq!(store.get_state()["items"], json!(["a", "b"]));
    }
}
