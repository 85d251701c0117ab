//! Macros for reducing thunk boilerplate.

/// Build a [`Thunk`](crate::Thunk) from a closure-like body.
///
/// The body must evaluate to a [`ThunkResult`](crate::ThunkResult). Prefix the body with
/// `async` to get a suspending thunk that owns its store handle.
///
/// # Example
///
/// ```ignore
/// use idlestore::{thunk, mutation, Action};
///
/// let bump_twice = thunk!(|store| {
///     store.dispatch_sync(mutation("counter.value", increment))?;
///     store.dispatch_sync(mutation("counter.value", increment))?;
///     Ok(Action::none())
/// });
///
/// let fetch_later = thunk!(|store| async {
///     let value = load_remote().await?;
///     Ok(Record::volatile_set("remote", value)?.into())
/// });
/// ```
#[macro_export]
macro_rules! thunk {
    (|$store:ident| async move $body:block) => {
        $crate::thunk!(|$store| async $body)
    };
    (|$store:ident| async $body:block) => {
        $crate::Thunk::suspending(move |$store: $crate::StoreHandle| {
            $crate::__suspending_body(async move $body)
        })
    };
    (|$store:ident| $body:expr) => {
        $crate::Thunk::new(move |$store: &$crate::StoreHandle| -> $crate::ThunkResult {
            $body
        })
    };
}

/// Pins a suspending body's output type so `?` converts into `anyhow::Error`.
#[doc(hidden)]
pub fn __suspending_body<Fut>(body: Fut) -> Fut
where
    Fut: std::future::Future<Output = crate::ThunkResult>,
{
    body
}
