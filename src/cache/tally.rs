//! Per-request count of invalidated cache keys.
//!
//! The trigger records every executed plan into a task-local counter when
//! one is in scope; the HTTP layer opens the scope around each request so
//! write responses can be logged with the invalidation they caused.

use std::cell::Cell;
use std::future::Future;

tokio::task_local! {
    static INVALIDATED_KEYS: Cell<usize>;
}

/// Add `keys` to the current request's tally. Ignored outside a scope.
pub fn record(keys: usize) {
    let _ = INVALIDATED_KEYS.try_with(|tally| tally.set(tally.get() + keys));
}

/// Run `future` with a fresh tally, returning its output and the number of
/// keys invalidated while it ran.
pub async fn with_tally<F, R>(future: F) -> (R, usize)
where
    F: Future<Output = R>,
{
    INVALIDATED_KEYS
        .scope(Cell::new(0), async move {
            let output = future.await;
            let keys = INVALIDATED_KEYS.with(Cell::get);
            (output, keys)
        })
        .await
}
