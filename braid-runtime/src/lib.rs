#![deny(missing_docs)]
//! Async primitives for braid.
//!
//! Everything here rides on the tokio timer wheel and task system:
//! delays are scheduled, never slept on a worker thread, and
//! [`parallel_map`] bounds how much work is in flight at once. The rest of
//! the deferred vocabulary maps directly onto the ecosystem — a deferred
//! value is a `Future`, `zip` is `futures_util::future::join_all`, and
//! `chain` is `async`/`.await` composition — so this crate only provides
//! the pieces that need real machinery.
//!
//! The scheduling contract is load-bearing: spawning a thread per delay or
//! sleeping on a worker is exactly how runaway CPU happens under load.
//! Every wait in braid (rate-limit spacing, retry backoff, per-call
//! deadlines) goes through [`delay`] or [`timeout`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A deadline expired before the wrapped operation completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {deadline_ms} ms elapsed")]
pub struct Elapsed {
    /// The deadline that expired, in milliseconds.
    pub deadline_ms: u64,
}

/// Await `future` for at most `ms` milliseconds.
///
/// A future that is already ready completes even at `ms = 0`; anything
/// that would suspend fails immediately at a zero deadline.
pub async fn timeout<F: Future>(ms: u64, future: F) -> Result<F::Output, Elapsed> {
    tokio::time::timeout(Duration::from_millis(ms), future)
        .await
        .map_err(|_| Elapsed { deadline_ms: ms })
}

/// Suspend for `ms` milliseconds on the timer wheel.
///
/// This is the only sanctioned wait in braid — no worker thread blocks,
/// no thread is spawned per delay.
pub async fn delay(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Run `ms` milliseconds in the future, returning the thunk's value.
pub async fn run_in<T, F, Fut>(ms: u64, thunk: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    delay(ms).await;
    thunk().await
}

/// Apply `f` to every item with at most `limit` operations in flight.
///
/// Results come back in input order. The first error cancels all in-flight
/// work and is returned; completed results are discarded.
pub async fn parallel_map<Item, T, E, F, Fut>(
    limit: usize,
    items: Vec<Item>,
    f: F,
) -> Result<Vec<T>, E>
where
    Item: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(Item) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let limit = limit.max(1);
    let gate = Arc::new(Semaphore::new(limit));
    let mut tasks: JoinSet<(usize, Result<T, E>)> = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let gate = Arc::clone(&gate);
        let work = f(item);
        tasks.spawn(async move {
            // Closing the gate cannot happen — the semaphore lives as long
            // as every task. Acquire failure is therefore unreachable, but
            // the task must not proceed ungated, so it parks forever.
            let _permit = match gate.acquire().await {
                Ok(permit) => permit,
                Err(_) => std::future::pending().await,
            };
            (index, work.await)
        });
    }

    let mut completed: Vec<(usize, T)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(value))) => completed.push((index, value)),
            Ok((_, Err(error))) => {
                tasks.abort_all();
                return Err(error);
            }
            Err(join_error) => {
                if join_error.is_panic() {
                    std::panic::resume_unwind(join_error.into_panic());
                }
                // Cancelled tasks only appear after abort_all, which
                // returns before reaching here.
            }
        }
    }

    completed.sort_by_key(|(index, _)| *index);
    Ok(completed.into_iter().map(|(_, value)| value).collect())
}

/// Default in-flight cap for parallel operations.
///
/// Reads the `PARALLELISM` environment variable; defaults to 8, capped
/// at 16 and floored at 1.
pub fn default_parallelism() -> usize {
    std::env::var("PARALLELISM")
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(8)
        .clamp(1, 16)
}

/// Await a future and measure its wall-clock duration in milliseconds.
pub async fn timed<F: Future>(future: F) -> (F::Output, u64) {
    let start = std::time::Instant::now();
    let output = future.await;
    (output, start.elapsed().as_millis() as u64)
}
