//! Resilience middleware for the backend contract.
//!
//! Each wrapper holds an inner `Arc<dyn Backend>` and implements
//! [`braid_core::Backend`] itself, so wrappers stack in any order. All
//! waiting (throttle spacing, retry backoff) is scheduled on the tokio
//! timer via `braid_runtime::delay` — no worker thread ever sleeps.

pub mod breaker;
pub mod logging;
pub mod retry;
pub mod throttle;
pub mod timeout;
