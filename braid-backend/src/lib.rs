#![deny(missing_docs)]
//! Backend implementations and resilience middleware for braid.
//!
//! Every type here implements or wraps [`braid_core::Backend`]. Middleware
//! composes by wrapping — the outermost wrapper runs first on entry:
//!
//! ```ignore
//! let backend = LoggingBackend::new(
//!     RetryBackend::new(
//!         TimeoutBackend::new(provider, TimeoutConfig::default()),
//!         RetryConfig::default(),
//!     ),
//! );
//! ```
//!
//! Concrete provider SDKs are external: they implement [`braid_core::Backend`]
//! in their own crates and plug into [`create_backend`] via
//! [`register_provider`]. The built-in providers are `echo` (deterministic
//! local backend) and `scripted` (queued canned responses, the test
//! fixture).

pub mod echo;
pub mod factory;
pub mod middleware;
pub mod script;

pub use echo::EchoBackend;
pub use factory::{
    BackendConfig, ProviderFactory, create_backend, register_provider, reset_providers,
};
pub use middleware::breaker::{BreakerConfig, CircuitBreakerBackend, CircuitState};
pub use middleware::logging::LoggingBackend;
pub use middleware::retry::{RetryBackend, RetryConfig, RetryPredicate};
pub use middleware::throttle::{ThrottleBackend, ThrottleConfig};
pub use middleware::timeout::{TimeoutBackend, TimeoutConfig};
pub use script::ScriptedBackend;
