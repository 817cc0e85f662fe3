//! Instrumentation events — a publish-only side channel.
//!
//! Components emit structured records as they work; external consumers
//! (telemetry viewers, test assertions) subscribe to the process-wide bus.
//! Publishing never blocks and never fails: with no subscriber the record
//! is dropped, and a `tracing` line is emitted either way.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

/// The kinds of instrumentation events braid emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A module started or finished executing.
    ModuleExec,
    /// An optimization iteration completed.
    OptimizationIteration,
    /// A backend request is about to be issued.
    BackendRequest,
    /// A backend response (or failure) was observed.
    BackendResponse,
    /// A signature or tool schema validation failed.
    ValidationError,
    /// A timing or throughput measurement.
    PerformanceMetric,
}

impl EventKind {
    /// The stable wire name of this kind (e.g. `module/exec`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ModuleExec => "module/exec",
            EventKind::OptimizationIteration => "optimization/iteration",
            EventKind::BackendRequest => "backend/request",
            EventKind::BackendResponse => "backend/response",
            EventKind::ValidationError => "validation/error",
            EventKind::PerformanceMetric => "performance/metric",
        }
    }
}

/// One structured instrumentation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Milliseconds since the Unix epoch.
    pub at_ms: u64,
    /// Kind-specific named fields.
    pub fields: Value,
}

const BUS_CAPACITY: usize = 1024;

fn bus() -> &'static broadcast::Sender<Event> {
    static BUS: OnceLock<broadcast::Sender<Event>> = OnceLock::new();
    BUS.get_or_init(|| broadcast::channel(BUS_CAPACITY).0)
}

/// Emit an event to the process-wide bus.
pub fn emit(kind: EventKind, fields: Value) {
    let at_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    tracing::debug!(target: "braid::event", kind = kind.as_str(), %fields, "event");
    // send only errors when there are no receivers; that's fine.
    let _ = bus().send(Event { kind, at_ms, fields });
}

/// Subscribe to the process-wide event bus.
///
/// Slow consumers that fall more than the bus capacity behind observe a
/// `Lagged` error and then resume from the current position.
pub fn subscribe() -> broadcast::Receiver<Event> {
    bus().subscribe()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_wire_names() {
        assert_eq!(EventKind::ModuleExec.as_str(), "module/exec");
        assert_eq!(
            EventKind::OptimizationIteration.as_str(),
            "optimization/iteration"
        );
        assert_eq!(EventKind::BackendRequest.as_str(), "backend/request");
        assert_eq!(EventKind::BackendResponse.as_str(), "backend/response");
        assert_eq!(EventKind::ValidationError.as_str(), "validation/error");
        assert_eq!(EventKind::PerformanceMetric.as_str(), "performance/metric");
    }

    #[tokio::test]
    async fn subscriber_sees_emitted_event() {
        let mut rx = subscribe();
        emit(
            EventKind::PerformanceMetric,
            json!({"marker": "subscriber_sees_emitted_event"}),
        );
        // The bus is process-wide; skip records other tests may emit.
        loop {
            let event = rx.recv().await.unwrap();
            if event.fields["marker"] == json!("subscriber_sees_emitted_event") {
                assert_eq!(event.kind, EventKind::PerformanceMetric);
                assert!(event.at_ms > 0);
                break;
            }
        }
    }

    #[test]
    fn emit_without_subscriber_is_fine() {
        emit(EventKind::ModuleExec, json!({"module": "noop"}));
    }
}
