//! Fire-and-forget structured diagnostics.
//!
//! The pipeline emits one event per notable decision (retry, fallback,
//! rewrite outcome, encode fallback). Sinks must be cheap and must never
//! block; a panicking sink is swallowed rather than failing the request.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// One observability record. Field values are JSON so sinks can forward
/// events without knowing their shape.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsEvent {
    pub name: String,
    pub fields: Map<String, Value>,
}

impl DiagnosticsEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// Structured event sink. Implementations must not block the pipeline.
pub trait DiagnosticsSink: Send + Sync {
    fn log(&self, event: DiagnosticsEvent);
}

/// Discards every event.
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn log(&self, _event: DiagnosticsEvent) {}
}

/// Forwards events to `tracing` at info level under the `orate::diag` target.
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn log(&self, event: DiagnosticsEvent) {
        let fields = Value::Object(event.fields);
        tracing::info!(target: "orate::diag", name = %event.name, %fields);
    }
}

/// Emit an event, isolating the pipeline from a misbehaving sink.
pub(crate) fn emit(sink: &Arc<dyn DiagnosticsSink>, event: DiagnosticsEvent) {
    let name = event.name.clone();
    if catch_unwind(AssertUnwindSafe(|| sink.log(event))).is_err() {
        warn!("diagnostics sink panicked while logging '{name}'");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    pub(crate) struct PanickingSink;

    impl DiagnosticsSink for PanickingSink {
        fn log(&self, _event: DiagnosticsEvent) {
            panic!("sink blew up");
        }
    }

    struct CollectingSink(Mutex<Vec<DiagnosticsEvent>>);

    impl DiagnosticsSink for CollectingSink {
        fn log(&self, event: DiagnosticsEvent) {
            self.0.lock().push(event);
        }
    }

    #[test]
    fn builder_accumulates_fields() {
        let event = DiagnosticsEvent::new("stt_retry")
            .with("provider", "primary")
            .with("attempt", 2)
            .with("delay_ms", 1500);
        assert_eq!(event.name, "stt_retry");
        assert_eq!(event.fields["attempt"], 2);
        assert_eq!(event.fields["provider"], "primary");
    }

    #[test]
    fn panicking_sink_does_not_propagate() {
        let sink: Arc<dyn DiagnosticsSink> = Arc::new(PanickingSink);
        emit(&sink, DiagnosticsEvent::new("boom"));
    }

    #[test]
    fn emit_delivers_to_well_behaved_sink() {
        let collecting = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let sink: Arc<dyn DiagnosticsSink> = collecting.clone();
        emit(&sink, DiagnosticsEvent::new("ok").with("k", "v"));
        let events = collecting.0.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].fields["k"], "v");
    }
}
