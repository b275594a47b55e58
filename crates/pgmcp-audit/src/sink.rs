//! Audit sinks.

use std::sync::{Arc, Mutex};

use crate::event::AuditEvent;

/// Destination for audit records. Implementations must be safe to share
/// across concurrent tool invocations.
pub trait AuditSink: Send + Sync {
    /// Record one event. Called synchronously before control proceeds.
    fn record(&self, event: AuditEvent);
}

/// Sink that emits each record as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            event_id = %event.event_id,
            event = %event.event,
            actor = %event.actor,
            payload = %event.payload,
            outcome = %event.outcome,
            success = event.success,
            "audit_log"
        );
    }
}

/// Sink that captures events in memory, for tests and previews.
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    inner: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded events, leaving the sink empty.
    pub fn drain(&self) -> Vec<AuditEvent> {
        let mut guard = self.inner.lock().unwrap();
        std::mem::take(&mut *guard)
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut guard = self.inner.lock().unwrap();
        guard.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditEventType;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditEvent::new(
            AuditEventType::ServerStart,
            "system",
            "",
            "0.0.0.0:8080",
            true,
        ));
        sink.record(AuditEvent::new(
            AuditEventType::AskSuccess,
            "unknown",
            "list users",
            "streamed 10 rows",
            true,
        ));

        let events = sink.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, AuditEventType::ServerStart);
        assert_eq!(events[1].event, AuditEventType::AskSuccess);
        assert!(sink.is_empty());
    }
}
