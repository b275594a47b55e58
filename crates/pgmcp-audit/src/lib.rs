//! # pgmcp-audit
//!
//! Append-only audit trail for security-relevant gateway events. Every tool
//! invocation, guard rejection, and auth failure produces exactly one record,
//! written synchronously to the sink before control proceeds.

pub mod event;
pub mod sink;

pub use event::{AuditEvent, AuditEventType};
pub use sink::{AuditSink, MemoryAuditSink, TracingAuditSink};
