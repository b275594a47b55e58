//! Audit event types.
//!
//! The event set is closed: every security-relevant path in the gateway maps
//! to exactly one variant, so downstream consumers can alert on names without
//! parsing free text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // ===== ask tool =====
    AskInputValidationFailed,
    AskSqlGenerationFailed,
    AskDryRunSuccess,
    AskDryRunGuardFailed,
    AskGuardFailed,
    AskQueryFailed,
    AskSuccess,

    // ===== search tool =====
    SearchInputValidationFailed,
    SearchSqlBuildFailed,
    SearchQueryFailed,
    SearchSuccess,

    // ===== stream tool =====
    StreamInputValidationFailed,
    StreamSqlGenerationFailed,
    StreamGuardFailed,
    StreamQueryFailed,
    StreamSuccess,

    // ===== transport / lifecycle =====
    AuthFailed,
    ServerStart,
}

impl AuditEventType {
    /// Wire name of the event, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AskInputValidationFailed => "ask_input_validation_failed",
            Self::AskSqlGenerationFailed => "ask_sql_generation_failed",
            Self::AskDryRunSuccess => "ask_dry_run_success",
            Self::AskDryRunGuardFailed => "ask_dry_run_guard_failed",
            Self::AskGuardFailed => "ask_guard_failed",
            Self::AskQueryFailed => "ask_query_failed",
            Self::AskSuccess => "ask_success",
            Self::SearchInputValidationFailed => "search_input_validation_failed",
            Self::SearchSqlBuildFailed => "search_sql_build_failed",
            Self::SearchQueryFailed => "search_query_failed",
            Self::SearchSuccess => "search_success",
            Self::StreamInputValidationFailed => "stream_input_validation_failed",
            Self::StreamSqlGenerationFailed => "stream_sql_generation_failed",
            Self::StreamGuardFailed => "stream_guard_failed",
            Self::StreamQueryFailed => "stream_query_failed",
            Self::StreamSuccess => "stream_success",
            Self::AuthFailed => "auth_failed",
            Self::ServerStart => "server_start",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Event type.
    pub event: AuditEventType,

    /// Caller identity, or "system" for lifecycle events.
    pub actor: String,

    /// Sanitized question or SQL the event refers to.
    pub payload: String,

    /// Free-form outcome description (row counts, error text).
    pub outcome: String,

    /// Whether the audited operation succeeded.
    pub success: bool,
}

impl AuditEvent {
    /// Create a new audit event stamped with the current time.
    pub fn new(
        event: AuditEventType,
        actor: impl Into<String>,
        payload: impl Into<String>,
        outcome: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event,
            actor: actor.into(),
            payload: payload.into(),
            outcome: outcome.into(),
            success,
        }
    }

    /// Format the event as a human-readable log line.
    pub fn to_log_line(&self) -> String {
        let payload_preview = if self.payload.len() > 100 {
            format!("{}...", &self.payload[..100])
        } else {
            self.payload.clone()
        };
        format!(
            "[{}] {} actor={} success={} payload=\"{}\" outcome=\"{}\"",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event,
            self.actor,
            self.success,
            payload_preview.replace('\n', " "),
            self.outcome.replace('"', "'"),
        )
    }
}
