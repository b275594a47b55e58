//! Tool execution.
//!
//! This module runs the three tools end-to-end: sanitize the question, fetch
//! the cached schema summary, translate to SQL, pass the admission gate,
//! execute under a read-only transaction, and audit every outcome. Database
//! failures caused by faulty model output (missing column, missing table,
//! syntax error) are converted into structured results so one bad generation
//! does not break the session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use pgmcp_audit::{AuditEvent, AuditEventType, AuditSink};
use pgmcp_core::{GatewayConfig, AUTO_STREAM_MAX_PAGES, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use pgmcp_guard::{guard_read_only, is_expensive, sanitize_question, simplify_expensive};
use pgmcp_llm::Translator;
use pgmcp_pg::{
    build_search_sql, list_text_columns, run_paginated, run_read_only, run_streaming,
    total_pages, Page, PgPool, PgSchemaSource, QueryFailure, ResultRow, SchemaCache,
};

use crate::error::ToolError;
use crate::protocol::ToolContent;

/// The transport does not expose the caller's address, so every tool-level
/// audit record carries this actor.
const CALLER: &str = "unknown";

const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Arguments to the `ask` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskInput {
    pub query: String,
    #[serde(default)]
    pub max_rows: usize,
    #[serde(default)]
    pub dry_run: bool,
    /// Explicit 0-based page; switches off auto-streaming.
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: usize,
    /// Accepted for wire compatibility; auto-streaming is the default.
    #[serde(default)]
    pub stream_all: bool,
}

/// Result of the `ask` tool.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AskOutput {
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<ResultRow>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<usize>,
}

/// Arguments to the `search` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchInput {
    pub q: String,
    #[serde(default)]
    pub limit: usize,
}

/// Result of the `search` tool.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutput {
    pub sql: String,
    pub rows: Vec<ResultRow>,
}

/// Arguments to the `stream` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamInput {
    pub query: String,
    #[serde(default)]
    pub max_pages: usize,
    #[serde(default)]
    pub page_size: usize,
}

/// Result of the `stream` tool.
#[derive(Debug, Clone, Serialize)]
pub struct StreamOutput {
    pub sql: String,
    pub pages: Vec<Page>,
    pub total_rows: usize,
    pub total_pages: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
}

/// Result of a tool execution, ready for the JSON-RPC layer.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub content: Vec<ToolContent>,
}

impl ExecutionResult {
    pub fn success_json(value: Value) -> Self {
        Self {
            success: true,
            content: vec![ToolContent::Json { json: value }],
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
        }
    }

    pub fn error_json(value: Value) -> Self {
        Self {
            success: false,
            content: vec![ToolContent::Json { json: value }],
        }
    }
}

/// Executes tool calls against the database.
pub struct ToolExecutor {
    cfg: GatewayConfig,
    pool: PgPool,
    cache: SchemaCache,
    source: PgSchemaSource,
    translator: Translator,
    audit: Arc<dyn AuditSink>,
}

impl ToolExecutor {
    pub fn new(
        cfg: GatewayConfig,
        pool: PgPool,
        cache: SchemaCache,
        translator: Translator,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let source = PgSchemaSource::new(pool.clone());
        Self {
            cfg,
            pool,
            cache,
            source,
            translator,
            audit,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn audit_sink(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    fn audit(&self, event: AuditEventType, payload: &str, outcome: &str, success: bool) {
        self.audit
            .record(AuditEvent::new(event, CALLER, payload, outcome, success));
    }

    /// Dispatch a tool call by name.
    pub async fn execute(&self, name: &str, arguments: Value) -> ExecutionResult {
        match name {
            "ask" => match serde_json::from_value::<AskInput>(arguments) {
                Ok(input) => to_execution(self.ask(input).await),
                Err(e) => ExecutionResult::error(format!("invalid arguments: {e}")),
            },
            "search" => match serde_json::from_value::<SearchInput>(arguments) {
                Ok(input) => to_execution(self.search(input).await),
                Err(e) => ExecutionResult::error(format!("invalid arguments: {e}")),
            },
            "stream" => match serde_json::from_value::<StreamInput>(arguments) {
                Ok(input) => to_execution(self.stream(input).await),
                Err(e) => ExecutionResult::error(format!("invalid arguments: {e}")),
            },
            other => ExecutionResult::error(format!("unknown tool: {other}")),
        }
    }

    /// The `ask` tool.
    pub async fn ask(&self, input: AskInput) -> Result<AskOutput, ToolError> {
        tracing::debug!(
            tool = "ask",
            query = %input.query.trim(),
            max_rows = input.max_rows,
            dry_run = input.dry_run,
            page = ?input.page,
            page_size = input.page_size,
            "request"
        );

        let question = match sanitize_question(&input.query) {
            Ok(q) => q,
            Err(e) => {
                self.audit(
                    AuditEventType::AskInputValidationFailed,
                    &input.query,
                    &e.to_string(),
                    false,
                );
                return Err(e.into());
            }
        };

        let schema = self.cache.get(&self.source).await?;

        // The configured ceiling is a hard cap on whatever the caller asks for.
        let max_rows = input.max_rows.min(self.cfg.max_rows);

        let mut page_size = min_non_zero(input.page_size, DEFAULT_PAGE_SIZE);
        if max_rows > 0 {
            page_size = min_non_zero(max_rows, page_size);
        }

        // Ask the model for a generous window; paging trims it afterwards.
        let generated = match self
            .translator
            .generate_sql(&question, &schema, page_size * 10)
            .await
        {
            Ok(g) => g,
            Err(e) => {
                self.audit(
                    AuditEventType::AskSqlGenerationFailed,
                    &question,
                    &e.to_string(),
                    false,
                );
                return Err(e.into());
            }
        };
        let note = generated.note;
        let mut sql = generated.sql;

        if input.dry_run {
            if let Err(e) = guard_read_only(&sql) {
                self.audit(
                    AuditEventType::AskDryRunGuardFailed,
                    &sql,
                    &e.to_string(),
                    false,
                );
                return Err(ToolError::Guard { source: e, sql });
            }
            self.audit(AuditEventType::AskDryRunSuccess, &question, &sql, true);
            return Ok(AskOutput {
                sql,
                note,
                ..AskOutput::default()
            });
        }

        if let Err(e) = guard_read_only(&sql) {
            self.audit(AuditEventType::AskGuardFailed, &sql, &e.to_string(), false);
            return Err(ToolError::Guard { source: e, sql });
        }

        if is_expensive(&sql) {
            tracing::warn!(sql = %sql, "potentially expensive query detected");
            if self.cfg.reject_expensive_joins {
                sql = simplify_expensive(&sql);
                tracing::info!(simplified_sql = %sql, "query simplified for performance");
            }
        }

        if let Some(page) = input.page {
            return self.ask_paginated(&sql, page, page_size, &note).await;
        }

        let max_pages = if max_rows > 0 {
            max_rows.div_ceil(page_size)
        } else {
            AUTO_STREAM_MAX_PAGES
        };

        match run_streaming(
            &self.pool,
            &sql,
            max_pages,
            page_size,
            self.cfg.query_timeout,
        )
        .await
        {
            Ok(stream) => {
                let page_count = stream.pages.len();
                let rows: Vec<ResultRow> = stream
                    .pages
                    .into_iter()
                    .flat_map(|p| p.rows)
                    .collect();

                self.audit(
                    AuditEventType::AskSuccess,
                    &question,
                    &format!(
                        "streamed {} rows across {} pages",
                        stream.total_rows, page_count
                    ),
                    true,
                );
                tracing::debug!(
                    tool = "ask",
                    total_rows = stream.total_rows,
                    pages = page_count,
                    returned_rows = rows.len(),
                    "done"
                );

                Ok(AskOutput {
                    sql,
                    rows,
                    note: format!("{note} (streamed {page_count} pages)"),
                    ..AskOutput::default()
                })
            }
            Err(e) => {
                self.audit(AuditEventType::AskQueryFailed, &sql, &e.to_string(), false);
                match structured_failure(QueryFailure::classify(&e), &sql, &note) {
                    Some(output) => Ok(output),
                    None => Err(e.into()),
                }
            }
        }
    }

    async fn ask_paginated(
        &self,
        sql: &str,
        page: usize,
        page_size: usize,
        note: &str,
    ) -> Result<AskOutput, ToolError> {
        match run_paginated(&self.pool, sql, page, page_size, self.cfg.query_timeout).await {
            Ok(result) => {
                self.audit(
                    AuditEventType::AskSuccess,
                    sql,
                    &format!(
                        "page {} of {} rows total",
                        result.page, result.total_count
                    ),
                    true,
                );
                Ok(AskOutput {
                    sql: sql.to_string(),
                    rows: result.rows,
                    note: note.to_string(),
                    page: Some(result.page),
                    page_size: Some(result.page_size),
                    total_count: Some(result.total_count),
                    has_more: result.has_more,
                    next_page: Some(result.next_page),
                })
            }
            Err(e) => {
                self.audit(AuditEventType::AskQueryFailed, sql, &e.to_string(), false);
                match structured_failure(QueryFailure::classify(&e), sql, note) {
                    Some(output) => Ok(output),
                    None => Err(e.into()),
                }
            }
        }
    }

    /// The `search` tool.
    pub async fn search(&self, input: SearchInput) -> Result<SearchOutput, ToolError> {
        tracing::debug!(tool = "search", q = %input.q.trim(), limit = input.limit, "request");

        let needle = match sanitize_question(&input.q) {
            Ok(q) => q,
            Err(e) => {
                self.audit(
                    AuditEventType::SearchInputValidationFailed,
                    &input.q,
                    &e.to_string(),
                    false,
                );
                return Err(e.into());
            }
        };

        let limit = min_non_zero(input.limit, DEFAULT_SEARCH_LIMIT).min(self.cfg.max_rows);

        let sql = match self.build_search(&needle, limit).await {
            Ok(sql) => sql,
            Err(e) => {
                self.audit(
                    AuditEventType::SearchSqlBuildFailed,
                    &needle,
                    &e.to_string(),
                    false,
                );
                return Err(e);
            }
        };
        tracing::debug!(tool = "search", sql = %sql, "generated sql");

        match run_read_only(&self.pool, &sql, limit, self.cfg.query_timeout).await {
            Ok(rows) => {
                self.audit(
                    AuditEventType::SearchSuccess,
                    &needle,
                    &format!("returned {} rows", rows.len()),
                    true,
                );
                Ok(SearchOutput { sql, rows })
            }
            Err(e) => {
                self.audit(
                    AuditEventType::SearchQueryFailed,
                    &sql,
                    &e.to_string(),
                    false,
                );
                Err(e.into())
            }
        }
    }

    async fn build_search(&self, needle: &str, limit: usize) -> Result<String, ToolError> {
        let columns = list_text_columns(&self.pool).await?;
        let sql = build_search_sql(&columns, needle, limit)?;

        // The synthesized SQL goes through the same gate as generated SQL.
        if let Err(e) = guard_read_only(&sql) {
            return Err(ToolError::Guard { source: e, sql });
        }
        Ok(sql)
    }

    /// The `stream` tool.
    pub async fn stream(&self, input: StreamInput) -> Result<StreamOutput, ToolError> {
        tracing::debug!(
            tool = "stream",
            query = %input.query.trim(),
            max_pages = input.max_pages,
            page_size = input.page_size,
            "request"
        );

        let question = match sanitize_question(&input.query) {
            Ok(q) => q,
            Err(e) => {
                self.audit(
                    AuditEventType::StreamInputValidationFailed,
                    &input.query,
                    &e.to_string(),
                    false,
                );
                return Err(e.into());
            }
        };

        let schema = self.cache.get(&self.source).await?;

        let max_pages = min_non_zero(input.max_pages, DEFAULT_MAX_PAGES);
        let page_size = min_non_zero(input.page_size, DEFAULT_PAGE_SIZE);

        let generated = match self
            .translator
            .generate_sql(&question, &schema, page_size * max_pages)
            .await
        {
            Ok(g) => g,
            Err(e) => {
                self.audit(
                    AuditEventType::StreamSqlGenerationFailed,
                    &question,
                    &e.to_string(),
                    false,
                );
                return Err(e.into());
            }
        };

        if let Err(e) = guard_read_only(&generated.sql) {
            self.audit(
                AuditEventType::StreamGuardFailed,
                &generated.sql,
                &e.to_string(),
                false,
            );
            return Err(ToolError::Guard {
                source: e,
                sql: generated.sql,
            });
        }

        match run_streaming(
            &self.pool,
            &generated.sql,
            max_pages,
            page_size,
            self.cfg.query_timeout,
        )
        .await
        {
            Ok(stream) => {
                self.audit(
                    AuditEventType::StreamSuccess,
                    &question,
                    &format!(
                        "returned {} rows in {} pages",
                        stream.total_rows,
                        stream.pages.len()
                    ),
                    true,
                );

                Ok(StreamOutput {
                    sql: generated.sql,
                    total_pages: total_pages(stream.total_rows, page_size),
                    total_rows: stream.total_rows,
                    pages: stream.pages,
                    note: generated.note,
                })
            }
            Err(e) => {
                self.audit(
                    AuditEventType::StreamQueryFailed,
                    &generated.sql,
                    &e.to_string(),
                    false,
                );
                Err(e.into())
            }
        }
    }
}

/// Clamp an optional caller value into (0, max]; zero selects the default.
pub fn min_non_zero(value: usize, max: usize) -> usize {
    if value == 0 || value > max {
        max
    } else {
        value
    }
}

/// Convert a recoverable query failure into a structured one-row result, or
/// `None` when the failure should propagate as a tool error.
pub fn structured_failure(kind: QueryFailure, sql: &str, note: &str) -> Option<AskOutput> {
    let (error, suggestion, tag) = match kind {
        QueryFailure::ColumnNotFound => (
            "Column not found in generated query",
            "Try rephrasing your question or ask about specific tables",
            "column not found",
        ),
        QueryFailure::RelationNotFound => (
            "Table not found in generated query",
            "Check available tables or rephrase your question",
            "table not found",
        ),
        QueryFailure::SyntaxError => (
            "SQL syntax error in generated query",
            "Try rephrasing your question more clearly",
            "syntax error",
        ),
        QueryFailure::Other => return None,
    };

    let mut row = ResultRow::new();
    row.insert("error".to_string(), json!(error));
    row.insert("suggestion".to_string(), json!(suggestion));
    row.insert("original_sql".to_string(), json!(sql));

    Some(AskOutput {
        sql: sql.to_string(),
        rows: vec![row],
        note: format!("{note} (query failed - {tag})"),
        ..AskOutput::default()
    })
}

fn to_execution<T: Serialize>(result: Result<T, ToolError>) -> ExecutionResult {
    match result {
        Ok(output) => match serde_json::to_value(&output) {
            Ok(value) => ExecutionResult::success_json(value),
            Err(e) => ExecutionResult::error(format!("serialization error: {e}")),
        },
        Err(ToolError::Guard { source, sql }) => {
            ExecutionResult::error_json(json!({ "error": source.to_string(), "sql": sql }))
        }
        Err(other) => ExecutionResult::error(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_non_zero() {
        assert_eq!(min_non_zero(0, 50), 50);
        assert_eq!(min_non_zero(10, 50), 10);
        assert_eq!(min_non_zero(50, 50), 50);
        assert_eq!(min_non_zero(100, 50), 50);
    }

    #[test]
    fn test_structured_failure_column_not_found() {
        let output = structured_failure(
            QueryFailure::ColumnNotFound,
            "SELECT user_id FROM order_items",
            "model=gpt-4o-mini",
        )
        .unwrap();

        assert_eq!(output.note, "model=gpt-4o-mini (query failed - column not found)");
        assert_eq!(output.rows.len(), 1);
        let row = &output.rows[0];
        assert_eq!(row["error"], "Column not found in generated query");
        assert_eq!(row["original_sql"], "SELECT user_id FROM order_items");
        assert!(row["suggestion"].as_str().unwrap().contains("rephras"));
        assert!(!output.has_more);
    }

    #[test]
    fn test_structured_failure_relation_and_syntax() {
        let output =
            structured_failure(QueryFailure::RelationNotFound, "SELECT * FROM ghosts", "m").unwrap();
        assert!(output.note.ends_with("(query failed - table not found)"));

        let output =
            structured_failure(QueryFailure::SyntaxError, "SELEC * FORM users", "m").unwrap();
        assert!(output.note.ends_with("(query failed - syntax error)"));
    }

    #[test]
    fn test_structured_failure_other_propagates() {
        assert!(structured_failure(QueryFailure::Other, "SELECT 1", "m").is_none());
    }

    #[test]
    fn test_ask_output_serialization_shape() {
        let output = AskOutput {
            sql: "SELECT 1".to_string(),
            note: "model=m".to_string(),
            ..AskOutput::default()
        };
        let v = serde_json::to_value(&output).unwrap();
        assert_eq!(v["sql"], "SELECT 1");
        // Empty rows and unset pagination fields are omitted; has_more is
        // always present.
        assert!(v.get("rows").is_none());
        assert!(v.get("page").is_none());
        assert_eq!(v["has_more"], false);
    }

    #[test]
    fn test_ask_output_paginated_serialization() {
        let output = AskOutput {
            sql: "SELECT 1".to_string(),
            page: Some(0),
            page_size: Some(50),
            total_count: Some(0),
            has_more: false,
            next_page: Some(0),
            ..AskOutput::default()
        };
        let v = serde_json::to_value(&output).unwrap();
        assert_eq!(v["total_count"], 0);
        assert_eq!(v["has_more"], false);
        assert_eq!(v["next_page"], 0);
    }

    #[test]
    fn test_ask_input_defaults() {
        let input: AskInput = serde_json::from_value(json!({"query": "how many users"})).unwrap();
        assert_eq!(input.query, "how many users");
        assert_eq!(input.max_rows, 0);
        assert!(!input.dry_run);
        assert!(input.page.is_none());
    }

    #[test]
    fn test_guard_error_result_includes_sql() {
        let err = ToolError::Guard {
            source: pgmcp_guard::GuardError::WriteAttempt,
            sql: "DELETE FROM users WHERE 1=1".to_string(),
        };
        let result = to_execution::<AskOutput>(Err(err));
        assert!(!result.success);
        match &result.content[0] {
            ToolContent::Json { json } => {
                assert_eq!(json["sql"], "DELETE FROM users WHERE 1=1");
                assert!(json["error"].as_str().unwrap().contains("non-read-only"));
            }
            other => panic!("expected json content, got {other:?}"),
        }
    }
}
