//! Error types for the MCP crate.

use thiserror::Error;

use pgmcp_guard::{GuardError, SanitizeError};
use pgmcp_llm::TranslateError;
use pgmcp_pg::{ExecError, IntrospectError, SearchError};

/// Failure of one tool invocation. Messages are surfaced to the caller, so
/// they stay short and never carry connection strings or stack traces.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Rejected natural-language input.
    #[error("{0}")]
    Input(#[from] SanitizeError),

    /// Catalog introspection failed or timed out.
    #[error("schema introspection failed: {0}")]
    Introspect(#[from] IntrospectError),

    /// The language model call failed.
    #[error("sql generation failed: {0}")]
    Translate(#[from] TranslateError),

    /// The admission gate rejected the generated SQL. The statement is kept
    /// so the response can include it for transparency.
    #[error("{source}")]
    Guard {
        #[source]
        source: GuardError,
        sql: String,
    },

    /// Free-text search could not be built.
    #[error("{0}")]
    Search(#[from] SearchError),

    /// Query execution failed.
    #[error("{0}")]
    Exec(#[from] ExecError),
}

/// Errors from the MCP server and transport.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
