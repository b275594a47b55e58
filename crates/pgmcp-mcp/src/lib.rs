//! # pgmcp-mcp
//!
//! MCP (Model Context Protocol) server for the pgmcp gateway.
//!
//! This crate publishes three tools over a streamable HTTP transport:
//!
//! - **ask** — translate a plain-English question into one safe, read-only
//!   SQL statement, execute it, and stream all results back.
//! - **search** — free-text search across every text-typed column.
//! - **stream** — explicitly paginated result batches from one snapshot.
//!
//! ## Architecture
//!
//! ```text
//! AI Agent (Claude, GPT, etc.)
//!       │
//!       │ JSON-RPC over HTTP (SSE-framed responses)
//!       ▼
//! ┌──────────────────┐
//! │  pgmcp server    │
//! │  1. Sanitize     │  ← pgmcp-guard
//! │  2. Schema cache │  ← pgmcp-pg
//! │  3. NL -> SQL    │  ← pgmcp-llm
//! │  4. Admission    │  ← pgmcp-guard
//! │  5. Execute      │  ← pgmcp-pg (read-only tx)
//! │  6. Audit + JSON │  ← pgmcp-audit
//! └────────┬─────────┘
//!          │
//!          ▼
//!    Upstream Postgres
//! ```

pub mod error;
pub mod executor;
pub mod http_transport;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::{McpError, ToolError};
pub use executor::{
    AskInput, AskOutput, ExecutionResult, SearchInput, SearchOutput, StreamInput, StreamOutput,
    ToolExecutor,
};
pub use http_transport::{create_router, HttpTransportState};
pub use protocol::{
    CallToolParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolContent, ToolDefinition,
};
pub use server::McpServer;
pub use tools::{builtin_tools, ToolRegistry};
