//! MCP server implementation.
//!
//! The server owns the tool registry and the executor, answers JSON-RPC
//! requests, and runs the HTTP transport with graceful shutdown on
//! SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use pgmcp_audit::{AuditEvent, AuditEventType};

use crate::error::McpError;
use crate::executor::ToolExecutor;
use crate::http_transport::{create_router, HttpTransportState};
use crate::protocol::{CallToolParams, JsonRpcRequest, JsonRpcResponse, ToolContent};
use crate::tools::{builtin_tools, ToolRegistry};

/// The MCP server.
pub struct McpServer {
    tools: ToolRegistry,
    executor: ToolExecutor,
}

impl McpServer {
    /// Create a server with the built-in `ask` / `search` / `stream` tools.
    pub fn new(executor: ToolExecutor) -> Self {
        let mut tools = ToolRegistry::new();
        for tool in builtin_tools() {
            tools.register(tool);
        }
        Self { tools, executor }
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" | "notifications/initialized" => JsonRpcResponse::success(id, json!({})),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            _ => JsonRpcResponse::error(
                id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {
                "name": "pgmcp",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<_> = self
            .tools
            .list()
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema
                })
            })
            .collect();

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {e}"))
                }
            },
            None => return JsonRpcResponse::error(id, -32602, "Missing params"),
        };

        if self.tools.get(&params.name).is_none() {
            return JsonRpcResponse::error(
                id,
                -32602,
                format!("Tool not found: {}", params.name),
            );
        }

        let result = self.executor.execute(&params.name, params.arguments).await;

        let content: Vec<Value> = result
            .content
            .iter()
            .map(|c| match c {
                ToolContent::Text { text } => json!({"type": "text", "text": text}),
                ToolContent::Json { json } => json!({"type": "json", "json": json}),
            })
            .collect();

        JsonRpcResponse::success(
            id,
            json!({
                "content": content,
                "isError": !result.success
            }),
        )
    }

    /// Run the HTTP transport until a termination signal arrives, then stop
    /// accepting sessions and let in-flight work drain.
    pub async fn run_http(
        self,
        addr: &str,
        path: &str,
        bearer: &str,
    ) -> Result<(), McpError> {
        let audit = self.executor.audit_sink().clone();

        let (request_tx, mut request_rx) =
            mpsc::channel::<(JsonRpcRequest, mpsc::Sender<JsonRpcResponse>)>(100);

        let server = Arc::new(self);
        let handler = server.clone();
        tokio::spawn(async move {
            while let Some((request, response_tx)) = request_rx.recv().await {
                let server = handler.clone();
                // Each tool invocation is one isolated task.
                tokio::spawn(async move {
                    let response = server.handle_request(request).await;
                    let _ = response_tx.send(response).await;
                });
            }
        });

        let state = Arc::new(HttpTransportState::new(request_tx, bearer, audit.clone()));
        let app = create_router(state, path);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| McpError::StartupFailed(format!("failed to bind {addr}: {e}")))?;

        tracing::info!(addr, path, "starting MCP server on streamable HTTP");
        audit.record(AuditEvent::new(
            AuditEventType::ServerStart,
            "system",
            "",
            addr,
            true,
        ));

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

/// Resolve when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgmcp_audit::MemoryAuditSink;
    use pgmcp_core::{GatewayConfig, SCHEMA_MAX_CHARS};
    use pgmcp_llm::{ChatClient, Translator};
    use pgmcp_pg::SchemaCache;
    use sqlx::postgres::PgPoolOptions;

    /// Server wired with a lazy pool: nothing here touches the database.
    fn test_server() -> (McpServer, MemoryAuditSink) {
        let cfg = GatewayConfig {
            database_url: "postgres://localhost/unreachable".to_string(),
            ..GatewayConfig::default()
        };
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy(&cfg.database_url)
            .expect("lazy pool");
        let cache = SchemaCache::new(cfg.schema_ttl, SCHEMA_MAX_CHARS);
        let translator = Translator::new(ChatClient::new("", ""), cfg.openai_model.clone());
        let sink = MemoryAuditSink::new();
        let executor =
            ToolExecutor::new(cfg, pool, cache, translator, Arc::new(sink.clone()));
        (McpServer::new(executor), sink)
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_initialize() {
        let (server, _sink) = test_server();
        let response = server.handle_request(request("initialize", None)).await;

        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "pgmcp");
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_list_tools() {
        let (server, _sink) = test_server();
        let response = server.handle_request(request("tools/list", None)).await;

        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        let mut names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        names.sort_unstable();
        assert_eq!(names, ["ask", "search", "stream"]);
    }

    #[tokio::test]
    async fn test_unknown_method_rejected() {
        let (server, _sink) = test_server();
        let response = server.handle_request(request("tools/delete", None)).await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_call_nonexistent_tool() {
        let (server, _sink) = test_server();
        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "nonexistent", "arguments": {}})),
            ))
            .await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn test_ask_empty_input_is_tool_error_with_audit() {
        let (server, sink) = test_server();
        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "ask", "arguments": {"query": "   "}})),
            ))
            .await;

        // Input rejection is a tool-level failure, not a transport failure.
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("empty"));

        let events = sink.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, AuditEventType::AskInputValidationFailed);
    }
}
