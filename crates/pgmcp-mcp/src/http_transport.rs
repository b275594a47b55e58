//! HTTP transport for the MCP server.
//!
//! One endpoint accepts JSON-RPC over POST and answers with an event-stream
//! framed response (`event:` / `data:` lines, no-cache). Requests are handed
//! to the server task over a channel, so this layer never touches the
//! database. A 1 MiB body limit applies before protocol decoding, and an
//! optional static bearer gates the endpoint.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response, Sse},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use pgmcp_audit::{AuditEvent, AuditEventType, AuditSink};
use pgmcp_core::MAX_REQUEST_SIZE;

use crate::protocol::{JsonRpcRequest, JsonRpcResponse};

/// HTTP transport handler state.
pub struct HttpTransportState {
    /// Channel for sending requests to the MCP server task.
    request_tx: mpsc::Sender<(JsonRpcRequest, mpsc::Sender<JsonRpcResponse>)>,
    /// Static bearer credential; empty disables auth.
    bearer: String,
    audit: Arc<dyn AuditSink>,
}

impl HttpTransportState {
    pub fn new(
        request_tx: mpsc::Sender<(JsonRpcRequest, mpsc::Sender<JsonRpcResponse>)>,
        bearer: impl Into<String>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            request_tx,
            bearer: bearer.into(),
            audit,
        }
    }
}

/// Create the HTTP router, mounting the MCP endpoint at `path`.
pub fn create_router(state: Arc<HttpTransportState>, path: &str) -> Router {
    Router::new()
        .route(path, post(handle_mcp_post))
        .route("/healthz", get(handle_healthz))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle POST requests (JSON-RPC over HTTP, SSE-framed response).
async fn handle_mcp_post(
    State(state): State<Arc<HttpTransportState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    if !state.bearer.is_empty() {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .strip_prefix("Bearer ")
            .unwrap_or("")
            .trim();

        if presented != state.bearer {
            let remote = connect_info
                .map(|ConnectInfo(addr)| addr.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            state.audit.record(AuditEvent::new(
                AuditEventType::AuthFailed,
                remote,
                "",
                "invalid bearer token",
                false,
            ));
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }

    let (response_tx, mut response_rx) = mpsc::channel(1);

    if state.request_tx.send((request, response_tx)).await.is_err() {
        return sse_response(JsonRpcResponse::error(None, -32603, "MCP server unavailable"));
    }

    match response_rx.recv().await {
        Some(response) => sse_response(response),
        None => sse_response(JsonRpcResponse::error(
            None,
            -32603,
            "No response from MCP server",
        )),
    }
}

/// Frame one JSON-RPC response as a single-message event stream.
fn sse_response(response: JsonRpcResponse) -> Response {
    let stream = async_stream::stream! {
        let data = serde_json::to_string(&response).unwrap_or_default();
        yield Ok::<_, Infallible>(
            axum::response::sse::Event::default().event("message").data(data),
        );
    };

    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(stream),
    )
        .into_response()
}

/// Liveness probe.
async fn handle_healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pgmcp_audit::MemoryAuditSink;
    use serde_json::json;
    use tower::ServiceExt;

    fn rpc_body() -> Body {
        Body::from(
            serde_json::to_vec(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize"
            }))
            .unwrap(),
        )
    }

    fn state_with_echo_server(bearer: &str) -> (Arc<HttpTransportState>, MemoryAuditSink) {
        let (tx, mut rx) = mpsc::channel::<(JsonRpcRequest, mpsc::Sender<JsonRpcResponse>)>(8);
        tokio::spawn(async move {
            while let Some((request, response_tx)) = rx.recv().await {
                let response =
                    JsonRpcResponse::success(request.id, json!({"echo": request.method}));
                let _ = response_tx.send(response).await;
            }
        });
        let sink = MemoryAuditSink::new();
        let state = Arc::new(HttpTransportState::new(tx, bearer, Arc::new(sink.clone())));
        (state, sink)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _sink) = state_with_echo_server("");
        let app = create_router(state, "/mcp");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_post_is_sse_framed() {
        let (state, _sink) = state_with_echo_server("");
        let app = create_router(state, "/mcp");

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(rpc_body())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap(),
            "text/event-stream"
        );
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .unwrap()
                .to_str()
                .unwrap(),
            "no-cache"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("event: message"));
        assert!(text.contains("data: "));
        assert!(text.contains("\"echo\":\"initialize\""));
    }

    #[tokio::test]
    async fn test_bearer_mismatch_is_401_and_audited() {
        let (state, sink) = state_with_echo_server("secret");
        let app = create_router(state, "/mcp");

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .header("authorization", "Bearer wrong")
                    .body(rpc_body())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let events = sink.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, AuditEventType::AuthFailed);
        assert!(!events[0].success);
    }

    #[tokio::test]
    async fn test_bearer_match_passes() {
        let (state, sink) = state_with_echo_server("secret");
        let app = create_router(state, "/mcp");

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .header("authorization", "Bearer secret")
                    .body(rpc_body())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(sink.is_empty());
    }
}
