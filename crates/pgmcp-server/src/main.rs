use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use pgmcp_audit::TracingAuditSink;
use pgmcp_core::{GatewayConfig, SCHEMA_MAX_CHARS};
use pgmcp_llm::{ChatClient, Translator};
use pgmcp_mcp::{McpServer, ToolExecutor};
use pgmcp_pg::SchemaCache;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(log_level.as_str())
        .init();

    let cfg = GatewayConfig::from_env();
    if let Err(e) = cfg.validate() {
        tracing::error!("invalid configuration:\n{e}");
        anyhow::bail!("invalid configuration");
    }

    let pool = PgPoolOptions::new()
        .min_connections(2)
        .max_connections(8)
        .max_lifetime(Duration::from_secs(30 * 60))
        .idle_timeout(Duration::from_secs(5 * 60))
        .test_before_acquire(true)
        .connect(&cfg.database_url)
        .await?;

    // Fail fast on an unreachable or misconfigured database.
    sqlx::query("SELECT 1").execute(&pool).await?;
    tracing::info!("database connection established");

    let cache = SchemaCache::new(cfg.schema_ttl, SCHEMA_MAX_CHARS);
    let client = ChatClient::new(&cfg.openai_base_url, &cfg.openai_api_key);
    let translator = Translator::new(client, cfg.openai_model.clone());
    let audit = Arc::new(TracingAuditSink);

    let executor = ToolExecutor::new(cfg.clone(), pool.clone(), cache, translator, audit);
    let server = McpServer::new(executor);

    server
        .run_http(&cfg.http_addr, &cfg.http_path, &cfg.auth_bearer)
        .await?;

    // Transport has drained; give checked-out connections a bounded window.
    tracing::info!("shutting down server gracefully");
    if tokio::time::timeout(SHUTDOWN_GRACE, pool.close())
        .await
        .is_err()
    {
        tracing::warn!("connection pool did not close within the grace period");
    }
    tracing::info!("server shutdown complete");

    Ok(())
}
