//! Gateway configuration.
//!
//! Configuration is read once from the environment at startup and is
//! immutable afterwards. Unparseable numeric or duration values fall back
//! to their defaults with a warning; out-of-range values are collected and
//! reported together as a fatal [`ConfigError`].

use std::env;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_SCHEMA_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(25);
const DEFAULT_MAX_ROWS: usize = 200;

/// Configuration validation failure. Carries every violation, each naming
/// the offending key.
#[derive(Debug, Error)]
#[error("configuration validation failed:\n  - {}", .violations.join("\n  - "))]
pub struct ConfigError {
    pub violations: Vec<String>,
}

/// Immutable runtime configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Postgres connection string. Required.
    pub database_url: String,
    /// Bearer credential for the language-model endpoint. May be empty.
    pub openai_api_key: String,
    /// Language-model identifier.
    pub openai_model: String,
    /// Override for the language-model base URL. Empty means the default.
    pub openai_base_url: String,
    /// Schema cache validity window.
    pub schema_ttl: Duration,
    /// Wall-clock budget per query.
    pub query_timeout: Duration,
    /// Hard cap on rows returned per response.
    pub max_rows: usize,
    /// HTTP bind address.
    pub http_addr: String,
    /// Endpoint path for the MCP transport.
    pub http_path: String,
    /// Optional static bearer gating the endpoint. Empty disables auth.
    pub auth_bearer: String,
    /// Log verbosity: debug/info/warn/error.
    pub log_level: String,
    /// Whether the cost heuristic rewrites expensive join plans.
    pub reject_expensive_joins: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: String::new(),
            schema_ttl: DEFAULT_SCHEMA_TTL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_rows: DEFAULT_MAX_ROWS,
            http_addr: "0.0.0.0:8080".to_string(),
            http_path: "/mcp".to_string(),
            auth_bearer: String::new(),
            log_level: "info".to_string(),
            reject_expensive_joins: true,
        }
    }
}

impl GatewayConfig {
    /// Build the configuration from the process environment.
    ///
    /// Invalid-but-present duration/numeric values warn and fall back to
    /// defaults; range checks happen separately in [`Self::validate`].
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let schema_ttl = env_duration("SCHEMA_TTL", defaults.schema_ttl);
        let query_timeout = env_duration("QUERY_TIMEOUT", defaults.query_timeout);

        let max_rows = match env::var("MAX_ROWS") {
            Ok(v) => match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!(
                        value = %v,
                        default = defaults.max_rows,
                        "invalid MAX_ROWS: must be a positive integer, using default"
                    );
                    defaults.max_rows
                }
            },
            Err(_) => defaults.max_rows,
        };

        let reject_expensive_joins = match env::var("REJECT_EXPENSIVE_JOINS") {
            Ok(v) => match v.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => {
                    tracing::warn!(value = %other, "invalid REJECT_EXPENSIVE_JOINS, using default");
                    defaults.reject_expensive_joins
                }
            },
            Err(_) => defaults.reject_expensive_joins,
        };

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_default(),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: env_or("OPENAI_MODEL", &defaults.openai_model),
            openai_base_url: env::var("OPENAI_BASE_URL").unwrap_or_default(),
            schema_ttl,
            query_timeout,
            max_rows,
            http_addr: env_or("HTTP_ADDR", &defaults.http_addr),
            http_path: env_or("HTTP_PATH", &defaults.http_path),
            auth_bearer: env::var("AUTH_BEARER")
                .unwrap_or_default()
                .trim()
                .to_string(),
            log_level: env_or("LOG_LEVEL", &defaults.log_level),
            reject_expensive_joins,
        }
    }

    /// Check every field against its accepted range.
    ///
    /// Returns all violations at once so an operator can fix the whole
    /// environment in one pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = Vec::new();

        if self.database_url.is_empty() {
            violations.push("DATABASE_URL is required".to_string());
        }

        if self.max_rows == 0 {
            violations.push("MAX_ROWS must be greater than 0".to_string());
        } else if self.max_rows > 10_000 {
            violations.push(
                "MAX_ROWS cannot exceed 10000 (too many rows could cause memory issues)"
                    .to_string(),
            );
        }

        if self.query_timeout < Duration::from_secs(1) {
            violations.push("QUERY_TIMEOUT must be at least 1 second".to_string());
        } else if self.query_timeout > Duration::from_secs(5 * 60) {
            violations.push("QUERY_TIMEOUT cannot exceed 5 minutes".to_string());
        }

        if self.schema_ttl < Duration::from_secs(30) {
            violations.push("SCHEMA_TTL must be at least 30 seconds".to_string());
        } else if self.schema_ttl > Duration::from_secs(24 * 60 * 60) {
            violations.push("SCHEMA_TTL cannot exceed 24 hours".to_string());
        }

        if self.openai_model.trim().is_empty() {
            violations.push("OPENAI_MODEL must be non-empty".to_string());
        }

        match self.log_level.as_str() {
            "debug" | "info" | "warn" | "error" => {}
            other => violations.push(format!(
                "LOG_LEVEL must be one of debug/info/warn/error (got '{other}')"
            )),
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError { violations })
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn env_duration(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(v) if !v.is_empty() => match parse_duration(&v) {
            Some(d) => d,
            None => {
                tracing::warn!(key, value = %v, ?default, "invalid duration, using default");
                default
            }
        },
        _ => default,
    }
}

/// Parse a duration string like "30s", "5m", "24h". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim().to_lowercase();

    if let Some(hours) = s.strip_suffix('h') {
        let h: u64 = hours.parse().ok()?;
        return Some(Duration::from_secs(h * 3600));
    }
    if let Some(minutes) = s.strip_suffix('m') {
        let m: u64 = minutes.parse().ok()?;
        return Some(Duration::from_secs(m * 60));
    }
    if let Some(seconds) = s.strip_suffix('s') {
        let sec: u64 = seconds.parse().ok()?;
        return Some(Duration::from_secs(sec));
    }

    let sec: u64 = s.parse().ok()?;
    Some(Duration::from_secs(sec))
}
