//! Read-only query execution.
//!
//! Every statement runs inside an explicit read-only transaction with a
//! local `statement_timeout`, so writes fail at the database no matter what
//! slipped past the admission gate. The whole call is additionally bounded
//! by a wall-clock timeout; on any error path the transaction rolls back
//! when dropped.

use std::time::Duration;

use pgmcp_guard::enforce_limit;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::ExecError;
use crate::row::{row_to_json, ResultRow};

/// Open a read-only transaction with a local statement timeout.
pub(crate) async fn begin_read_only(
    pool: &PgPool,
    statement_timeout: Duration,
) -> Result<Transaction<'_, Postgres>, ExecError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION READ ONLY")
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!(
        "SET LOCAL statement_timeout = {}",
        statement_timeout.as_millis()
    ))
    .execute(&mut *tx)
    .await?;
    Ok(tx)
}

/// Execute `sql` under a read-only transaction, wrapping it with a row
/// ceiling when it has no explicit LIMIT.
pub async fn run_read_only(
    pool: &PgPool,
    sql: &str,
    limit: usize,
    query_timeout: Duration,
) -> Result<Vec<ResultRow>, ExecError> {
    let bounded = enforce_limit(sql, limit);
    tracing::debug!(sql = %bounded, "executing read-only query");

    let fut = async {
        let mut tx = begin_read_only(pool, query_timeout).await?;

        let rows = sqlx::query(&bounded).fetch_all(&mut *tx).await?;
        let out: Vec<ResultRow> = rows.iter().map(row_to_json).collect();

        // Commit of a read-only transaction is a no-op but explicit.
        tx.commit().await?;
        Ok(out)
    };

    tokio::time::timeout(query_timeout, fut)
        .await
        .map_err(|_| ExecError::Timeout)?
}
