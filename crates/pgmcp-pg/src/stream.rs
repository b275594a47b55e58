//! Streaming pagination engine.
//!
//! A stream is one logical read: all pages are fetched inside a single
//! read-only transaction so they reflect one snapshot, and the wall-clock
//! budget scales with the page cap. Absent an ORDER BY the relative row
//! ordering across pages is whatever the database yields.

use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;

use crate::error::ExecError;
use crate::executor::begin_read_only;
use crate::row::{row_to_json, ResultRow};

/// One bounded slice of a query's result set.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// 0-based page index.
    #[serde(rename = "page")]
    pub index: usize,
    pub rows: Vec<ResultRow>,
}

/// Outcome of a streaming run.
#[derive(Debug, Clone)]
pub struct StreamResult {
    pub pages: Vec<Page>,
    pub total_rows: usize,
}

/// Outcome of a single-page run with pagination bookkeeping.
#[derive(Debug, Clone)]
pub struct PaginatedResult {
    pub rows: Vec<ResultRow>,
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub has_more: bool,
    /// Next page index, or 0 when there is none.
    pub next_page: usize,
}

/// Number of pages a result set spans.
pub fn total_pages(total_rows: usize, page_size: usize) -> usize {
    total_rows.div_ceil(page_size)
}

fn count_sql(sql: &str) -> String {
    format!("WITH query AS ({sql}) SELECT COUNT(*) FROM query")
}

fn page_sql(sql: &str, page_size: usize, offset: usize) -> String {
    format!("WITH query AS ({sql}) SELECT * FROM query LIMIT {page_size} OFFSET {offset}")
}

/// Fetch up to `max_pages` pages of `page_size` rows within one read-only
/// transaction. Stops early when a page comes back short.
pub async fn run_streaming(
    pool: &PgPool,
    sql: &str,
    max_pages: usize,
    page_size: usize,
    query_timeout: Duration,
) -> Result<StreamResult, ExecError> {
    // A multi-page stream is one logical read, so the budget scales.
    let budget = query_timeout * max_pages.max(1) as u32;
    tracing::debug!(sql = %sql, max_pages, page_size, "starting streaming query");

    let fut = async {
        let mut tx = begin_read_only(pool, budget).await?;

        let total_rows: i64 = sqlx::query_scalar(&count_sql(sql))
            .fetch_one(&mut *tx)
            .await?;
        let total_rows = total_rows.max(0) as usize;

        let pages_to_fetch = max_pages.min(total_pages(total_rows, page_size));

        let mut pages = Vec::with_capacity(pages_to_fetch);
        for index in 0..pages_to_fetch {
            let offset = index * page_size;
            let rows = sqlx::query(&page_sql(sql, page_size, offset))
                .fetch_all(&mut *tx)
                .await?;
            let rows: Vec<ResultRow> = rows.iter().map(row_to_json).collect();
            let short = rows.len() < page_size;

            pages.push(Page { index, rows });

            // Defensive termination at the window boundary.
            if short {
                break;
            }
        }

        tx.commit().await?;
        Ok(StreamResult { pages, total_rows })
    };

    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| ExecError::Timeout)?
}

/// Fetch one explicit page with total-count bookkeeping, within one
/// read-only transaction.
pub async fn run_paginated(
    pool: &PgPool,
    sql: &str,
    page: usize,
    page_size: usize,
    query_timeout: Duration,
) -> Result<PaginatedResult, ExecError> {
    let fut = async {
        let mut tx = begin_read_only(pool, query_timeout).await?;

        let total_count: i64 = sqlx::query_scalar(&count_sql(sql))
            .fetch_one(&mut *tx)
            .await?;
        let total_count = total_count.max(0) as usize;

        let offset = page * page_size;
        let rows = sqlx::query(&page_sql(sql, page_size, offset))
            .fetch_all(&mut *tx)
            .await?;
        let rows: Vec<ResultRow> = rows.iter().map(row_to_json).collect();

        tx.commit().await?;

        Ok(pagination_flags(rows, page, page_size, total_count))
    };

    tokio::time::timeout(query_timeout, fut)
        .await
        .map_err(|_| ExecError::Timeout)?
}

/// Derive `has_more`/`next_page` from a fetched window.
pub fn pagination_flags(
    rows: Vec<ResultRow>,
    page: usize,
    page_size: usize,
    total_count: usize,
) -> PaginatedResult {
    let offset = page * page_size;
    let has_more = offset + rows.len() < total_count;
    let next_page = if has_more { page + 1 } else { 0 };

    PaginatedResult {
        rows,
        page,
        page_size,
        total_count,
        has_more,
        next_page,
    }
}
