//! Free-text search across all text-typed columns.
//!
//! The builder enumerates text-valued columns from the catalog and unions a
//! bounded ILIKE probe per column. The resulting SQL goes through the normal
//! admission gate and read-only executor.

use std::time::Duration;

use sqlx::PgPool;

use crate::error::SearchError;

const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Cap on probed columns, bounding both query size and execution cost.
const MAX_SEARCH_COLUMNS: usize = 60;

/// Truncation applied to matched text in the result.
const MATCH_TEXT_CHARS: usize = 240;

const TEXT_COLUMNS_SQL: &str = r#"
SELECT table_schema, table_name, column_name
FROM information_schema.columns
WHERE data_type IN ('text','character varying','character','citext')
  AND table_schema NOT IN ('pg_catalog','information_schema')
ORDER BY table_schema, table_name, ordinal_position;
"#;

/// A text-typed column eligible for free-text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextColumn {
    pub schema: String,
    pub table: String,
    pub column: String,
}

/// Enumerate text-typed columns outside system namespaces.
pub async fn list_text_columns(pool: &PgPool) -> Result<Vec<TextColumn>, SearchError> {
    let rows = tokio::time::timeout(
        CATALOG_TIMEOUT,
        sqlx::query_as::<_, (String, String, String)>(TEXT_COLUMNS_SQL).fetch_all(pool),
    )
    .await
    .map_err(|_| SearchError::Timeout)??;

    Ok(rows
        .into_iter()
        .map(|(schema, table, column)| TextColumn {
            schema,
            table,
            column,
        })
        .collect())
}

/// Build the UNION-ALL ILIKE query over `columns` for `needle`.
///
/// Single quotes in the needle are doubled; table and column identifiers are
/// always double-quoted, which is valid for any identifier.
pub fn build_search_sql(
    columns: &[TextColumn],
    needle: &str,
    limit: usize,
) -> Result<String, SearchError> {
    if columns.is_empty() {
        return Err(SearchError::NoTextColumns);
    }

    let escaped = needle.replace('\'', "''");

    let mut parts = Vec::new();
    for c in columns.iter().take(MAX_SEARCH_COLUMNS) {
        parts.push(format!(
            "SELECT '{schema}.{table}' AS source_table, '{column}' AS column, LEFT(CAST(\"{column}\" AS text), {chars}) AS match_text FROM \"{schema}\".\"{table}\" WHERE \"{column}\" ILIKE '%{needle}%'",
            schema = c.schema,
            table = c.table,
            column = c.column,
            chars = MATCH_TEXT_CHARS,
            needle = escaped,
        ));
    }

    Ok(format!(
        "WITH u AS (\n{}\n) SELECT * FROM u LIMIT {limit}",
        parts.join("\nUNION ALL\n")
    ))
}
