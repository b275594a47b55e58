//! Catalog introspection.
//!
//! One query against the Postgres catalog produces the full line-oriented
//! schema summary: `TABLE schema.name(col type [PRIMARY KEY], ...)` lines
//! followed by `FK src(col) -> dst(col)` lines. Identifier quoting is applied
//! inside the query so the summary and any SQL derived from it agree
//! byte-for-byte. Columns are listed by name, not declaration order, so the
//! summary is stable across runs.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::cache::SchemaSource;
use crate::error::IntrospectError;

const INTROSPECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Identifiers matching this pattern stay unquoted; everything else gets
/// ASCII double quotes. Mirrors the CASE expressions in [`SCHEMA_SQL`].
pub fn quote_ident(ident: &str) -> String {
    let plain = !ident.is_empty()
        && ident
            .chars()
            .next()
            .map(|c| c.is_ascii_lowercase() || c == '_')
            .unwrap_or(false)
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if plain {
        ident.to_string()
    } else {
        format!("\"{ident}\"")
    }
}

const SCHEMA_SQL: &str = r#"
WITH cols AS (
  SELECT n.nspname AS schema, c.relname AS table, a.attname AS column,
         pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
         (SELECT EXISTS (
            SELECT 1 FROM pg_constraint
            WHERE conrelid = c.oid AND contype='p' AND a.attnum = ANY(conkey)
         )) AS is_pk
  FROM pg_attribute a
  JOIN pg_class c ON a.attrelid = c.oid
  JOIN pg_namespace n ON c.relnamespace = n.oid
  WHERE a.attnum > 0 AND NOT a.attisdropped AND c.relkind='r' AND n.nspname NOT IN ('pg_catalog','information_schema')
),
fks AS (
  SELECT
    n1.nspname AS src_schema, c1.relname AS src_table, a1.attname AS src_column,
    n2.nspname AS dst_schema, c2.relname AS dst_table, a2.attname AS dst_column
  FROM pg_constraint co
  JOIN pg_class c1 ON co.conrelid=c1.oid
  JOIN pg_namespace n1 ON c1.relnamespace=n1.oid
  JOIN pg_class c2 ON co.confrelid=c2.oid
  JOIN pg_namespace n2 ON c2.relnamespace=n2.oid
  JOIN unnest(co.conkey) WITH ORDINALITY AS ck(attnum, pos) ON TRUE
  JOIN unnest(co.confkey) WITH ORDINALITY AS fk(attnum, pos) ON ck.pos=fk.pos
  JOIN pg_attribute a1 ON a1.attrelid=c1.oid AND a1.attnum=ck.attnum
  JOIN pg_attribute a2 ON a2.attrelid=c2.oid AND a2.attnum=fk.attnum
  WHERE co.contype='f'
)
SELECT
  'TABLE '||cols.schema||'.'||
  CASE
    WHEN cols.table ~ '^[a-z_][a-z0-9_]*$' THEN cols.table
    ELSE '"' || cols.table || '"'
  END ||'('||
    string_agg(
      CASE
        WHEN cols.column ~ '^[a-z_][a-z0-9_]*$' THEN cols.column
        ELSE '"' || cols.column || '"'
      END ||' '||cols.data_type||CASE WHEN cols.is_pk THEN ' PRIMARY KEY' ELSE '' END,
      ', ' ORDER BY cols.column
    )||
  ')' AS line
FROM cols
GROUP BY cols.schema, cols.table
UNION ALL
SELECT 'FK '||src_schema||'.'||
  CASE
    WHEN src_table ~ '^[a-z_][a-z0-9_]*$' THEN src_table
    ELSE '"' || src_table || '"'
  END ||'('||
  CASE
    WHEN src_column ~ '^[a-z_][a-z0-9_]*$' THEN src_column
    ELSE '"' || src_column || '"'
  END ||') -> '||dst_schema||'.'||
  CASE
    WHEN dst_table ~ '^[a-z_][a-z0-9_]*$' THEN dst_table
    ELSE '"' || dst_table || '"'
  END ||'('||
  CASE
    WHEN dst_column ~ '^[a-z_][a-z0-9_]*$' THEN dst_column
    ELSE '"' || dst_column || '"'
  END ||')'
FROM fks
ORDER BY 1;
"#;

/// Load the schema summary from the live catalog.
pub async fn load_schema(pool: &PgPool) -> Result<String, IntrospectError> {
    let lines = tokio::time::timeout(
        INTROSPECT_TIMEOUT,
        sqlx::query_scalar::<_, String>(SCHEMA_SQL).fetch_all(pool),
    )
    .await
    .map_err(|_| IntrospectError::Timeout(INTROSPECT_TIMEOUT))??;

    let mut summary = String::new();
    for line in lines {
        summary.push_str(&line);
        summary.push('\n');
    }
    Ok(summary)
}

/// Live-catalog [`SchemaSource`] backed by a connection pool.
#[derive(Clone)]
pub struct PgSchemaSource {
    pool: PgPool,
}

impl PgSchemaSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaSource for PgSchemaSource {
    async fn load(&self) -> Result<String, IntrospectError> {
        load_schema(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_plain_names_unquoted() {
        assert_eq!(quote_ident("users"), "users");
        assert_eq!(quote_ident("order_items"), "order_items");
        assert_eq!(quote_ident("_private"), "_private");
        assert_eq!(quote_ident("t2"), "t2");
    }

    #[test]
    fn test_quote_ident_quotes_everything_else() {
        assert_eq!(quote_ident("Book"), "\"Book\"");
        assert_eq!(quote_ident("user name"), "\"user name\"");
        assert_eq!(quote_ident("2fast"), "\"2fast\"");
        assert_eq!(quote_ident(""), "\"\"");
    }

    #[test]
    fn test_quote_rule_matches_catalog_query() {
        // The Rust helper and the SQL CASE expressions implement the same
        // rule; spot-check the pattern edge cases here.
        for (ident, quoted) in [
            ("a", false),
            ("A", true),
            ("a1", false),
            ("1a", true),
            ("a-b", true),
            ("a_b_c", false),
        ] {
            assert_eq!(quote_ident(ident).starts_with('"'), quoted, "{ident}");
        }
    }
}
