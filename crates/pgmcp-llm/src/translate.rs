//! NL→SQL translation.
//!
//! The system prompt constrains the model to a single read-only statement
//! that uses identifiers exactly as they appear in the schema summary,
//! including quotes. The response is post-processed into bare SQL.

use pgmcp_core::MAX_MODEL_TOKENS;

use crate::client::{ChatClient, ChatMessage, TranslateError};

const TEMPERATURE: f32 = 0.2;

/// A generated SQL statement with provenance.
#[derive(Debug, Clone)]
pub struct GeneratedQuery {
    /// Exactly one top-level statement, no trailing semicolon expected.
    pub sql: String,
    /// Provenance, e.g. the model identifier.
    pub note: String,
}

/// Translates questions into SQL using a chat model.
#[derive(Debug, Clone)]
pub struct Translator {
    client: ChatClient,
    model: String,
}

impl Translator {
    pub fn new(client: ChatClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Model identifier this translator queries.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate one SQL statement for `question` against `schema`, with an
    /// explicit row ceiling the model must respect.
    pub async fn generate_sql(
        &self,
        question: &str,
        schema: &str,
        max_rows: usize,
    ) -> Result<GeneratedQuery, TranslateError> {
        let messages = [
            ChatMessage::system(system_prompt(schema, max_rows)),
            ChatMessage::user(format!(
                "Question: {}\nReturn ONLY SQL, nothing else.",
                question.trim()
            )),
        ];

        let raw = self
            .client
            .complete(&self.model, &messages, MAX_MODEL_TOKENS, TEMPERATURE)
            .await?;

        let sql = extract_sql(&raw);
        tracing::debug!(model = %self.model, sql = %sql, "generated sql");

        Ok(GeneratedQuery {
            sql,
            note: format!("model={}", self.model),
        })
    }
}

fn system_prompt(schema: &str, max_rows: usize) -> String {
    format!(
        r#"You translate plain English questions into a SINGLE, safe PostgreSQL query for ANY PostgreSQL database.

Core Rules:
- Use only read-only SQL (WITH/SELECT). No writes, DDL, or side effects.
- Use proper JOINs based on foreign key relationships shown in the schema.
- Always include an explicit LIMIT <= {max_rows}.
- Do not add semicolons.
- Return concise, meaningful column aliases.
- CRITICAL: Use table and column names EXACTLY as shown in the schema below, including quotes when present.

Query Scope Rules:
- SINGULAR questions ("Who is the...", "What is the...") -> LIMIT 1
- PLURAL questions ("Who are the...", "What are the...") -> LIMIT 20
- COUNT questions ("How many...") -> Return COUNT, no additional LIMIT
- LIST questions ("List all...", "Show all...") -> LIMIT 50
- COMPARISON questions ("Compare X and Y...") -> Return just the compared items

User Override Rules (when user explicitly wants more results):
- "Show ALL [items]" or "List ALL [items]" -> Use larger LIMIT (200-500)
- "Give me EVERY [item]" -> Use larger LIMIT (200-500)
- "Complete list of [items]" -> Use larger LIMIT (200-500)
- When user emphasizes ALL/EVERY/COMPLETE -> Override normal limits
- But still respect the maximum LIMIT constraint provided

CRITICAL COLUMN CHECKING RULES:
- BEFORE writing ANY SQL, verify EVERY column exists in the table you're using
- ONLY use columns that are explicitly listed in the schema below
- If you need a column that doesn't exist in your target table, you MUST use JOINs
- Example: If you need user_id but you're querying order_items (which has no user_id),
  you MUST JOIN: order_items -> orders -> users via the foreign keys shown in schema
- NEVER assume standard columns like 'id' exist - many tables use composite keys
- For counting records: use COUNT(*) instead of COUNT(table.id) unless 'id' is explicitly shown

CRITICAL Identifier Rules (PostgreSQL Case Sensitivity):
- PostgreSQL identifiers are case-sensitive when quoted with double quotes
- If the schema shows "Book" (with quotes), you MUST use "Book" in your SQL
- If the schema shows book (no quotes), you can use book, Book, or BOOK
- NEVER change the case or remove quotes from identifiers shown in the schema

JOIN Strategy:
- Look for "FK" lines in the schema that show: table1(column1) -> table2(column2)
- Use ONLY the foreign key relationships explicitly shown in the schema summary
- When multiple JOIN paths exist, choose the most direct one with fewest tables

Performance Guidelines:
- PREFER single-table queries when possible
- Limit JOINs to maximum 2 tables to avoid expensive operations
- Use INNER JOINs instead of LEFT JOINs when possible
- If a question requires more than 2 JOINs, simplify to a single-table approximation

MANDATORY: Study this schema summary carefully before writing SQL. It shows all tables, columns, and foreign key relationships:

{schema}

REMEMBER: If you need a column that doesn't exist in your target table, find the FK relationship above and use JOINs."#
    )
}

/// Strip whitespace, code fences, and a leading "sql" language tag from a
/// model response, leaving bare SQL.
pub fn extract_sql(raw: &str) -> String {
    let mut s = raw.trim();
    s = s.trim_matches('`');
    s = s.trim();
    if let Some(rest) = s.strip_prefix("sql") {
        s = rest.trim_start();
    } else if let Some(rest) = s.strip_prefix("SQL") {
        s = rest.trim_start();
    }
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sql_plain() {
        assert_eq!(extract_sql("SELECT 1"), "SELECT 1");
        assert_eq!(extract_sql("  SELECT 1\n"), "SELECT 1");
    }

    #[test]
    fn test_extract_sql_fenced() {
        assert_eq!(
            extract_sql("```sql\nSELECT * FROM users LIMIT 5\n```"),
            "SELECT * FROM users LIMIT 5"
        );
        assert_eq!(extract_sql("```\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn test_extract_sql_language_tag_without_fence() {
        assert_eq!(extract_sql("sql SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_extract_sql_does_not_eat_sql_prefixed_identifiers() {
        // "sqlstate" starts with "sql" but the remainder is still returned
        // intact; only the tag itself is stripped.
        assert_eq!(
            extract_sql("SELECT sqlstate FROM errors"),
            "SELECT sqlstate FROM errors"
        );
    }

    #[test]
    fn test_system_prompt_embeds_schema_and_ceiling() {
        let prompt = system_prompt("TABLE public.users(id integer PRIMARY KEY)", 500);
        assert!(prompt.contains("LIMIT <= 500"));
        assert!(prompt.contains("TABLE public.users(id integer PRIMARY KEY)"));
    }
}
