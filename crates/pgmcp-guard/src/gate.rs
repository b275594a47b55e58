//! Layered SQL admission gate.
//!
//! Each layer short-circuits on rejection: mutating keywords first, then
//! multi-statement detection, then structural sanity. Cost heuristics and
//! LIMIT enforcement are separate helpers applied by callers after the gate
//! accepts, so acceptance itself stays idempotent.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Whole-word, case-insensitive match for anything that could mutate state,
/// control transactions, or alter session settings.
static MUTATING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)\b(INSERT|UPDATE|DELETE|UPSERT|MERGE|ALTER|DROP|TRUNCATE|VACUUM|REINDEX|GRANT|REVOKE|CREATE|COPY|ROLLBACK|COMMIT|BEGIN|START|SAVEPOINT|RELEASE|SET)\b",
    )
    .expect("invalid mutating-keyword regex")
});

static HAS_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bLIMIT\s+\d+").expect("invalid LIMIT regex"));

/// Rejection reasons from the admission gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("refusing to run non-read-only SQL")]
    WriteAttempt,

    #[error("multiple statements not allowed")]
    MultiStatement,

    #[error("malformed SQL: {0}")]
    Malformed(String),
}

/// Accept or reject a generated SQL statement.
///
/// Acceptance is idempotent: a statement that passes once passes again
/// unchanged.
pub fn guard_read_only(sql: &str) -> Result<(), GuardError> {
    if MUTATING.is_match(sql) {
        return Err(GuardError::WriteAttempt);
    }

    // One trailing semicolon is tolerated; anything internal means a second
    // statement.
    let trimmed = sql.trim();
    if let Some(pos) = trimmed.find(';') {
        if pos != trimmed.len() - 1 {
            return Err(GuardError::MultiStatement);
        }
    }

    structural_sanity(trimmed)?;

    Ok(())
}

fn structural_sanity(sql: &str) -> Result<(), GuardError> {
    let lower = sql.to_lowercase();

    if !lower.contains("select") {
        return Err(GuardError::Malformed(
            "query must contain SELECT".to_string(),
        ));
    }

    let open = sql.matches('(').count();
    let close = sql.matches(')').count();
    if open != close {
        return Err(GuardError::Malformed(format!(
            "unbalanced parentheses: {open} open, {close} close"
        )));
    }

    if lower.contains("select select") {
        return Err(GuardError::Malformed(
            "duplicate SELECT keywords detected".to_string(),
        ));
    }

    Ok(())
}

/// Cost heuristic: LEFT/CROSS joins and more than two joins are treated as
/// likely-pathological plans.
pub fn is_expensive(sql: &str) -> bool {
    let lower = sql.to_lowercase();

    if lower.contains("cross join") || lower.contains("left join") {
        return true;
    }

    lower.matches(" join ").count() > 2
}

/// Canonical benign replacement for an expensive plan. Returns the input
/// unchanged when the heuristic does not fire.
pub fn simplify_expensive(sql: &str) -> String {
    if is_expensive(sql) {
        return "SELECT 'Query too complex - please try a simpler question or ask about individual tables' AS message LIMIT 1".to_string();
    }
    sql.to_string()
}

/// Ensure a row ceiling: statements without an explicit `LIMIT <n>` are
/// wrapped so the total rows returned cannot exceed `cap`.
pub fn enforce_limit(sql: &str, cap: usize) -> String {
    if HAS_LIMIT.is_match(sql) {
        return sql.to_string();
    }
    format!("WITH q AS ({sql}) SELECT * FROM q LIMIT {cap}")
}
