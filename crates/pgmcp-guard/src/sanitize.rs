//! Question sanitization.
//!
//! Bounds checks reject; the suspicious-substring watch-list only warns,
//! because tokens like "union" or "execute" occur in ordinary English
//! questions. Treat those warnings as an audit signal, not a control.

use pgmcp_core::MAX_QUESTION_CHARS;
use thiserror::Error;

/// Substrings that warrant a warning in the audit trail.
const SUSPICIOUS: &[&str] = &[
    "--",
    "/*",
    "*/",
    "xp_",
    "sp_",
    "exec",
    "execute",
    "union",
    "information_schema",
    "pg_catalog",
];

/// Rejection reasons for natural-language input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("input cannot be empty")]
    Empty,

    #[error("input too long: {len} characters (max {max})")]
    Oversize { len: usize, max: usize },
}

/// Validate a question, returning the trimmed text on success.
pub fn sanitize_question(input: &str) -> Result<String, SanitizeError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(SanitizeError::Empty);
    }

    let len = trimmed.chars().count();
    if len > MAX_QUESTION_CHARS {
        return Err(SanitizeError::Oversize {
            len,
            max: MAX_QUESTION_CHARS,
        });
    }

    let lower = trimmed.to_lowercase();
    for pattern in SUSPICIOUS {
        if lower.contains(pattern) {
            tracing::warn!(pattern, input = trimmed, "suspicious pattern detected in input");
        }
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rejected() {
        assert_eq!(sanitize_question(""), Err(SanitizeError::Empty));
    }

    #[test]
    fn test_whitespace_only_rejected() {
        assert_eq!(sanitize_question("   \t\n  "), Err(SanitizeError::Empty));
    }

    #[test]
    fn test_oversize_rejected_at_boundary() {
        let at_max = "x".repeat(MAX_QUESTION_CHARS);
        assert!(sanitize_question(&at_max).is_ok());

        let over = "x".repeat(MAX_QUESTION_CHARS + 1);
        assert_eq!(
            sanitize_question(&over),
            Err(SanitizeError::Oversize {
                len: MAX_QUESTION_CHARS + 1,
                max: MAX_QUESTION_CHARS,
            })
        );
    }

    #[test]
    fn test_suspicious_substrings_pass() {
        // These legitimately occur in English questions and must not reject.
        for q in [
            "what is the union of both teams",
            "who can execute a trade",
            "show items described as 'spa -- deluxe'",
        ] {
            assert!(sanitize_question(q).is_ok(), "rejected: {q}");
        }
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        assert_eq!(sanitize_question("  list users  ").unwrap(), "list users");
    }
}
