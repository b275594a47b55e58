//! # pgmcp-guard
//!
//! Admission control for the pgmcp gateway. Two perimeters:
//!
//! 1. **Sanitizer** — bounds checks on the natural-language question before
//!    anything else runs.
//! 2. **Admission gate** — layered acceptance checks on generated SQL
//!    (mutating keywords, multi-statement, structural sanity), plus the cost
//!    heuristic, the expensive-plan rewrite, and LIMIT enforcement.
//!
//! The gate is additive to the database-enforced read-only transaction: SQL
//! that slips past these checks still cannot write, because the executor
//! never leaves read-only mode.

pub mod gate;
pub mod sanitize;

pub use gate::{
    enforce_limit, guard_read_only, is_expensive, simplify_expensive, GuardError,
};
pub use sanitize::{sanitize_question, SanitizeError};
