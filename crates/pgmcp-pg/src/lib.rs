//! # pgmcp-pg
//!
//! PostgreSQL adapter for the pgmcp gateway.
//!
//! This crate owns everything that touches the database: catalog
//! introspection into the line-oriented schema summary, the TTL cache with
//! single-flight refresh, the read-only query executor, the streaming
//! pagination engine, and the free-text search builder. All statements run
//! inside read-only transactions with a local statement timeout.

pub mod cache;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod row;
pub mod search;
pub mod stream;

pub use cache::{SchemaCache, SchemaSource};
pub use error::{ExecError, IntrospectError, QueryFailure, SearchError};
pub use executor::run_read_only;
pub use introspect::{quote_ident, PgSchemaSource};
pub use row::ResultRow;
pub use search::{build_search_sql, list_text_columns, TextColumn};
pub use stream::{run_paginated, run_streaming, total_pages, Page, PaginatedResult, StreamResult};

// Re-export the pool type for downstream crates.
pub use sqlx::PgPool;
