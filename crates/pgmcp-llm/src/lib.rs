//! # pgmcp-llm
//!
//! Natural-language to SQL translation against an OpenAI-compatible chat
//! endpoint. The translator composes a rule-laden system prompt around the
//! cached schema summary and extracts a single SQL statement from the model
//! response. Failures surface as [`TranslateError`]; there is no retry at
//! this layer.

pub mod client;
pub mod translate;

pub use client::{ChatClient, ChatMessage, TranslateError};
pub use translate::{GeneratedQuery, Translator};
