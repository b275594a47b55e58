//! Tool registry and the built-in tool definitions.

use std::collections::HashMap;

use serde_json::json;

use crate::protocol::ToolDefinition;

/// Registry of available MCP tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// List all tools.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.values().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The three tools this gateway publishes.
pub fn builtin_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "ask".to_string(),
            description: Some(
                "Answer questions about the connected PostgreSQL database by generating safe, read-only SQL. Automatically streams all results."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Plain-English question about the database"
                    },
                    "max_rows": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Hard cap on returned rows"
                    },
                    "dry_run": {
                        "type": "boolean",
                        "description": "Return the generated SQL without executing it"
                    },
                    "page": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Explicit 0-based page to fetch instead of auto-streaming"
                    },
                    "page_size": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Rows per page"
                    },
                    "stream_all": {
                        "type": "boolean",
                        "description": "Auto-fetch all pages (the default behavior)"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "search".to_string(),
            description: Some(
                "Search free text across all tables/columns (ILIKE).".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "q": {
                        "type": "string",
                        "description": "Text to search for"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum matches to return"
                    }
                },
                "required": ["q"]
            }),
        },
        ToolDefinition {
            name: "stream".to_string(),
            description: Some(
                "Stream large result sets by automatically fetching all pages. Returns complete results progressively."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Plain-English question about the database"
                    },
                    "max_pages": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum pages to fetch (default 10)"
                    },
                    "page_size": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Rows per page (default 50)"
                    }
                },
                "required": ["query"]
            }),
        },
    ]
}
