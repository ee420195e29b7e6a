//! The tool catalog and the router that executes tool calls.
//!
//! Every tool follows the same pipeline: decode arguments, validate, call the
//! backend, render plain text. Failures at any step come back as an
//! error-flagged [`CallToolResult`], never as a protocol error.

use std::fmt::Write as _;

use lore_store::{
    Category, CategoryStats, DEFAULT_CONFIDENCE, Learning, SharedBackend,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{Result, ToolError};
use crate::protocol::{CallToolResult, ToolInfo};

pub const LOOKUP_CONTEXT: &str = "lookup_context";
pub const STORE_LEARNING: &str = "store_learning";
pub const LIST_LEARNINGS: &str = "list_learnings";
pub const UPDATE_LEARNING: &str = "update_learning";
pub const DELETE_LEARNING: &str = "delete_learning";
pub const GET_STATS: &str = "get_stats";

const NO_MATCHES: &str = "No relevant learnings found. This may be a new topic or a fresh start.";
const NOTHING_STORED: &str = "No learnings stored yet.";

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// The static tool catalog returned by `tools/list`.
pub fn catalog() -> Vec<ToolInfo> {
    let categories = Category::names();
    let filter_categories: Vec<&str> = std::iter::once("").chain(categories.iter().copied()).collect();

    vec![
        ToolInfo {
            name: LOOKUP_CONTEXT.to_string(),
            description: "CALL THIS FIRST at the start of any conversation.\n\
                Retrieves relevant learnings and context that should inform how to best interact with this user.\n\
                Returns stored preferences, past mistakes to avoid, and relevant personal context.\n\
                Use the results to calibrate your tone, approach, and content before responding."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Keywords describing the topic or type of help needed (e.g. 'emotional support', 'kubernetes debugging', 'writing')"
                    },
                    "category": {
                        "type": "string",
                        "description": "Optional: filter by category",
                        "enum": filter_categories
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Max results to return (default 10)",
                        "default": 10
                    }
                },
                "required": ["query"]
            }),
        },
        ToolInfo {
            name: STORE_LEARNING.to_string(),
            description: "Store a new learning, observation, or improvement note.\n\
                Use this to record user preferences discovered during conversation, mistakes made and how to avoid them, \
                useful context about the user, and communication patterns that work well or poorly.\n\
                Be specific and actionable. Write as if briefing a future version of yourself."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "description": "Category for this learning",
                        "enum": categories
                    },
                    "content": {
                        "type": "string",
                        "description": "The learning itself. Be specific and actionable."
                    },
                    "tags": {
                        "type": "string",
                        "description": "Comma-separated tags (e.g. 'formatting,tone,communication')"
                    },
                    "confidence": {
                        "type": "number",
                        "description": "Confidence in this learning, 0.0-1.0 (default 0.8)",
                        "default": DEFAULT_CONFIDENCE
                    }
                },
                "required": ["category", "content"]
            }),
        },
        ToolInfo {
            name: LIST_LEARNINGS.to_string(),
            description: "List stored learnings, optionally filtered by category.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "description": "Optional: filter by category",
                        "enum": filter_categories
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Max results (default 50)",
                        "default": 50
                    }
                }
            }),
        },
        ToolInfo {
            name: UPDATE_LEARNING.to_string(),
            description: "Update an existing learning by ID. Use to refine or correct a stored learning."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string", "description": "ID of the learning to update"},
                    "content": {"type": "string", "description": "Updated content"},
                    "tags": {"type": "string", "description": "Updated tags (comma-separated)"},
                    "confidence": {
                        "type": "number",
                        "description": "Updated confidence score 0.0-1.0 (default 0.8)",
                        "default": DEFAULT_CONFIDENCE
                    }
                },
                "required": ["id", "content"]
            }),
        },
        ToolInfo {
            name: DELETE_LEARNING.to_string(),
            description: "Delete a learning by ID. Use when a learning is outdated, wrong, or no longer relevant."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string", "description": "ID of the learning to delete"}
                },
                "required": ["id"]
            }),
        },
        ToolInfo {
            name: GET_STATS.to_string(),
            description: "Get a summary of stored learnings by category.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Arguments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LookupArgs {
    query: String,
    category: String,
    limit: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoreArgs {
    category: String,
    content: String,
    tags: String,
    confidence: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListArgs {
    category: String,
    limit: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateArgs {
    id: String,
    content: String,
    tags: String,
    confidence: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeleteArgs {
    id: String,
}

fn decode<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T> {
    let arguments = match arguments {
        None | Some(Value::Null) => json!({}),
        Some(value) => value,
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::invalid_arguments(e.to_string()))
}

/// Empty means no filter; anything else must name a known category.
fn category_filter(raw: &str) -> Result<Option<Category>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|e: lore_store::UnknownCategory| ToolError::invalid_arguments(e.to_string()))
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ToolError::invalid_arguments(format!("{field} is required")));
    }
    Ok(())
}

/// Non-positive limits fall through to the backend default.
fn limit(raw: i64) -> usize {
    usize::try_from(raw).unwrap_or(0)
}

fn confidence(raw: f64) -> f64 {
    if raw == 0.0 { DEFAULT_CONFIDENCE } else { raw }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Executes tool calls against a shared backend.
#[derive(Clone)]
pub struct ToolRouter {
    backend: SharedBackend,
}

impl ToolRouter {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Run the named tool. Always returns a result; failures are error-flagged.
    pub async fn call(&self, name: &str, arguments: Option<Value>) -> CallToolResult {
        debug!(tool = name, "Calling tool");
        match self.execute(name, arguments).await {
            Ok(text) => CallToolResult::success(text),
            Err(e) => {
                match &e {
                    ToolError::Backend { .. } => warn!(tool = name, error = %e, "Tool failed"),
                    _ => debug!(tool = name, error = %e, "Tool rejected call"),
                }
                CallToolResult::failure(e.to_string())
            }
        }
    }

    async fn execute(&self, name: &str, arguments: Option<Value>) -> Result<String> {
        match name {
            LOOKUP_CONTEXT => self.lookup_context(decode(arguments)?).await,
            STORE_LEARNING => self.store_learning(decode(arguments)?).await,
            LIST_LEARNINGS => self.list_learnings(decode(arguments)?).await,
            UPDATE_LEARNING => self.update_learning(decode(arguments)?).await,
            DELETE_LEARNING => self.delete_learning(decode(arguments)?).await,
            GET_STATS => self.get_stats().await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    async fn lookup_context(&self, args: LookupArgs) -> Result<String> {
        let category = category_filter(&args.category)?;
        let learnings = self
            .backend
            .search(&args.query, category, limit(args.limit))
            .await
            .map_err(ToolError::backend("search"))?;

        for learning in &learnings {
            self.backend.increment_use_count(&learning.id).await;
        }
        Ok(render_lookup(&learnings))
    }

    async fn store_learning(&self, args: StoreArgs) -> Result<String> {
        require("content", &args.content)?;
        let category = Category::parse_lenient(&args.category);
        let learning = self
            .backend
            .add(category, &args.content, &args.tags, confidence(args.confidence))
            .await
            .map_err(ToolError::backend("store"))?;
        Ok(format!(
            "Learning stored successfully with ID:{} in category '{}'.",
            learning.id, learning.category
        ))
    }

    async fn list_learnings(&self, args: ListArgs) -> Result<String> {
        let category = category_filter(&args.category)?;
        let learnings = self
            .backend
            .list(category, limit(args.limit))
            .await
            .map_err(ToolError::backend("list"))?;
        Ok(render_list(&learnings))
    }

    async fn update_learning(&self, args: UpdateArgs) -> Result<String> {
        require("id", &args.id)?;
        require("content", &args.content)?;
        self.backend
            .update(&args.id, &args.content, &args.tags, confidence(args.confidence))
            .await
            .map_err(ToolError::backend("update"))?;
        Ok(format!("Learning ID:{} updated successfully.", args.id))
    }

    async fn delete_learning(&self, args: DeleteArgs) -> Result<String> {
        require("id", &args.id)?;
        self.backend
            .delete(&args.id)
            .await
            .map_err(ToolError::backend("delete"))?;
        Ok(format!("Learning ID:{} deleted.", args.id))
    }

    async fn get_stats(&self) -> Result<String> {
        let stats = self
            .backend
            .stats()
            .await
            .map_err(ToolError::backend("stats"))?;
        Ok(render_stats(&stats))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

fn render_lookup(learnings: &[Learning]) -> String {
    if learnings.is_empty() {
        return NO_MATCHES.to_string();
    }
    let mut out = format!("Found {} relevant learnings:\n\n", learnings.len());
    for l in learnings {
        let _ = writeln!(out, "--- [ID:{} | {} | confidence:{:.1}]", l.id, l.category, l.confidence);
        let _ = writeln!(out, "{}", l.content);
        if !l.tags.is_empty() {
            let _ = writeln!(out, "tags: {}", l.tags);
        }
        out.push('\n');
    }
    out
}

fn render_list(learnings: &[Learning]) -> String {
    if learnings.is_empty() {
        return NOTHING_STORED.to_string();
    }
    let mut out = format!("Stored learnings ({}):\n\n", learnings.len());
    for l in learnings {
        let _ = writeln!(
            out,
            "[ID:{} | {} | confidence:{:.1} | used:{} times]",
            l.id, l.category, l.confidence, l.use_count
        );
        let _ = writeln!(out, "{}", l.content);
        if !l.tags.is_empty() {
            let _ = writeln!(out, "tags: {}", l.tags);
        }
        let _ = writeln!(out, "updated: {}\n", l.updated_at.format("%Y-%m-%d"));
    }
    out
}

fn render_stats(stats: &CategoryStats) -> String {
    let mut out = String::from("Learnings by category:\n");
    for (category, count) in stats {
        let _ = writeln!(out, "  {category:<20} {count}");
    }
    let total: usize = stats.values().sum();
    let _ = write!(out, "\nTotal: {total} learnings\n");
    out
}
