//! Tool: debug_log. Recent match attempts.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::session::GrabSessionManager;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct LogParams {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    clear: bool,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "debug_log".to_string(),
        description: Some("List recent match attempts, newest first".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "minimum": 1 },
                "clear": { "type": "boolean", "default": false, "description": "Empty the log after reading it" }
            }
        }),
    }
}

pub async fn execute(
    args: Value,
    session: &Arc<Mutex<GrabSessionManager>>,
) -> McpResult<ToolCallResult> {
    let params: LogParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let mut session = session.lock().await;
    let entries = json!(session.debug_log(params.limit));
    let total = entries.as_array().map_or(0, Vec::len);
    if params.clear {
        session.clear_debug_log();
    }

    Ok(ToolCallResult::json(&json!({
        "total": total,
        "entries": entries,
    })))
}
