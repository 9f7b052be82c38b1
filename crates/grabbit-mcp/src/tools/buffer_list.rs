//! Tool: buffer_list. What the current page has captured.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::session::GrabSessionManager;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "buffer_list".to_string(),
        description: Some("Summarise buffered exchanges, newest first".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "default": 20 }
            }
        }),
    }
}

pub async fn execute(
    args: Value,
    session: &Arc<Mutex<GrabSessionManager>>,
) -> McpResult<ToolCallResult> {
    let params: ListParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let mut session = session.lock().await;
    let page = session.page_mut()?;
    page.absorb();

    let buffer = page.buffer();
    let exchanges: Vec<Value> = buffer
        .scan_newest_first()
        .take(params.limit)
        .enumerate()
        .map(|(index, e)| {
            json!({
                "index": index,
                "method": e.method,
                "url": e.url,
                "kind": e.kind,
                "timestamp": e.timestamp,
            })
        })
        .collect();

    Ok(ToolCallResult::json(&json!({
        "total": buffer.len(),
        "capacity": buffer.capacity(),
        "exchanges": exchanges,
    })))
}
