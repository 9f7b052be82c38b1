//! Tool: page_load. Start a fresh page session.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde_json::{json, Value};

use grabbit::PageSnapshot;

use crate::session::GrabSessionManager;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "page_load".to_string(),
        description: Some(
            "Open a fresh page session. Discards every exchange captured on the previous page"
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Absolute page URL; relative captures resolve against it" },
                "title": { "type": "string" },
                "text": { "type": "string", "description": "Rendered page text, searched when no API response matches" }
            },
            "required": ["url"]
        }),
    }
}

pub async fn execute(
    args: Value,
    session: &Arc<Mutex<GrabSessionManager>>,
) -> McpResult<ToolCallResult> {
    let snapshot: PageSnapshot =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let mut session = session.lock().await;
    let page = session.load_page(snapshot)?;
    let url = page.page().url.clone();
    let buffered = page.buffer().len();
    let capacity = page.buffer().capacity();

    Ok(ToolCallResult::json(&json!({
        "status": "loaded",
        "url": url,
        "buffered": buffered,
        "capacity": capacity,
        "loaded_at": session.loaded_at().map(|t| t.to_rfc3339()),
    })))
}
