//! Tool: capture_record. Deliver one captured network call.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde_json::{json, Value};

use grabbit::RawCapture;

use crate::session::GrabSessionManager;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "capture_record".to_string(),
        description: Some(
            "Record a completed network call on the current page. Calls whose response is not JSON are ignored"
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" },
                "method": { "type": "string", "default": "GET" },
                "requestHeaders": { "type": "object", "additionalProperties": { "type": "string" } },
                "requestBody": {},
                "responseBody": { "description": "Parsed JSON response. A string here is a JSON string, not text to decode" },
                "responseText": { "type": "string", "description": "Raw response text, decoded as JSON. Takes precedence over responseBody" },
                "kind": { "type": "string", "enum": ["callback_request", "promise_request"] }
            },
            "required": ["url"]
        }),
    }
}

pub async fn execute(
    args: Value,
    session: &Arc<Mutex<GrabSessionManager>>,
) -> McpResult<ToolCallResult> {
    let raw: RawCapture =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let mut session = session.lock().await;
    let recorded = session.record(raw)?;
    let buffered = session.page()?.buffer().len();

    Ok(ToolCallResult::json(&json!({
        "recorded": recorded,
        "buffered": buffered,
    })))
}
