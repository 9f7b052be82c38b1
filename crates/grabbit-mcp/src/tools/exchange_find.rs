//! Tool: exchange_find. Trace a visible value back to the call that produced it.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde::Deserialize;
use serde_json::{json, Value};

use grabbit::CookieRecord;

use crate::session::{FindKind, FindOutcome, GrabSessionManager};
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct FindParams {
    target: String,
    #[serde(default)]
    kind: FindKind,
    #[serde(default)]
    cookies: Vec<CookieRecord>,
    #[serde(default)]
    include_headers: Option<bool>,
    #[serde(default)]
    include_cookies: Option<bool>,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "exchange_find".to_string(),
        description: Some(
            "Find the captured call behind a selected value or image and generate curl, OpenAPI and pipeline artifacts"
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "target": { "type": "string", "description": "Selected text, or the image URL when kind is image" },
                "kind": { "type": "string", "enum": ["text", "image"], "default": "text" },
                "cookies": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": { "name": { "type": "string" }, "value": { "type": "string" } },
                        "required": ["name", "value"]
                    }
                },
                "include_headers": { "type": "boolean", "description": "Override the stored setting for this call" },
                "include_cookies": { "type": "boolean", "description": "Override the stored setting for this call" }
            },
            "required": ["target"]
        }),
    }
}

pub async fn execute(
    args: Value,
    session: &Arc<Mutex<GrabSessionManager>>,
) -> McpResult<ToolCallResult> {
    let params: FindParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let mut session = session.lock().await;
    let mut policy = session.policy();
    if let Some(v) = params.include_headers {
        policy.include_headers = v;
    }
    if let Some(v) = params.include_cookies {
        policy.include_cookies = v;
    }

    match session.find(&params.target, params.kind, policy, &params.cookies)? {
        FindOutcome::Found {
            exchange,
            matched,
            bundle,
            log,
        } => Ok(ToolCallResult::json(&json!({
            "found": true,
            "exchange": exchange,
            "match": matched,
            "artifacts": bundle,
            "log": log,
        }))),
        FindOutcome::NotFound { log } => Ok(ToolCallResult::json_error(&json!({
            "found": false,
            "log": log,
        }))),
    }
}
