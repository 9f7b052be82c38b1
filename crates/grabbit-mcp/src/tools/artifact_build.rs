//! Tool: artifact_build. Regenerate artifacts for a stored or buffered exchange.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde::Deserialize;
use serde_json::{json, Value};

use grabbit::matcher::leaf_text;
use grabbit::{ArtifactBundle, CookieRecord, Exchange, MatchResult};

use crate::session::GrabSessionManager;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct BuildParams {
    #[serde(default)]
    exchange: Option<Exchange>,
    /// Newest-first position in the current page's buffer.
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    cookies: Vec<CookieRecord>,
    #[serde(default)]
    include_headers: Option<bool>,
    #[serde(default)]
    include_cookies: Option<bool>,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "artifact_build".to_string(),
        description: Some(
            "Rebuild curl, OpenAPI and pipeline artifacts from a saved exchange, or from a buffered one by index"
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "exchange": { "type": "object", "description": "A previously returned exchange" },
                "index": { "type": "integer", "minimum": 0, "description": "Position in buffer_list output" },
                "path": { "type": "string", "description": "Stored match path, e.g. data.items[0].price" },
                "value": { "description": "Stored matched value" },
                "target": { "type": "string", "description": "The value originally asked for" },
                "cookies": { "type": "array", "items": { "type": "object" } },
                "include_headers": { "type": "boolean" },
                "include_cookies": { "type": "boolean" }
            }
        }),
    }
}

pub async fn execute(
    args: Value,
    session: &Arc<Mutex<GrabSessionManager>>,
) -> McpResult<ToolCallResult> {
    let params: BuildParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let mut session = session.lock().await;
    let exchange = match (params.exchange, params.index) {
        (Some(exchange), _) => exchange,
        (None, Some(index)) => {
            let page = session.page_mut()?;
            page.absorb();
            page.buffer()
                .scan_newest_first()
                .nth(index)
                .cloned()
                .ok_or_else(|| {
                    McpError::InvalidParams(format!("No buffered exchange at index {index}"))
                })?
        }
        (None, None) => {
            return Err(McpError::InvalidParams(
                "Either exchange or index is required".to_string(),
            ))
        }
    };

    let mut policy = session.policy();
    if let Some(v) = params.include_headers {
        policy.include_headers = v;
    }
    if let Some(v) = params.include_cookies {
        policy.include_cookies = v;
    }

    let path = params.path.filter(|p| !p.is_empty());
    let matched = match (params.value, path) {
        (None, None) => None,
        (value, path) => Some(MatchResult::restore(
            value.unwrap_or(Value::Null),
            path.as_deref(),
        )),
    };
    let requested = params
        .target
        .or_else(|| matched.as_ref().and_then(|m| leaf_text(&m.value)))
        .unwrap_or_default();

    let bundle = ArtifactBundle::generate(
        &exchange,
        matched.as_ref(),
        &requested,
        policy,
        &params.cookies,
    );
    Ok(ToolCallResult::json(&bundle))
}
