//! Tool: settings_update. Read or change the replay settings.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::session::GrabSessionManager;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct SettingsParams {
    #[serde(default)]
    include_headers: Option<bool>,
    #[serde(default)]
    include_cookies: Option<bool>,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "settings_update".to_string(),
        description: Some(
            "Change whether replay commands carry request headers and cookies. Call with no arguments to read the current settings"
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
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
    let params: SettingsParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let mut session = session.lock().await;
    let policy = session.update_policy(params.include_headers, params.include_cookies);
    Ok(ToolCallResult::json(&policy))
}
