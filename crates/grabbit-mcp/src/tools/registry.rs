//! Tool registration and dispatch.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde_json::Value;

use crate::session::GrabSessionManager;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

use super::{
    artifact_build, buffer_list, capture_record, debug_log, exchange_find, page_load,
    settings_update,
};

pub struct ToolRegistry;

impl ToolRegistry {
    pub fn list_tools() -> Vec<ToolDefinition> {
        vec![
            page_load::definition(),
            capture_record::definition(),
            exchange_find::definition(),
            artifact_build::definition(),
            settings_update::definition(),
            debug_log::definition(),
            buffer_list::definition(),
        ]
    }

    pub async fn call(
        name: &str,
        arguments: Option<Value>,
        session: &Arc<Mutex<GrabSessionManager>>,
    ) -> McpResult<ToolCallResult> {
        let args = arguments.unwrap_or(Value::Object(serde_json::Map::new()));

        match name {
            "page_load" => page_load::execute(args, session).await,
            "capture_record" => capture_record::execute(args, session).await,
            "exchange_find" => exchange_find::execute(args, session).await,
            "artifact_build" => artifact_build::execute(args, session).await,
            "settings_update" => settings_update::execute(args, session).await,
            "debug_log" => debug_log::execute(args, session).await,
            "buffer_list" => buffer_list::execute(args, session).await,
            _ => Err(McpError::ToolNotFound(name.to_string())),
        }
    }
}
