//! Protocol-level tests for grabbit-mcp: drive the handler with JSON-RPC
//! messages the way an MCP client would.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::BufReader;
use tokio::sync::Mutex;

use grabbit_mcp::config::ServerConfig;
use grabbit_mcp::protocol::ProtocolHandler;
use grabbit_mcp::session::GrabSessionManager;
use grabbit_mcp::transport::{framing, StdioTransport};
use grabbit_mcp::types::*;

// ─────────────────────── helpers ───────────────────────

fn handler() -> ProtocolHandler {
    handler_with(ServerConfig::default())
}

fn handler_with(config: ServerConfig) -> ProtocolHandler {
    ProtocolHandler::new(Arc::new(Mutex::new(GrabSessionManager::new(config))))
}

fn mcp_request(id: i64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

fn tool_call(id: i64, name: &str, arguments: Value) -> Value {
    mcp_request(id, "tools/call", json!({ "name": name, "arguments": arguments }))
}

async fn send(handler: &ProtocolHandler, msg: Value) -> Option<Value> {
    let parsed: JsonRpcMessage = serde_json::from_value(msg).unwrap();
    handler.handle_message(parsed).await
}

async fn send_unwrap(handler: &ProtocolHandler, msg: Value) -> Value {
    send(handler, msg).await.expect("expected response")
}

/// Call a tool and decode the JSON text it returned.
async fn call_tool(handler: &ProtocolHandler, name: &str, arguments: Value) -> (Value, bool) {
    let resp = send_unwrap(handler, tool_call(1, name, arguments)).await;
    assert!(resp.get("error").is_none(), "unexpected error: {resp}");
    let result = &resp["result"];
    let text = result["content"][0]["text"].as_str().unwrap();
    let is_error = result["isError"].as_bool().unwrap_or(false);
    (serde_json::from_str(text).unwrap(), is_error)
}

async fn load_profile_page(handler: &ProtocolHandler) {
    call_tool(
        handler,
        "page_load",
        json!({
            "url": "https://app.example.com/users/42",
            "title": "Ada",
            "text": "Ada Lovelace — 48.2k views — Joined 1843"
        }),
    )
    .await;
}

async fn record_user_api(handler: &ProtocolHandler) {
    let (out, _) = call_tool(
        handler,
        "capture_record",
        json!({
            "url": "https://api.example.com/users/42",
            "method": "get",
            "requestHeaders": {
                "Authorization": "Bearer t0k",
                "Cache-Control": "no-cache",
                "Cookie": "sid=from-header"
            },
            "responseBody": { "id": 42, "name": "Ada", "viewCount": "48.2k" }
        }),
    )
    .await;
    assert_eq!(out["recorded"], true);
}

// ═══════════════════════════════════════════════════════
// HANDSHAKE
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let h = handler();
    let resp = send_unwrap(
        &h,
        mcp_request(
            0,
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "1.0" }
            }),
        ),
    )
    .await;
    assert_eq!(resp["result"]["serverInfo"]["name"], SERVER_NAME);
    assert_eq!(resp["result"]["protocolVersion"], MCP_VERSION);

    let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    assert!(send(&h, initialized).await.is_none());

    let resp = send_unwrap(&h, mcp_request(1, "tools/list", json!({}))).await;
    let names: Vec<&str> = resp["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    for expected in [
        "page_load",
        "capture_record",
        "exchange_find",
        "artifact_build",
        "settings_update",
        "debug_log",
        "buffer_list",
    ] {
        assert!(names.contains(&expected), "missing tool {expected}");
    }
}

#[tokio::test]
async fn test_future_protocol_version_still_initializes() {
    let h = handler();
    let resp = send_unwrap(
        &h,
        mcp_request(
            0,
            "initialize",
            json!({
                "protocolVersion": "2099-01-01",
                "capabilities": {},
                "clientInfo": { "name": "future", "version": "9" }
            }),
        ),
    )
    .await;
    assert_eq!(resp["result"]["protocolVersion"], MCP_VERSION);
}

#[tokio::test]
async fn test_unknown_method_and_tool() {
    let h = handler();
    let resp = send_unwrap(&h, mcp_request(5, "resources/list", json!({}))).await;
    assert_eq!(resp["error"]["code"], error_codes::METHOD_NOT_FOUND);
    assert_eq!(resp["id"], 5);

    let resp = send_unwrap(&h, tool_call(6, "image_upload", json!({}))).await;
    assert_eq!(resp["error"]["code"], mcp_error_codes::TOOL_NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_jsonrpc_version() {
    let h = handler();
    let msg = json!({ "jsonrpc": "1.0", "id": 3, "method": "ping" });
    let resp = send_unwrap(&h, msg).await;
    assert_eq!(resp["error"]["code"], error_codes::INVALID_REQUEST);
}

// ═══════════════════════════════════════════════════════
// FIND AND ARTIFACTS
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_find_before_page_load() {
    let h = handler();
    let resp = send_unwrap(&h, tool_call(1, "exchange_find", json!({ "target": "48k" }))).await;
    assert_eq!(resp["error"]["code"], mcp_error_codes::PAGE_NOT_LOADED);
}

#[tokio::test]
async fn test_view_count_scenario() {
    let h = handler();
    load_profile_page(&h).await;
    record_user_api(&h).await;

    let (out, is_error) = call_tool(
        &h,
        "exchange_find",
        json!({ "target": "48200", "cookies": [{ "name": "sid", "value": "jar" }] }),
    )
    .await;
    assert!(!is_error);
    assert_eq!(out["found"], true);
    assert_eq!(out["match"]["path"], "viewCount");
    assert_eq!(out["match"]["value"], "48.2k");
    assert_eq!(out["exchange"]["url"], "https://api.example.com/users/42");
    assert_eq!(out["exchange"]["method"], "GET");
    assert_eq!(out["log"]["outcome"], "success");
    assert_eq!(out["log"]["message"], "Found match \"48.2k\" at \"viewCount\".");

    let curl = out["artifacts"]["curlCommand"].as_str().unwrap();
    assert_eq!(
        curl,
        "curl -X GET 'https://api.example.com/users/42' \\\n  -b 'sid=jar'"
    );
    assert_eq!(
        out["artifacts"]["pipelineCommand"],
        format!(r#"{curl} | jq '.["viewCount"]'"#)
    );
    assert_eq!(
        out["artifacts"]["openApiFragment"]["servers"][0]["url"],
        "https://api.example.com"
    );
}

#[tokio::test]
async fn test_header_policy_and_exclusions() {
    let h = handler();
    load_profile_page(&h).await;
    record_user_api(&h).await;

    let (settings, _) = call_tool(&h, "settings_update", json!({ "include_headers": true })).await;
    assert_eq!(settings, json!({ "include_headers": true, "include_cookies": true }));

    let (out, _) = call_tool(&h, "exchange_find", json!({ "target": "Ada" })).await;
    let curl = out["artifacts"]["curlCommand"].as_str().unwrap();
    assert!(curl.contains("-H 'Authorization: Bearer t0k'"));
    assert!(curl.contains("-b 'sid=from-header'"));
    assert!(!curl.to_lowercase().contains("cache-control"));
    assert!(!curl.contains("-H 'Cookie"));

    let (out, _) = call_tool(
        &h,
        "exchange_find",
        json!({ "target": "Ada", "include_cookies": false }),
    )
    .await;
    assert!(!out["artifacts"]["curlCommand"].as_str().unwrap().contains("-b "));
}

#[tokio::test]
async fn test_no_match_is_a_structured_failure() {
    let h = handler();
    load_profile_page(&h).await;
    record_user_api(&h).await;

    let (out, is_error) = call_tool(&h, "exchange_find", json!({ "target": "zzz-unmatched" })).await;
    assert!(is_error);
    assert_eq!(out["found"], false);
    assert_eq!(out["log"]["outcome"], "error");
    assert_eq!(
        out["log"]["message"],
        "Failed to match \"zzz-unmatched\". Scanned 2 requests."
    );

    let (log, _) = call_tool(&h, "debug_log", json!({})).await;
    assert_eq!(log["total"], 1);
    assert_eq!(log["entries"][0]["outcome"], "error");
}

#[tokio::test]
async fn test_empty_target_is_a_hard_stop() {
    let h = handler();
    load_profile_page(&h).await;
    let resp = send_unwrap(&h, tool_call(1, "exchange_find", json!({ "target": "  " }))).await;
    assert_eq!(resp["error"]["code"], mcp_error_codes::EMPTY_TARGET);

    let (log, _) = call_tool(&h, "debug_log", json!({})).await;
    assert_eq!(log["total"], 0);
}

#[tokio::test]
async fn test_page_text_fallback() {
    let page = json!({ "url": "https://shop.test/p/1", "text": "Price: $1,299.00 today" });

    // A one-slot buffer: the next capture evicts the seeded document, so only
    // the rendered-text fallback can match.
    let h = handler_with(ServerConfig {
        capture: grabbit::CaptureConfig {
            max_exchanges: 1,
            ..Default::default()
        },
        ..Default::default()
    });
    call_tool(&h, "page_load", page.clone()).await;
    call_tool(
        &h,
        "capture_record",
        json!({ "url": "/api/unrelated", "responseBody": { "ok": true } }),
    )
    .await;

    let (out, is_error) = call_tool(&h, "exchange_find", json!({ "target": "1299.00" })).await;
    assert!(!is_error);
    assert_eq!(out["match"]["path"], "document.body.innerText");
    assert_eq!(out["log"]["message"], "Found match in page content (SSR).");
    assert!(out["artifacts"]["pipelineCommand"]
        .as_str()
        .unwrap()
        .contains("| grep -oP '<[^<]*1299\\.00[^>]*>'"));

    // With the document still buffered, the seeded pseudo-exchange answers instead.
    let h = handler();
    call_tool(&h, "page_load", page).await;
    let (out, _) = call_tool(&h, "exchange_find", json!({ "target": "1299.00" })).await;
    assert_eq!(out["exchange"]["kind"], "initial_document");
    assert_eq!(out["match"]["path"], "html");
}

#[tokio::test]
async fn test_image_lookup() {
    let h = handler();
    load_profile_page(&h).await;
    call_tool(
        &h,
        "capture_record",
        json!({
            "url": "/api/gallery",
            "responseText": "{\"photos\": [{\"src\": \"/img/cat.png?w=200\"}]}"
        }),
    )
    .await;

    let (out, _) = call_tool(
        &h,
        "exchange_find",
        json!({ "target": "https://cdn.example.com/img/cat.png?w=200", "kind": "image" }),
    )
    .await;
    assert_eq!(out["exchange"]["url"], "https://app.example.com/api/gallery");
    assert_eq!(out["match"]["path"], "photos[0].src");

    let (out, _) = call_tool(
        &h,
        "exchange_find",
        json!({ "target": "https://cdn.example.com/nowhere.png", "kind": "image" }),
    )
    .await;
    assert_eq!(out["exchange"]["kind"], "synthetic");
    assert!(out["match"].is_null());
    assert!(out["artifacts"].get("pipelineCommand").is_none());
}

#[tokio::test]
async fn test_artifact_build_from_buffer_and_saved_exchange() {
    let h = handler();
    load_profile_page(&h).await;
    record_user_api(&h).await;

    let (list, _) = call_tool(&h, "buffer_list", json!({})).await;
    assert_eq!(list["total"], 2);
    assert_eq!(list["exchanges"][0]["url"], "https://api.example.com/users/42");
    assert_eq!(list["exchanges"][1]["kind"], "initial_document");

    let (bundle, _) = call_tool(
        &h,
        "artifact_build",
        json!({ "index": 0, "path": "name", "value": "Ada", "include_cookies": false }),
    )
    .await;
    assert_eq!(
        bundle["pipelineCommand"],
        r#"curl -X GET 'https://api.example.com/users/42' | jq '.["name"]'"#
    );

    let saved = json!({
        "url": "https://api.example.com/search",
        "method": "POST",
        "requestHeaders": {},
        "requestBody": "{\"q\":\"it's\"}",
        "responseBody": { "hits": [] },
        "kind": "promise_request"
    });
    let (bundle, _) = call_tool(&h, "artifact_build", json!({ "exchange": saved })).await;
    assert_eq!(
        bundle["curlCommand"],
        "curl -X POST 'https://api.example.com/search' \\\n  -d '{\"q\":\"it'\\''s\"}'"
    );
    assert_eq!(
        bundle["openApiFragment"]["paths"]["/search"]["post"]["requestBody"]["content"]
            ["application/json"]["schema"]["properties"]["q"]["type"],
        "string"
    );
    assert!(bundle.get("pipelineCommand").is_none());

    let resp = send_unwrap(&h, tool_call(9, "artifact_build", json!({ "index": 7 }))).await;
    assert_eq!(resp["error"]["code"], error_codes::INVALID_PARAMS);
}

#[tokio::test]
async fn test_non_json_capture_is_ignored() {
    let h = handler();
    load_profile_page(&h).await;
    let (out, _) = call_tool(
        &h,
        "capture_record",
        json!({ "url": "/styles.css", "responseText": "body { color: red }" }),
    )
    .await;
    assert_eq!(out["recorded"], false);
    assert_eq!(out["buffered"], 1);
}

// ═══════════════════════════════════════════════════════
// TRANSPORT
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_stdio_serves_lines_until_eof() {
    let input = [
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        "",
        r#"{"broken":"#,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
    ]
    .join("\n");

    let transport = StdioTransport::new(handler());
    let mut output = Vec::new();
    transport
        .serve(BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[1]["error"]["code"], error_codes::PARSE_ERROR);
    assert!(lines[1]["id"].is_null());
    assert!(lines[2]["result"]["tools"].is_array());
}

#[test]
fn test_framing_round_trip() {
    let framed = framing::frame_message(&json!({ "jsonrpc": "2.0", "id": 1, "result": {} })).unwrap();
    assert!(matches!(
        framing::parse_message(&framed),
        Ok(JsonRpcMessage::Response(_))
    ));
}
