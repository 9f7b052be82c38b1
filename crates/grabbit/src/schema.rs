//! OpenAPI 3.0 fragment generator.
//!
//! Builds a one-path, one-operation document from a captured exchange, with a
//! JSON-Schema-like type tree inferred from the response (and, for payload
//! methods, the request) body.

use serde_json::{json, Map, Value};

use crate::types::Exchange;

/// Methods that conventionally carry a request payload.
const PAYLOAD_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

/// Infer a type tree from a sample value.
///
/// Arrays take the schema of their first element; objects map every field.
pub fn infer_schema(value: &Value) -> Value {
    match value {
        Value::Array(items) => json!({
            "type": "array",
            "items": items.first().map(infer_schema).unwrap_or_else(|| json!({})),
        }),
        Value::Null => json!({ "type": "null" }),
        Value::Object(map) => {
            let properties: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), infer_schema(v)))
                .collect();
            json!({ "type": "object", "properties": properties })
        }
        Value::Bool(_) => json!({ "type": "boolean" }),
        Value::Number(_) => json!({ "type": "number" }),
        Value::String(_) => json!({ "type": "string" }),
    }
}

/// The request payload as structured data, if it is structured data.
///
/// A textual body is decoded as JSON; text that does not decode is not
/// structured and yields `None`.
pub fn decode_request_body(exchange: &Exchange) -> Option<Value> {
    match exchange.request_body.as_ref()? {
        Value::Null => None,
        Value::String(text) => serde_json::from_str::<Value>(text)
            .ok()
            .filter(|v| v.is_object() || v.is_array()),
        other => Some(other.clone()),
    }
}

/// Build a minimal OpenAPI 3.0 document for one exchange.
///
/// `request_body` is the already-decoded payload; it is only attached for
/// payload-carrying methods.
pub fn build_openapi(exchange: &Exchange, request_body: Option<&Value>) -> Value {
    let parsed = url::Url::parse(&exchange.url).ok();
    let path = parsed
        .as_ref()
        .map(|u| u.path().to_string())
        .unwrap_or_else(|| "/".to_string());

    let response_schema = exchange
        .response_body
        .as_ref()
        .map(infer_schema)
        .unwrap_or_else(|| json!({}));

    let mut operation = json!({
        "responses": {
            "200": {
                "description": "Successful response",
                "content": {
                    "application/json": { "schema": response_schema }
                }
            }
        }
    });

    let method = exchange.method.to_uppercase();
    if let Some(body) = request_body {
        if PAYLOAD_METHODS.contains(&method.as_str()) {
            operation["requestBody"] = json!({
                "content": {
                    "application/json": { "schema": infer_schema(body) }
                }
            });
        }
    }

    let mut item = Map::new();
    item.insert(method.to_lowercase(), operation);
    let mut paths = Map::new();
    paths.insert(path, Value::Object(item));

    let mut doc = json!({
        "openapi": "3.0.0",
        "info": { "title": "Extracted API", "version": "1.0.0" },
    });
    if let Some(origin) = parsed
        .as_ref()
        .map(|u| u.origin())
        .filter(|o| o.is_tuple())
    {
        doc["servers"] = json!([{ "url": origin.ascii_serialization() }]);
    }
    doc["paths"] = Value::Object(paths);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExchangeKind;

    fn exchange(method: &str, url: &str, request: Option<Value>, response: Value) -> Exchange {
        Exchange {
            url: url.to_string(),
            method: method.to_string(),
            request_headers: Default::default(),
            request_body: request,
            response_body: Some(response),
            timestamp: 0,
            kind: ExchangeKind::PromiseRequest,
        }
    }

    #[test]
    fn test_infer_schema_shapes() {
        let schema = infer_schema(&json!({ "a": 1, "b": ["x", "y"], "c": null }));
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "number");
        assert_eq!(
            schema["properties"]["b"],
            json!({ "type": "array", "items": { "type": "string" } })
        );
        assert_eq!(schema["properties"]["c"], json!({ "type": "null" }));
    }

    #[test]
    fn test_empty_array_has_empty_items() {
        assert_eq!(
            infer_schema(&json!([])),
            json!({ "type": "array", "items": {} })
        );
        assert_eq!(infer_schema(&json!(true)), json!({ "type": "boolean" }));
    }

    #[test]
    fn test_openapi_document() {
        let ex = exchange(
            "GET",
            "https://api.example.com/users/42?expand=1",
            None,
            json!({ "id": 42 }),
        );
        let doc = build_openapi(&ex, None);
        assert_eq!(doc["openapi"], "3.0.0");
        assert_eq!(doc["servers"][0]["url"], "https://api.example.com");
        let op = &doc["paths"]["/users/42"]["get"];
        assert_eq!(
            op["responses"]["200"]["content"]["application/json"]["schema"]["properties"]["id"]
                ["type"],
            "number"
        );
        assert!(op.get("requestBody").is_none());
    }

    #[test]
    fn test_request_body_only_for_payload_methods() {
        let body = json!({ "q": "shoes", "page": 2 });

        let post = exchange("POST", "https://api.test/search", None, json!([]));
        let doc = build_openapi(&post, Some(&body));
        let schema = &doc["paths"]["/search"]["post"]["requestBody"]["content"]["application/json"]
            ["schema"];
        assert_eq!(schema["properties"]["page"]["type"], "number");

        let get = exchange("GET", "https://api.test/search", None, json!([]));
        let doc = build_openapi(&get, Some(&body));
        assert!(doc["paths"]["/search"]["get"].get("requestBody").is_none());
    }

    #[test]
    fn test_decode_request_body() {
        let text = exchange("POST", "https://a.test/", Some(json!("{\"a\":1}")), json!({}));
        assert_eq!(decode_request_body(&text), Some(json!({ "a": 1 })));

        let form = exchange("POST", "https://a.test/", Some(json!("a=1&b=2")), json!({}));
        assert_eq!(decode_request_body(&form), None);

        let structured = exchange("POST", "https://a.test/", Some(json!([1, 2])), json!({}));
        assert_eq!(decode_request_body(&structured), Some(json!([1, 2])));
    }

    #[test]
    fn test_missing_response_degrades() {
        let mut ex = exchange("GET", "not a url", None, json!({}));
        ex.response_body = None;
        let doc = build_openapi(&ex, None);
        assert!(doc.get("servers").is_none());
        assert_eq!(
            doc["paths"]["/"]["get"]["responses"]["200"]["content"]["application/json"]["schema"],
            json!({})
        );
    }
}
