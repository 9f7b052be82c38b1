//! Core data types for captured exchanges, matches, and artifacts.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// Default number of exchanges a page keeps in memory.
pub const DEFAULT_MAX_EXCHANGES: usize = 100;

/// How an exchange came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
    /// Observed through the callback-based request surface.
    CallbackRequest,
    /// Observed through the promise-based fetch surface.
    PromiseRequest,
    /// The page's own rendered text, seeded when the buffer is created.
    InitialDocument,
    /// A stand-in built when nothing was captured.
    Synthetic,
}

/// Request headers in the order the caller supplied them.
///
/// Names keep their original case; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Set a header. An entry with exactly the same name is replaced in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (n, v) in iter {
            headers.set(n, v);
        }
        headers
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of header names to values")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Headers, E> {
                Ok(Headers::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Headers, A::Error> {
                let mut headers = Headers::new();
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    let value = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    headers.set(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_any(HeadersVisitor)
    }
}

/// One observed network call, or a synthetic substitute for one.
///
/// Immutable once it has been pushed into an [`ExchangeBuffer`](crate::ExchangeBuffer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    /// Absolute URL of the call.
    pub url: String,
    /// Upper-case HTTP verb.
    pub method: String,
    #[serde(default)]
    pub request_headers: Headers,
    /// Raw request payload: a string, a structured value, or absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    /// Parsed response payload; absent when it was not structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    /// Capture instant, epoch milliseconds.
    #[serde(default = "now_millis")]
    pub timestamp: i64,
    pub kind: ExchangeKind,
}

impl Exchange {
    /// The pseudo-exchange standing in for server-rendered page content.
    pub fn initial_document(url: &str, title: &str, text: &str) -> Self {
        Self {
            url: url.to_string(),
            method: "GET".to_string(),
            request_headers: [("Note", "Initial Page Load")].into_iter().collect(),
            request_body: None,
            response_body: Some(json!({ "html": text, "title": title })),
            timestamp: now_millis(),
            kind: ExchangeKind::InitialDocument,
        }
    }

    /// A GET exchange carrying nothing but a URL and an informational note.
    pub fn synthetic(url: &str, info: &str) -> Self {
        Self {
            url: url.to_string(),
            method: "GET".to_string(),
            request_headers: Headers::new(),
            request_body: None,
            response_body: Some(json!({ "info": info })),
            timestamp: now_millis(),
            kind: ExchangeKind::Synthetic,
        }
    }
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A browser cookie handed in by the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
}

/// Errors that can occur in the core library.
#[derive(thiserror::Error, Debug)]
pub enum GrabbitError {
    #[error("Nothing to search for: the target value is empty")]
    EmptyTarget,

    #[error("Failed to match \"{target}\". Scanned {scanned} requests.")]
    NoMatch { target: String, scanned: usize },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Convenience result type.
pub type GrabbitResult<T> = Result<T, GrabbitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_preserve_order_and_case() {
        let mut headers = Headers::new();
        headers.set("X-Token", "a");
        headers.set("Accept", "application/json");
        headers.set("X-Token", "b");

        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["X-Token", "Accept"]);
        assert_eq!(headers.get("x-token"), Some("b"));
        assert!(headers.contains("ACCEPT"));
    }

    #[test]
    fn test_headers_json_shape() {
        let headers: Headers = serde_json::from_str(r#"{"b": "1", "a": 2}"#).unwrap();
        assert_eq!(headers.get("a"), Some("2"));
        assert_eq!(serde_json::to_string(&headers).unwrap(), r#"{"b":"1","a":"2"}"#);
    }

    #[test]
    fn test_exchange_wire_format() {
        let raw = json!({
            "url": "https://api.example.com/users/42",
            "method": "GET",
            "responseBody": { "id": 42 },
            "kind": "promise_request"
        });
        let exchange: Exchange = serde_json::from_value(raw).unwrap();
        assert_eq!(exchange.kind, ExchangeKind::PromiseRequest);
        assert!(exchange.request_headers.is_empty());
        assert!(exchange.timestamp > 0);

        let back = serde_json::to_value(&exchange).unwrap();
        assert_eq!(back["responseBody"]["id"], 42);
        assert!(back.get("requestBody").is_none());
    }

    #[test]
    fn test_initial_document() {
        let doc = Exchange::initial_document("https://shop.test/", "Shop", "Total $12.50");
        assert_eq!(doc.kind, ExchangeKind::InitialDocument);
        assert_eq!(doc.request_headers.get("note"), Some("Initial Page Load"));
        assert_eq!(doc.response_body.unwrap()["html"], "Total $12.50");
    }

    #[test]
    fn test_no_match_message() {
        let err = GrabbitError::NoMatch {
            target: "zzz-unmatched".to_string(),
            scanned: 3,
        };
        assert_eq!(
            err.to_string(),
            "Failed to match \"zzz-unmatched\". Scanned 3 requests."
        );
    }
}
