//! Passive capture of a page's network calls.
//!
//! Each networking surface is wrapped by a decorator that keeps the surface's
//! signature and return semantics and, once a call completes, hands a
//! [`RawCapture`] to the page's [`Interceptor`]. The interceptor normalises it
//! into an [`Exchange`] and broadcasts it; the page session absorbs broadcasts
//! into its buffer. A call whose payload is not structured data is dropped
//! here and never reaches the caller as an error.

pub mod callback;
pub mod fetch;
pub mod http;

pub use callback::{
    CallHandle, CallbackBody, CallbackResponse, CallbackTransport, InterceptedCallback, OnLoad,
    ResponseType,
};
pub use fetch::{FetchRequest, FetchResponse, FetchTransport, InterceptedFetch};
pub use http::{CallbackClient, HttpClient};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;
use url::Url;

use crate::types::{now_millis, Exchange, ExchangeKind, GrabbitError, GrabbitResult, Headers};

/// A response payload as the surface delivered it.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// Text that still has to decode as JSON.
    Text(String),
    /// Already-structured data.
    Structured(Value),
}

impl ResponsePayload {
    fn decode(self) -> Option<Value> {
        match self {
            ResponsePayload::Structured(v) => Some(v),
            ResponsePayload::Text(text) => serde_json::from_str(&text).ok(),
        }
    }
}

/// A completed call before normalisation.
///
/// On the wire `responseBody` is always taken as structured data, so a
/// top-level JSON string stays a string. Undecoded text goes in
/// `responseText` and wins when both are present.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "CaptureRecord")]
pub struct RawCapture {
    /// Possibly relative URL, as the page passed it.
    pub url: String,
    pub method: Option<String>,
    pub request_headers: Headers,
    pub request_body: Option<Value>,
    pub response_body: Option<ResponsePayload>,
    pub kind: Option<ExchangeKind>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureRecord {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    request_headers: Headers,
    #[serde(default)]
    request_body: Option<Value>,
    #[serde(default)]
    response_body: Option<Value>,
    #[serde(default)]
    response_text: Option<String>,
    #[serde(default)]
    kind: Option<ExchangeKind>,
}

impl From<CaptureRecord> for RawCapture {
    fn from(record: CaptureRecord) -> Self {
        let response_body = match (record.response_text, record.response_body) {
            (Some(text), _) => Some(ResponsePayload::Text(text)),
            (None, Some(value)) => Some(ResponsePayload::Structured(value)),
            (None, None) => None,
        };
        Self {
            url: record.url,
            method: record.method,
            request_headers: record.request_headers,
            request_body: record.request_body,
            response_body,
            kind: record.kind,
        }
    }
}

/// Turns raw captures into well-formed exchanges for one page.
#[derive(Debug, Clone)]
pub struct CaptureNormalizer {
    base: Url,
    user_agent: Option<String>,
}

impl CaptureNormalizer {
    pub fn new(page_url: &str, user_agent: Option<String>) -> GrabbitResult<Self> {
        let base = Url::parse(page_url).map_err(|e| GrabbitError::InvalidUrl(format!("{page_url}: {e}")))?;
        Ok(Self { base, user_agent })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a possibly relative URL against the page location.
    pub fn resolve_url(&self, url: &str) -> Option<String> {
        self.base.join(url).ok().map(String::from)
    }

    /// Normalise a capture, or `None` if it has nothing structured to offer.
    pub fn normalize(&self, raw: RawCapture) -> Option<Exchange> {
        let Some(url) = self.resolve_url(&raw.url) else {
            tracing::debug!("Dropped capture with unresolvable URL: {}", raw.url);
            return None;
        };

        let Some(response_body) = raw.response_body.and_then(ResponsePayload::decode) else {
            tracing::debug!("Dropped capture without structured response: {url}");
            return None;
        };

        let method = raw
            .method
            .filter(|m| !m.trim().is_empty())
            .map(|m| m.trim().to_uppercase())
            .unwrap_or_else(|| "GET".to_string());

        let mut request_headers = raw.request_headers;
        if let Some(ua) = &self.user_agent {
            if !request_headers.contains("User-Agent") {
                request_headers.set("User-Agent", ua.clone());
            }
        }

        Some(Exchange {
            url,
            method,
            request_headers,
            request_body: raw.request_body,
            response_body: Some(response_body),
            timestamp: now_millis(),
            kind: raw.kind.unwrap_or(ExchangeKind::PromiseRequest),
        })
    }
}

/// The capture side of one page: normaliser plus broadcast channel.
///
/// Created once per page session and shared by every wrapped surface.
#[derive(Debug)]
pub struct Interceptor {
    normalizer: CaptureNormalizer,
    sender: broadcast::Sender<Exchange>,
}

impl Interceptor {
    pub fn new(normalizer: CaptureNormalizer, sender: broadcast::Sender<Exchange>) -> Self {
        Self { normalizer, sender }
    }

    pub fn normalizer(&self) -> &CaptureNormalizer {
        &self.normalizer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Exchange> {
        self.sender.subscribe()
    }

    /// Normalise and broadcast a completed call. Returns whether a record was
    /// emitted; never fails.
    pub fn record(&self, raw: RawCapture) -> bool {
        match self.normalizer.normalize(raw) {
            Some(exchange) => {
                tracing::debug!("Captured {} {}", exchange.method, exchange.url);
                // No subscribers just means nobody is listening any more.
                let _ = self.sender.send(exchange);
                true
            }
            None => false,
        }
    }
}
