//! Real network transports over reqwest.
//!
//! Handles redirects and timeouts. Idempotent calls retry on 5xx and back off
//! on 429; other methods go out exactly once. Relative URLs resolve against
//! the client's base, the way a page's own calls resolve against the page.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use url::Url;

use super::callback::{CallHandle, CallbackBody, CallbackResponse, CallbackTransport, OnLoad, ResponseType};
use super::fetch::{FetchRequest, FetchResponse, FetchTransport};
use crate::config::DEFAULT_USER_AGENT;
use crate::types::{GrabbitError, GrabbitResult, Headers};

const MAX_RETRIES: u32 = 2;

/// Promise-style transport over reqwest.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
    base: Option<Url>,
}

impl HttpClient {
    pub fn new(timeout_ms: u64) -> Self {
        Self::with_user_agent(timeout_ms, DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(timeout_ms: u64, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            base: None,
        }
    }

    /// Resolve relative request URLs against `base`.
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    fn resolve(&self, url: &str) -> GrabbitResult<Url> {
        let resolved = match &self.base {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        resolved.map_err(|e| GrabbitError::InvalidUrl(format!("{url}: {e}")))
    }

    async fn send_inner(
        &self,
        client: &reqwest::Client,
        request: &FetchRequest,
    ) -> GrabbitResult<FetchResponse> {
        let method = request
            .method
            .as_deref()
            .map(|m| Method::from_bytes(m.trim().to_uppercase().as_bytes()))
            .transpose()
            .map_err(|e| GrabbitError::Transport(format!("bad method: {e}")))?
            .unwrap_or(Method::GET);
        let idempotent = matches!(method, Method::GET | Method::HEAD);
        let url = self.resolve(&request.url)?;

        let mut retries = 0u32;
        loop {
            let mut builder = client.request(method.clone(), url.clone());
            for (name, value) in request.headers.iter() {
                builder = builder.header(name, value);
            }
            match &request.body {
                None | Some(Value::Null) => {}
                Some(Value::String(text)) => builder = builder.body(text.clone()),
                Some(other) => {
                    if !request.headers.contains("content-type") {
                        builder = builder.header("content-type", "application/json");
                    }
                    builder = builder.body(other.to_string());
                }
            }

            match builder.send().await {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if idempotent && status >= 500 && retries < MAX_RETRIES {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if idempotent && status == 429 && retries < MAX_RETRIES {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let url = r.url().to_string();
                    let headers: Headers = r
                        .headers()
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                        .collect();
                    let body = r.bytes().await?.to_vec();

                    return Ok(FetchResponse {
                        url,
                        status,
                        headers,
                        body,
                    });
                }
                Err(e) => {
                    if idempotent && !e.is_builder() && retries < MAX_RETRIES {
                        retries += 1;
                        let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

#[async_trait]
impl FetchTransport for HttpClient {
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    async fn fetch(&self, request: FetchRequest) -> GrabbitResult<FetchResponse> {
        match self.send_inner(&self.client, &request).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let err_str = format!("{e}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    self.send_inner(&self.h1_client, &request).await
                } else {
                    Err(e)
                }
            }
        }
    }
}

/// Callback-style transport: each `send` runs on the current tokio runtime
/// and invokes the load callback when the body has arrived.
///
/// A call that fails at the network level never loads. Must be used from
/// within a runtime.
pub struct CallbackClient {
    http: HttpClient,
    next_handle: CallHandle,
    opened: HashMap<CallHandle, FetchRequest>,
}

impl CallbackClient {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            next_handle: 0,
            opened: HashMap::new(),
        }
    }
}

impl CallbackTransport for CallbackClient {
    fn open(&mut self, method: &str, url: &str) -> CallHandle {
        self.next_handle += 1;
        self.opened
            .insert(self.next_handle, FetchRequest::get(url).method(method));
        self.next_handle
    }

    fn set_request_header(&mut self, handle: CallHandle, name: &str, value: &str) {
        if let Some(request) = self.opened.get_mut(&handle) {
            request.headers.set(name, value);
        }
    }

    fn send(&mut self, handle: CallHandle, body: Option<Value>, on_load: OnLoad) {
        let Some(mut request) = self.opened.remove(&handle) else {
            tracing::warn!("send on unopened call handle {handle}");
            return;
        };
        request.body = body;

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!("No runtime for callback call to {}: {e}", request.url);
                return;
            }
        };

        let http = self.http.clone();
        runtime.spawn(async move {
            match http.fetch(request).await {
                Ok(response) => on_load(&to_callback_response(response)),
                Err(e) => tracing::debug!("Callback call failed: {e}"),
            }
        });
    }
}

/// Pick a body representation from the response's content type.
fn to_callback_response(response: FetchResponse) -> CallbackResponse {
    let content_type = response
        .headers
        .get("content-type")
        .unwrap_or("")
        .to_ascii_lowercase();

    let (response_type, body) = if content_type.contains("json") {
        match serde_json::from_slice::<Value>(&response.body) {
            Ok(v) => (ResponseType::Json, CallbackBody::Json(v)),
            Err(_) => (ResponseType::Text, CallbackBody::Text(response.text())),
        }
    } else if content_type.is_empty()
        || content_type.starts_with("text/")
        || content_type.contains("xml")
        || content_type.contains("javascript")
    {
        (ResponseType::Default, CallbackBody::Text(response.text()))
    } else {
        (ResponseType::ArrayBuffer, CallbackBody::Binary(response.body))
    };

    CallbackResponse {
        status: response.status,
        response_type,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content_type: &str, body: &[u8]) -> FetchResponse {
        let mut headers = Headers::new();
        if !content_type.is_empty() {
            headers.set("content-type", content_type);
        }
        FetchResponse {
            url: "https://a.test/".into(),
            status: 200,
            headers,
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_http_client_creation() {
        let _ = HttpClient::new(10_000);
        let _ = HttpClient::with_user_agent(10_000, "Grabbit/0.1");
    }

    #[test]
    fn test_callback_body_from_content_type() {
        let r = to_callback_response(response("application/json; charset=utf-8", br#"{"a":1}"#));
        assert_eq!(r.response_type, ResponseType::Json);
        assert_eq!(r.body, CallbackBody::Json(serde_json::json!({ "a": 1 })));

        let r = to_callback_response(response("text/plain", b"hello"));
        assert_eq!(r.body, CallbackBody::Text("hello".into()));

        let r = to_callback_response(response("", b"{}"));
        assert!(r.response_type.is_textual());

        let r = to_callback_response(response("image/png", &[0x89, 0x50]));
        assert_eq!(r.response_type, ResponseType::ArrayBuffer);
        assert!(!r.response_type.is_textual());
    }

    #[test]
    fn test_relative_urls_resolve_against_base() {
        let client = HttpClient::new(1_000);
        assert!(matches!(
            client.resolve("/api/items"),
            Err(GrabbitError::InvalidUrl(_))
        ));

        let client = client.with_base(Url::parse("https://shop.test/item/5").unwrap());
        assert_eq!(
            client.resolve("/api/items?page=2").unwrap().as_str(),
            "https://shop.test/api/items?page=2"
        );
        assert_eq!(
            client.resolve("reviews").unwrap().as_str(),
            "https://shop.test/item/reviews"
        );
        assert_eq!(
            client.resolve("https://cdn.test/a.json").unwrap().as_str(),
            "https://cdn.test/a.json"
        );
    }

    #[tokio::test]
    async fn test_unresolvable_url_fails_without_retrying() {
        let client = HttpClient::new(1_000);
        let started = std::time::Instant::now();
        let err = client.fetch(FetchRequest::get("/api/items")).await.unwrap_err();
        assert!(matches!(err, GrabbitError::InvalidUrl(_)));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn test_send_without_open_is_ignored() {
        let mut client = CallbackClient::new(HttpClient::new(1_000));
        client.send(99, None, Box::new(|_| panic!("must not load")));
        assert!(client.opened.is_empty());
    }
}
