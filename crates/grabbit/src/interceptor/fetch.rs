//! Promise-style surface: one awaited call per request.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{Interceptor, RawCapture, ResponsePayload};
use crate::types::{ExchangeKind, GrabbitResult, Headers};

/// An outgoing request on the promise-style surface.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub url: String,
    /// `None` means GET.
    pub method: Option<String>,
    pub headers: Headers,
    pub body: Option<Value>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// The response as the caller sees it; the body is left undecoded.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> GrabbitResult<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[async_trait]
pub trait FetchTransport: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> GrabbitResult<FetchResponse>;
}

/// Wraps a [`FetchTransport`] and records every completed call.
///
/// The caller gets the original response back untouched. A duplicate of the
/// body is decoded on a separate task, so capture never delays or alters the
/// caller's read.
pub struct InterceptedFetch<T> {
    inner: T,
    interceptor: Arc<Interceptor>,
}

impl<T> InterceptedFetch<T> {
    pub fn new(inner: T, interceptor: Arc<Interceptor>) -> Self {
        Self { inner, interceptor }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: FetchTransport> FetchTransport for InterceptedFetch<T> {
    async fn fetch(&self, request: FetchRequest) -> GrabbitResult<FetchResponse> {
        let seen = request.clone();
        let response = self.inner.fetch(request).await?;

        let duplicate = response.body.clone();
        let interceptor = Arc::clone(&self.interceptor);
        tokio::spawn(async move {
            let decoded = match serde_json::from_slice::<Value>(&duplicate) {
                Ok(v) => v,
                Err(_) => {
                    tracing::debug!("Skipped non-JSON response from {}", seen.url);
                    return;
                }
            };
            interceptor.record(RawCapture {
                url: seen.url,
                method: seen.method,
                request_headers: seen.headers,
                request_body: seen.body,
                response_body: Some(ResponsePayload::Structured(decoded)),
                kind: Some(ExchangeKind::PromiseRequest),
            });
        });

        Ok(response)
    }
}
