//! Callback-style surface: open, set headers, send, then a load callback.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::{Interceptor, RawCapture, ResponsePayload};
use crate::types::{ExchangeKind, Headers};

/// Identifies one call between `open` and its load callback.
pub type CallHandle = u64;

/// Invoked once when a call's response has loaded.
pub type OnLoad = Box<dyn FnOnce(&CallbackResponse) + Send + 'static>;

/// How the caller asked to receive the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    #[default]
    Default,
    Text,
    Json,
    ArrayBuffer,
    Blob,
    Document,
}

impl ResponseType {
    pub fn is_textual(self) -> bool {
        matches!(self, ResponseType::Default | ResponseType::Text | ResponseType::Json)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackBody {
    Text(String),
    Json(Value),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct CallbackResponse {
    pub status: u16,
    pub response_type: ResponseType,
    pub body: CallbackBody,
}

pub trait CallbackTransport {
    /// Start a call. Reopening a handle discards its earlier headers.
    fn open(&mut self, method: &str, url: &str) -> CallHandle;
    fn set_request_header(&mut self, handle: CallHandle, name: &str, value: &str);
    fn send(&mut self, handle: CallHandle, body: Option<Value>, on_load: OnLoad);
}

struct PendingCall {
    method: String,
    url: String,
    headers: Headers,
}

/// Wraps a [`CallbackTransport`] and records each call once it loads.
///
/// Method, URL and headers are remembered per handle from `open` until
/// `send`; the entry is released at `send`. The caller's own load callback
/// always runs first.
pub struct InterceptedCallback<T> {
    inner: T,
    pending: HashMap<CallHandle, PendingCall>,
    interceptor: Arc<Interceptor>,
}

impl<T> InterceptedCallback<T> {
    pub fn new(inner: T, interceptor: Arc<Interceptor>) -> Self {
        Self {
            inner,
            pending: HashMap::new(),
            interceptor,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Calls opened but not yet sent.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }
}

impl<T: CallbackTransport> CallbackTransport for InterceptedCallback<T> {
    fn open(&mut self, method: &str, url: &str) -> CallHandle {
        let handle = self.inner.open(method, url);
        self.pending.insert(
            handle,
            PendingCall {
                method: method.to_string(),
                url: url.to_string(),
                headers: Headers::new(),
            },
        );
        handle
    }

    fn set_request_header(&mut self, handle: CallHandle, name: &str, value: &str) {
        if let Some(call) = self.pending.get_mut(&handle) {
            call.headers.set(name, value);
        }
        self.inner.set_request_header(handle, name, value);
    }

    fn send(&mut self, handle: CallHandle, body: Option<Value>, on_load: OnLoad) {
        let call = self.pending.remove(&handle);
        let interceptor = Arc::clone(&self.interceptor);
        let request_body = body.clone();

        let wrapped: OnLoad = Box::new(move |response| {
            on_load(response);
            if let Some(call) = call {
                record_load(&interceptor, call, request_body, response);
            }
        });
        self.inner.send(handle, body, wrapped);
    }
}

fn record_load(
    interceptor: &Interceptor,
    call: PendingCall,
    request_body: Option<Value>,
    response: &CallbackResponse,
) {
    if !response.response_type.is_textual() {
        return;
    }
    let payload = match &response.body {
        CallbackBody::Json(v) => ResponsePayload::Structured(v.clone()),
        CallbackBody::Text(t) => ResponsePayload::Text(t.clone()),
        CallbackBody::Binary(_) => return,
    };
    interceptor.record(RawCapture {
        url: call.url,
        method: Some(call.method),
        request_headers: call.headers,
        request_body,
        response_body: Some(payload),
        kind: Some(ExchangeKind::CallbackRequest),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::CaptureNormalizer;
    use crate::types::Exchange;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    /// Loads every call synchronously with a canned response.
    struct Immediate {
        next: CallHandle,
        response: CallbackResponse,
        seen_headers: Vec<(CallHandle, String)>,
    }

    impl Immediate {
        fn new(response: CallbackResponse) -> Self {
            Self {
                next: 0,
                response,
                seen_headers: Vec::new(),
            }
        }
    }

    impl CallbackTransport for Immediate {
        fn open(&mut self, _method: &str, _url: &str) -> CallHandle {
            self.next += 1;
            self.next
        }

        fn set_request_header(&mut self, handle: CallHandle, name: &str, _value: &str) {
            self.seen_headers.push((handle, name.to_string()));
        }

        fn send(&mut self, _handle: CallHandle, _body: Option<Value>, on_load: OnLoad) {
            on_load(&self.response);
        }
    }

    fn setup(response: CallbackResponse) -> (InterceptedCallback<Immediate>, broadcast::Receiver<Exchange>) {
        setup_with_agent(response, None)
    }

    fn setup_with_agent(
        response: CallbackResponse,
        user_agent: Option<&str>,
    ) -> (InterceptedCallback<Immediate>, broadcast::Receiver<Exchange>) {
        let (tx, rx) = broadcast::channel(8);
        let normalizer =
            CaptureNormalizer::new("https://app.test/feed", user_agent.map(str::to_string)).unwrap();
        let interceptor = Arc::new(Interceptor::new(normalizer, tx));
        (InterceptedCallback::new(Immediate::new(response), interceptor), rx)
    }

    fn text_response(body: &str) -> CallbackResponse {
        CallbackResponse {
            status: 200,
            response_type: ResponseType::Default,
            body: CallbackBody::Text(body.to_string()),
        }
    }

    #[test]
    fn test_records_after_caller_callback() {
        let (mut xhr, mut rx) = setup(text_response(r#"{"items": [1, 2]}"#));
        let order = Arc::new(Mutex::new(Vec::new()));

        let handle = xhr.open("get", "/api/items");
        xhr.set_request_header(handle, "X-Csrf", "abc");
        assert_eq!(xhr.pending_calls(), 1);

        let seen = Arc::clone(&order);
        xhr.send(
            handle,
            None,
            Box::new(move |r| seen.lock().unwrap().push(r.status)),
        );

        assert_eq!(*order.lock().unwrap(), vec![200]);
        assert_eq!(xhr.pending_calls(), 0);
        assert_eq!(xhr.inner().seen_headers, vec![(handle, "X-Csrf".to_string())]);

        let ex = rx.try_recv().unwrap();
        assert_eq!(ex.url, "https://app.test/api/items");
        assert_eq!(ex.method, "GET");
        assert_eq!(ex.kind, ExchangeKind::CallbackRequest);
        assert_eq!(ex.request_headers.get("x-csrf"), Some("abc"));
    }

    #[test]
    fn test_binary_and_undecodable_are_ignored() {
        let (mut xhr, mut rx) = setup(CallbackResponse {
            status: 200,
            response_type: ResponseType::ArrayBuffer,
            body: CallbackBody::Binary(vec![0, 1, 2]),
        });
        let h = xhr.open("GET", "/blob");
        xhr.send(h, None, Box::new(|_| {}));
        assert!(rx.try_recv().is_err());

        let (mut xhr, mut rx) = setup(text_response("plain words"));
        let h = xhr.open("GET", "/text");
        xhr.send(h, None, Box::new(|_| {}));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_interleaved_calls_keep_their_own_headers() {
        let (mut xhr, mut rx) = setup(CallbackResponse {
            status: 200,
            response_type: ResponseType::Json,
            body: CallbackBody::Json(serde_json::json!({ "ok": true })),
        });
        let first = xhr.open("GET", "/a");
        let second = xhr.open("POST", "/b");
        xhr.set_request_header(first, "X-First", "1");
        xhr.set_request_header(second, "X-Second", "2");

        xhr.send(second, Some(serde_json::json!({ "q": 1 })), Box::new(|_| {}));
        xhr.send(first, None, Box::new(|_| {}));

        let b = rx.try_recv().unwrap();
        assert_eq!(b.method, "POST");
        assert!(b.request_headers.contains("X-Second"));
        assert!(!b.request_headers.contains("X-First"));
        assert_eq!(b.request_body, Some(serde_json::json!({ "q": 1 })));

        let a = rx.try_recv().unwrap();
        assert_eq!(a.url, "https://app.test/a");
        assert!(a.request_headers.contains("X-First"));
    }

    #[test]
    fn test_default_agent_is_not_sent() {
        let (mut xhr, mut rx) = setup_with_agent(text_response(r#"{"n": 1}"#), Some("UA/1"));
        let handle = xhr.open("GET", "/api/n");
        xhr.set_request_header(handle, "Accept", "application/json");
        xhr.send(handle, None, Box::new(|_| {}));

        assert_eq!(xhr.inner().seen_headers, vec![(handle, "Accept".to_string())]);

        let ex = rx.try_recv().unwrap();
        assert_eq!(ex.request_headers.get("user-agent"), Some("UA/1"));
        assert_eq!(ex.request_headers.get("accept"), Some("application/json"));
    }
}
