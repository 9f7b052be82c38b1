//! One page's capture state.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::buffer::ExchangeBuffer;
use crate::config::CaptureConfig;
use crate::interceptor::{
    CallbackTransport, CaptureNormalizer, FetchTransport, HttpClient, InterceptedCallback,
    InterceptedFetch, Interceptor, RawCapture,
};
use crate::matcher::{self, Found, PageSnapshot};
use crate::types::{Exchange, GrabbitResult};

/// Buffer, capture channel and interceptor for a single loaded page.
///
/// The interceptor is created here and nowhere else, so a page never has
/// more than one. Wrapped transports share it via [`PageSession::interceptor`].
pub struct PageSession {
    page: PageSnapshot,
    buffer: ExchangeBuffer,
    interceptor: Arc<Interceptor>,
    receiver: broadcast::Receiver<Exchange>,
}

impl PageSession {
    pub fn open(page: PageSnapshot, config: &CaptureConfig) -> GrabbitResult<Self> {
        let normalizer = CaptureNormalizer::new(&page.url, config.user_agent.clone())?;
        let (sender, receiver) = broadcast::channel(config.channel_capacity.max(1));
        let interceptor = Arc::new(Interceptor::new(normalizer, sender));

        let mut buffer = ExchangeBuffer::new(config.max_exchanges);
        buffer.push(Exchange::initial_document(&page.url, &page.title, &page.text));

        tracing::info!("Opened page session for {}", page.url);
        Ok(Self {
            page,
            buffer,
            interceptor,
            receiver,
        })
    }

    pub fn page(&self) -> &PageSnapshot {
        &self.page
    }

    pub fn buffer(&self) -> &ExchangeBuffer {
        &self.buffer
    }

    pub fn interceptor(&self) -> Arc<Interceptor> {
        Arc::clone(&self.interceptor)
    }

    /// A real network client whose relative URLs resolve against this page.
    pub fn http_client(&self, timeout_ms: u64) -> HttpClient {
        HttpClient::new(timeout_ms).with_base(self.interceptor.normalizer().base().clone())
    }

    pub fn wrap_fetch<T: FetchTransport>(&self, inner: T) -> InterceptedFetch<T> {
        InterceptedFetch::new(inner, self.interceptor())
    }

    pub fn wrap_callback<T: CallbackTransport>(&self, inner: T) -> InterceptedCallback<T> {
        InterceptedCallback::new(inner, self.interceptor())
    }

    /// Deliver a capture event directly and absorb it. Returns whether an
    /// exchange was recorded.
    pub fn record(&mut self, raw: RawCapture) -> bool {
        let recorded = self.interceptor.record(raw);
        self.absorb();
        recorded
    }

    /// Move every delivered record into the buffer. Records still being
    /// decoded elsewhere are not waited for.
    pub fn absorb(&mut self) -> usize {
        let mut absorbed = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(exchange) => {
                    self.buffer.push(exchange);
                    absorbed += 1;
                }
                Err(TryRecvError::Lagged(n)) => {
                    tracing::warn!("Capture channel lagged, {n} records lost");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        absorbed
    }

    pub fn find_text(&mut self, selection: &str) -> GrabbitResult<Found<'_>> {
        self.absorb();
        matcher::find_text(selection, &self.buffer, Some(&self.page))
    }

    pub fn find_image(&mut self, image_url: &str) -> Found<'_> {
        self.absorb();
        matcher::find_image(image_url, &self.buffer)
    }
}
