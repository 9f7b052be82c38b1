//! Bounded, insertion-ordered history of captured exchanges.

use std::collections::VecDeque;

use crate::types::{Exchange, DEFAULT_MAX_EXCHANGES};

/// Most-recent-N exchanges, oldest at the front.
///
/// Length never exceeds the capacity; when it would, the oldest entry is
/// evicted. Entries are never reordered or updated.
#[derive(Debug, Clone)]
pub struct ExchangeBuffer {
    entries: VecDeque<Exchange>,
    capacity: usize,
}

impl ExchangeBuffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an exchange, returning the evicted entry if the bound was hit.
    pub fn push(&mut self, exchange: Exchange) -> Option<Exchange> {
        self.entries.push_back(exchange);
        if self.entries.len() > self.capacity {
            let evicted = self.entries.pop_front();
            if let Some(ref old) = evicted {
                tracing::debug!("Evicted oldest exchange: {} {}", old.method, old.url);
            }
            evicted
        } else {
            None
        }
    }

    /// Newest-to-oldest traversal. Call again to restart.
    pub fn scan_newest_first(&self) -> impl ExactSizeIterator<Item = &Exchange> + '_ {
        self.entries.iter().rev()
    }

    /// Oldest-to-newest traversal.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Exchange> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ExchangeBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXCHANGES)
    }
}
