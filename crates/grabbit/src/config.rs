//! Capture-side configuration.

use crate::types::DEFAULT_MAX_EXCHANGES;

/// Desktop Chrome user-agent recorded on captures that did not set one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";

/// Capture records in flight before a slow consumer starts losing them.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Exchange buffer bound.
    pub max_exchanges: usize,
    /// Capacity of the broadcast channel carrying capture records.
    pub channel_capacity: usize,
    /// Injected into a record's headers when the caller set no `User-Agent`.
    pub user_agent: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_exchanges: DEFAULT_MAX_EXCHANGES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        }
    }
}
