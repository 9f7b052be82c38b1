//! Configuration loading and resolution.
//!
//! Every setting resolves the same way: explicit flag, then environment
//! variable, then built-in default.

use grabbit::config::DEFAULT_USER_AGENT;
use grabbit::{CaptureConfig, ReplayPolicy, DEFAULT_MAX_EXCHANGES};

pub const DEFAULT_DEBUG_LOG_SIZE: usize = 50;

pub const HISTORY_ENV: &str = "GRABBIT_HISTORY";
pub const DEBUG_LOG_ENV: &str = "GRABBIT_DEBUG_LOG";
pub const USER_AGENT_ENV: &str = "GRABBIT_USER_AGENT";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub capture: CaptureConfig,
    /// Initial replay settings; `settings_update` changes them at runtime.
    pub policy: ReplayPolicy,
    pub debug_log_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            policy: ReplayPolicy::default(),
            debug_log_size: DEFAULT_DEBUG_LOG_SIZE,
        }
    }
}

/// Exchange buffer bound.
pub fn resolve_history(explicit: Option<usize>) -> usize {
    resolve_count(explicit, std::env::var(HISTORY_ENV).ok(), DEFAULT_MAX_EXCHANGES)
}

/// Debug log bound.
pub fn resolve_debug_log_size(explicit: Option<usize>) -> usize {
    resolve_count(explicit, std::env::var(DEBUG_LOG_ENV).ok(), DEFAULT_DEBUG_LOG_SIZE)
}

/// User-agent recorded on captures that carry none.
pub fn resolve_user_agent(explicit: Option<&str>) -> String {
    if let Some(ua) = explicit {
        return ua.to_string();
    }
    if let Ok(ua) = std::env::var(USER_AGENT_ENV) {
        if !ua.trim().is_empty() {
            return ua;
        }
    }
    DEFAULT_USER_AGENT.to_string()
}

fn resolve_count(explicit: Option<usize>, env: Option<String>, default: usize) -> usize {
    if let Some(n) = explicit.filter(|n| *n > 0) {
        return n;
    }
    match env.as_deref().map(str::trim).map(str::parse::<usize>) {
        Some(Ok(n)) if n > 0 => n,
        Some(_) => {
            tracing::warn!("Ignoring invalid count {env:?}, using {default}");
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_order() {
        assert_eq!(resolve_count(Some(7), Some("9".into()), 100), 7);
        assert_eq!(resolve_count(None, Some(" 9 ".into()), 100), 9);
        assert_eq!(resolve_count(None, None, 100), 100);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        assert_eq!(resolve_count(Some(0), None, 100), 100);
        assert_eq!(resolve_count(None, Some("lots".into()), 100), 100);
        assert_eq!(resolve_count(None, Some("0".into()), 50), 50);
    }
}
