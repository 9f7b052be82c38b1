//! Page session lifecycle, replay settings and the match debug log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use grabbit::matcher::clean_text;
use grabbit::{
    ArtifactBundle, CookieRecord, Exchange, GrabbitError, MatchLog, MatchResult, PageSession,
    PageSnapshot, RawCapture, ReplayPolicy,
};

use crate::config::ServerConfig;
use crate::types::{McpError, McpResult};

/// What the selected target is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindKind {
    #[default]
    Text,
    Image,
}

#[derive(Debug, Clone)]
pub enum FindOutcome {
    Found {
        exchange: Exchange,
        matched: Option<MatchResult>,
        bundle: ArtifactBundle,
        log: MatchLog,
    },
    NotFound {
        log: MatchLog,
    },
}

/// Owns everything that outlives a single tool call.
pub struct GrabSessionManager {
    config: ServerConfig,
    policy: ReplayPolicy,
    page: Option<PageSession>,
    loaded_at: Option<DateTime<Utc>>,
    /// Newest first.
    debug_log: VecDeque<MatchLog>,
}

impl GrabSessionManager {
    pub fn new(config: ServerConfig) -> Self {
        tracing::info!(
            "Session manager ready: history {}, debug log {}",
            config.capture.max_exchanges,
            config.debug_log_size
        );
        Self {
            policy: config.policy,
            config,
            page: None,
            loaded_at: None,
            debug_log: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Replace the current page with a fresh session. Anything captured on
    /// the previous page is discarded with it.
    pub fn load_page(&mut self, snapshot: PageSnapshot) -> McpResult<&PageSession> {
        let session = PageSession::open(snapshot, &self.config.capture)?;
        if let Some(previous) = self.page.replace(session) {
            tracing::info!("Discarded page session for {}", previous.page().url);
        }
        self.loaded_at = Some(Utc::now());
        self.page.as_ref().ok_or(McpError::PageNotLoaded)
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn page(&self) -> McpResult<&PageSession> {
        self.page.as_ref().ok_or(McpError::PageNotLoaded)
    }

    pub fn page_mut(&mut self) -> McpResult<&mut PageSession> {
        self.page.as_mut().ok_or(McpError::PageNotLoaded)
    }

    /// Deliver a capture event to the current page.
    pub fn record(&mut self, raw: RawCapture) -> McpResult<bool> {
        Ok(self.page_mut()?.record(raw))
    }

    pub fn policy(&self) -> ReplayPolicy {
        self.policy
    }

    pub fn update_policy(
        &mut self,
        include_headers: Option<bool>,
        include_cookies: Option<bool>,
    ) -> ReplayPolicy {
        if let Some(v) = include_headers {
            self.policy.include_headers = v;
        }
        if let Some(v) = include_cookies {
            self.policy.include_cookies = v;
        }
        tracing::info!(
            "Settings: include_headers={}, include_cookies={}",
            self.policy.include_headers,
            self.policy.include_cookies
        );
        self.policy
    }

    /// Look a target up on the current page and, on success, generate its
    /// artifacts. Every attempt except an empty target lands in the debug log.
    pub fn find(
        &mut self,
        target: &str,
        kind: FindKind,
        policy: ReplayPolicy,
        cookies: &[CookieRecord],
    ) -> McpResult<FindOutcome> {
        if clean_text(target).is_empty() {
            return Err(McpError::EmptyTarget);
        }
        let page = self.page.as_mut().ok_or(McpError::PageNotLoaded)?;

        let result = match kind {
            FindKind::Text => page.find_text(target),
            FindKind::Image => Ok(page.find_image(target)),
        };
        let log = MatchLog::from_lookup(&result);
        push_bounded(&mut self.debug_log, self.config.debug_log_size, log.clone());

        match result {
            Ok(found) => {
                let bundle = ArtifactBundle::generate(
                    &found.exchange,
                    found.matched.as_ref(),
                    target,
                    policy,
                    cookies,
                );
                Ok(FindOutcome::Found {
                    exchange: found.exchange.into_owned(),
                    matched: found.matched,
                    bundle,
                    log,
                })
            }
            Err(GrabbitError::NoMatch { .. }) => Ok(FindOutcome::NotFound { log }),
            Err(e) => Err(e.into()),
        }
    }

    /// Most recent entries first, at most `limit`.
    pub fn debug_log(&self, limit: Option<usize>) -> Vec<&MatchLog> {
        self.debug_log
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    pub fn clear_debug_log(&mut self) -> usize {
        let n = self.debug_log.len();
        self.debug_log.clear();
        n
    }
}

fn push_bounded(log: &mut VecDeque<MatchLog>, capacity: usize, entry: MatchLog) {
    log.push_front(entry);
    log.truncate(capacity.max(1));
}
