//! One structured log line per match attempt.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::matcher::Found;
use crate::types::GrabbitResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// A debug-log entry: when, what happened, and whether it worked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchLog {
    pub timestamp: String,
    pub message: String,
    pub outcome: Outcome,
}

impl MatchLog {
    pub fn new(message: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            message: message.into(),
            outcome,
        }
    }

    /// Summarise a lookup and emit it through `tracing`.
    pub fn from_lookup(result: &GrabbitResult<Found<'_>>) -> Self {
        let entry = match result {
            Ok(found) => Self::new(found.log.clone(), Outcome::Success),
            Err(e) => Self::new(e.to_string(), Outcome::Error),
        };
        match entry.outcome {
            Outcome::Success => tracing::info!("{}", entry.message),
            Outcome::Error => tracing::warn!("{}", entry.message),
        }
        entry
    }
}
