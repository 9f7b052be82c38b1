//! Artifact bundle: replay command, OpenAPI fragment, extraction pipeline.

use serde::Serialize;
use serde_json::Value;

use crate::matcher::MatchResult;
use crate::pipeline::build_pipeline;
use crate::replay::{build_replay_command, ReplayPolicy};
use crate::schema::{build_openapi, decode_request_body};
use crate::types::{CookieRecord, Exchange};

/// Everything generated from one exchange. Never persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBundle {
    pub curl_command: String,
    pub open_api_fragment: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_command: Option<String>,
}

impl ArtifactBundle {
    /// Generate all artifacts. The pipeline is only produced when there is a match.
    pub fn generate(
        exchange: &Exchange,
        matched: Option<&MatchResult>,
        requested: &str,
        policy: ReplayPolicy,
        cookies: &[CookieRecord],
    ) -> Self {
        let curl_command = build_replay_command(exchange, policy, cookies);
        let request_body = decode_request_body(exchange);
        let open_api_fragment = build_openapi(exchange, request_body.as_ref());
        let pipeline_command = matched.map(|m| build_pipeline(&curl_command, m, requested));

        Self {
            curl_command,
            open_api_fragment,
            pipeline_command,
        }
    }
}
