//! Shell-safe curl replay command generation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CookieRecord, Exchange};

/// Which parts of a captured request to carry into the replay command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayPolicy {
    #[serde(default)]
    pub include_headers: bool,
    #[serde(default = "default_include_cookies")]
    pub include_cookies: bool,
}

fn default_include_cookies() -> bool {
    true
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            include_headers: false,
            include_cookies: true,
        }
    }
}

/// Escape a value for inclusion inside single quotes: `'` becomes `'\''`.
pub fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', r"'\''")
}

/// Wrap a value in single quotes, escaping as needed.
pub fn single_quote(value: &str) -> String {
    format!("'{}'", escape_single_quotes(value))
}

/// Headers that leak the capturing client's cache or proxy state.
fn is_excluded_header(lower: &str) -> bool {
    matches!(
        lower,
        "if-none-match" | "if-modified-since" | "cache-control" | "pragma"
    ) || lower.contains("forwarded")
}

fn method_token(method: &str) -> String {
    if !method.is_empty() && method.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        method.to_string()
    } else {
        single_quote(method)
    }
}

/// Build a curl command that replays the exchange.
///
/// Cache-validation and `*forwarded*` headers are never emitted. A `cookie`
/// header is routed to `-b` rather than `-H`; explicit `cookies` win over it.
pub fn build_replay_command(
    exchange: &Exchange,
    policy: ReplayPolicy,
    cookies: &[CookieRecord],
) -> String {
    let mut cmd = format!(
        "curl -X {} {}",
        method_token(&exchange.method),
        single_quote(&exchange.url)
    );
    let mut cookie_header: Option<&str> = None;

    for (name, value) in exchange.request_headers.iter() {
        let lower = name.to_ascii_lowercase();
        if lower == "cookie" {
            cookie_header = Some(value);
            continue;
        }
        if !policy.include_headers || is_excluded_header(&lower) {
            continue;
        }
        cmd.push_str(" \\\n  -H ");
        cmd.push_str(&single_quote(&format!("{name}: {value}")));
    }

    if policy.include_cookies {
        let cookie_string = if cookies.is_empty() {
            cookie_header.map(str::to_string)
        } else {
            Some(
                cookies
                    .iter()
                    .map(|c| format!("{}={}", c.name, c.value))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };
        if let Some(cookie_string) = cookie_string.filter(|c| !c.is_empty()) {
            cmd.push_str(" \\\n  -b ");
            cmd.push_str(&single_quote(&cookie_string));
        }
    }

    if let Some(body) = body_text(exchange.request_body.as_ref()) {
        cmd.push_str(" \\\n  -d ");
        cmd.push_str(&single_quote(&body));
    }

    cmd
}

/// Request body as the text curl should send. Structured values are
/// serialised compactly.
fn body_text(body: Option<&Value>) -> Option<String> {
    match body? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
