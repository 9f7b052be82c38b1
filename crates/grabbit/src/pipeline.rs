//! Extraction pipelines chained after a replay command.

use crate::matcher::{leaf_text, MatchLocation, MatchResult};
use crate::path::{PathStep, StructuralPath};
use crate::replay::single_quote;

/// A jq filter equivalent to walking `path`: `.["data"]["items"][0]`.
pub fn jq_filter(path: &StructuralPath) -> String {
    if path.is_root() {
        return ".".to_string();
    }
    let mut filter = String::from(".");
    for step in path.steps() {
        match step {
            PathStep::Key(key) => {
                let quoted = serde_json::to_string(key).unwrap_or_else(|_| format!("\"{key}\""));
                filter.push('[');
                filter.push_str(&quoted);
                filter.push(']');
            }
            PathStep::Index(i) => filter.push_str(&format!("[{i}]")),
        }
    }
    filter
}

/// A Perl-style pattern capturing the markup fragment around `value`:
/// from the nearest `<` before it to the nearest `>` after it.
pub fn markup_pattern(value: &str) -> String {
    format!("<[^<]*{}[^>]*>", regex::escape(value))
}

/// Append an extraction stage to `replay` that pulls the matched value back out.
///
/// `requested` is the value the user originally asked for; it is used when the
/// match itself carries no printable value.
pub fn build_pipeline(replay: &str, matched: &MatchResult, requested: &str) -> String {
    let value = leaf_text(&matched.value).unwrap_or_else(|| requested.to_string());
    match &matched.location {
        MatchLocation::Structured(path) => {
            format!("{replay} | jq {}", single_quote(&jq_filter(path)))
        }
        MatchLocation::PageText => {
            format!("{replay} | grep -oP {}", single_quote(&markup_pattern(&value)))
        }
        MatchLocation::Unlocated => {
            let needle = if value.is_empty() { requested } else { &value };
            format!("{replay} | grep -i -C 2 -F -- {}", single_quote(needle))
        }
    }
}
