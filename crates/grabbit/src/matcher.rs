//! Map a human-visible value back to the captured response field that produced it.
//!
//! Exchanges are scanned newest first. Inside a response body the search
//! visits arrays in index order and objects with "likely" keys (counts, ids,
//! prices, text) ahead of the rest. The first leaf that matches the target
//! under the tolerant comparison wins.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::buffer::ExchangeBuffer;
use crate::path::{PathStep, StructuralPath, PAGE_TEXT_PATH};
use crate::types::{Exchange, GrabbitError, GrabbitResult};

/// Key-name fragments that usually hold the value a user selected.
const PRIORITY_KEY_TOKENS: [&str; 6] = ["count", "view", "id", "amount", "price", "text"];

/// A fractional shorthand covers values from its base up to the end of the
/// base's block of this many units: "48.2k" is 48200..=48999, "1.5m" is
/// 1500000..=1500999. Whole shorthands span a full unit of their scale.
const FRACTIONAL_BAND_WIDTH: f64 = 1000.0;

/// Substring rules only apply to strings longer than this.
const MIN_CONTAINMENT_LEN: usize = 2;

fn strip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{Sc},\s]").expect("clean-form regex is valid"))
}

fn shorthand_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d*\.?\d+)([kmb])").expect("shorthand regex is valid"))
}

fn exact_shorthand_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d*\.?\d+)([kmb])$").expect("shorthand regex is valid"))
}

/// The "clean form" of a value: currency symbols, thousands separators and
/// whitespace removed, then lower-cased.
pub fn clean_text(text: &str) -> String {
    strip_regex().replace_all(text, "").to_lowercase()
}

/// The inclusive numeric range a shorthand like `48k` stands for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShorthandBand {
    pub min: f64,
    pub max: f64,
}

impl ShorthandBand {
    /// Find a shorthand anywhere in an already-clean string.
    pub fn find(clean: &str) -> Option<Self> {
        let caps = shorthand_regex().captures(clean)?;
        Self::from_parts(&caps[1], &caps[2])
    }

    /// Accept only a clean string that is a shorthand and nothing else.
    pub fn exact(clean: &str) -> Option<Self> {
        let caps = exact_shorthand_regex().captures(clean)?;
        Self::from_parts(&caps[1], &caps[2])
    }

    fn from_parts(number: &str, suffix: &str) -> Option<Self> {
        let scale: f64 = match suffix {
            "k" => 1e3,
            "m" => 1e6,
            "b" => 1e9,
            _ => return None,
        };
        // Scale the digits as an integer so "48.2k" lands on 48200 exactly.
        let frac_len = number.split_once('.').map(|(_, f)| f.len()).unwrap_or(0);
        let digits: f64 = number.replace('.', "").parse().ok()?;
        let base = digits * scale / 10f64.powi(frac_len as i32);
        let max = if frac_len == 0 {
            base + (scale - 1.0)
        } else {
            (base / FRACTIONAL_BAND_WIDTH).floor() * FRACTIONAL_BAND_WIDTH
                + (FRACTIONAL_BAND_WIDTH - 1.0)
        };
        Some(Self { min: base, max })
    }

    pub fn contains(&self, n: f64) -> bool {
        n >= self.min && n <= self.max
    }
}

/// A value to search for, pre-processed once.
#[derive(Debug, Clone)]
pub struct Target {
    raw: String,
    clean: String,
    shorthand: Option<ShorthandBand>,
    numeric: Option<f64>,
}

impl Target {
    /// A selected-text target: shorthand and numeric bands apply.
    pub fn new(raw: &str) -> Self {
        let clean = clean_text(raw);
        Self {
            raw: raw.to_string(),
            shorthand: ShorthandBand::find(&clean),
            numeric: clean.parse().ok(),
            clean,
        }
    }

    /// A literal target such as a URL: only clean-form comparison applies.
    pub fn literal(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            clean: clean_text(raw),
            shorthand: None,
            numeric: None,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn clean(&self) -> &str {
        &self.clean
    }

    pub fn is_empty(&self) -> bool {
        self.clean.is_empty()
    }
}

/// Where a matched value was found.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchLocation {
    /// Inside a structured response body.
    Structured(StructuralPath),
    /// In the rendered page text; there is no structural path.
    PageText,
    /// Supplied without any location, e.g. a value restored from history.
    Unlocated,
}

/// A matched leaf value and where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub value: Value,
    pub location: MatchLocation,
}

impl MatchResult {
    pub fn structural_path(&self) -> Option<&StructuralPath> {
        match &self.location {
            MatchLocation::Structured(path) => Some(path),
            _ => None,
        }
    }

    /// Path as reported to collaborators: the dotted path, the page-text
    /// marker, or nothing.
    pub fn path_label(&self) -> Option<String> {
        match &self.location {
            MatchLocation::Structured(path) => Some(path.to_string()),
            MatchLocation::PageText => Some(PAGE_TEXT_PATH.to_string()),
            MatchLocation::Unlocated => None,
        }
    }

    /// Rebuild a match from a stored value and path label.
    pub fn restore(value: Value, path: Option<&str>) -> Self {
        let location = match path {
            Some(PAGE_TEXT_PATH) => MatchLocation::PageText,
            Some(p) => MatchLocation::Structured(StructuralPath::parse(p)),
            None => MatchLocation::Unlocated,
        };
        Self { value, location }
    }
}

impl Serialize for MatchResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            value: &'a Value,
            path: Option<String>,
        }
        Wire {
            value: &self.value,
            path: self.path_label(),
        }
        .serialize(serializer)
    }
}

/// Text form of a leaf, printed the way a browser would print it.
pub fn leaf_text(leaf: &Value) -> Option<String> {
    match leaf {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{f:.0}")
            }
            _ => n.to_string(),
        }),
        _ => None,
    }
}

fn leaf_number(leaf: &Value) -> Option<f64> {
    match leaf {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether a single leaf matches the target.
pub fn leaf_matches(leaf: &Value, target: &Target) -> bool {
    let Some(text) = leaf_text(leaf) else {
        return false;
    };

    if let (Some(band), Some(n)) = (target.shorthand, leaf_number(leaf)) {
        if band.contains(n) {
            return true;
        }
    }

    let clean = clean_text(&text);
    if clean == target.clean {
        return true;
    }
    if target.clean.chars().count() > MIN_CONTAINMENT_LEN && clean.contains(&target.clean) {
        return true;
    }
    if clean.chars().count() > MIN_CONTAINMENT_LEN && target.clean.contains(&clean) {
        return true;
    }

    if let (Some(band), Some(n)) = (ShorthandBand::exact(&clean), target.numeric) {
        if band.contains(n) {
            return true;
        }
    }

    false
}

/// Object keys in visiting order: priority keys first, each tier in payload order.
pub fn prioritized_keys(map: &Map<String, Value>) -> Vec<&String> {
    let (mut priority, rest): (Vec<&String>, Vec<&String>) = map.keys().partition(|key| {
        let lower = key.to_lowercase();
        PRIORITY_KEY_TOKENS.iter().any(|t| lower.contains(t))
    });
    priority.extend(rest);
    priority
}

/// Depth-first search of one response body for the first matching leaf.
pub fn search_value(body: &Value, target: &Target) -> Option<MatchResult> {
    let mut stack: Vec<(&Value, StructuralPath)> = vec![(body, StructuralPath::root())];

    while let Some((node, path)) = stack.pop() {
        match node {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate().rev() {
                    stack.push((item, path.child(PathStep::Index(i))));
                }
            }
            Value::Object(map) => {
                for key in prioritized_keys(map).into_iter().rev() {
                    stack.push((&map[key.as_str()], path.child(PathStep::Key(key.clone()))));
                }
            }
            leaf => {
                if leaf_matches(leaf, target) {
                    return Some(MatchResult {
                        value: leaf.clone(),
                        location: MatchLocation::Structured(path),
                    });
                }
            }
        }
    }

    None
}

/// The rendered page, as the caller sees it, for the page-text fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

/// A resolved lookup: the owning exchange plus the match inside it, if any.
#[derive(Debug, Clone)]
pub struct Found<'a> {
    pub exchange: Cow<'a, Exchange>,
    pub matched: Option<MatchResult>,
    /// Human-readable account of how the exchange was found.
    pub log: String,
}

/// Find the exchange behind a piece of selected text.
///
/// Falls back to a clean-form containment check against `page` when no
/// structured response matches.
pub fn find_text<'a>(
    selection: &str,
    buffer: &'a ExchangeBuffer,
    page: Option<&PageSnapshot>,
) -> GrabbitResult<Found<'a>> {
    let target = Target::new(selection);
    if target.is_empty() {
        return Err(GrabbitError::EmptyTarget);
    }

    tracing::debug!(
        "Searching for: \"{}\" (clean: \"{}\")",
        target.raw(),
        target.clean()
    );

    for exchange in buffer.scan_newest_first() {
        let Some(body) = exchange.response_body.as_ref() else {
            continue;
        };
        if let Some(matched) = search_value(body, &target) {
            let log = format!(
                "Found match \"{}\" at \"{}\".",
                leaf_text(&matched.value).unwrap_or_default(),
                matched.path_label().unwrap_or_default()
            );
            return Ok(Found {
                exchange: Cow::Borrowed(exchange),
                matched: Some(matched),
                log,
            });
        }
    }

    if let Some(page) = page {
        if clean_text(&page.text).contains(target.clean()) {
            let exchange = Exchange {
                request_headers: [("Note", "Found in Page Content (SSR)")].into_iter().collect(),
                response_body: Some(serde_json::json!({ "content": "Matched in static HTML" })),
                ..Exchange::synthetic(&page.url, "")
            };
            return Ok(Found {
                exchange: Cow::Owned(exchange),
                matched: Some(MatchResult {
                    value: Value::String(selection.to_string()),
                    location: MatchLocation::PageText,
                }),
                log: "Found match in page content (SSR).".to_string(),
            });
        }
    }

    Err(GrabbitError::NoMatch {
        target: target.clean().to_string(),
        scanned: buffer.len(),
    })
}

/// Find the exchange behind an image.
///
/// Tries the image URL and its path-plus-query form against response bodies,
/// then the image's own request, then settles for a synthetic exchange.
pub fn find_image<'a>(image_url: &str, buffer: &'a ExchangeBuffer) -> Found<'a> {
    let absolute = Target::literal(image_url);
    let relative = url::Url::parse(image_url)
        .ok()
        .map(|u| match u.query() {
            Some(q) => format!("{}?{q}", u.path()),
            None => u.path().to_string(),
        })
        .filter(|r| r.len() > 1)
        .map(|r| Target::literal(&r));

    for exchange in buffer.scan_newest_first() {
        let Some(body) = exchange.response_body.as_ref() else {
            continue;
        };
        let matched = search_value(body, &absolute)
            .or_else(|| relative.as_ref().and_then(|r| search_value(body, r)));
        if let Some(matched) = matched {
            return Found {
                exchange: Cow::Borrowed(exchange),
                matched: Some(matched),
                log: format!("Found API source for image \"{image_url}\"."),
            };
        }
    }

    if let Some(direct) = buffer.scan_newest_first().find(|e| e.url == image_url) {
        return Found {
            exchange: Cow::Borrowed(direct),
            matched: None,
            log: "No API source found. Captured direct image request.".to_string(),
        };
    }

    Found {
        exchange: Cow::Owned(Exchange::synthetic(
            image_url,
            "Captured via direct URL (no intercepted request found)",
        )),
        matched: None,
        log: format!("No intercepted request found for \"{image_url}\". Captured direct URL."),
    }
}
