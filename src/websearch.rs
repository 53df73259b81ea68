//! Normalization of web-search results merged from several sources.
//!
//! Results arrive as loosely-shaped JSON objects. They are filtered,
//! truncated and turned into [`WebSearchItem`]s; Reddit and X/Twitter links
//! are dropped because those sources are fetched through their own APIs.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;

use crate::text::truncate_chars;

pub const EXCLUDED_DOMAINS: &[&str] = &[
    "reddit.com",
    "www.reddit.com",
    "old.reddit.com",
    "twitter.com",
    "www.twitter.com",
    "x.com",
    "www.x.com",
    "mobile.twitter.com",
];

const TITLE_MAX_CHARS: usize = 200;
const SNIPPET_MAX_CHARS: usize = 500;
const DEFAULT_RELEVANCE: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateConfidence {
    Low,
    Med,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebSearchItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub source_domain: String,
    pub snippet: String,
    pub date: Option<String>,
    pub date_confidence: DateConfidence,
    pub relevance: f64,
    pub why_relevant: String,
}

/// Lower-cased authority of `url` without a leading `www.`.
///
/// Returns an empty string when `url` has no authority.
pub fn extract_domain(url: &str) -> String {
    let domain = authority(url);
    match domain.strip_prefix("www.") {
        Some(rest) => rest.to_owned(),
        None => domain,
    }
}

pub fn is_excluded_domain(url: &str) -> bool {
    EXCLUDED_DOMAINS.contains(&authority(url).as_str())
}

/// Parses raw search results into items.
///
/// Skips non-objects, results without a URL, excluded domains and results
/// with neither title nor snippet. Ids are `W1`, `W2`, … by input position.
pub fn parse_websearch_results(results: &[JsonValue]) -> Vec<WebSearchItem> {
    let mut items = Vec::new();

    for (index, result) in results.iter().enumerate() {
        let Some(object) = result.as_object() else {
            continue;
        };

        let url = object.get("url").map(scalar_text).unwrap_or_default();
        if url.is_empty() || is_excluded_domain(&url) {
            continue;
        }

        let title = object
            .get("title")
            .map(scalar_text)
            .unwrap_or_default()
            .trim()
            .to_owned();
        let snippet = object
            .get("snippet")
            .or_else(|| object.get("description"))
            .map(scalar_text)
            .unwrap_or_default()
            .trim()
            .to_owned();
        if title.is_empty() && snippet.is_empty() {
            continue;
        }

        let date = object
            .get("date")
            .map(scalar_text)
            .filter(|date| is_iso_date(date));
        let date_confidence = if date.is_some() {
            DateConfidence::Med
        } else {
            DateConfidence::Low
        };

        items.push(WebSearchItem {
            id: format!("W{}", index + 1),
            title: truncate_chars(&title, TITLE_MAX_CHARS).to_owned(),
            source_domain: extract_domain(&url),
            snippet: truncate_chars(&snippet, SNIPPET_MAX_CHARS).to_owned(),
            url,
            date,
            date_confidence,
            relevance: relevance(object.get("relevance")),
            why_relevant: object
                .get("why_relevant")
                .map(scalar_text)
                .unwrap_or_default()
                .trim()
                .to_owned(),
        });
    }

    items
}

/// Drops items whose URL repeats an earlier one, ignoring case and
/// trailing slashes. Order is preserved.
pub fn dedupe_websearch(items: Vec<WebSearchItem>) -> Vec<WebSearchItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.url.to_lowercase().trim_end_matches('/').to_owned()))
        .collect()
}

fn authority(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    let Some(host) = parsed.host_str() else {
        return String::new();
    };
    let host = host.to_ascii_lowercase();
    match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn is_iso_date(value: &str) -> bool {
    static ISO_DATE: OnceLock<Regex> = OnceLock::new();
    ISO_DATE
        .get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"))
        .is_match(value)
}

fn relevance(value: Option<&JsonValue>) -> f64 {
    let parsed = match value {
        Some(JsonValue::Number(number)) => number.as_f64(),
        Some(JsonValue::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|relevance| relevance.is_finite())
        .map_or(DEFAULT_RELEVANCE, |relevance| relevance.clamp(0.0, 1.0))
}
