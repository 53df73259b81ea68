//! Reddit's public JSON API: any listing or thread path becomes a JSON
//! resource by appending `.json`.

use serde_json::Value as JsonValue;

use crate::{RequestSpec, ResilientClient, Result};

pub const REDDIT_BASE_URL: &str = "https://www.reddit.com";

/// Normalizes a Reddit path into its `.json` resource path.
///
/// Ensures a leading slash, strips trailing slashes and appends `.json`
/// unless already present: `r/rust/comments/abc/title/` →
/// `/r/rust/comments/abc/title.json`.
pub fn normalize_json_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 6);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(path);

    let trimmed_len = normalized.trim_end_matches('/').len();
    normalized.truncate(trimmed_len);

    if !normalized.ends_with(".json") {
        normalized.push_str(".json");
    }
    normalized
}

/// Full request URL for `path`, asking for unescaped (`raw_json=1`) content.
pub fn reddit_json_url(base_url: &str, path: &str) -> String {
    format!("{base_url}{}?raw_json=1", normalize_json_path(path))
}

impl ResilientClient {
    /// Fetches a Reddit path as JSON from `https://www.reddit.com`.
    pub async fn get_reddit_json(&self, path: &str) -> Result<JsonValue> {
        self.get_reddit_json_from(REDDIT_BASE_URL, path).await
    }

    /// Fetches a Reddit path as JSON from a custom base URL.
    pub async fn get_reddit_json_from(&self, base_url: &str, path: &str) -> Result<JsonValue> {
        let spec = RequestSpec::get(reddit_json_url(base_url, path))
            .header("User-Agent", self.options().user_agent.as_str())
            .header("Accept", "application/json");
        self.execute(&spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_json_path, reddit_json_url, REDDIT_BASE_URL};

    #[test]
    fn adds_leading_slash_and_suffix() {
        assert_eq!(
            normalize_json_path("r/rust/comments/abc/title"),
            "/r/rust/comments/abc/title.json"
        );
    }

    #[test]
    fn strips_all_trailing_slashes() {
        assert_eq!(normalize_json_path("/r/rust/"), "/r/rust.json");
        assert_eq!(normalize_json_path("/r/rust///"), "/r/rust.json");
    }

    #[test]
    fn keeps_existing_suffix() {
        assert_eq!(normalize_json_path("/r/rust.json"), "/r/rust.json");
        assert_eq!(normalize_json_path("/r/rust.json/"), "/r/rust.json");
    }

    #[test]
    fn degenerate_paths() {
        assert_eq!(normalize_json_path(""), ".json");
        assert_eq!(normalize_json_path("/"), ".json");
    }

    #[test]
    fn url_requests_raw_json() {
        assert_eq!(
            reddit_json_url(REDDIT_BASE_URL, "r/rust"),
            "https://www.reddit.com/r/rust.json?raw_json=1"
        );
    }
}
