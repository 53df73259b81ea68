use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
pub use reqwest::Method;
use reqwest::Url;
use serde::Serialize;

use crate::{RequestError, Result};

/// Already-serialized request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Body {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Describes one logical request.
///
/// Header names are matched case-insensitively: setting a header twice keeps
/// the last value. `timeout` and `max_attempts` fall back to the client's
/// [`ClientOptions`](crate::ClientOptions) when unset.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
    pub timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
    /// Allows retrying transient failures of non-idempotent methods.
    pub retry_non_idempotent: bool,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            max_attempts: None,
            retry_non_idempotent: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Sets a header, replacing any existing value under the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(value)
            .map_err(|err| RequestError::InvalidRequest(format!("body is not JSON: {err}")))?;
        Ok(self.body(bytes, "application/json"))
    }

    /// Sets a pre-serialized body with its content type.
    pub fn body(mut self, bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        self.body = Some(Body {
            bytes: bytes.into(),
            content_type: content_type.into(),
        });
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry budget. Values below 1 are treated as 1.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn retry_non_idempotent(mut self, allow: bool) -> Self {
        self.retry_non_idempotent = allow;
        self
    }

    pub fn is_idempotent(&self) -> bool {
        [
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::TRACE,
        ]
        .contains(&self.method)
    }

    /// Whether a transient failure of this request may be retried.
    pub(crate) fn may_retry_transient(&self) -> bool {
        self.is_idempotent() || self.retry_non_idempotent
    }

    pub(crate) fn parsed_url(&self) -> Result<Url> {
        Url::parse(&self.url).map_err(|err| {
            RequestError::InvalidRequest(format!("invalid URL '{}': {err}", self.url))
        })
    }

    /// Builds the header map sent on every attempt.
    ///
    /// Adds `User-Agent` unless the caller set one, and the body's content
    /// type whenever a body is present and no `Content-Type` was given.
    pub(crate) fn header_map(&self, default_user_agent: &str) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len() + 2);
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                RequestError::InvalidRequest(format!("invalid header name '{name}': {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                RequestError::InvalidRequest(format!("invalid value for header '{name}': {err}"))
            })?;
            map.insert(name, value);
        }

        if !map.contains_key(USER_AGENT) {
            let value = HeaderValue::from_str(default_user_agent).map_err(|err| {
                RequestError::InvalidRequest(format!("invalid user agent: {err}"))
            })?;
            map.insert(USER_AGENT, value);
        }

        if let Some(body) = &self.body {
            if !map.contains_key(CONTENT_TYPE) {
                let value = HeaderValue::from_str(&body.content_type).map_err(|err| {
                    RequestError::InvalidRequest(format!("invalid content type: {err}"))
                })?;
                map.insert(CONTENT_TYPE, value);
            }
        }

        Ok(map)
    }

    /// Top-level keys of a JSON object body, for diagnostics.
    pub(crate) fn payload_keys(&self) -> Option<Vec<String>> {
        let body = self.body.as_ref()?;
        match serde_json::from_slice::<serde_json::Value>(&body.bytes).ok()? {
            serde_json::Value::Object(map) => Some(map.keys().cloned().collect()),
            _ => None,
        }
    }
}
