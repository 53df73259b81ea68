use reqwest::StatusCode;
use serde_json::Value as JsonValue;

use crate::{text::truncate_chars, RequestError};

/// Maximum number of characters kept from an error response body.
pub const BODY_SNIPPET_CHARS: usize = 500;

/// Classification of a failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// 4xx other than 429. Never retried.
    Client,
    /// HTTP 429. Retried.
    RateLimited,
    /// 5xx, timeouts, connection and other transport failures. Retried.
    Transient,
    /// A success status with a body that is not JSON. Never retried.
    Malformed,
    /// The request could not be built; no attempt was made.
    InvalidRequest,
    /// The caller cancelled the call.
    Cancelled,
}

/// Result of a single network attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success(JsonValue),
    ClientError {
        status: u16,
        message: String,
        body: Option<String>,
    },
    RateLimited {
        status: u16,
        message: String,
        body: Option<String>,
        retry_after: Option<f64>,
    },
    ServerOrTransportError {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },
    MalformedResponse {
        message: String,
    },
}

impl Outcome {
    /// Maps a non-success HTTP response to its failure class.
    pub fn from_status(status: StatusCode, body: &str, retry_after: Option<&str>) -> Self {
        let code = status.as_u16();
        let message = status_message(status);
        let body = body_snippet(body);

        match code {
            429 => Outcome::RateLimited {
                status: code,
                message,
                body,
                retry_after: retry_after.and_then(parse_retry_after),
            },
            400..=499 => Outcome::ClientError {
                status: code,
                message,
                body,
            },
            _ => Outcome::ServerOrTransportError {
                message,
                status: Some(code),
                body,
            },
        }
    }

    /// Decodes a success body. An empty body yields an empty object.
    pub fn from_success_body(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Outcome::Success(JsonValue::Object(Default::default()));
        }
        match serde_json::from_slice(bytes) {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::MalformedResponse {
                message: format!("invalid JSON response: {err}"),
            },
        }
    }

    /// Wraps a transport-level failure. Every error reaching here is transient.
    pub fn transport(err: &reqwest::Error) -> Self {
        let detail = error_chain(err);
        let message = if err.is_timeout() {
            format!("request timed out: {detail}")
        } else if err.is_connect() {
            format!("connection error: {detail}")
        } else if err.is_body() || err.is_decode() {
            format!("error reading response body: {detail}")
        } else {
            format!("transport error: {detail}")
        };
        Outcome::ServerOrTransportError {
            message,
            status: err.status().map(|status| status.as_u16()),
            body: None,
        }
    }

    /// Failure class, or `None` for [`Outcome::Success`].
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Success(_) => None,
            Outcome::ClientError { .. } => Some(ErrorKind::Client),
            Outcome::RateLimited { .. } => Some(ErrorKind::RateLimited),
            Outcome::ServerOrTransportError { .. } => Some(ErrorKind::Transient),
            Outcome::MalformedResponse { .. } => Some(ErrorKind::Malformed),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Outcome::RateLimited { .. } | Outcome::ServerOrTransportError { .. }
        )
    }

    /// Converts into the terminal result of a call.
    pub fn into_result(self) -> Result<JsonValue, RequestError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::ClientError {
                status,
                message,
                body,
            } => Err(RequestError::Client {
                status,
                message,
                body,
            }),
            Outcome::RateLimited {
                status,
                message,
                body,
                retry_after,
            } => Err(RequestError::RateLimited {
                status,
                message,
                body,
                retry_after,
            }),
            Outcome::ServerOrTransportError {
                message,
                status,
                body,
            } => Err(RequestError::Transient {
                message,
                status,
                body,
            }),
            Outcome::MalformedResponse { message } => Err(RequestError::Malformed { message }),
        }
    }
}

/// Parses a retry-after header as non-negative seconds.
///
/// HTTP-date values and anything else unparsable yield `None`.
pub fn parse_retry_after(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

fn status_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {}: {reason}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    }
}

/// Joins an error with its `source()` chain, skipping repeated messages.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.ends_with(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

fn body_snippet(body: &str) -> Option<String> {
    (!body.is_empty()).then(|| truncate_chars(body, BODY_SNIPPET_CHARS).to_owned())
}
