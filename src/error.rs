use crate::ErrorKind;

/// Error type returned by this crate.
///
/// Each variant maps to one [`ErrorKind`]; the kind is authoritative for
/// callers deciding whether to retry at a higher level.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// 4xx response other than 429. Surfaced on the first attempt.
    #[error("{message}")]
    Client {
        status: u16,
        message: String,
        body: Option<String>,
    },
    /// 429 response, after the retry budget ran out.
    #[error("{message}")]
    RateLimited {
        status: u16,
        message: String,
        body: Option<String>,
        /// Server-supplied delay hint in seconds.
        retry_after: Option<f64>,
    },
    /// 5xx response or transport failure, after the retry budget ran out
    /// (or immediately for a non-idempotent request without opt-in).
    #[error("{message}")]
    Transient {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },
    /// Success status with a body that failed to decode as JSON.
    #[error("{message}")]
    Malformed { message: String },
    /// Request could not be built from its description.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Caller cancelled the call during an attempt or a backoff wait.
    #[error("request cancelled")]
    Cancelled,
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestError::Client { .. } => ErrorKind::Client,
            RequestError::RateLimited { .. } => ErrorKind::RateLimited,
            RequestError::Transient { .. } => ErrorKind::Transient,
            RequestError::Malformed { .. } => ErrorKind::Malformed,
            RequestError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            RequestError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// HTTP status code of the last response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Client { status, .. } | RequestError::RateLimited { status, .. } => {
                Some(*status)
            }
            RequestError::Transient { status, .. } => *status,
            _ => None,
        }
    }

    /// Truncated response body, if one was received.
    pub fn body_snippet(&self) -> Option<&str> {
        match self {
            RequestError::Client { body, .. }
            | RequestError::RateLimited { body, .. }
            | RequestError::Transient { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// Server-supplied delay hint in seconds.
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            RequestError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Whether the failure class is one this crate retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::RateLimited | ErrorKind::Transient)
    }
}
