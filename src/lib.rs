//! `resilient-http` is an async JSON client for rate-limited, occasionally
//! unreliable third-party APIs.
//!
//! [`ResilientClient::execute`] sends a [`RequestSpec`] and returns parsed
//! JSON or a classified [`RequestError`]:
//! - 4xx responses (except 429) and undecodable bodies fail immediately
//! - 429, 5xx and transport failures are retried with exponential backoff,
//!   jitter and `Retry-After` support (see [`BackoffPolicy`])
//!
//! The [`websearch`] module normalizes and deduplicates search results
//! gathered from several sources.

mod backoff;
mod client;
pub mod diagnostics;
mod error;
mod options;
mod outcome;
pub mod reddit;
mod request;
mod text;
mod transport;
pub mod websearch;

pub use backoff::{
    BackoffDecision, BackoffPolicy, DelaySource, FixedJitter, JitterSource, RandomJitter,
};
pub use client::ResilientClient;
pub use error::RequestError;
pub use options::{ClientOptions, DEBUG_ENV, DEFAULT_USER_AGENT, MAX_ATTEMPTS_ENV, TIMEOUT_ENV};
pub use outcome::{parse_retry_after, ErrorKind, Outcome, BODY_SNIPPET_CHARS};
pub use request::{Body, Method, RequestSpec};
pub use text::truncate_chars;
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, RequestError>;
