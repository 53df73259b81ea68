use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    backoff::{BackoffDecision, JitterSource, RandomJitter},
    transport, BackoffPolicy, ClientOptions, Outcome, RequestError, RequestSpec, Result,
};

#[derive(Clone)]
/// HTTP client that retries rate-limited and transient failures.
///
/// Each call owns its retry state; a single client can serve any number of
/// concurrent calls.
pub struct ResilientClient {
    http: reqwest::Client,
    options: ClientOptions,
    jitter: Arc<dyn JitterSource>,
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("options", &self.options)
            .field("jitter", &"<jitter source>")
            .finish()
    }
}

impl Default for ResilientClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ResilientClient {
    /// Creates a client with default options and random jitter.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            options: ClientOptions::default(),
            jitter: Arc::new(RandomJitter),
        }
    }

    /// Creates a client configured from `RESILIENT_HTTP_*` environment variables.
    ///
    /// See [`ClientOptions::from_env`].
    pub fn from_env() -> std::result::Result<Self, String> {
        Ok(Self::new().with_options(ClientOptions::from_env()?))
    }

    /// Applies client options such as timeout, retry budget and diagnostics.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Replaces the jitter source, e.g. with [`FixedJitter`](crate::FixedJitter) in tests.
    pub fn with_jitter(mut self, jitter: impl JitterSource + 'static) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    /// Uses a preconfigured `reqwest` client (proxies, TLS roots, pooling).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends a GET request and returns the parsed JSON body.
    pub async fn get(&self, url: &str) -> Result<JsonValue> {
        self.execute(&RequestSpec::get(url)).await
    }

    /// Sends a POST request with a JSON body.
    ///
    /// Transient failures are not retried; build a [`RequestSpec`] with
    /// [`RequestSpec::retry_non_idempotent`] to opt in.
    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<JsonValue> {
        self.execute(&RequestSpec::post(url).json(body)?).await
    }

    /// Executes `spec` until success, a terminal failure or budget exhaustion.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<JsonValue> {
        self.execute_with_cancel(spec, &CancellationToken::new()).await
    }

    /// Like [`execute`](Self::execute), aborting the in-flight attempt or
    /// backoff wait as soon as `cancel` fires.
    pub async fn execute_with_cancel(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<JsonValue> {
        let url = spec.parsed_url()?;
        let headers = spec.header_map(&self.options.user_agent)?;
        let budget = spec.max_attempts.unwrap_or(self.options.max_attempts).max(1);
        let timeout = spec.timeout.unwrap_or(self.options.timeout);
        let debug = self.options.debug;

        if debug {
            tracing::debug!(method = %spec.method, url = %spec.url, budget, "sending request");
            if let Some(keys) = spec.payload_keys() {
                tracing::debug!(?keys, "payload keys");
            }
        }

        let mut state = RetryState::Attempting { attempt: 0 };
        loop {
            state = match state {
                RetryState::Attempting { attempt } => {
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        outcome = transport::invoke(
                            &self.http,
                            spec,
                            &url,
                            &headers,
                            timeout,
                            &self.options,
                        ) => Some(outcome),
                    };
                    match outcome {
                        Some(outcome) => {
                            if debug {
                                tracing::debug!(
                                    attempt = attempt + 1,
                                    budget,
                                    class = ?outcome.kind(),
                                    "attempt finished"
                                );
                            }
                            next_state(
                                outcome,
                                attempt,
                                budget,
                                spec.may_retry_transient(),
                                &self.options.backoff,
                                self.jitter.as_ref(),
                            )
                        }
                        None => RetryState::Failed(RequestError::Cancelled),
                    }
                }
                RetryState::Waiting {
                    attempt,
                    decision,
                    last,
                } => {
                    if debug {
                        tracing::debug!(
                            class = ?last.kind(),
                            delay_secs = decision.delay.as_secs_f64(),
                            source = ?decision.source,
                            "retrying in {decision} (attempt {}/{budget})",
                            attempt + 1
                        );
                    }
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => RetryState::Failed(RequestError::Cancelled),
                        _ = sleep(decision.delay) => RetryState::Attempting { attempt: attempt + 1 },
                    }
                }
                RetryState::Succeeded(value) => return Ok(value),
                RetryState::Failed(err) => {
                    if debug {
                        tracing::debug!(kind = ?err.kind(), status = ?err.status(), "request failed: {err}");
                    }
                    return Err(err);
                }
            };
        }
    }

    /// Bounds the whole call, retries and waits included, by `deadline`.
    ///
    /// Returns [`RequestError::Cancelled`] when the deadline passes first.
    pub async fn execute_with_deadline(
        &self,
        spec: &RequestSpec,
        deadline: Duration,
    ) -> Result<JsonValue> {
        tokio::time::timeout(deadline, self.execute(spec))
            .await
            .unwrap_or(Err(RequestError::Cancelled))
    }
}

/// Executor state for one call.
#[derive(Debug)]
enum RetryState {
    Attempting {
        attempt: u32,
    },
    Waiting {
        attempt: u32,
        decision: BackoffDecision,
        last: Outcome,
    },
    Succeeded(JsonValue),
    Failed(RequestError),
}

/// Decides what follows attempt number `attempt` (zero-based).
fn next_state(
    outcome: Outcome,
    attempt: u32,
    budget: u32,
    may_retry_transient: bool,
    backoff: &BackoffPolicy,
    jitter: &dyn JitterSource,
) -> RetryState {
    let (is_rate_limit, hint) = match &outcome {
        Outcome::RateLimited { retry_after, .. } => (true, *retry_after),
        Outcome::ServerOrTransportError { .. } if may_retry_transient => (false, None),
        _ => return terminal(outcome),
    };

    if attempt.saturating_add(1) >= budget {
        return terminal(outcome);
    }

    RetryState::Waiting {
        attempt,
        decision: backoff.delay(attempt, is_rate_limit, hint, jitter),
        last: outcome,
    }
}

fn terminal(outcome: Outcome) -> RetryState {
    match outcome.into_result() {
        Ok(value) => RetryState::Succeeded(value),
        Err(err) => RetryState::Failed(err),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{next_state, ResilientClient, RetryState};
    use crate::{BackoffPolicy, ErrorKind, FixedJitter, Outcome, RequestError};

    fn server_error() -> Outcome {
        Outcome::ServerOrTransportError {
            message: "HTTP 500: Internal Server Error".to_owned(),
            status: Some(500),
            body: None,
        }
    }

    fn rate_limited(retry_after: Option<f64>) -> Outcome {
        Outcome::RateLimited {
            status: 429,
            message: "HTTP 429: Too Many Requests".to_owned(),
            body: None,
            retry_after,
        }
    }

    fn step(outcome: Outcome, attempt: u32, budget: u32, may_retry_transient: bool) -> RetryState {
        next_state(
            outcome,
            attempt,
            budget,
            may_retry_transient,
            &BackoffPolicy::default(),
            &FixedJitter(0.0),
        )
    }

    #[test]
    fn success_is_terminal() {
        match step(Outcome::Success(json!({"ok": true})), 0, 3, true) {
            RetryState::Succeeded(value) => assert_eq!(value, json!({"ok": true})),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn client_error_fails_regardless_of_budget() {
        let outcome = Outcome::ClientError {
            status: 404,
            message: "HTTP 404: Not Found".to_owned(),
            body: None,
        };
        match step(outcome, 0, 10, true) {
            RetryState::Failed(err) => assert_eq!(err.kind(), ErrorKind::Client),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn malformed_body_fails_immediately() {
        let outcome = Outcome::MalformedResponse {
            message: "invalid JSON response".to_owned(),
        };
        assert!(matches!(
            step(outcome, 0, 3, true),
            RetryState::Failed(RequestError::Malformed { .. })
        ));
    }

    #[test]
    fn transient_error_waits_while_budget_remains() {
        match step(server_error(), 1, 3, true) {
            RetryState::Waiting {
                attempt, decision, ..
            } => {
                assert_eq!(attempt, 1);
                assert_eq!(decision.delay, Duration::from_secs(4));
            }
            other => panic!("expected wait, got {other:?}"),
        }
    }

    #[test]
    fn exhausted_budget_surfaces_last_outcome() {
        match step(server_error(), 2, 3, true) {
            RetryState::Failed(err) => {
                assert_eq!(err.kind(), ErrorKind::Transient);
                assert_eq!(err.status(), Some(500));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn single_attempt_budget_never_waits() {
        assert!(matches!(
            step(rate_limited(None), 0, 1, true),
            RetryState::Failed(RequestError::RateLimited { .. })
        ));
    }

    #[test]
    fn rate_limit_uses_server_hint() {
        match step(rate_limited(Some(30.0)), 2, 5, false) {
            RetryState::Waiting { decision, .. } => {
                assert_eq!(decision.delay, Duration::from_secs(30))
            }
            other => panic!("expected wait, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_without_hint_uses_rate_limit_base() {
        match step(rate_limited(None), 0, 3, true) {
            RetryState::Waiting { decision, .. } => {
                assert_eq!(decision.delay, Duration::from_secs(5))
            }
            other => panic!("expected wait, got {other:?}"),
        }
    }

    #[test]
    fn transient_error_of_non_idempotent_request_is_terminal() {
        assert!(matches!(
            step(server_error(), 0, 3, false),
            RetryState::Failed(RequestError::Transient { .. })
        ));
    }

    #[test]
    fn debug_hides_jitter_source() {
        let debug = format!("{:?}", ResilientClient::new().with_jitter(FixedJitter(0.5)));
        assert!(debug.contains("<jitter source>"));
        assert!(debug.contains("max_attempts: 3"));
    }
}
