use std::time::Duration;

use crate::BackoffPolicy;

/// Environment variable enabling diagnostic logging.
pub const DEBUG_ENV: &str = "RESILIENT_HTTP_DEBUG";
/// Environment variable overriding the per-attempt timeout, in seconds.
pub const TIMEOUT_ENV: &str = "RESILIENT_HTTP_TIMEOUT_SECS";
/// Environment variable overriding the retry budget.
pub const MAX_ATTEMPTS_ENV: &str = "RESILIENT_HTTP_MAX_ATTEMPTS";

/// Default `User-Agent` sent unless a request overrides it.
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Configures timeout, retry and diagnostic behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout, used when a request does not set its own.
    pub timeout: Duration,
    /// Attempts per call including the first, used when a request does not set its own.
    pub max_attempts: u32,
    /// Delay policy between attempts.
    pub backoff: BackoffPolicy,
    /// Emit diagnostic events for every attempt and retry decision.
    pub debug: bool,
    /// User-Agent sent when a request does not set its own.
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            debug: false,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl ClientOptions {
    /// Builds options from defaults overlaid with environment variables.
    ///
    /// Reads:
    /// - `RESILIENT_HTTP_DEBUG` — `1`, `true` or `yes` enables diagnostics
    /// - `RESILIENT_HTTP_TIMEOUT_SECS` — per-attempt timeout in seconds
    /// - `RESILIENT_HTTP_MAX_ATTEMPTS` — retry budget, at least 1
    ///
    /// Returns an error if a numeric variable is set but unparsable.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut options = Self::default();

        if let Some(value) = lookup(DEBUG_ENV) {
            options.debug = is_truthy(&value);
        }

        if let Some(value) = lookup(TIMEOUT_ENV) {
            let secs = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .ok_or_else(|| format!("{TIMEOUT_ENV} must be a positive number, got '{value}'"))?;
            options.timeout = Duration::from_secs_f64(secs);
        }

        if let Some(value) = lookup(MAX_ATTEMPTS_ENV) {
            let attempts = value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts >= 1)
                .ok_or_else(|| {
                    format!("{MAX_ATTEMPTS_ENV} must be a positive integer, got '{value}'")
                })?;
            options.max_attempts = attempts;
        }

        Ok(options)
    }

    /// Enables or disables diagnostic events.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
